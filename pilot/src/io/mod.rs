//! Side-effecting helpers: settings, plan file, prompts, backends, processes.

pub mod backend;
pub mod config;
pub mod plan_store;
pub mod process;
pub mod prompt;
