//! Plan-driven autonomous agent.
//!
//! A hierarchical project plan (epics, milestones, features, tasks) lives in a
//! JSON file. Each turn the agent shows the model the single active task, the
//! available tools and the conversation so far, then executes the one action
//! the model returns.
//!
//! - **[`core`]**: Pure logic: task selection, status updates, the action
//!   contract and conversation memory. No I/O.
//! - **[`io`]**: Configuration, plan persistence, prompt rendering, model
//!   backends and subprocess handling.
//! - **[`tools`]**: Capabilities the model can invoke.
//!
//! [`agent`] runs single turns; [`session`] drives turns until a stop
//! condition.

pub mod agent;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
