//! Deterministic, pure logic shared by the agent core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action;
pub mod invariants;
pub mod memory;
pub mod plan_update;
pub mod selector;
pub mod types;
