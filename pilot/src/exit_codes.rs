//! Stable exit codes for `pilot` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration or plan, unknown task id, or another fatal error.
pub const INVALID: i32 = 1;
/// `pilot current` found no active task.
pub const NO_TASK: i32 = 2;
