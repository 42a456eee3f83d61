//! Stable exit codes for dispatch CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments/config, or the load or commit failed.
pub const INVALID: i32 = 1;
/// A requested move crossed the urgent boundary; nothing was saved.
pub const REJECTED: i32 = 2;
