//! Well-known error class names.
//!
//! Task executors raise their own business error classes (for example
//! `ImageIdentifyError`). The engine raises the classes below for failures it
//! detects itself.

/// Wildcard matching every error class.
pub const ALL: &str = "States.ALL";

/// Short alias accepted for [`ALL`] in retry and catch lists.
pub const ALL_SHORT: &str = "ALL";

/// A task invocation exceeded its deadline.
pub const TIMEOUT: &str = "States.Timeout";

/// Transient invocation failure (transport error, executor unavailable).
pub const TASK_FAILED: &str = "States.TaskFailed";

/// The execution document did not match a state's paths.
pub const RUNTIME: &str = "States.Runtime";

/// A parallel branch failed without reporting its own error.
pub const BRANCH_FAILED: &str = "States.BranchFailed";

/// A parallel branch was cancelled because a sibling branch failed.
pub const ABORTED: &str = "States.Aborted";

/// Returns true if `pattern` is one of the wildcard spellings.
pub fn is_wildcard(pattern: &str) -> bool {
  pattern == ALL || pattern == ALL_SHORT
}
