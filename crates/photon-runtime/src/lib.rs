//! Photon Runtime
//!
//! Executes locked workflows. The runtime is responsible for:
//! - Driving executions through their state graph, one recorded transition at a time
//! - Invoking tasks with deadlines and applying retry and catch rules
//! - Routing choice states
//! - Forking parallel branches as child executions and joining their outputs
//! - Enforcing workflow timeouts
//! - Resuming interrupted executions from their history

mod choice;
mod engine;
mod error;
mod parallel;
mod retry;
mod task;

pub use choice::route;
pub use engine::{Engine, EngineConfig};
pub use error::RuntimeError;
pub use retry::{RetryDecision, backoff_delay, decide, matching_policy};
pub use task::{TaskExecutor, TaskFailure, TaskRegistry, TaskRequest};
