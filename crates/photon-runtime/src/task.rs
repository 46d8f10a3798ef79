//! Task invocation contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use photon_config::error_class;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Input handed to a task executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
  /// Execution ID this invocation belongs to.
  pub execution_id: String,
  /// State being executed.
  pub state_id: String,
  /// Task name, as referenced by the state.
  pub task: String,
  /// 1-based invocation count within the state.
  pub attempt: u32,
  /// Sub-document selected by the state's input path. Identical across retries.
  pub input: Value,
  /// Deadline the engine enforces for this invocation.
  pub timeout: Duration,
}

/// A typed task failure: error class plus a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
  pub error: String,
  pub cause: String,
}

impl TaskFailure {
  pub fn new(error: impl Into<String>, cause: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      cause: cause.into(),
    }
  }

  /// The invocation exceeded its deadline.
  pub fn timeout(after: Duration) -> Self {
    Self::new(
      error_class::TIMEOUT,
      format!("task did not complete within {}s", after.as_secs_f64()),
    )
  }

  /// Transient infrastructure failure.
  pub fn task_failed(cause: impl Into<String>) -> Self {
    Self::new(error_class::TASK_FAILED, cause)
  }
}

/// An external task.
///
/// Implementations must treat repeated invocations with identical input as
/// safe: retries and crash recovery resend the same input.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
  /// Invoke the task. The engine enforces the timeout; `cancel` fires when
  /// the result is no longer wanted.
  async fn invoke(&self, request: TaskRequest, cancel: CancellationToken)
  -> Result<Value, TaskFailure>;

  /// Timeout configured for this executor, used when the state declares none.
  fn timeout(&self) -> Option<Duration> {
    None
  }
}

/// Task name to executor mapping.
#[derive(Clone, Default)]
pub struct TaskRegistry {
  executors: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an executor under a task name, replacing any previous one.
  pub fn register(&mut self, task: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
    self.executors.insert(task.into(), executor);
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(mut self, task: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
    self.register(task, executor);
    self
  }

  pub fn get(&self, task: &str) -> Option<&Arc<dyn TaskExecutor>> {
    self.executors.get(task)
  }

  pub fn contains(&self, task: &str) -> bool {
    self.executors.contains_key(task)
  }
}
