use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::ExecutionEvent;
use crate::snapshot::ExecutionSnapshot;

/// Status of an execution, derived from its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
  Running,
  Succeeded,
  Failed,
  TimedOut,
  /// A parallel branch cancelled because a sibling failed.
  Aborted,
}

impl ExecutionStatus {
  pub fn is_terminal(self) -> bool {
    !matches!(self, ExecutionStatus::Running)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ExecutionStatus::Running => "RUNNING",
      ExecutionStatus::Succeeded => "SUCCEEDED",
      ExecutionStatus::Failed => "FAILED",
      ExecutionStatus::TimedOut => "TIMED_OUT",
      ExecutionStatus::Aborted => "ABORTED",
    }
  }
}

impl fmt::Display for ExecutionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Terminal error of an execution: the error class and its cause, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
  pub error: String,
  pub cause: String,
}

impl ExecutionError {
  pub fn new(error: impl Into<String>, cause: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      cause: cause.into(),
    }
  }
}

/// Answer to a status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<ExecutionError>,
  pub history: Vec<ExecutionEvent>,
}

impl StatusReport {
  /// Build a report by replaying `history`. Returns `None` for an empty history.
  pub fn from_history(history: Vec<ExecutionEvent>) -> Option<Self> {
    let snapshot = ExecutionSnapshot::replay(&history)?;
    Some(Self {
      execution_id: snapshot.execution_id,
      workflow_id: snapshot.workflow_id,
      status: snapshot.status,
      output: snapshot.output,
      error: snapshot.error,
      history,
    })
  }
}
