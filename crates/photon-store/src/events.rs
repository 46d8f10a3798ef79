use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable entry of an execution's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
  pub execution_id: String,
  /// 1-based, gap-free, assigned by the store.
  pub sequence: u64,
  pub recorded_at: DateTime<Utc>,
  #[serde(flatten)]
  pub kind: EventKind,
}

/// Identifies the parallel state that forked a branch sub-execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
  pub execution_id: String,
  pub state_id: String,
  pub branch_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
  ExecutionStarted {
    workflow_id: String,
    input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ParentRef>,
  },
  StateEntered {
    state_id: String,
    document: Value,
  },
  TaskStarted {
    state_id: String,
    task: String,
    /// Counts every invocation of this state since it was entered, starting at 1.
    attempt: u32,
    input: Value,
  },
  TaskSucceeded {
    state_id: String,
    attempt: u32,
    result: Value,
  },
  TaskFailed {
    state_id: String,
    attempt: u32,
    error: String,
    cause: String,
  },
  RetryScheduled {
    state_id: String,
    policy_index: usize,
    /// Retries granted by this policy so far, including this one.
    retry_count: u32,
    delay_ms: u64,
  },
  ErrorCaught {
    state_id: String,
    catch_index: usize,
    error: String,
    cause: String,
    next: String,
  },
  ParallelStarted {
    state_id: String,
    branches: Vec<String>,
  },
  BranchSucceeded {
    state_id: String,
    branch_index: usize,
    execution_id: String,
    output: Value,
  },
  BranchFailed {
    state_id: String,
    branch_index: usize,
    execution_id: String,
    error: String,
    cause: String,
  },
  ParallelJoined {
    state_id: String,
  },
  StateExited {
    state_id: String,
    document: Value,
    /// `None` when the state ended its graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
  },
  ExecutionSucceeded {
    output: Value,
  },
  ExecutionFailed {
    error: String,
    cause: String,
  },
  ExecutionTimedOut {
    error: String,
    cause: String,
  },
  ExecutionAborted {
    error: String,
    cause: String,
  },
}

impl EventKind {
  /// True for events that close an execution.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      EventKind::ExecutionSucceeded { .. }
        | EventKind::ExecutionFailed { .. }
        | EventKind::ExecutionTimedOut { .. }
        | EventKind::ExecutionAborted { .. }
    )
  }

  /// Short snake_case name, used in logs and CLI output.
  pub fn name(&self) -> &'static str {
    match self {
      EventKind::ExecutionStarted { .. } => "execution_started",
      EventKind::StateEntered { .. } => "state_entered",
      EventKind::TaskStarted { .. } => "task_started",
      EventKind::TaskSucceeded { .. } => "task_succeeded",
      EventKind::TaskFailed { .. } => "task_failed",
      EventKind::RetryScheduled { .. } => "retry_scheduled",
      EventKind::ErrorCaught { .. } => "error_caught",
      EventKind::ParallelStarted { .. } => "parallel_started",
      EventKind::BranchSucceeded { .. } => "branch_succeeded",
      EventKind::BranchFailed { .. } => "branch_failed",
      EventKind::ParallelJoined { .. } => "parallel_joined",
      EventKind::StateExited { .. } => "state_exited",
      EventKind::ExecutionSucceeded { .. } => "execution_succeeded",
      EventKind::ExecutionFailed { .. } => "execution_failed",
      EventKind::ExecutionTimedOut { .. } => "execution_timed_out",
      EventKind::ExecutionAborted { .. } => "execution_aborted",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_event_serializes_flat_with_type_tag() {
    let event = ExecutionEvent {
      execution_id: "exec-1".to_string(),
      sequence: 2,
      recorded_at: Utc::now(),
      kind: EventKind::StateEntered {
        state_id: "ExtractImageMetadata".to_string(),
        document: json!({ "objectKey": "k" }),
      },
    };

    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "state_entered");
    assert_eq!(value["state_id"], "ExtractImageMetadata");
    assert_eq!(value["sequence"], 2);

    let back: ExecutionEvent = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
  }

  #[test]
  fn test_terminal_events() {
    assert!(
      EventKind::ExecutionSucceeded {
        output: json!({})
      }
      .is_terminal()
    );
    assert!(
      !EventKind::ParallelJoined {
        state_id: "P".to_string()
      }
      .is_terminal()
    );
  }
}
