use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{EventKind, ExecutionEvent, ParentRef};
use crate::status::{ExecutionError, ExecutionStatus};

/// Where the driver stands inside the state graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cursor {
  /// Started, no state entered yet.
  Start,
  /// Inside a state.
  InState(StateProgress),
  /// A state exited; `next` is `None` when it ended its graph.
  Between {
    from: String,
    next: Option<String>,
  },
  /// A terminal event was recorded.
  Finished,
}

/// Progress recorded inside the current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateProgress {
  pub state_id: String,
  /// Sequence of the `StateEntered` event that opened this visit.
  pub entered_sequence: u64,
  /// Invocations started since the state was entered.
  pub attempts: u32,
  /// Retries granted so far, per retry policy index.
  pub retry_counts: BTreeMap<usize, u32>,
  pub pending: Pending,
  /// Child execution ids, once the parallel state forked.
  pub branches: Option<Vec<String>>,
  pub branch_outcomes: BTreeMap<usize, BranchOutcome>,
}

/// The last unresolved step of a task state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Pending {
  #[default]
  Nothing,
  /// An invocation started but no outcome was recorded.
  Invoking { attempt: u32, input: Value },
  Succeeded { result: Value },
  Failed { error: String, cause: String },
  /// A retry was scheduled; the next invocation has not started.
  RetryScheduled,
  Caught {
    catch_index: usize,
    error: String,
    cause: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchOutcome {
  Succeeded { output: Value },
  Failed { error: String, cause: String },
}

/// Execution state derived by folding its history.
///
/// Replay is a pure function of the event sequence: the same history always
/// yields the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
  pub execution_id: String,
  pub workflow_id: String,
  pub parent: Option<ParentRef>,
  pub status: ExecutionStatus,
  pub input: Value,
  pub document: Value,
  pub cursor: Cursor,
  pub output: Option<Value>,
  pub error: Option<ExecutionError>,
  pub started_at: Option<DateTime<Utc>>,
  pub last_sequence: u64,
}

impl ExecutionSnapshot {
  /// Fold a history into a snapshot.
  ///
  /// Returns `None` for an empty history.
  pub fn replay(history: &[ExecutionEvent]) -> Option<Self> {
    let first = history.first()?;
    let mut snapshot = ExecutionSnapshot {
      execution_id: first.execution_id.clone(),
      workflow_id: String::new(),
      parent: None,
      status: ExecutionStatus::Running,
      input: Value::Null,
      document: Value::Null,
      cursor: Cursor::Start,
      output: None,
      error: None,
      started_at: None,
      last_sequence: 0,
    };
    for event in history {
      snapshot.apply(event);
    }
    Some(snapshot)
  }

  /// Apply one event.
  pub fn apply(&mut self, event: &ExecutionEvent) {
    self.last_sequence = event.sequence;

    match &event.kind {
      EventKind::ExecutionStarted {
        workflow_id,
        input,
        parent,
      } => {
        self.workflow_id = workflow_id.clone();
        self.parent = parent.clone();
        self.input = input.clone();
        self.document = input.clone();
        self.started_at = Some(event.recorded_at);
        self.status = ExecutionStatus::Running;
        self.cursor = Cursor::Start;
      }
      EventKind::StateEntered { state_id, document } => {
        self.document = document.clone();
        self.cursor = Cursor::InState(StateProgress {
          state_id: state_id.clone(),
          entered_sequence: event.sequence,
          ..Default::default()
        });
      }
      EventKind::TaskStarted { attempt, input, .. } => {
        if let Some(progress) = self.progress_mut() {
          progress.attempts = *attempt;
          progress.pending = Pending::Invoking {
            attempt: *attempt,
            input: input.clone(),
          };
        }
      }
      EventKind::TaskSucceeded { result, .. } => {
        if let Some(progress) = self.progress_mut() {
          progress.pending = Pending::Succeeded {
            result: result.clone(),
          };
        }
      }
      EventKind::TaskFailed { error, cause, .. } => {
        if let Some(progress) = self.progress_mut() {
          progress.pending = Pending::Failed {
            error: error.clone(),
            cause: cause.clone(),
          };
        }
      }
      EventKind::RetryScheduled {
        policy_index,
        retry_count,
        ..
      } => {
        if let Some(progress) = self.progress_mut() {
          progress.retry_counts.insert(*policy_index, *retry_count);
          progress.pending = Pending::RetryScheduled;
        }
      }
      EventKind::ErrorCaught {
        catch_index,
        error,
        cause,
        ..
      } => {
        if let Some(progress) = self.progress_mut() {
          progress.pending = Pending::Caught {
            catch_index: *catch_index,
            error: error.clone(),
            cause: cause.clone(),
          };
        }
      }
      EventKind::ParallelStarted { branches, .. } => {
        if let Some(progress) = self.progress_mut() {
          progress.branches = Some(branches.clone());
        }
      }
      EventKind::BranchSucceeded {
        branch_index,
        output,
        ..
      } => {
        if let Some(progress) = self.progress_mut() {
          progress.branch_outcomes.insert(
            *branch_index,
            BranchOutcome::Succeeded {
              output: output.clone(),
            },
          );
        }
      }
      EventKind::BranchFailed {
        branch_index,
        error,
        cause,
        ..
      } => {
        if let Some(progress) = self.progress_mut() {
          progress.branch_outcomes.insert(
            *branch_index,
            BranchOutcome::Failed {
              error: error.clone(),
              cause: cause.clone(),
            },
          );
        }
      }
      EventKind::ParallelJoined { .. } => {}
      EventKind::StateExited {
        state_id,
        document,
        next,
      } => {
        self.document = document.clone();
        self.cursor = Cursor::Between {
          from: state_id.clone(),
          next: next.clone(),
        };
      }
      EventKind::ExecutionSucceeded { output } => {
        self.finish(ExecutionStatus::Succeeded);
        self.output = Some(output.clone());
      }
      EventKind::ExecutionFailed { error, cause } => {
        self.finish(ExecutionStatus::Failed);
        self.error = Some(ExecutionError::new(error, cause));
      }
      EventKind::ExecutionTimedOut { error, cause } => {
        self.finish(ExecutionStatus::TimedOut);
        self.error = Some(ExecutionError::new(error, cause));
      }
      EventKind::ExecutionAborted { error, cause } => {
        self.finish(ExecutionStatus::Aborted);
        self.error = Some(ExecutionError::new(error, cause));
      }
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  fn finish(&mut self, status: ExecutionStatus) {
    self.status = status;
    self.cursor = Cursor::Finished;
  }

  fn progress_mut(&mut self) -> Option<&mut StateProgress> {
    match &mut self.cursor {
      Cursor::InState(progress) => Some(progress),
      _ => None,
    }
  }
}
