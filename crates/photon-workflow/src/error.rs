use photon_path::PathError;
use thiserror::Error;

/// Definition errors, detected when a workflow is locked.
///
/// A workflow that fails validation is never executed.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("duplicate state id: {state_id}")]
  DuplicateStateId { state_id: String },

  #[error("start state '{start_at}' does not exist")]
  UnknownStartState { start_at: String },

  #[error("state '{state_id}' transitions to unknown state '{next}'")]
  UnknownNextState { state_id: String, next: String },

  #[error("state '{state_id}' has an invalid transition: {message}")]
  InvalidTransition { state_id: String, message: String },

  #[error("state '{state_id}' is not reachable from the start state")]
  UnreachableState { state_id: String },

  #[error("state '{state_id}' has no path to a terminal state")]
  NoTerminalPath { state_id: String },

  #[error("choice state '{state_id}' has no choice rules")]
  EmptyChoice { state_id: String },

  #[error("parallel state '{state_id}' has no branches")]
  EmptyParallel { state_id: String },

  #[error("state '{state_id}' has an invalid path")]
  InvalidPath {
    state_id: String,
    #[source]
    source: PathError,
  },

  #[error("state '{state_id}' has an invalid retry policy: {message}")]
  InvalidRetryPolicy { state_id: String, message: String },

  #[error("state '{state_id}' has an invalid catch rule: {message}")]
  InvalidCatchRule { state_id: String, message: String },

  #[error("state '{state_id}' references unknown task '{task}'")]
  UnknownTask { state_id: String, task: String },
}
