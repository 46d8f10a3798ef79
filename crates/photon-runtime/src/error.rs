//! Runtime error types.

use photon_workflow::WorkflowError;

/// Errors that can occur during engine operations.
///
/// Task failures are not errors at this level: they are recorded in the
/// execution history and routed through retry and catch rules.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The workflow id is not registered.
  #[error("workflow not found: {workflow_id}")]
  WorkflowNotFound { workflow_id: String },

  /// The start input is not acceptable.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// No history exists for the execution id.
  #[error("execution not found: {execution_id}")]
  ExecutionNotFound { execution_id: String },

  /// A workflow references a task with no registered executor.
  #[error("state '{state_id}' references task '{task}' with no registered executor")]
  UnknownTask { state_id: String, task: String },

  /// Branch sub-executions are resumed through their parent.
  #[error("execution {execution_id} is a parallel branch; resume its parent instead")]
  BranchExecution { execution_id: String },

  /// History does not match the workflow definition.
  #[error("execution {execution_id} is inconsistent with its workflow: {message}")]
  Inconsistent {
    execution_id: String,
    message: String,
  },

  /// The execution driver stopped without reaching a terminal state.
  #[error("execution {execution_id} driver stopped: {message}")]
  Driver {
    execution_id: String,
    message: String,
  },

  #[error(transparent)]
  Definition(#[from] WorkflowError),

  #[error("store error: {0}")]
  Store(#[from] photon_store::Error),
}
