use photon_runtime::RuntimeError;

/// Error type for trigger operations.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
  #[error("invalid upload notification: {message}")]
  InvalidNotification { message: String },

  #[error("failed to start execution: {0}")]
  Start(#[from] RuntimeError),

  #[error("idempotency store error: {0}")]
  Store(#[from] photon_store::Error),
}
