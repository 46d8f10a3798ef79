use thiserror::Error;

/// Errors from execution stores.
#[derive(Debug, Error)]
pub enum Error {
  #[error("execution not found: {execution_id}")]
  NotFound { execution_id: String },

  #[error("execution already exists: {execution_id}")]
  AlreadyExists { execution_id: String },

  #[error("execution is closed: {execution_id}")]
  Closed { execution_id: String },

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}
