//! Photon Store
//!
//! This crate provides the durable execution history for Photon. Every
//! transition of an execution is appended as an [`ExecutionEvent`]; the
//! history is the single source of truth for status, which is derived by
//! replaying it ([`ExecutionSnapshot::replay`]).
//!
//! The [`Store`] trait defines operations for:
//! - Appending events (atomic, totally ordered per execution)
//! - Reading an execution's history and derived status
//! - Claiming idempotency keys for deduplicated starts

mod error;
mod events;
mod memory;
mod snapshot;
mod sqlite;
mod status;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

pub use error::Error;
pub use events::{EventKind, ExecutionEvent, ParentRef};
pub use memory::MemoryStore;
pub use snapshot::{BranchOutcome, Cursor, ExecutionSnapshot, Pending, StateProgress};
pub use sqlite::SqliteStore;
pub use status::{ExecutionError, ExecutionStatus, StatusReport};

/// Result of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
  /// The key is now bound to the proposed execution id.
  Claimed,
  /// The key is bound to an execution claimed within the window.
  Existing(String),
}

/// Storage trait for execution histories.
#[async_trait]
pub trait Store: Send + Sync {
  /// Append an event, assigning the next sequence number.
  ///
  /// The first event of an execution must be `ExecutionStarted`; nothing can
  /// be appended after a terminal event.
  async fn append(&self, execution_id: &str, kind: EventKind) -> Result<ExecutionEvent, Error>;

  /// Full history of an execution in sequence order.
  async fn history(&self, execution_id: &str) -> Result<Vec<ExecutionEvent>, Error>;

  /// Ids of every known execution, branch sub-executions included.
  async fn list_executions(&self) -> Result<Vec<String>, Error>;

  /// Bind `key` to `execution_id` unless it is already bound to an execution
  /// claimed less than `window` before `now`. Atomic.
  async fn claim_idempotency_key(
    &self,
    key: &str,
    execution_id: &str,
    now: DateTime<Utc>,
    window: TimeDelta,
  ) -> Result<Claim, Error>;

  /// Drop a claim made for `execution_id`. Claims held by other executions are kept.
  async fn release_idempotency_key(&self, key: &str, execution_id: &str) -> Result<(), Error>;

  /// Replay an execution's history.
  async fn snapshot(&self, execution_id: &str) -> Result<ExecutionSnapshot, Error> {
    let history = self.history(execution_id).await?;
    ExecutionSnapshot::replay(&history).ok_or_else(|| Error::NotFound {
      execution_id: execution_id.to_string(),
    })
  }

  /// Status, output or error, and history of an execution.
  async fn status(&self, execution_id: &str) -> Result<StatusReport, Error> {
    let history = self.history(execution_id).await?;
    StatusReport::from_history(history).ok_or_else(|| Error::NotFound {
      execution_id: execution_id.to_string(),
    })
  }
}

/// Checks shared by every store before an append.
pub(crate) fn check_append(
  execution_id: &str,
  last: Option<&EventKind>,
  kind: &EventKind,
) -> Result<(), Error> {
  let starting = matches!(kind, EventKind::ExecutionStarted { .. });
  match last {
    None if !starting => Err(Error::NotFound {
      execution_id: execution_id.to_string(),
    }),
    Some(_) if starting => Err(Error::AlreadyExists {
      execution_id: execution_id.to_string(),
    }),
    Some(last) if last.is_terminal() => {
      debug!(
        execution_id = %execution_id,
        event = kind.name(),
        "append_after_terminal_rejected"
      );
      Err(Error::Closed {
        execution_id: execution_id.to_string(),
      })
    }
    _ => Ok(()),
  }
}
