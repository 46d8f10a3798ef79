use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::FromRow;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use tokio::sync::Mutex;
use tracing::info;

use crate::{Claim, Error, EventKind, ExecutionEvent, Store, check_append};

/// SQLite-based store implementation.
///
/// Appends to one execution are serialized by a per-execution lock held across
/// the read-check-insert, so unrelated executions append concurrently. The
/// `(execution_id, sequence)` primary key rejects a duplicate sequence from any
/// other writer. Idempotency claims share a separate lock.
pub struct SqliteStore {
  pool: SqlitePool,
  appends: Mutex<HashMap<String, Arc<Mutex<()>>>>,
  claims: Mutex<()>,
}

#[derive(FromRow)]
struct EventRow {
  execution_id: String,
  sequence: i64,
  recorded_at: DateTime<Utc>,
  event: Json<EventKind>,
}

impl From<EventRow> for ExecutionEvent {
  fn from(row: EventRow) -> Self {
    ExecutionEvent {
      execution_id: row.execution_id,
      sequence: row.sequence as u64,
      recorded_at: row.recorded_at,
      kind: row.event.0,
    }
  }
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self {
      pool,
      appends: Mutex::new(HashMap::new()),
      claims: Mutex::new(()),
    }
  }

  /// Open (creating if missing) the database at `url` and run migrations.
  ///
  /// In-memory databases get a single connection so every query sees the same data.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
      .max_connections(max_connections)
      .connect_with(options)
      .await?;

    let store = Self::new(pool);
    store.migrate().await?;
    info!(url = %url, max_connections, "store_opened");
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn append_lock(&self, execution_id: &str) -> Arc<Mutex<()>> {
    self
      .appends
      .lock()
      .await
      .entry(execution_id.to_string())
      .or_default()
      .clone()
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn append(&self, execution_id: &str, kind: EventKind) -> Result<ExecutionEvent, Error> {
    let lock = self.append_lock(execution_id).await;
    let _guard = lock.lock().await;

    let last: Option<(i64, Json<EventKind>)> = sqlx::query_as(
      r#"
      SELECT sequence, event
      FROM execution_events
      WHERE execution_id = ?
      ORDER BY sequence DESC
      LIMIT 1
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?;

    check_append(execution_id, last.as_ref().map(|(_, event)| &event.0), &kind)?;

    let event = ExecutionEvent {
      execution_id: execution_id.to_string(),
      sequence: last.map(|(sequence, _)| sequence as u64).unwrap_or(0) + 1,
      recorded_at: Utc::now(),
      kind,
    };

    sqlx::query(
      r#"
      INSERT INTO execution_events (execution_id, sequence, recorded_at, event)
      VALUES (?, ?, ?, ?)
      "#,
    )
    .bind(&event.execution_id)
    .bind(event.sequence as i64)
    .bind(event.recorded_at)
    .bind(Json(&event.kind))
    .execute(&self.pool)
    .await?;

    Ok(event)
  }

  async fn history(&self, execution_id: &str) -> Result<Vec<ExecutionEvent>, Error> {
    let rows: Vec<EventRow> = sqlx::query_as(
      r#"
      SELECT execution_id, sequence, recorded_at, event
      FROM execution_events
      WHERE execution_id = ?
      ORDER BY sequence ASC
      "#,
    )
    .bind(execution_id)
    .fetch_all(&self.pool)
    .await?;

    if rows.is_empty() {
      return Err(Error::NotFound {
        execution_id: execution_id.to_string(),
      });
    }
    Ok(rows.into_iter().map(ExecutionEvent::from).collect())
  }

  async fn list_executions(&self) -> Result<Vec<String>, Error> {
    let ids: Vec<(String,)> = sqlx::query_as(
      r#"
      SELECT DISTINCT execution_id
      FROM execution_events
      ORDER BY execution_id ASC
      "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
  }

  async fn claim_idempotency_key(
    &self,
    key: &str,
    execution_id: &str,
    now: DateTime<Utc>,
    window: TimeDelta,
  ) -> Result<Claim, Error> {
    let _guard = self.claims.lock().await;

    let existing: Option<(String, DateTime<Utc>)> = sqlx::query_as(
      r#"
      SELECT execution_id, claimed_at
      FROM idempotency_keys
      WHERE idempotency_key = ?
      "#,
    )
    .bind(key)
    .fetch_optional(&self.pool)
    .await?;

    if let Some((existing, claimed_at)) = existing {
      if now - claimed_at < window {
        return Ok(Claim::Existing(existing));
      }
    }

    sqlx::query(
      r#"
      INSERT INTO idempotency_keys (idempotency_key, execution_id, claimed_at)
      VALUES (?, ?, ?)
      ON CONFLICT(idempotency_key) DO UPDATE
      SET execution_id = excluded.execution_id, claimed_at = excluded.claimed_at
      "#,
    )
    .bind(key)
    .bind(execution_id)
    .bind(now)
    .execute(&self.pool)
    .await?;

    Ok(Claim::Claimed)
  }

  async fn release_idempotency_key(&self, key: &str, execution_id: &str) -> Result<(), Error> {
    let _guard = self.claims.lock().await;

    sqlx::query(
      r#"
      DELETE FROM idempotency_keys
      WHERE idempotency_key = ? AND execution_id = ?
      "#,
    )
    .bind(key)
    .bind(execution_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}
