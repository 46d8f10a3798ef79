use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::{Claim, Error, EventKind, ExecutionEvent, Store, check_append};

type Log = Arc<Mutex<Vec<ExecutionEvent>>>;

/// In-process store.
///
/// Each execution has its own lock, so unrelated executions append in parallel.
#[derive(Default)]
pub struct MemoryStore {
  executions: RwLock<BTreeMap<String, Log>>,
  idempotency: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  async fn log(&self, execution_id: &str, create: bool) -> Option<Log> {
    if let Some(log) = self.executions.read().await.get(execution_id) {
      return Some(log.clone());
    }
    if !create {
      return None;
    }
    let mut executions = self.executions.write().await;
    Some(
      executions
        .entry(execution_id.to_string())
        .or_default()
        .clone(),
    )
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn append(&self, execution_id: &str, kind: EventKind) -> Result<ExecutionEvent, Error> {
    let starting = matches!(kind, EventKind::ExecutionStarted { .. });
    let log = self
      .log(execution_id, starting)
      .await
      .ok_or_else(|| Error::NotFound {
        execution_id: execution_id.to_string(),
      })?;

    let mut events = log.lock().await;
    check_append(execution_id, events.last().map(|e| &e.kind), &kind)?;

    let event = ExecutionEvent {
      execution_id: execution_id.to_string(),
      sequence: events.len() as u64 + 1,
      recorded_at: Utc::now(),
      kind,
    };
    events.push(event.clone());
    Ok(event)
  }

  async fn history(&self, execution_id: &str) -> Result<Vec<ExecutionEvent>, Error> {
    let log = self
      .log(execution_id, false)
      .await
      .ok_or_else(|| Error::NotFound {
        execution_id: execution_id.to_string(),
      })?;
    let events = log.lock().await;
    if events.is_empty() {
      return Err(Error::NotFound {
        execution_id: execution_id.to_string(),
      });
    }
    Ok(events.clone())
  }

  async fn list_executions(&self) -> Result<Vec<String>, Error> {
    Ok(self.executions.read().await.keys().cloned().collect())
  }

  async fn claim_idempotency_key(
    &self,
    key: &str,
    execution_id: &str,
    now: DateTime<Utc>,
    window: TimeDelta,
  ) -> Result<Claim, Error> {
    let mut keys = self.idempotency.lock().await;
    if let Some((existing, claimed_at)) = keys.get(key) {
      if now - *claimed_at < window {
        return Ok(Claim::Existing(existing.clone()));
      }
    }
    keys.insert(key.to_string(), (execution_id.to_string(), now));
    Ok(Claim::Claimed)
  }

  async fn release_idempotency_key(&self, key: &str, execution_id: &str) -> Result<(), Error> {
    let mut keys = self.idempotency.lock().await;
    if keys.get(key).is_some_and(|(owner, _)| owner == execution_id) {
      keys.remove(key);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn started() -> EventKind {
    EventKind::ExecutionStarted {
      workflow_id: "wf".to_string(),
      input: json!({}),
      parent: None,
    }
  }

  #[tokio::test]
  async fn test_append_assigns_sequence() {
    let store = MemoryStore::new();
    let first = store.append("a", started()).await.unwrap();
    let second = store
      .append(
        "a",
        EventKind::StateEntered {
          state_id: "S".to_string(),
          document: json!({}),
        },
      )
      .await
      .unwrap();

    assert_eq!(first.sequence, 1);
    assert_eq!(second.sequence, 2);
    assert_eq!(store.history("a").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_append_requires_start() {
    let store = MemoryStore::new();
    let result = store
      .append("missing", EventKind::ParallelJoined { state_id: "P".to_string() })
      .await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
    assert!(store.list_executions().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_append_after_terminal_is_rejected() {
    let store = MemoryStore::new();
    store.append("a", started()).await.unwrap();
    store
      .append("a", EventKind::ExecutionSucceeded { output: json!({}) })
      .await
      .unwrap();

    let result = store
      .append("a", EventKind::ExecutionSucceeded { output: json!({}) })
      .await;
    assert!(matches!(result, Err(Error::Closed { .. })));
  }

  #[tokio::test]
  async fn test_history_unknown_execution() {
    let store = MemoryStore::new();
    assert!(matches!(
      store.history("nope").await,
      Err(Error::NotFound { .. })
    ));
    assert!(matches!(
      store.status("nope").await,
      Err(Error::NotFound { .. })
    ));
  }

  #[tokio::test]
  async fn test_claim_idempotency_key_within_window() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let window = TimeDelta::seconds(300);

    assert_eq!(
      store.claim_idempotency_key("k", "e1", now, window).await.unwrap(),
      Claim::Claimed
    );
    assert_eq!(
      store
        .claim_idempotency_key("k", "e2", now + TimeDelta::seconds(10), window)
        .await
        .unwrap(),
      Claim::Existing("e1".to_string())
    );
    assert_eq!(
      store
        .claim_idempotency_key("k", "e3", now + TimeDelta::seconds(301), window)
        .await
        .unwrap(),
      Claim::Claimed
    );
  }

  #[tokio::test]
  async fn test_release_only_own_claim() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let window = TimeDelta::seconds(300);

    store.claim_idempotency_key("k", "e1", now, window).await.unwrap();
    store.release_idempotency_key("k", "other").await.unwrap();
    assert_eq!(
      store.claim_idempotency_key("k", "e2", now, window).await.unwrap(),
      Claim::Existing("e1".to_string())
    );

    store.release_idempotency_key("k", "e1").await.unwrap();
    assert_eq!(
      store.claim_idempotency_key("k", "e2", now, window).await.unwrap(),
      Claim::Claimed
    );
  }
}
