use std::time::Duration;

use chrono::{TimeDelta, Utc};
use photon_config::SystemConfig;
use photon_runtime::Engine;
use photon_store::Claim;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::TriggerError;
use crate::notification::UploadNotification;

/// Configuration for the trigger adapter.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
  /// Workflow started for every new upload.
  pub workflow_id: String,
  /// Duplicate notifications for one object key within this window are dropped.
  pub dedupe_window: Duration,
}

impl TriggerConfig {
  pub fn new(workflow_id: impl Into<String>, config: &SystemConfig) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      dedupe_window: Duration::from_secs(config.dedupe_window_seconds),
    }
  }
}

/// Turns upload notifications into executions, at most one per object key
/// within the dedupe window.
#[derive(Clone)]
pub struct TriggerAdapter {
  engine: Engine,
  config: TriggerConfig,
}

impl TriggerAdapter {
  pub fn new(engine: Engine, config: TriggerConfig) -> Self {
    Self { engine, config }
  }

  /// Start an execution for an upload, or return the execution already
  /// started for the same object key.
  #[instrument(
    name = "upload_notification",
    skip(self, notification),
    fields(
      object_key = %notification.object_key,
      workflow_id = %self.config.workflow_id,
    )
  )]
  pub async fn on_upload_notification(
    &self,
    notification: UploadNotification,
  ) -> Result<String, TriggerError> {
    if notification.object_key.is_empty() {
      return Err(TriggerError::InvalidNotification {
        message: "object key is empty".to_string(),
      });
    }

    let store = self.engine.store();
    let execution_id = uuid::Uuid::new_v4().to_string();
    let window = TimeDelta::from_std(self.config.dedupe_window).unwrap_or(TimeDelta::MAX);

    let claim = store
      .claim_idempotency_key(&notification.object_key, &execution_id, Utc::now(), window)
      .await?;
    if let Claim::Existing(existing) = claim {
      info!(execution_id = %existing, "duplicate_notification_ignored");
      return Ok(existing);
    }

    let started = self
      .engine
      .start_with_id(&self.config.workflow_id, &execution_id, notification.document())
      .await;

    if let Err(e) = started {
      warn!(execution_id = %execution_id, error = %e, "execution_start_failed");
      // Let a redelivered notification try again
      if let Err(release) = store
        .release_idempotency_key(&notification.object_key, &execution_id)
        .await
      {
        warn!(error = %release, "idempotency_key_release_failed");
      }
      return Err(e.into());
    }

    info!(execution_id = %execution_id, "execution_triggered");
    Ok(execution_id)
  }

  /// Handle every object-created record of an event envelope, in order.
  pub async fn on_object_created_event(&self, event: &Value) -> Result<Vec<String>, TriggerError> {
    let mut execution_ids = Vec::new();
    for notification in UploadNotification::from_object_created_event(event)? {
      execution_ids.push(self.on_upload_notification(notification).await?);
    }
    Ok(execution_ids)
  }
}
