use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::TriggerError;

/// Object attributes delivered with an upload notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub etag: Option<String>,
}

/// A new object landed in the photo repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadNotification {
  pub object_key: String,
  #[serde(default)]
  pub metadata: ObjectMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectCreatedEvent {
  records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
  #[serde(default)]
  event_name: Option<String>,
  #[serde(default)]
  event_time: Option<DateTime<Utc>>,
  s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
struct StorageEntity {
  object: StorageObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageObject {
  key: String,
  #[serde(default)]
  size: Option<u64>,
  #[serde(default)]
  e_tag: Option<String>,
}

impl UploadNotification {
  pub fn new(object_key: impl Into<String>, metadata: ObjectMetadata) -> Self {
    Self {
      object_key: object_key.into(),
      metadata,
    }
  }

  /// The initial execution document: `{objectKey, metadata}`.
  pub fn document(&self) -> Value {
    json!({
      "objectKey": self.object_key,
      "metadata": self.metadata,
    })
  }

  /// Parse an object-created event envelope (`Records[].s3.object`).
  ///
  /// Records for other event types are skipped.
  pub fn from_object_created_event(event: &Value) -> Result<Vec<Self>, TriggerError> {
    let event: ObjectCreatedEvent =
      serde_json::from_value(event.clone()).map_err(|e| TriggerError::InvalidNotification {
        message: e.to_string(),
      })?;

    let notifications = event
      .records
      .into_iter()
      .filter(|record| {
        record
          .event_name
          .as_deref()
          .is_none_or(|name| name.starts_with("ObjectCreated"))
      })
      .map(|record| Self {
        object_key: record.s3.object.key,
        metadata: ObjectMetadata {
          size: record.s3.object.size,
          timestamp: record.event_time,
          content_type: None,
          etag: record.s3.object.e_tag,
        },
      })
      .collect();
    Ok(notifications)
  }
}
