//! Photon Trigger
//!
//! Starts executions from upload notifications. The object key is the
//! idempotency key: notifications redelivered within the dedupe window map
//! to the execution the first one started.

mod adapter;
mod error;
mod notification;

pub use adapter::{TriggerAdapter, TriggerConfig};
pub use error::TriggerError;
pub use notification::{ObjectMetadata, UploadNotification};
