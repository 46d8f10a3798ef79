use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_task_timeout_seconds() -> u64 {
  60
}

fn default_dedupe_window_seconds() -> u64 {
  300
}

/// Where and how to reach one external task executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEndpoint {
  pub url: String,
  /// Overrides the system default timeout for this task.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_seconds: Option<u64>,
}

/// System-wide wiring handed to each component at construction.
///
/// ```json
/// {
///   "database_url": "sqlite:///var/lib/photon/photon.db",
///   "default_task_timeout_seconds": 60,
///   "dedupe_window_seconds": 300,
///   "tasks": {
///     "extract-image-metadata": { "url": "http://extract.internal/invoke", "timeout_seconds": 200 }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
  /// SQLite connection string. When absent the CLI uses `<data-dir>/photon.db`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,
  #[serde(default = "default_task_timeout_seconds")]
  pub default_task_timeout_seconds: u64,
  #[serde(default = "default_dedupe_window_seconds")]
  pub dedupe_window_seconds: u64,
  #[serde(default)]
  pub tasks: HashMap<String, TaskEndpoint>,
}

impl Default for SystemConfig {
  fn default() -> Self {
    Self {
      database_url: None,
      default_task_timeout_seconds: default_task_timeout_seconds(),
      dedupe_window_seconds: default_dedupe_window_seconds(),
      tasks: HashMap::new(),
    }
  }
}

impl SystemConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = SystemConfig::from_json("{}").unwrap();
    assert_eq!(config, SystemConfig::default());
    assert_eq!(config.default_task_timeout_seconds, 60);
    assert_eq!(config.dedupe_window_seconds, 300);
  }

  #[test]
  fn test_task_endpoints() {
    let config = SystemConfig::from_json(
      r#"{ "tasks": { "thumbnail": { "url": "http://localhost:9000/thumbnail", "timeout_seconds": 300 } } }"#,
    )
    .unwrap();

    let endpoint = &config.tasks["thumbnail"];
    assert_eq!(endpoint.url, "http://localhost:9000/thumbnail");
    assert_eq!(endpoint.timeout_seconds, Some(300));
  }
}
