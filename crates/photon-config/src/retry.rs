use serde::{Deserialize, Serialize};

fn default_interval_seconds() -> f64 {
  1.0
}

fn default_max_attempts() -> u32 {
  3
}

fn default_backoff_rate() -> f64 {
  2.0
}

/// Retry policy attached to a task state.
///
/// Policies are evaluated in declaration order and only the first one whose
/// `errors` list matches the raised error class is consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Error classes this policy applies to, e.g. `["ImageIdentifyError"]` or
  /// `["States.ALL"]`.
  pub errors: Vec<String>,
  /// Delay before the first retry.
  #[serde(default = "default_interval_seconds")]
  pub interval_seconds: f64,
  /// Number of retries allowed. Zero disables retries for the matched classes.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// Multiplier applied to the delay on every subsequent retry.
  #[serde(default = "default_backoff_rate")]
  pub backoff_rate: f64,
  /// Optional upper bound on the computed delay.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_delay_seconds: Option<f64>,
}

impl RetryPolicy {
  /// A policy for `errors` with the default interval and backoff.
  pub fn new(errors: Vec<String>, max_attempts: u32) -> Self {
    Self {
      errors,
      interval_seconds: default_interval_seconds(),
      max_attempts,
      backoff_rate: default_backoff_rate(),
      max_delay_seconds: None,
    }
  }
}

/// Fallback route taken once retries for an error are exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchRule {
  pub errors: Vec<String>,
  pub next: String,
  /// Where the error object is placed in the document. Defaults to `$`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_path: Option<String>,
}
