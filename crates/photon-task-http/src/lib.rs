//! Photon HTTP task executor
//!
//! Invokes a task by POSTing its input document as JSON to the endpoint
//! configured for it. The response body is the task result.
//!
//! Failures follow the function-invocation convention: a body of the form
//! `{"errorType": "...", "errorMessage": "..."}` is a typed task error with
//! `errorType` as the error class. Transport errors and 5xx responses without
//! such a body are transient `States.TaskFailed` failures.

mod error;

use std::time::Duration;

use async_trait::async_trait;
use photon_config::{SystemConfig, TaskEndpoint, error_class};
use photon_runtime::{TaskExecutor, TaskFailure, TaskRegistry, TaskRequest};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

pub use error::HttpTaskError;

/// Header carrying the execution id of the invocation.
pub const EXECUTION_ID_HEADER: &str = "x-photon-execution-id";
/// Header carrying the 1-based attempt number.
pub const ATTEMPT_HEADER: &str = "x-photon-attempt";

const MAX_CAUSE_BODY: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
  error_type: String,
  #[serde(default)]
  error_message: String,
}

/// A task executor backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTaskExecutor {
  task: String,
  endpoint: Url,
  timeout: Option<Duration>,
  client: Client,
}

impl HttpTaskExecutor {
  pub fn new(
    task: impl Into<String>,
    endpoint: &TaskEndpoint,
    client: Client,
  ) -> Result<Self, HttpTaskError> {
    let task = task.into();
    let url = Url::parse(&endpoint.url).map_err(|source| HttpTaskError::InvalidUrl {
      task: task.clone(),
      source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(HttpTaskError::UnsupportedScheme {
        task,
        scheme: url.scheme().to_string(),
      });
    }

    Ok(Self {
      task,
      endpoint: url,
      timeout: endpoint.timeout_seconds.map(Duration::from_secs),
      client,
    })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  /// One executor per configured task, sharing a single connection pool.
  pub fn registry(config: &SystemConfig) -> Result<TaskRegistry, HttpTaskError> {
    let client = Client::builder().build()?;
    let mut registry = TaskRegistry::new();
    for (task, endpoint) in &config.tasks {
      let executor = Self::new(task.clone(), endpoint, client.clone())?;
      registry.register(task.clone(), std::sync::Arc::new(executor));
    }
    Ok(registry)
  }
}

#[async_trait]
impl TaskExecutor for HttpTaskExecutor {
  #[instrument(
    name = "http_task_invoke",
    skip(self, request, cancel),
    fields(
      task = %self.task,
      execution_id = %request.execution_id,
      attempt = request.attempt,
    )
  )]
  async fn invoke(
    &self,
    request: TaskRequest,
    cancel: CancellationToken,
  ) -> Result<Value, TaskFailure> {
    let send = self
      .client
      .post(self.endpoint.clone())
      .header(EXECUTION_ID_HEADER, &request.execution_id)
      .header(ATTEMPT_HEADER, request.attempt.to_string())
      .timeout(request.timeout)
      .json(&request.input)
      .send();

    let response = tokio::select! {
      response = send => response,
      _ = cancel.cancelled() => {
        debug!("http_task_cancelled");
        return Err(TaskFailure::new(error_class::ABORTED, "invocation cancelled"));
      }
    };
    let response = response.map_err(|e| transport_failure(e, request.timeout))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| transport_failure(e, request.timeout))?;

    let result = interpret(status, &body);
    if let Err(failure) = &result {
      warn!(status = status.as_u16(), error = %failure.error, "http_task_failed");
    }
    result
  }

  fn timeout(&self) -> Option<Duration> {
    self.timeout
  }
}

fn transport_failure(error: reqwest::Error, timeout: Duration) -> TaskFailure {
  if error.is_timeout() {
    TaskFailure::timeout(timeout)
  } else {
    TaskFailure::task_failed(error.to_string())
  }
}

/// Map a response to a task result or failure.
fn interpret(status: StatusCode, body: &str) -> Result<Value, TaskFailure> {
  let parsed: Option<Value> = serde_json::from_str(body).ok();

  if let Some(error) = parsed
    .as_ref()
    .and_then(|value| serde_json::from_value::<ErrorBody>(value.clone()).ok())
  {
    return Err(TaskFailure::new(error.error_type, error.error_message));
  }

  if !status.is_success() {
    return Err(TaskFailure::task_failed(format!(
      "endpoint responded {}: {}",
      status,
      truncate(body)
    )));
  }

  match parsed {
    Some(value) => Ok(value),
    None if body.trim().is_empty() => Ok(Value::Null),
    None => Err(TaskFailure::new(
      error_class::RUNTIME,
      format!("endpoint returned a non-JSON body: {}", truncate(body)),
    )),
  }
}

fn truncate(body: &str) -> &str {
  match body.char_indices().nth(MAX_CAUSE_BODY) {
    Some((end, _)) => &body[..end],
    None => body,
  }
}
