/// Errors raised while wiring HTTP task executors.
///
/// Invocation failures are not reported here; they become task failures.
#[derive(Debug, thiserror::Error)]
pub enum HttpTaskError {
  #[error("task '{task}' has an invalid endpoint url: {source}")]
  InvalidUrl {
    task: String,
    #[source]
    source: url::ParseError,
  },

  #[error("task '{task}' endpoint must use http or https, got '{scheme}'")]
  UnsupportedScheme { task: String, scheme: String },

  #[error("failed to build http client: {0}")]
  Client(#[from] reqwest::Error),
}
