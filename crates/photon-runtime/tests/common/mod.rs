//! Fake task executors and the image recognition pipeline wiring.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use photon_config::WorkflowDef;
use photon_runtime::{Engine, EngineConfig, TaskExecutor, TaskFailure, TaskRegistry, TaskRequest};
use photon_store::{EventKind, ExecutionEvent, Store};
use photon_workflow::Workflow;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const IMAGE_RECOGNITION: &str = include_str!("../../../../workflows/image-recognition.json");

type Handler = dyn Fn(&TaskRequest) -> Result<Value, TaskFailure> + Send + Sync;

/// One recorded invocation.
#[derive(Clone)]
pub struct Call {
  pub request: TaskRequest,
  pub at: Instant,
  pub cancel: CancellationToken,
}

/// An executor answering synchronously from a closure and recording every call.
pub struct FakeTask {
  handler: Box<Handler>,
  calls: Mutex<Vec<Call>>,
}

impl FakeTask {
  pub fn new(
    handler: impl Fn(&TaskRequest) -> Result<Value, TaskFailure> + Send + Sync + 'static,
  ) -> Arc<Self> {
    Arc::new(Self {
      handler: Box::new(handler),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn returning(value: Value) -> Arc<Self> {
    Self::new(move |_| Ok(value.clone()))
  }

  pub fn failing(error: &str, cause: &str) -> Arc<Self> {
    let failure = TaskFailure::new(error, cause);
    Self::new(move |_| Err(failure.clone()))
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl TaskExecutor for FakeTask {
  async fn invoke(
    &self,
    request: TaskRequest,
    cancel: CancellationToken,
  ) -> Result<Value, TaskFailure> {
    self.calls.lock().unwrap().push(Call {
      request: request.clone(),
      at: Instant::now(),
      cancel,
    });
    (self.handler)(&request)
  }
}

/// An executor that never answers on its own; it only returns once cancelled.
#[derive(Default)]
pub struct HangingTask {
  tokens: Mutex<Vec<CancellationToken>>,
}

impl HangingTask {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn tokens(&self) -> Vec<CancellationToken> {
    self.tokens.lock().unwrap().clone()
  }
}

#[async_trait]
impl TaskExecutor for HangingTask {
  async fn invoke(
    &self,
    _request: TaskRequest,
    cancel: CancellationToken,
  ) -> Result<Value, TaskFailure> {
    self.tokens.lock().unwrap().push(cancel.clone());
    cancel.cancelled().await;
    Err(TaskFailure::new("States.Aborted", "cancelled"))
  }
}

pub fn labels() -> Value {
  json!([
    { "Name": "Cat", "Confidence": 98.5 },
    { "Name": "Pet", "Confidence": 97.1 }
  ])
}

pub fn thumbnail() -> Value {
  json!({ "thumbnail": { "key": "resized/cat.jpg", "width": 250, "height": 200 } })
}

/// Fake executors for every task of the image recognition workflow.
pub struct Pipeline {
  pub extract: Arc<FakeTask>,
  pub transform: Arc<FakeTask>,
  pub labels: Arc<FakeTask>,
  pub thumbnails: Arc<FakeTask>,
  pub store: Arc<FakeTask>,
}

impl Pipeline {
  pub fn new() -> Self {
    Self {
      extract: FakeTask::new(extract_metadata),
      transform: FakeTask::new(|request| {
        Ok(json!({
          "format": request.input["format"],
          "dimensions": request.input["dimensions"],
          "transformed": true,
        }))
      }),
      labels: FakeTask::returning(labels()),
      thumbnails: FakeTask::returning(thumbnail()),
      store: FakeTask::returning(json!({ "stored": true })),
    }
  }

  pub fn registry(&self) -> TaskRegistry {
    TaskRegistry::new()
      .with("extract-image-metadata", self.extract.clone())
      .with("transform-metadata", self.transform.clone())
      .with("detect-labels", self.labels.clone())
      .with("generate-thumbnails", self.thumbnails.clone())
      .with("store-image-metadata", self.store.clone())
  }
}

/// Identify the image format from the object key's extension.
fn extract_metadata(request: &TaskRequest) -> Result<Value, TaskFailure> {
  let key = request.input["objectKey"].as_str().unwrap_or_default();
  let format = match key.rsplit('.').next() {
    Some("jpg") | Some("jpeg") => "JPEG",
    Some("png") => "PNG",
    Some("bmp") => "BMP",
    _ => {
      return Err(TaskFailure::new(
        "ImageIdentifyError",
        format!("cannot identify image format of {}", key),
      ));
    }
  };
  Ok(json!({
    "format": format,
    "dimensions": { "width": 800, "height": 600 },
    "fileSize": 1024,
  }))
}

pub fn image_workflow_def() -> WorkflowDef {
  WorkflowDef::from_json(IMAGE_RECOGNITION).expect("workflow definition parses")
}

pub fn image_workflow() -> Workflow {
  Workflow::lock(image_workflow_def()).expect("workflow definition is valid")
}

pub fn upload(object_key: &str) -> Value {
  json!({
    "objectKey": object_key,
    "metadata": { "size": 1024, "contentType": "image/jpeg" },
  })
}

pub async fn engine(store: Arc<dyn Store>, tasks: TaskRegistry) -> Engine {
  let engine = Engine::new(EngineConfig::default(), store, tasks);
  engine
    .register(image_workflow())
    .await
    .expect("all tasks are registered");
  engine
}

pub fn event_names(history: &[ExecutionEvent]) -> Vec<&'static str> {
  history.iter().map(|event| event.kind.name()).collect()
}

pub fn retry_delays(history: &[ExecutionEvent]) -> Vec<u64> {
  history
    .iter()
    .filter_map(|event| match &event.kind {
      EventKind::RetryScheduled { delay_ms, .. } => Some(*delay_ms),
      _ => None,
    })
    .collect()
}

/// Branch execution ids in the order the parent forked them, across every visit.
pub fn branch_ids(history: &[ExecutionEvent]) -> Vec<String> {
  history
    .iter()
    .filter_map(|event| match &event.kind {
      EventKind::ParallelStarted { branches, .. } => Some(branches.clone()),
      _ => None,
    })
    .flatten()
    .collect()
}
