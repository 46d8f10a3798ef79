//! Resuming interrupted executions, timeouts and engine API errors.

mod common;

use std::sync::Arc;

use common::{FakeTask, HangingTask, Pipeline, engine, event_names, upload};
use photon_config::WorkflowDef;
use photon_runtime::{Engine, EngineConfig, RuntimeError, TaskRegistry};
use photon_store::{EventKind, ExecutionStatus, MemoryStore, Store};
use serde_json::json;

fn single_task_workflow(workflow_timeout: Option<u64>, task_timeout: u64) -> WorkflowDef {
  let mut def = json!({
    "workflow_id": "single",
    "name": "Single task",
    "start_at": "Work",
    "states": [
      {
        "state_id": "Work",
        "type": "task",
        "task": "work",
        "result_path": "$.work",
        "timeout_seconds": task_timeout,
        "end": true
      }
    ]
  });
  if let Some(timeout) = workflow_timeout {
    def["timeout_seconds"] = json!(timeout);
  }
  serde_json::from_value(def).unwrap()
}

async fn single_task_engine(def: WorkflowDef, tasks: TaskRegistry) -> Engine {
  let engine = Engine::new(
    EngineConfig::default(),
    Arc::new(MemoryStore::new()),
    tasks,
  );
  engine.register_def(def).await.unwrap();
  engine
}

#[tokio::test]
async fn test_resume_reinvokes_interrupted_task() {
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let input = upload("photos/cat.jpg");

  // History as left behind by a process that died mid-invocation
  store
    .append(
      "exec-1",
      EventKind::ExecutionStarted {
        workflow_id: "image-recognition".to_string(),
        input: input.clone(),
        parent: None,
      },
    )
    .await
    .unwrap();
  store
    .append(
      "exec-1",
      EventKind::StateEntered {
        state_id: "ExtractImageMetadata".to_string(),
        document: input.clone(),
      },
    )
    .await
    .unwrap();
  store
    .append(
      "exec-1",
      EventKind::TaskStarted {
        state_id: "ExtractImageMetadata".to_string(),
        task: "extract-image-metadata".to_string(),
        attempt: 1,
        input: input.clone(),
      },
    )
    .await
    .unwrap();

  let pipeline = Pipeline::new();
  let engine = engine(store, pipeline.registry()).await;

  assert_eq!(engine.resume("exec-1").await.unwrap(), ExecutionStatus::Running);
  let report = engine.wait("exec-1").await.unwrap();

  assert_eq!(report.status, ExecutionStatus::Succeeded);
  let calls = pipeline.extract.calls();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].request.attempt, 2);
  assert_eq!(calls[0].request.input, input);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resumes_share_one_driver() {
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let input = upload("photos/cat.jpg");
  let events = vec![
    EventKind::ExecutionStarted {
      workflow_id: "image-recognition".to_string(),
      input: input.clone(),
      parent: None,
    },
    EventKind::StateEntered {
      state_id: "ExtractImageMetadata".to_string(),
      document: input.clone(),
    },
    EventKind::TaskStarted {
      state_id: "ExtractImageMetadata".to_string(),
      task: "extract-image-metadata".to_string(),
      attempt: 1,
      input: input.clone(),
    },
  ];
  for kind in events {
    store.append("exec-3", kind).await.unwrap();
  }

  let pipeline = Pipeline::new();
  let engine = engine(store, pipeline.registry()).await;

  let resumes: Vec<_> = (0..8)
    .map(|_| {
      let engine = engine.clone();
      tokio::spawn(async move { engine.resume("exec-3").await })
    })
    .collect();
  for resume in futures::future::join_all(resumes).await {
    resume.unwrap().unwrap();
  }

  let report = engine.wait("exec-3").await.unwrap();
  assert_eq!(report.status, ExecutionStatus::Succeeded);
  assert_eq!(pipeline.extract.call_count(), 1);
  assert_eq!(
    event_names(&report.history)
      .iter()
      .filter(|name| **name == "execution_succeeded")
      .count(),
    1
  );
}

#[tokio::test]
async fn test_resume_parallel_runs_only_unfinished_branches() {
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let document = json!({
    "objectKey": "photos/cat.jpg",
    "extractedMetadata": { "format": "JPEG", "transformed": true },
  });

  let events = vec![
    EventKind::ExecutionStarted {
      workflow_id: "image-recognition".to_string(),
      input: upload("photos/cat.jpg"),
      parent: None,
    },
    EventKind::StateEntered {
      state_id: "ParallelProcessing".to_string(),
      document: document.clone(),
    },
    EventKind::ParallelStarted {
      state_id: "ParallelProcessing".to_string(),
      branches: vec![
        "exec-2/ParallelProcessing@2/0".to_string(),
        "exec-2/ParallelProcessing@2/1".to_string(),
      ],
    },
    EventKind::BranchSucceeded {
      state_id: "ParallelProcessing".to_string(),
      branch_index: 0,
      execution_id: "exec-2/ParallelProcessing@2/0".to_string(),
      output: common::labels(),
    },
  ];
  for kind in events {
    store.append("exec-2", kind).await.unwrap();
  }

  let pipeline = Pipeline::new();
  let engine = engine(store.clone(), pipeline.registry()).await;
  engine.resume("exec-2").await.unwrap();
  let report = engine.wait("exec-2").await.unwrap();

  assert_eq!(report.status, ExecutionStatus::Succeeded);
  assert_eq!(pipeline.labels.call_count(), 0);
  assert_eq!(pipeline.thumbnails.call_count(), 1);

  let output = report.output.unwrap();
  assert_eq!(
    output["parallelResults"],
    json!([common::labels(), common::thumbnail()])
  );

  let branch = store.status("exec-2/ParallelProcessing@2/1").await.unwrap();
  assert_eq!(branch.status, ExecutionStatus::Succeeded);
  assert!(matches!(
    store.history("exec-2/ParallelProcessing@2/0").await,
    Err(photon_store::Error::NotFound { .. })
  ));
}

#[tokio::test]
async fn test_recover_resumes_running_roots_only() {
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let pipeline = Pipeline::new();

  let finished = {
    let engine = engine(store.clone(), pipeline.registry()).await;
    engine
      .run("image-recognition", upload("photos/cat.jpg"))
      .await
      .unwrap()
      .execution_id
  };

  store
    .append(
      "stalled",
      EventKind::ExecutionStarted {
        workflow_id: "image-recognition".to_string(),
        input: upload("photos/dog.png"),
        parent: None,
      },
    )
    .await
    .unwrap();
  store
    .append(
      "orphan",
      EventKind::ExecutionStarted {
        workflow_id: "retired-workflow".to_string(),
        input: json!({}),
        parent: None,
      },
    )
    .await
    .unwrap();

  let engine = engine(store.clone(), pipeline.registry()).await;
  let resumed = engine.recover().await.unwrap();
  assert_eq!(resumed, vec!["stalled".to_string()]);

  let report = engine.wait("stalled").await.unwrap();
  assert_eq!(report.status, ExecutionStatus::Succeeded);

  assert_eq!(
    engine.get_status(&finished).await.unwrap().status,
    ExecutionStatus::Succeeded
  );
  assert_eq!(
    engine.get_status("orphan").await.unwrap().status,
    ExecutionStatus::Running
  );
}

#[tokio::test]
async fn test_resume_terminal_execution_is_a_no_op() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;
  let report = engine
    .run("image-recognition", upload("photos/scan.bmp"))
    .await
    .unwrap();

  let status = engine.resume(&report.execution_id).await.unwrap();
  assert_eq!(status, ExecutionStatus::Failed);
  assert_eq!(pipeline.extract.call_count(), 1);
}

#[tokio::test]
async fn test_resume_rejects_branch_execution() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;
  let report = engine
    .run("image-recognition", upload("photos/cat.jpg"))
    .await
    .unwrap();

  let branch_id = &common::branch_ids(&report.history)[0];
  let result = engine.resume(branch_id).await;
  assert!(matches!(result, Err(RuntimeError::BranchExecution { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_task_timeout_is_a_timeout_error() {
  let hanging = HangingTask::new();
  let engine = single_task_engine(
    single_task_workflow(None, 1),
    TaskRegistry::new().with("work", hanging.clone()),
  )
  .await;

  let report = engine.run("single", json!({})).await.unwrap();

  assert_eq!(report.status, ExecutionStatus::Failed);
  assert_eq!(report.error.unwrap().error, "States.Timeout");
  assert_eq!(hanging.tokens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_workflow_timeout_ends_timed_out() {
  let hanging = HangingTask::new();
  let engine = single_task_engine(
    single_task_workflow(Some(5), 60),
    TaskRegistry::new().with("work", hanging.clone()),
  )
  .await;

  let report = engine.run("single", json!({})).await.unwrap();

  assert_eq!(report.status, ExecutionStatus::TimedOut);
  assert_eq!(report.error.unwrap().error, "States.Timeout");

  let tokens = hanging.tokens();
  assert_eq!(tokens.len(), 1);
  assert!(tokens[0].is_cancelled());
}

#[tokio::test]
async fn test_end_transition_succeeds_with_document() {
  let work = FakeTask::returning(json!({ "answer": 42 }));
  let engine = single_task_engine(
    single_task_workflow(None, 10),
    TaskRegistry::new().with("work", work.clone()),
  )
  .await;

  let report = engine
    .run("single", json!({ "question": "everything" }))
    .await
    .unwrap();

  assert_eq!(report.status, ExecutionStatus::Succeeded);
  assert_eq!(
    report.output,
    Some(json!({ "question": "everything", "work": { "answer": 42 } }))
  );
}

#[tokio::test]
async fn test_start_rejects_non_object_input() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;

  let result = engine.start("image-recognition", json!(["photos/cat.jpg"])).await;
  assert!(matches!(result, Err(RuntimeError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_start_unknown_workflow() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;

  let result = engine.start("no-such-workflow", json!({})).await;
  assert!(matches!(
    result,
    Err(RuntimeError::WorkflowNotFound { workflow_id }) if workflow_id == "no-such-workflow"
  ));
}

#[tokio::test]
async fn test_start_with_existing_id_is_rejected() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;

  engine
    .start_with_id("image-recognition", "fixed", upload("photos/cat.jpg"))
    .await
    .unwrap();
  let again = engine
    .start_with_id("image-recognition", "fixed", upload("photos/cat.jpg"))
    .await;
  assert!(matches!(
    again,
    Err(RuntimeError::Store(photon_store::Error::AlreadyExists { .. }))
  ));

  engine.wait("fixed").await.unwrap();
  assert_eq!(pipeline.extract.call_count(), 1);
}

#[tokio::test]
async fn test_register_requires_every_task() {
  let engine = Engine::new(
    EngineConfig::default(),
    Arc::new(MemoryStore::new()),
    TaskRegistry::new().with("extract-image-metadata", FakeTask::returning(json!({}))),
  );

  let result = engine.register(common::image_workflow()).await;
  assert!(matches!(result, Err(RuntimeError::UnknownTask { .. })));
}

#[tokio::test]
async fn test_status_of_unknown_execution() {
  let pipeline = Pipeline::new();
  let engine = engine(Arc::new(MemoryStore::new()), pipeline.registry()).await;

  let result = engine.get_status("missing").await;
  assert!(matches!(
    result,
    Err(RuntimeError::ExecutionNotFound { execution_id }) if execution_id == "missing"
  ));
}
