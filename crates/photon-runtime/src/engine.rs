//! Execution engine.
//!
//! The [`Engine`] owns the registered workflows, the task registry and the
//! store handle. Each execution is driven by its own tokio task; every
//! transition is appended to the store before the next one begins, so an
//! interrupted execution can be resumed from its history alone.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use photon_config::{SystemConfig, WorkflowDef, error_class};
use photon_store::{
  Cursor, EventKind, ExecutionEvent, ExecutionSnapshot, ExecutionStatus, Pending, StateProgress,
  StatusReport, Store,
};
use photon_workflow::{
  State, StateGraph, StateKind, TaskState, Transition, Workflow, matches_error,
};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::choice;
use crate::error::RuntimeError;
use crate::retry::{self, RetryDecision};
use crate::task::{TaskFailure, TaskRegistry, TaskRequest};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Task timeout when neither the state nor the executor declares one.
  pub default_task_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      default_task_timeout: Duration::from_secs(60),
    }
  }
}

impl From<&SystemConfig> for EngineConfig {
  fn from(config: &SystemConfig) -> Self {
    Self {
      default_task_timeout: Duration::from_secs(config.default_task_timeout_seconds),
    }
  }
}

/// Final word of a driver task: `Err` carries the driver error message.
type DriverOutcome = Option<Result<(), String>>;

pub(crate) type DriveFuture =
  Pin<Box<dyn Future<Output = Result<ExecutionSnapshot, RuntimeError>> + Send>>;

/// The workflow execution engine.
///
/// Cheap to clone; clones share workflows, executors, store and drivers.
#[derive(Clone)]
pub struct Engine {
  inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
  pub(crate) config: EngineConfig,
  pub(crate) store: Arc<dyn Store>,
  pub(crate) tasks: TaskRegistry,
  workflows: RwLock<HashMap<String, Arc<Workflow>>>,
  drivers: Mutex<HashMap<String, watch::Receiver<DriverOutcome>>>,
}

/// Which graph of the workflow an execution runs.
#[derive(Debug, Clone)]
pub(crate) enum Scope {
  Root,
  Branch { state_id: String, index: usize },
}

/// Everything a driver needs to run one execution.
#[derive(Clone)]
pub(crate) struct ExecutionContext {
  pub(crate) execution_id: String,
  pub(crate) workflow: Arc<Workflow>,
  pub(crate) scope: Scope,
  pub(crate) cancel: CancellationToken,
}

impl ExecutionContext {
  fn graph(&self) -> Result<&StateGraph, RuntimeError> {
    match &self.scope {
      Scope::Root => Ok(&self.workflow.root),
      Scope::Branch { state_id, index } => {
        self
          .workflow
          .branch(state_id, *index)
          .ok_or_else(|| RuntimeError::Inconsistent {
            execution_id: self.execution_id.clone(),
            message: format!("parallel state '{}' has no branch {}", state_id, index),
          })
      }
    }
  }

  pub(crate) fn inconsistent(&self, message: impl Into<String>) -> RuntimeError {
    RuntimeError::Inconsistent {
      execution_id: self.execution_id.clone(),
      message: message.into(),
    }
  }
}

enum Interrupt {
  TimedOut,
  Aborted,
}

impl Engine {
  /// Create an engine over a store and a set of task executors.
  pub fn new(config: EngineConfig, store: Arc<dyn Store>, tasks: TaskRegistry) -> Self {
    Self {
      inner: Arc::new(EngineInner {
        config,
        store,
        tasks,
        workflows: RwLock::new(HashMap::new()),
        drivers: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// The store this engine records to.
  pub fn store(&self) -> &Arc<dyn Store> {
    &self.inner.store
  }

  /// Register a locked workflow.
  ///
  /// Fails if any task state references a task with no registered executor.
  pub async fn register(&self, workflow: Workflow) -> Result<Arc<Workflow>, RuntimeError> {
    if let Some((state_id, task)) = unknown_task(&workflow.root, &self.inner.tasks) {
      return Err(RuntimeError::UnknownTask { state_id, task });
    }

    let workflow = Arc::new(workflow);
    info!(workflow_id = %workflow.workflow_id, "workflow_registered");
    self
      .inner
      .workflows
      .write()
      .await
      .insert(workflow.workflow_id.clone(), workflow.clone());
    Ok(workflow)
  }

  /// Validate a definition and register it.
  pub async fn register_def(&self, def: WorkflowDef) -> Result<Arc<Workflow>, RuntimeError> {
    self.register(Workflow::lock(def)?).await
  }

  /// Start an execution with a generated id.
  pub async fn start(&self, workflow_id: &str, input: Value) -> Result<String, RuntimeError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    self.start_with_id(workflow_id, &execution_id, input).await?;
    Ok(execution_id)
  }

  /// Start an execution under a caller-chosen id.
  ///
  /// `ExecutionStarted` is recorded before this returns, so the execution is
  /// immediately visible to status queries.
  #[instrument(
    name = "engine_start",
    skip(self, input),
    fields(
      workflow_id = %workflow_id,
      execution_id = %execution_id,
    )
  )]
  pub async fn start_with_id(
    &self,
    workflow_id: &str,
    execution_id: &str,
    input: Value,
  ) -> Result<(), RuntimeError> {
    if !input.is_object() {
      return Err(RuntimeError::InvalidInput {
        message: "input must be a JSON object".to_string(),
      });
    }
    let workflow = self.workflow(workflow_id).await?;

    self
      .inner
      .store
      .append(
        execution_id,
        EventKind::ExecutionStarted {
          workflow_id: workflow_id.to_string(),
          input: input.clone(),
          parent: None,
        },
      )
      .await?;
    info!(input = %input, "execution_started");

    self.spawn(workflow, execution_id.to_string()).await;
    Ok(())
  }

  /// Start an execution and wait for it to finish.
  pub async fn run(&self, workflow_id: &str, input: Value) -> Result<StatusReport, RuntimeError> {
    let execution_id = self.start(workflow_id, input).await?;
    self.wait(&execution_id).await
  }

  /// Wait until the execution's driver stops, then report its status.
  ///
  /// Returns immediately for executions this engine is not driving.
  pub async fn wait(&self, execution_id: &str) -> Result<StatusReport, RuntimeError> {
    let receiver = self.inner.drivers.lock().await.get(execution_id).cloned();
    if let Some(mut receiver) = receiver {
      let outcome = match receiver.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => Some(Err("driver task ended unexpectedly".to_string())),
      };
      if let Some(Err(message)) = outcome {
        return Err(RuntimeError::Driver {
          execution_id: execution_id.to_string(),
          message,
        });
      }
    }
    self.get_status(execution_id).await
  }

  /// Status, output or error, and history, derived by replay.
  pub async fn get_status(&self, execution_id: &str) -> Result<StatusReport, RuntimeError> {
    self
      .inner
      .store
      .status(execution_id)
      .await
      .map_err(|e| not_found(execution_id, e))
  }

  /// Raw history of an execution.
  pub async fn history(&self, execution_id: &str) -> Result<Vec<ExecutionEvent>, RuntimeError> {
    self
      .inner
      .store
      .history(execution_id)
      .await
      .map_err(|e| not_found(execution_id, e))
  }

  /// Continue a RUNNING root execution from its history.
  ///
  /// Terminal executions are left alone; their status is returned.
  #[instrument(name = "engine_resume", skip(self), fields(execution_id = %execution_id))]
  pub async fn resume(&self, execution_id: &str) -> Result<ExecutionStatus, RuntimeError> {
    let snapshot = self
      .inner
      .store
      .snapshot(execution_id)
      .await
      .map_err(|e| not_found(execution_id, e))?;

    if snapshot.parent.is_some() {
      return Err(RuntimeError::BranchExecution {
        execution_id: execution_id.to_string(),
      });
    }
    if snapshot.is_terminal() {
      return Ok(snapshot.status);
    }

    let workflow = self.workflow(&snapshot.workflow_id).await?;
    if self.spawn(workflow, execution_id.to_string()).await {
      info!(
        workflow_id = %snapshot.workflow_id,
        last_sequence = snapshot.last_sequence,
        "execution_resumed"
      );
    }
    Ok(ExecutionStatus::Running)
  }

  /// Resume every RUNNING root execution in the store.
  ///
  /// Executions of unregistered workflows are skipped. Returns the resumed ids.
  pub async fn recover(&self) -> Result<Vec<String>, RuntimeError> {
    let mut resumed = Vec::new();
    for execution_id in self.inner.store.list_executions().await? {
      let snapshot = self.inner.store.snapshot(&execution_id).await?;
      if snapshot.parent.is_some() || snapshot.is_terminal() {
        continue;
      }
      match self.resume(&execution_id).await {
        Ok(_) => resumed.push(execution_id),
        Err(RuntimeError::WorkflowNotFound { workflow_id }) => {
          warn!(
            execution_id = %execution_id,
            workflow_id = %workflow_id,
            "recover_skipped_unknown_workflow"
          );
        }
        Err(e) => return Err(e),
      }
    }
    info!(count = resumed.len(), "recover_completed");
    Ok(resumed)
  }

  async fn workflow(&self, workflow_id: &str) -> Result<Arc<Workflow>, RuntimeError> {
    self
      .inner
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| RuntimeError::WorkflowNotFound {
        workflow_id: workflow_id.to_string(),
      })
  }

  /// Start a driver for `execution_id` unless one is already running.
  ///
  /// Returns `false` when a driver exists. The check and the registration
  /// happen under one lock so an execution never gets two drivers.
  async fn spawn(&self, workflow: Arc<Workflow>, execution_id: String) -> bool {
    let (sender, receiver) = watch::channel(None);
    {
      let mut drivers = self.inner.drivers.lock().await;
      if drivers.contains_key(&execution_id) {
        return false;
      }
      drivers.insert(execution_id.clone(), receiver);
    }

    let inner = self.inner.clone();
    let ctx = ExecutionContext {
      execution_id: execution_id.clone(),
      workflow,
      scope: Scope::Root,
      cancel: CancellationToken::new(),
    };

    tokio::spawn(async move {
      let outcome = match inner.clone().drive(ctx).await {
        Ok(snapshot) => {
          info!(execution_id = %execution_id, status = %snapshot.status, "execution_finished");
          Ok(())
        }
        Err(e) => {
          error!(execution_id = %execution_id, error = %e, "execution_driver_failed");
          Err(e.to_string())
        }
      };
      sender.send_replace(Some(outcome));
      inner.drivers.lock().await.remove(&execution_id);
    });
    true
  }
}

fn not_found(execution_id: &str, error: photon_store::Error) -> RuntimeError {
  match error {
    photon_store::Error::NotFound { .. } => RuntimeError::ExecutionNotFound {
      execution_id: execution_id.to_string(),
    },
    other => other.into(),
  }
}

/// First task state (by state id) whose task has no executor.
fn unknown_task(graph: &StateGraph, tasks: &TaskRegistry) -> Option<(String, String)> {
  let mut states: Vec<&State> = graph.states.values().collect();
  states.sort_by(|a, b| a.state_id.cmp(&b.state_id));

  states.into_iter().find_map(|state| match &state.kind {
    StateKind::Task(task) if !tasks.contains(&task.task) => {
      Some((state.state_id.clone(), task.task.clone()))
    }
    StateKind::Parallel(parallel) => parallel
      .branches
      .iter()
      .find_map(|branch| unknown_task(branch, tasks)),
    _ => None,
  })
}

async fn expire(after: Option<Duration>) {
  match after {
    Some(after) => tokio::time::sleep(after).await,
    None => std::future::pending().await,
  }
}

impl EngineInner {
  /// Drive an execution to a terminal status.
  ///
  /// Boxed because parallel branches drive their own sub-executions.
  pub(crate) fn drive(self: Arc<Self>, ctx: ExecutionContext) -> DriveFuture {
    Box::pin(async move { self.drive_inner(&ctx).await })
  }

  #[instrument(
    name = "execution",
    skip_all,
    fields(
      execution_id = %ctx.execution_id,
      workflow_id = %ctx.workflow.workflow_id,
    )
  )]
  async fn drive_inner(
    self: &Arc<Self>,
    ctx: &ExecutionContext,
  ) -> Result<ExecutionSnapshot, RuntimeError> {
    let mut snapshot = self.store.snapshot(&ctx.execution_id).await?;
    if snapshot.is_terminal() {
      return Ok(snapshot);
    }
    let remaining = self.remaining_time(ctx, &snapshot);

    let interrupt = {
      let steps = self.run_steps(ctx, &mut snapshot);
      tokio::select! {
        result = steps => {
          result?;
          None
        }
        _ = expire(remaining) => Some(Interrupt::TimedOut),
        _ = ctx.cancel.cancelled() => Some(Interrupt::Aborted),
      }
    };

    let Some(interrupt) = interrupt else {
      return Ok(snapshot);
    };

    // The interrupted step may have recorded events we never applied
    let snapshot = self.store.snapshot(&ctx.execution_id).await?;
    if snapshot.is_terminal() {
      return Ok(snapshot);
    }

    let kind = match interrupt {
      Interrupt::TimedOut => {
        ctx.cancel.cancel();
        warn!("execution_timed_out");
        EventKind::ExecutionTimedOut {
          error: error_class::TIMEOUT.to_string(),
          cause: format!(
            "execution exceeded {}s",
            ctx.workflow.timeout_seconds.unwrap_or_default()
          ),
        }
      }
      Interrupt::Aborted => {
        warn!("execution_aborted");
        EventKind::ExecutionAborted {
          error: error_class::ABORTED.to_string(),
          cause: "cancelled because a sibling branch failed".to_string(),
        }
      }
    };

    match self.store.append(&ctx.execution_id, kind).await {
      Ok(_) | Err(photon_store::Error::Closed { .. }) => {}
      Err(e) => return Err(e.into()),
    }
    Ok(self.store.snapshot(&ctx.execution_id).await?)
  }

  /// Time left before the workflow-level timeout, measured from the start event.
  fn remaining_time(&self, ctx: &ExecutionContext, snapshot: &ExecutionSnapshot) -> Option<Duration> {
    if !matches!(ctx.scope, Scope::Root) {
      return None;
    }
    let timeout = Duration::from_secs(ctx.workflow.timeout_seconds?);
    let elapsed = snapshot
      .started_at
      .and_then(|started| (Utc::now() - started).to_std().ok())
      .unwrap_or_default();
    Some(timeout.saturating_sub(elapsed))
  }

  async fn run_steps(
    self: &Arc<Self>,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    let graph = ctx.graph()?;
    while !snapshot.is_terminal() {
      self.step(ctx, graph, snapshot).await?;
    }
    Ok(())
  }

  /// Append an event and fold it into the in-memory snapshot.
  pub(crate) async fn record(
    &self,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
    kind: EventKind,
  ) -> Result<(), RuntimeError> {
    let event = self.store.append(&ctx.execution_id, kind).await?;
    snapshot.apply(&event);
    Ok(())
  }

  /// Advance the execution by one transition.
  async fn step(
    self: &Arc<Self>,
    ctx: &ExecutionContext,
    graph: &StateGraph,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    match snapshot.cursor.clone() {
      Cursor::Start => self.enter(ctx, snapshot, graph.start_at.clone()).await,
      Cursor::Between {
        next: Some(next), ..
      } => self.enter(ctx, snapshot, next).await,
      Cursor::Between { next: None, .. } => self.succeed(ctx, snapshot).await,
      Cursor::InState(progress) => {
        let state = graph
          .get_state(&progress.state_id)
          .ok_or_else(|| ctx.inconsistent(format!("unknown state '{}'", progress.state_id)))?;

        match &state.kind {
          StateKind::Task(task) => self.step_task(ctx, state, task, progress, snapshot).await,
          StateKind::Choice(choice_state) => {
            let next = choice::route(
              &snapshot.document,
              &choice_state.choices,
              &choice_state.default,
            )
            .to_string();
            info!(state_id = %state.state_id, next = %next, "choice_routed");
            let document = snapshot.document.clone();
            self
              .record(
                ctx,
                snapshot,
                EventKind::StateExited {
                  state_id: state.state_id.clone(),
                  document,
                  next: Some(next),
                },
              )
              .await
          }
          StateKind::Parallel(parallel) => {
            self
              .step_parallel(ctx, state, parallel, progress, snapshot)
              .await
          }
          StateKind::Fail(fail) => self.fail(ctx, snapshot, &fail.error, &fail.cause).await,
          StateKind::Succeed => self.succeed(ctx, snapshot).await,
        }
      }
      Cursor::Finished => Ok(()),
    }
  }

  async fn enter(
    &self,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
    state_id: String,
  ) -> Result<(), RuntimeError> {
    info!(state_id = %state_id, "state_entered");
    let document = snapshot.document.clone();
    self
      .record(ctx, snapshot, EventKind::StateEntered { state_id, document })
      .await
  }

  /// Leave `state` with `document`, following its transition.
  pub(crate) async fn exit(
    &self,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
    state: &State,
    document: Value,
    transition: &Transition,
  ) -> Result<(), RuntimeError> {
    let next = match transition {
      Transition::Next(next) => Some(next.clone()),
      Transition::End => None,
    };
    info!(state_id = %state.state_id, next = ?next, "state_exited");
    self
      .record(
        ctx,
        snapshot,
        EventKind::StateExited {
          state_id: state.state_id.clone(),
          document,
          next,
        },
      )
      .await
  }

  async fn succeed(
    &self,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    let output = snapshot.document.clone();
    info!("execution_succeeded");
    self
      .record(ctx, snapshot, EventKind::ExecutionSucceeded { output })
      .await
  }

  pub(crate) async fn fail(
    &self,
    ctx: &ExecutionContext,
    snapshot: &mut ExecutionSnapshot,
    error: &str,
    cause: &str,
  ) -> Result<(), RuntimeError> {
    error!(error = %error, cause = %cause, "execution_failed");
    self
      .record(
        ctx,
        snapshot,
        EventKind::ExecutionFailed {
          error: error.to_string(),
          cause: cause.to_string(),
        },
      )
      .await
  }

  async fn step_task(
    &self,
    ctx: &ExecutionContext,
    state: &State,
    task: &TaskState,
    progress: StateProgress,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    match progress.pending {
      // A pending retry or an invocation cut short by a crash is re-invoked
      Pending::Nothing | Pending::RetryScheduled | Pending::Invoking { .. } => {
        self
          .invoke_task(ctx, state, task, progress.attempts + 1, snapshot)
          .await
      }
      Pending::Succeeded { result } => {
        let mut document = snapshot.document.clone();
        if let Err(e) = task.result_path.place(&mut document, result) {
          let cause = format!("state '{}': {}", state.state_id, e);
          return self.fail(ctx, snapshot, error_class::RUNTIME, &cause).await;
        }
        self
          .exit(ctx, snapshot, state, document, &task.transition)
          .await
      }
      Pending::Failed { error, cause } => {
        self
          .handle_failure(ctx, state, task, &progress.retry_counts, snapshot, error, cause)
          .await
      }
      Pending::Caught {
        catch_index,
        error,
        cause,
      } => {
        let rule = task
          .catch
          .get(catch_index)
          .ok_or_else(|| ctx.inconsistent(format!("state '{}' has no catch rule {}", state.state_id, catch_index)))?;

        let mut document = snapshot.document.clone();
        let error_output = json!({ "Error": error, "Cause": cause });
        if let Err(e) = rule.result_path.place(&mut document, error_output) {
          let cause = format!("state '{}': {}", state.state_id, e);
          return self.fail(ctx, snapshot, error_class::RUNTIME, &cause).await;
        }
        self
          .exit(
            ctx,
            snapshot,
            state,
            document,
            &Transition::Next(rule.next.clone()),
          )
          .await
      }
    }
  }

  async fn invoke_task(
    &self,
    ctx: &ExecutionContext,
    state: &State,
    task: &TaskState,
    attempt: u32,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    let Some(input) = task.input_path.select(&snapshot.document).cloned() else {
      let cause = format!(
        "state '{}': input_path '{}' did not match the document",
        state.state_id, task.input_path
      );
      return self.fail(ctx, snapshot, error_class::RUNTIME, &cause).await;
    };

    info!(state_id = %state.state_id, task = %task.task, attempt, "task_started");
    self
      .record(
        ctx,
        snapshot,
        EventKind::TaskStarted {
          state_id: state.state_id.clone(),
          task: task.task.clone(),
          attempt,
          input: input.clone(),
        },
      )
      .await?;

    let outcome = match self.tasks.get(&task.task) {
      Some(executor) => {
        let timeout = task
          .timeout_seconds
          .map(Duration::from_secs)
          .or_else(|| executor.timeout())
          .unwrap_or(self.config.default_task_timeout);
        let request = TaskRequest {
          execution_id: ctx.execution_id.clone(),
          state_id: state.state_id.clone(),
          task: task.task.clone(),
          attempt,
          input,
          timeout,
        };

        match tokio::time::timeout(timeout, executor.invoke(request, ctx.cancel.child_token())).await
        {
          Ok(result) => result,
          Err(_) => Err(TaskFailure::timeout(timeout)),
        }
      }
      None => Err(TaskFailure::task_failed(format!(
        "no executor registered for task '{}'",
        task.task
      ))),
    };

    let kind = match outcome {
      Ok(result) => {
        info!(state_id = %state.state_id, attempt, "task_succeeded");
        EventKind::TaskSucceeded {
          state_id: state.state_id.clone(),
          attempt,
          result,
        }
      }
      Err(failure) => {
        warn!(
          state_id = %state.state_id,
          attempt,
          error = %failure.error,
          cause = %failure.cause,
          "task_failed"
        );
        EventKind::TaskFailed {
          state_id: state.state_id.clone(),
          attempt,
          error: failure.error,
          cause: failure.cause,
        }
      }
    };
    self.record(ctx, snapshot, kind).await
  }

  /// Route a task failure: first matching retry policy, then catch rules.
  #[allow(clippy::too_many_arguments)]
  async fn handle_failure(
    &self,
    ctx: &ExecutionContext,
    state: &State,
    task: &TaskState,
    retry_counts: &std::collections::BTreeMap<usize, u32>,
    snapshot: &mut ExecutionSnapshot,
    error: String,
    cause: String,
  ) -> Result<(), RuntimeError> {
    if let Some((policy_index, _)) = retry::matching_policy(&error, &task.retry) {
      let retry_count = retry_counts.get(&policy_index).copied().unwrap_or(0) + 1;
      if let RetryDecision::RetryAfter(delay) = retry::decide(&error, retry_count, &task.retry) {
        info!(
          state_id = %state.state_id,
          error = %error,
          policy_index,
          retry_count,
          delay_ms = delay.as_millis() as u64,
          "retry_scheduled"
        );
        self
          .record(
            ctx,
            snapshot,
            EventKind::RetryScheduled {
              state_id: state.state_id.clone(),
              policy_index,
              retry_count,
              delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            },
          )
          .await?;
        tokio::time::sleep(delay).await;
        return Ok(());
      }
    }

    let caught = task
      .catch
      .iter()
      .enumerate()
      .find(|(_, rule)| matches_error(&rule.errors, &error));

    match caught {
      Some((catch_index, rule)) => {
        info!(
          state_id = %state.state_id,
          error = %error,
          next = %rule.next,
          "error_caught"
        );
        self
          .record(
            ctx,
            snapshot,
            EventKind::ErrorCaught {
              state_id: state.state_id.clone(),
              catch_index,
              error,
              cause,
              next: rule.next.clone(),
            },
          )
          .await
      }
      None => self.fail(ctx, snapshot, &error, &cause).await,
    }
  }
}
