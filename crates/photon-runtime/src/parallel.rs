//! Parallel state coordination.
//!
//! Each branch runs as a child execution with its own history, keyed
//! `{parent}/{state}@{visit}/{index}` where `visit` is the sequence of the
//! parent's `StateEntered` event. Every visit to the state forks fresh
//! children. The parent records every branch outcome, so a resumed parent
//! only restarts branches that never reported back.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use photon_config::error_class;
use photon_store::{
  BranchOutcome, Cursor, EventKind, ExecutionSnapshot, ExecutionStatus, ParentRef,
  StateProgress,
};
use photon_workflow::{ParallelState, State};
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{EngineInner, ExecutionContext, Scope};
use crate::error::RuntimeError;

pub(crate) fn branch_execution_id(
  execution_id: &str,
  state_id: &str,
  visit: u64,
  index: usize,
) -> String {
  format!("{}/{}@{}/{}", execution_id, state_id, visit, index)
}

impl EngineInner {
  pub(crate) async fn step_parallel(
    self: &Arc<Self>,
    ctx: &ExecutionContext,
    state: &State,
    parallel: &ParallelState,
    progress: StateProgress,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<(), RuntimeError> {
    let Some(branch_ids) = progress.branches.clone() else {
      let branches: Vec<String> = (0..parallel.branches.len())
        .map(|index| {
          branch_execution_id(
            &ctx.execution_id,
            &state.state_id,
            progress.entered_sequence,
            index,
          )
        })
        .collect();
      info!(state_id = %state.state_id, branches = branches.len(), "parallel_started");
      return self
        .record(
          ctx,
          snapshot,
          EventKind::ParallelStarted {
            state_id: state.state_id.clone(),
            branches,
          },
        )
        .await;
    };

    // A failure recorded before an interruption already decided the state
    let recorded_failure = progress.branch_outcomes.values().find_map(|outcome| match outcome {
      BranchOutcome::Failed { error, cause } => Some((error.clone(), cause.clone())),
      BranchOutcome::Succeeded { .. } => None,
    });
    if let Some((error, cause)) = recorded_failure {
      self.abort_unfinished(&branch_ids, &progress).await?;
      return self.fail(ctx, snapshot, &error, &cause).await;
    }

    if let Some((error, cause)) = self
      .run_branches(ctx, state, &branch_ids, &progress, snapshot)
      .await?
    {
      return self.fail(ctx, snapshot, &error, &cause).await;
    }

    let outputs = match &snapshot.cursor {
      Cursor::InState(progress) => (0..branch_ids.len())
        .map(|index| match progress.branch_outcomes.get(&index) {
          Some(BranchOutcome::Succeeded { output }) => Ok(output.clone()),
          _ => Err(ctx.inconsistent(format!(
            "parallel state '{}' joined without an output for branch {}",
            state.state_id, index
          ))),
        })
        .collect::<Result<Vec<Value>, RuntimeError>>()?,
      _ => {
        return Err(ctx.inconsistent(format!(
          "parallel state '{}' joined outside the state",
          state.state_id
        )));
      }
    };

    info!(state_id = %state.state_id, "parallel_joined");
    self
      .record(
        ctx,
        snapshot,
        EventKind::ParallelJoined {
          state_id: state.state_id.clone(),
        },
      )
      .await?;

    let mut document = snapshot.document.clone();
    if let Err(e) = parallel.result_path.place(&mut document, Value::Array(outputs)) {
      let cause = format!("state '{}': {}", state.state_id, e);
      return self.fail(ctx, snapshot, error_class::RUNTIME, &cause).await;
    }
    self
      .exit(ctx, snapshot, state, document, &parallel.transition)
      .await
  }

  /// Run every branch without a recorded outcome and record their outcomes.
  ///
  /// Returns the first branch failure. Siblings still running at that point
  /// are cancelled and awaited; their outcomes are not recorded.
  async fn run_branches(
    self: &Arc<Self>,
    ctx: &ExecutionContext,
    state: &State,
    branch_ids: &[String],
    progress: &StateProgress,
    snapshot: &mut ExecutionSnapshot,
  ) -> Result<Option<(String, String)>, RuntimeError> {
    let siblings = ctx.cancel.child_token();
    let mut running = FuturesUnordered::new();

    for (index, child_id) in branch_ids.iter().enumerate() {
      if progress.branch_outcomes.contains_key(&index) {
        continue;
      }
      self
        .fork(ctx, &state.state_id, index, child_id, &snapshot.document)
        .await?;

      let child = ExecutionContext {
        execution_id: child_id.clone(),
        workflow: ctx.workflow.clone(),
        scope: Scope::Branch {
          state_id: state.state_id.clone(),
          index,
        },
        cancel: siblings.child_token(),
      };
      let handle = tokio::spawn(self.clone().drive(child));
      running.push(async move { (index, handle.await) });
    }

    let mut failure = None;
    while let Some((index, joined)) = running.next().await {
      if failure.is_some() {
        continue;
      }
      let child_id = branch_ids[index].clone();

      let outcome = match joined {
        Ok(Ok(child)) if child.status == ExecutionStatus::Succeeded => BranchOutcome::Succeeded {
          output: child.output.unwrap_or(Value::Null),
        },
        Ok(Ok(child)) => match child.error {
          Some(e) => BranchOutcome::Failed {
            error: e.error,
            cause: e.cause,
          },
          None => BranchOutcome::Failed {
            error: error_class::BRANCH_FAILED.to_string(),
            cause: format!("branch ended {} without an error", child.status),
          },
        },
        Ok(Err(e)) => BranchOutcome::Failed {
          error: error_class::BRANCH_FAILED.to_string(),
          cause: e.to_string(),
        },
        Err(e) => BranchOutcome::Failed {
          error: error_class::BRANCH_FAILED.to_string(),
          cause: e.to_string(),
        },
      };

      let kind = match outcome {
        BranchOutcome::Succeeded { output } => {
          info!(state_id = %state.state_id, branch_index = index, "branch_succeeded");
          EventKind::BranchSucceeded {
            state_id: state.state_id.clone(),
            branch_index: index,
            execution_id: child_id,
            output,
          }
        }
        BranchOutcome::Failed { error, cause } => {
          warn!(
            state_id = %state.state_id,
            branch_index = index,
            error = %error,
            "branch_failed"
          );
          siblings.cancel();
          failure = Some((error.clone(), cause.clone()));
          EventKind::BranchFailed {
            state_id: state.state_id.clone(),
            branch_index: index,
            execution_id: child_id,
            error,
            cause,
          }
        }
      };
      self.record(ctx, snapshot, kind).await?;
    }

    Ok(failure)
  }

  /// Record the start of a branch execution unless it already has a history.
  async fn fork(
    &self,
    ctx: &ExecutionContext,
    state_id: &str,
    branch_index: usize,
    child_id: &str,
    document: &Value,
  ) -> Result<(), RuntimeError> {
    match self.store.history(child_id).await {
      Ok(_) => Ok(()),
      Err(photon_store::Error::NotFound { .. }) => {
        self
          .store
          .append(
            child_id,
            EventKind::ExecutionStarted {
              workflow_id: ctx.workflow.workflow_id.clone(),
              input: document.clone(),
              parent: Some(ParentRef {
                execution_id: ctx.execution_id.clone(),
                state_id: state_id.to_string(),
                branch_index,
              }),
            },
          )
          .await?;
        info!(state_id = %state_id, branch_index, child_id = %child_id, "branch_forked");
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Close out branches left RUNNING when the parallel state already failed.
  async fn abort_unfinished(
    &self,
    branch_ids: &[String],
    progress: &StateProgress,
  ) -> Result<(), RuntimeError> {
    for (index, child_id) in branch_ids.iter().enumerate() {
      if progress.branch_outcomes.contains_key(&index) {
        continue;
      }
      let running = match self.store.snapshot(child_id).await {
        Ok(child) => !child.is_terminal(),
        Err(photon_store::Error::NotFound { .. }) => false,
        Err(e) => return Err(e.into()),
      };
      if !running {
        continue;
      }

      let aborted = self
        .store
        .append(
          child_id,
          EventKind::ExecutionAborted {
            error: error_class::ABORTED.to_string(),
            cause: "cancelled because a sibling branch failed".to_string(),
          },
        )
        .await;
      match aborted {
        Ok(_) | Err(photon_store::Error::Closed { .. }) => {}
        Err(e) => return Err(e.into()),
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_branch_execution_id() {
    assert_eq!(
      branch_execution_id("exec-1", "ParallelProcessing", 7, 1),
      "exec-1/ParallelProcessing@7/1"
    );
  }

  #[test]
  fn test_branch_execution_id_differs_per_visit() {
    assert_ne!(
      branch_execution_id("exec-1", "ParallelProcessing", 7, 0),
      branch_execution_id("exec-1", "ParallelProcessing", 19, 0)
    );
  }
}
