use std::collections::{HashMap, HashSet};

use photon_config::{
  BranchDef, CatchRule as CatchRuleDef, ChoiceRuleDef, RetryPolicy, StateDef, StateType,
  WorkflowDef, error_class,
};
use photon_path::JsonPath;

use crate::error::WorkflowError;
use crate::predicate::Predicate;
use crate::state::{
  CatchRule, ChoiceRule, ChoiceState, FailState, ParallelState, State, StateKind, TaskState,
  Transition,
};
use crate::workflow::{StateGraph, Workflow};

impl Workflow {
  /// Validate a workflow definition and lock it for execution.
  ///
  /// This process:
  /// 1. Checks state ids are unique across the whole definition
  /// 2. Parses paths, compiles choice conditions, checks retry and catch lists
  /// 3. Checks every transition stays inside its own graph
  /// 4. Checks reachability from the start state and a path to a terminal
  pub fn lock(def: WorkflowDef) -> Result<Self, WorkflowError> {
    let mut seen = HashSet::new();
    check_unique_ids(&def.states, &mut seen)?;

    let root = lock_graph(def.start_at, def.states)?;

    Ok(Workflow {
      workflow_id: def.workflow_id,
      name: def.name,
      timeout_seconds: def.timeout_seconds,
      root,
    })
  }
}

impl TryFrom<WorkflowDef> for Workflow {
  type Error = WorkflowError;

  fn try_from(def: WorkflowDef) -> Result<Self, Self::Error> {
    Workflow::lock(def)
  }
}

fn check_unique_ids(states: &[StateDef], seen: &mut HashSet<String>) -> Result<(), WorkflowError> {
  for state in states {
    if !seen.insert(state.state_id.clone()) {
      return Err(WorkflowError::DuplicateStateId {
        state_id: state.state_id.clone(),
      });
    }
    if let StateType::Parallel { branches, .. } = &state.state_type {
      for branch in branches {
        check_unique_ids(&branch.states, seen)?;
      }
    }
  }
  Ok(())
}

fn lock_graph(start_at: String, defs: Vec<StateDef>) -> Result<StateGraph, WorkflowError> {
  let mut states = HashMap::new();
  for def in defs {
    let state = lock_state(def)?;
    states.insert(state.state_id.clone(), state);
  }

  if !states.contains_key(&start_at) {
    return Err(WorkflowError::UnknownStartState { start_at });
  }

  // Transitions never leave the graph they are declared in
  for state in states.values() {
    for next in state.successors() {
      if !states.contains_key(next) {
        return Err(WorkflowError::UnknownNextState {
          state_id: state.state_id.clone(),
          next: next.to_string(),
        });
      }
    }
  }

  let graph = StateGraph { start_at, states };
  let topology = graph.graph();

  let reachable = topology.reachable_from(&graph.start_at);
  if let Some(state_id) = first_missing(&graph.states, &reachable) {
    return Err(WorkflowError::UnreachableState { state_id });
  }

  let terminating = topology.can_reach_terminal();
  if let Some(state_id) = first_missing(&graph.states, &terminating) {
    return Err(WorkflowError::NoTerminalPath { state_id });
  }

  Ok(graph)
}

/// Smallest state id (for stable error reporting) not contained in `set`.
fn first_missing(states: &HashMap<String, State>, set: &HashSet<String>) -> Option<String> {
  states.keys().filter(|id| !set.contains(*id)).min().cloned()
}

fn lock_state(def: StateDef) -> Result<State, WorkflowError> {
  let state_id = def.state_id;

  let kind = match def.state_type {
    StateType::Task {
      task,
      input_path,
      result_path,
      timeout_seconds,
      retry,
      catch,
      next,
      end,
    } => {
      check_retry(&state_id, &retry)?;
      let catch = lock_catch(&state_id, catch)?;
      StateKind::Task(TaskState {
        task,
        input_path: parse_path(&state_id, input_path)?,
        result_path: parse_path(&state_id, result_path)?,
        timeout_seconds,
        retry,
        catch,
        transition: transition(&state_id, next, end)?,
      })
    }
    StateType::Choice { choices, default } => {
      StateKind::Choice(lock_choice(&state_id, choices, default)?)
    }
    StateType::Parallel {
      branches,
      result_path,
      next,
      end,
    } => {
      if branches.is_empty() {
        return Err(WorkflowError::EmptyParallel { state_id });
      }
      StateKind::Parallel(ParallelState {
        branches: branches
          .into_iter()
          .map(|BranchDef { start_at, states }| lock_graph(start_at, states))
          .collect::<Result<_, _>>()?,
        result_path: parse_path(&state_id, result_path)?,
        transition: transition(&state_id, next, end)?,
      })
    }
    StateType::Fail { error, cause } => StateKind::Fail(FailState { error, cause }),
    StateType::Succeed => StateKind::Succeed,
  };

  Ok(State { state_id, kind })
}

fn parse_path(state_id: &str, raw: Option<String>) -> Result<JsonPath, WorkflowError> {
  match raw {
    Some(raw) => JsonPath::parse(&raw).map_err(|source| WorkflowError::InvalidPath {
      state_id: state_id.to_string(),
      source,
    }),
    None => Ok(JsonPath::root()),
  }
}

fn transition(state_id: &str, next: Option<String>, end: bool) -> Result<Transition, WorkflowError> {
  match (next, end) {
    (Some(next), false) => Ok(Transition::Next(next)),
    (None, true) => Ok(Transition::End),
    (Some(_), true) => Err(WorkflowError::InvalidTransition {
      state_id: state_id.to_string(),
      message: "next and end must not both be set".to_string(),
    }),
    (None, false) => Err(WorkflowError::InvalidTransition {
      state_id: state_id.to_string(),
      message: "one of next or end is required".to_string(),
    }),
  }
}

fn lock_choice(
  state_id: &str,
  choices: Vec<ChoiceRuleDef>,
  default: String,
) -> Result<ChoiceState, WorkflowError> {
  if choices.is_empty() {
    return Err(WorkflowError::EmptyChoice {
      state_id: state_id.to_string(),
    });
  }

  let choices = choices
    .into_iter()
    .map(|rule| -> Result<ChoiceRule, WorkflowError> {
      let predicate =
        Predicate::compile(&rule.condition).map_err(|source| WorkflowError::InvalidPath {
          state_id: state_id.to_string(),
          source,
        })?;
      Ok(ChoiceRule {
        predicate,
        next: rule.next,
      })
    })
    .collect::<Result<_, _>>()?;

  Ok(ChoiceState { choices, default })
}

/// Shared ordering rules for retry and catch error lists.
fn check_error_list(errors: &[String], is_last: bool) -> Result<(), String> {
  if errors.is_empty() {
    return Err("errors must not be empty".to_string());
  }
  if errors.iter().any(|e| error_class::is_wildcard(e)) {
    if errors.len() > 1 {
      return Err(format!("{} must appear alone", error_class::ALL));
    }
    if !is_last {
      return Err(format!("{} must be the last entry", error_class::ALL));
    }
  }
  Ok(())
}

fn check_retry(state_id: &str, retry: &[RetryPolicy]) -> Result<(), WorkflowError> {
  let invalid = |message: String| WorkflowError::InvalidRetryPolicy {
    state_id: state_id.to_string(),
    message,
  };

  for (index, policy) in retry.iter().enumerate() {
    check_error_list(&policy.errors, index + 1 == retry.len()).map_err(invalid)?;

    if !policy.interval_seconds.is_finite() || policy.interval_seconds < 0.0 {
      return Err(invalid("interval_seconds must be a non-negative number".to_string()));
    }
    if !policy.backoff_rate.is_finite() || policy.backoff_rate < 1.0 {
      return Err(invalid("backoff_rate must be at least 1.0".to_string()));
    }
    if let Some(max_delay) = policy.max_delay_seconds {
      if !max_delay.is_finite() || max_delay < 0.0 {
        return Err(invalid("max_delay_seconds must be a non-negative number".to_string()));
      }
    }
  }
  Ok(())
}

fn lock_catch(state_id: &str, catch: Vec<CatchRuleDef>) -> Result<Vec<CatchRule>, WorkflowError> {
  let count = catch.len();
  catch
    .into_iter()
    .enumerate()
    .map(|(index, rule)| -> Result<CatchRule, WorkflowError> {
      check_error_list(&rule.errors, index + 1 == count).map_err(|message| {
        WorkflowError::InvalidCatchRule {
          state_id: state_id.to_string(),
          message,
        }
      })?;
      Ok(CatchRule {
        errors: rule.errors,
        next: rule.next,
        result_path: parse_path(state_id, rule.result_path)?,
      })
    })
    .collect()
}
