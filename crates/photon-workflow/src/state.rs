use photon_config::RetryPolicy;
use photon_config::error_class;
use photon_path::JsonPath;
use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;
use crate::workflow::StateGraph;

/// A locked state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
  pub state_id: String,
  pub kind: StateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateKind {
  Task(TaskState),
  Choice(ChoiceState),
  Parallel(ParallelState),
  Fail(FailState),
  Succeed,
}

/// Where control goes after a task or parallel state completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
  Next(String),
  /// The enclosing graph succeeds with the current document.
  End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
  pub task: String,
  pub input_path: JsonPath,
  pub result_path: JsonPath,
  pub timeout_seconds: Option<u64>,
  pub retry: Vec<RetryPolicy>,
  pub catch: Vec<CatchRule>,
  pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchRule {
  pub errors: Vec<String>,
  pub next: String,
  pub result_path: JsonPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRule {
  pub predicate: Predicate,
  pub next: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceState {
  pub choices: Vec<ChoiceRule>,
  pub default: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelState {
  pub branches: Vec<StateGraph>,
  pub result_path: JsonPath,
  pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailState {
  pub error: String,
  pub cause: String,
}

impl State {
  /// Fail and Succeed end an execution; so do task and parallel states with `end`.
  pub fn is_terminal(&self) -> bool {
    match &self.kind {
      StateKind::Fail(_) | StateKind::Succeed => true,
      StateKind::Task(task) => task.transition == Transition::End,
      StateKind::Parallel(parallel) => parallel.transition == Transition::End,
      StateKind::Choice(_) => false,
    }
  }

  /// Every state this state may transition to, including catch targets.
  pub fn successors(&self) -> Vec<&str> {
    match &self.kind {
      StateKind::Task(task) => {
        let mut next: Vec<&str> = task.catch.iter().map(|c| c.next.as_str()).collect();
        if let Transition::Next(id) = &task.transition {
          next.push(id);
        }
        next
      }
      StateKind::Choice(choice) => choice
        .choices
        .iter()
        .map(|c| c.next.as_str())
        .chain(std::iter::once(choice.default.as_str()))
        .collect(),
      StateKind::Parallel(parallel) => match &parallel.transition {
        Transition::Next(id) => vec![id.as_str()],
        Transition::End => Vec::new(),
      },
      StateKind::Fail(_) | StateKind::Succeed => Vec::new(),
    }
  }
}

/// True if `class` is matched by any entry of `errors` (exact or wildcard).
pub fn matches_error(errors: &[String], class: &str) -> bool {
  errors
    .iter()
    .any(|pattern| error_class::is_wildcard(pattern) || pattern == class)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_matches_error() {
    let specific = vec!["ImageIdentifyError".to_string()];
    assert!(matches_error(&specific, "ImageIdentifyError"));
    assert!(!matches_error(&specific, "States.Timeout"));

    let wildcard = vec!["States.ALL".to_string()];
    assert!(matches_error(&wildcard, "ImageIdentifyError"));
    assert!(matches_error(&wildcard, "States.Timeout"));

    let short = vec!["ALL".to_string()];
    assert!(matches_error(&short, "anything"));
  }
}
