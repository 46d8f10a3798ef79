use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::state::{State, StateKind};

/// A locked workflow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub timeout_seconds: Option<u64>,
  pub root: StateGraph,
}

/// A closed set of states with a start state.
///
/// Used for the top level of a workflow and for every parallel branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGraph {
  pub start_at: String,
  pub states: HashMap<String, State>,
}

impl StateGraph {
  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.states)
  }

  /// Get a state by ID.
  pub fn get_state(&self, state_id: &str) -> Option<&State> {
    self.states.get(state_id)
  }

  /// Find a state by ID in this graph or any nested parallel branch.
  pub fn find_state(&self, state_id: &str) -> Option<&State> {
    if let Some(state) = self.states.get(state_id) {
      return Some(state);
    }
    self.states.values().find_map(|state| match &state.kind {
      StateKind::Parallel(parallel) => parallel
        .branches
        .iter()
        .find_map(|branch| branch.find_state(state_id)),
      _ => None,
    })
  }

  fn collect_tasks<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
    for state in self.states.values() {
      match &state.kind {
        StateKind::Task(task) => {
          out.insert(task.task.as_str());
        }
        StateKind::Parallel(parallel) => {
          for branch in &parallel.branches {
            branch.collect_tasks(out);
          }
        }
        _ => {}
      }
    }
  }
}

impl Workflow {
  /// Get a top-level state by ID.
  pub fn get_state(&self, state_id: &str) -> Option<&State> {
    self.root.get_state(state_id)
  }

  /// Branch `index` of the parallel state `state_id`, wherever it is nested.
  pub fn branch(&self, state_id: &str, index: usize) -> Option<&StateGraph> {
    match &self.root.find_state(state_id)?.kind {
      StateKind::Parallel(parallel) => parallel.branches.get(index),
      _ => None,
    }
  }

  /// Every task name referenced anywhere in the workflow, branches included.
  pub fn task_names(&self) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    self.root.collect_tasks(&mut names);
    names
  }
}
