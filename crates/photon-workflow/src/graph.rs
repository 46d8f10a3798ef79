use std::collections::{HashMap, HashSet, VecDeque};

use crate::state::State;

/// Transition graph of one state machine (the root graph or a parallel branch).
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: state_id -> states it may transition to.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: state_id -> states that may transition into it.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// States that end the graph when they complete.
  terminals: HashSet<String>,
}

impl Graph {
  /// Build a graph from locked states.
  pub fn new(states: &HashMap<String, State>) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut terminals = HashSet::new();

    for (state_id, state) in states {
      adjacency.entry(state_id.clone()).or_default();
      reverse_adjacency.entry(state_id.clone()).or_default();
      if state.is_terminal() {
        terminals.insert(state_id.clone());
      }
    }

    for (state_id, state) in states {
      for next in state.successors() {
        adjacency
          .entry(state_id.clone())
          .or_default()
          .push(next.to_string());
        reverse_adjacency
          .entry(next.to_string())
          .or_default()
          .push(state_id.clone());
      }
    }

    Self {
      adjacency,
      reverse_adjacency,
      terminals,
    }
  }

  /// States a given state may transition to.
  pub fn downstream(&self, state_id: &str) -> &[String] {
    self
      .adjacency
      .get(state_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// States that may transition into a given state.
  pub fn upstream(&self, state_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(state_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn terminals(&self) -> &HashSet<String> {
    &self.terminals
  }

  /// Every state reachable from `start`, `start` included.
  pub fn reachable_from(&self, start: &str) -> HashSet<String> {
    walk(start.to_string(), |id| self.downstream(id))
  }

  /// Every state with at least one path to a terminal state.
  pub fn can_reach_terminal(&self) -> HashSet<String> {
    let mut seen = HashSet::new();
    for terminal in &self.terminals {
      seen.extend(walk(terminal.clone(), |id| self.upstream(id)));
    }
    seen
  }
}

fn walk<'a>(start: String, next: impl Fn(&str) -> &'a [String]) -> HashSet<String> {
  let mut seen = HashSet::new();
  let mut queue = VecDeque::from([start]);
  while let Some(id) = queue.pop_front() {
    if !seen.insert(id.clone()) {
      continue;
    }
    queue.extend(next(&id).iter().cloned());
  }
  seen
}
