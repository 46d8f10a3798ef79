use serde::{Deserialize, Serialize};

use crate::condition::ChoiceRuleDef;
use crate::retry::{CatchRule, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDef {
  pub state_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(flatten)]
  pub state_type: StateType,
}

/// A parallel branch: a self-contained state graph with its own start state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDef {
  pub start_at: String,
  pub states: Vec<StateDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateType {
  /// Invoke an external task.
  Task {
    /// Name of the task executor, e.g. "extract-image-metadata".
    task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    retry: Vec<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    catch: Vec<CatchRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    #[serde(default)]
    end: bool,
  },
  /// Route on the first matching predicate.
  Choice {
    choices: Vec<ChoiceRuleDef>,
    default: String,
  },
  /// Fan out over independent branches and join their outputs.
  Parallel {
    branches: Vec<BranchDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    #[serde(default)]
    end: bool,
  },
  Fail {
    error: String,
    cause: String,
  },
  Succeed,
}
