use serde::{Deserialize, Serialize};

use crate::state::StateDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  pub start_at: String,
  /// Upper bound on a whole execution. Exceeding it ends the execution as timed out.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_seconds: Option<u64>,
  pub states: Vec<StateDef>,
}

impl WorkflowDef {
  /// Parse a workflow definition from JSON.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::StateType;

  #[test]
  fn test_parse_minimal_workflow() {
    let json = r#"{
      "workflow_id": "wf",
      "name": "Minimal",
      "start_at": "Work",
      "states": [
        { "state_id": "Work", "type": "task", "task": "do-work", "result_path": "$.work", "next": "Done" },
        { "state_id": "Done", "type": "succeed" }
      ]
    }"#;

    let def = WorkflowDef::from_json(json).unwrap();
    assert_eq!(def.states.len(), 2);

    match &def.states[0].state_type {
      StateType::Task {
        task,
        input_path,
        result_path,
        next,
        end,
        retry,
        ..
      } => {
        assert_eq!(task, "do-work");
        assert!(input_path.is_none());
        assert_eq!(result_path.as_deref(), Some("$.work"));
        assert_eq!(next.as_deref(), Some("Done"));
        assert!(!end);
        assert!(retry.is_empty());
      }
      other => panic!("expected task state, got {:?}", other),
    }
    assert!(matches!(def.states[1].state_type, StateType::Succeed));
  }

  #[test]
  fn test_fail_state_requires_error_and_cause() {
    let json = r#"{
      "workflow_id": "wf",
      "name": "Broken",
      "start_at": "Oops",
      "states": [ { "state_id": "Oops", "type": "fail", "error": "Boom" } ]
    }"#;

    assert!(WorkflowDef::from_json(json).is_err());
  }
}
