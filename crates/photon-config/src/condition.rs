use serde::{Deserialize, Serialize};

/// A branch predicate over the execution document.
///
/// `variable` is a JSONPath-lite expression such as `$.extractedMetadata.format`.
///
/// ```json
/// { "or": [
///   { "string_equals": { "variable": "$.extractedMetadata.format", "value": "JPEG" } },
///   { "string_equals": { "variable": "$.extractedMetadata.format", "value": "PNG" } }
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionDef {
  StringEquals { variable: String, value: String },
  NumericEquals { variable: String, value: f64 },
  NumericLessThan { variable: String, value: f64 },
  NumericGreaterThan { variable: String, value: f64 },
  BooleanEquals { variable: String, value: bool },
  IsPresent { variable: String, value: bool },
  And(Vec<ConditionDef>),
  Or(Vec<ConditionDef>),
  Not(Box<ConditionDef>),
}

/// One `(predicate, next-state)` pair of a choice state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRuleDef {
  pub condition: ConditionDef,
  pub next: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_nested_condition_parses() {
    let json = r#"{
      "condition": {
        "or": [
          { "string_equals": { "variable": "$.format", "value": "JPEG" } },
          { "not": { "is_present": { "variable": "$.format", "value": true } } }
        ]
      },
      "next": "Transform"
    }"#;

    let rule: ChoiceRuleDef = serde_json::from_str(json).unwrap();
    assert_eq!(rule.next, "Transform");

    match rule.condition {
      ConditionDef::Or(inner) => {
        assert_eq!(inner.len(), 2);
        assert!(matches!(inner[1], ConditionDef::Not(_)));
      }
      other => panic!("expected or condition, got {:?}", other),
    }
  }
}
