//! Choice router.

use photon_workflow::ChoiceRule;
use serde_json::Value;

/// Next state for a choice: the first rule whose predicate holds, else `default`.
pub fn route<'a>(document: &Value, choices: &'a [ChoiceRule], default: &'a str) -> &'a str {
  choices
    .iter()
    .find(|rule| rule.predicate.evaluate(document))
    .map(|rule| rule.next.as_str())
    .unwrap_or(default)
}

#[cfg(test)]
mod tests {
  use super::*;
  use photon_config::ConditionDef;
  use photon_workflow::Predicate;
  use serde_json::json;

  fn format_is(value: &str, next: &str) -> ChoiceRule {
    let condition = ConditionDef::StringEquals {
      variable: "$.extractedMetadata.format".to_string(),
      value: value.to_string(),
    };
    ChoiceRule {
      predicate: Predicate::compile(&condition).unwrap(),
      next: next.to_string(),
    }
  }

  #[test]
  fn test_first_match_wins() {
    let choices = vec![format_is("JPEG", "First"), format_is("JPEG", "Second")];
    let doc = json!({ "extractedMetadata": { "format": "JPEG" } });
    assert_eq!(route(&doc, &choices, "Fallback"), "First");
  }

  #[test]
  fn test_default_when_nothing_matches() {
    let choices = vec![format_is("JPEG", "Transform"), format_is("PNG", "Transform")];
    let doc = json!({ "extractedMetadata": { "format": "BMP" } });
    assert_eq!(route(&doc, &choices, "NotSupportedImageType"), "NotSupportedImageType");
  }

  #[test]
  fn test_missing_path_takes_default() {
    let choices = vec![format_is("JPEG", "Transform")];
    let doc = json!({ "objectKey": "photos/cat.jpg" });
    assert_eq!(route(&doc, &choices, "NotSupportedImageType"), "NotSupportedImageType");
  }
}
