use photon_config::ConditionDef;
use photon_path::{JsonPath, PathError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A compiled choice condition.
///
/// Comparisons against a path that does not resolve, or that resolves to a
/// value of the wrong type, evaluate to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
  StringEquals { path: JsonPath, value: String },
  NumericEquals { path: JsonPath, value: f64 },
  NumericLessThan { path: JsonPath, value: f64 },
  NumericGreaterThan { path: JsonPath, value: f64 },
  BooleanEquals { path: JsonPath, value: bool },
  IsPresent { path: JsonPath, value: bool },
  And(Vec<Predicate>),
  Or(Vec<Predicate>),
  Not(Box<Predicate>),
}

impl Predicate {
  /// Compile a condition, parsing every variable path it references.
  pub fn compile(def: &ConditionDef) -> Result<Self, PathError> {
    Ok(match def {
      ConditionDef::StringEquals { variable, value } => Predicate::StringEquals {
        path: JsonPath::parse(variable)?,
        value: value.clone(),
      },
      ConditionDef::NumericEquals { variable, value } => Predicate::NumericEquals {
        path: JsonPath::parse(variable)?,
        value: *value,
      },
      ConditionDef::NumericLessThan { variable, value } => Predicate::NumericLessThan {
        path: JsonPath::parse(variable)?,
        value: *value,
      },
      ConditionDef::NumericGreaterThan { variable, value } => Predicate::NumericGreaterThan {
        path: JsonPath::parse(variable)?,
        value: *value,
      },
      ConditionDef::BooleanEquals { variable, value } => Predicate::BooleanEquals {
        path: JsonPath::parse(variable)?,
        value: *value,
      },
      ConditionDef::IsPresent { variable, value } => Predicate::IsPresent {
        path: JsonPath::parse(variable)?,
        value: *value,
      },
      ConditionDef::And(inner) => {
        Predicate::And(inner.iter().map(Predicate::compile).collect::<Result<_, _>>()?)
      }
      ConditionDef::Or(inner) => {
        Predicate::Or(inner.iter().map(Predicate::compile).collect::<Result<_, _>>()?)
      }
      ConditionDef::Not(inner) => Predicate::Not(Box::new(Predicate::compile(inner)?)),
    })
  }

  /// Evaluate against an execution document.
  pub fn evaluate(&self, document: &Value) -> bool {
    match self {
      Predicate::StringEquals { path, value } => {
        path.select(document).and_then(Value::as_str) == Some(value.as_str())
      }
      Predicate::NumericEquals { path, value } => number(path, document).is_some_and(|n| n == *value),
      Predicate::NumericLessThan { path, value } => number(path, document).is_some_and(|n| n < *value),
      Predicate::NumericGreaterThan { path, value } => {
        number(path, document).is_some_and(|n| n > *value)
      }
      Predicate::BooleanEquals { path, value } => {
        path.select(document).and_then(Value::as_bool) == Some(*value)
      }
      Predicate::IsPresent { path, value } => path.select(document).is_some() == *value,
      Predicate::And(inner) => inner.iter().all(|p| p.evaluate(document)),
      Predicate::Or(inner) => inner.iter().any(|p| p.evaluate(document)),
      Predicate::Not(inner) => !inner.evaluate(document),
    }
  }
}

fn number(path: &JsonPath, document: &Value) -> Option<f64> {
  path.select(document).and_then(Value::as_f64)
}
