use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PathError;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Member(String),
  Index(usize),
}

/// A parsed JSONPath-lite expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
  raw: String,
  segments: Vec<Segment>,
}

impl JsonPath {
  /// The `$` path, addressing the whole document.
  pub fn root() -> Self {
    Self {
      raw: "$".to_string(),
      segments: Vec::new(),
    }
  }

  /// Parse a path expression.
  pub fn parse(path: &str) -> Result<Self, PathError> {
    let chars: Vec<char> = path.chars().collect();
    if chars.first() != Some(&'$') {
      return Err(PathError::MissingRoot {
        path: path.to_string(),
      });
    }

    let mut segments = Vec::new();
    let mut i = 1;
    while i < chars.len() {
      match chars[i] {
        '.' => {
          let start = i + 1;
          let mut end = start;
          while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
            end += 1;
          }
          if end == start {
            return Err(PathError::EmptyMember {
              path: path.to_string(),
              position: start,
            });
          }
          segments.push(Segment::Member(chars[start..end].iter().collect()));
          i = end;
        }
        '[' => {
          let (segment, next) = parse_bracket(path, &chars, i)?;
          segments.push(segment);
          i = next;
        }
        ch => {
          return Err(PathError::UnexpectedChar {
            path: path.to_string(),
            ch,
            position: i,
          });
        }
      }
    }

    Ok(Self {
      raw: path.to_string(),
      segments,
    })
  }

  /// True for `$`.
  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// Resolve the sub-document addressed by this path.
  ///
  /// Returns `None` when any step is missing or has the wrong shape.
  pub fn select<'a>(&self, document: &'a Value) -> Option<&'a Value> {
    self
      .segments
      .iter()
      .try_fold(document, |current, segment| match segment {
        Segment::Member(name) => current.get(name.as_str()),
        Segment::Index(index) => current.get(*index),
      })
  }

  /// Write `value` into `document` at this path.
  ///
  /// `$` replaces the whole document. Missing (or null) intermediate members
  /// are created as objects; array elements must already exist.
  pub fn place(&self, document: &mut Value, value: Value) -> Result<(), PathError> {
    let Some((last, parents)) = self.segments.split_last() else {
      *document = value;
      return Ok(());
    };

    let mut current = document;
    for (depth, segment) in parents.iter().enumerate() {
      current = match segment {
        Segment::Member(name) => {
          if current.is_null() {
            *current = Value::Object(Map::new());
          }
          current
            .as_object_mut()
            .ok_or_else(|| self.not_an_object(depth))?
            .entry(name.clone())
            .or_insert(Value::Null)
        }
        Segment::Index(index) => current
          .as_array_mut()
          .and_then(|items| items.get_mut(*index))
          .ok_or_else(|| self.out_of_bounds(depth))?,
      };
    }

    let depth = parents.len();
    match last {
      Segment::Member(name) => {
        if current.is_null() {
          *current = Value::Object(Map::new());
        }
        current
          .as_object_mut()
          .ok_or_else(|| self.not_an_object(depth))?
          .insert(name.clone(), value);
      }
      Segment::Index(index) => {
        let slot = current
          .as_array_mut()
          .and_then(|items| items.get_mut(*index))
          .ok_or_else(|| self.out_of_bounds(depth))?;
        *slot = value;
      }
    }

    Ok(())
  }

  fn not_an_object(&self, depth: usize) -> PathError {
    PathError::NotAnObject {
      path: self.raw.clone(),
      at: render(&self.segments[..depth]),
    }
  }

  fn out_of_bounds(&self, depth: usize) -> PathError {
    PathError::IndexOutOfBounds {
      path: self.raw.clone(),
      at: render(&self.segments[..depth]),
    }
  }
}

/// Parse `[0]`, `['name']` or `["name"]` starting at `open`.
///
/// Returns the segment and the index just past the closing bracket.
fn parse_bracket(path: &str, chars: &[char], open: usize) -> Result<(Segment, usize), PathError> {
  let unterminated = || PathError::UnterminatedBracket {
    path: path.to_string(),
    position: open,
  };

  match chars.get(open + 1) {
    Some(&quote) if quote == '\'' || quote == '"' => {
      let start = open + 2;
      let close_quote = chars[start.min(chars.len())..]
        .iter()
        .position(|c| *c == quote)
        .map(|p| start + p)
        .ok_or_else(unterminated)?;
      if chars.get(close_quote + 1) != Some(&']') {
        return Err(unterminated());
      }
      if close_quote == start {
        return Err(PathError::EmptyMember {
          path: path.to_string(),
          position: start,
        });
      }
      let name: String = chars[start..close_quote].iter().collect();
      Ok((Segment::Member(name), close_quote + 2))
    }
    Some(_) => {
      let start = open + 1;
      let close = chars[start..]
        .iter()
        .position(|c| *c == ']')
        .map(|p| start + p)
        .ok_or_else(unterminated)?;
      let raw: String = chars[start..close].iter().collect();
      let index = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| PathError::InvalidIndex {
          path: path.to_string(),
          index: raw.clone(),
        })?;
      Ok((Segment::Index(index), close + 1))
    }
    None => Err(unterminated()),
  }
}

fn render(segments: &[Segment]) -> String {
  let mut out = String::from("$");
  for segment in segments {
    match segment {
      Segment::Member(name) if name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') => {
        out.push('.');
        out.push_str(name);
      }
      Segment::Member(name) => {
        out.push_str("['");
        out.push_str(name);
        out.push_str("']");
      }
      Segment::Index(index) => {
        out.push('[');
        out.push_str(&index.to_string());
        out.push(']');
      }
    }
  }
  out
}

impl Default for JsonPath {
  fn default() -> Self {
    Self::root()
  }
}

impl fmt::Display for JsonPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl FromStr for JsonPath {
  type Err = PathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for JsonPath {
  type Error = PathError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<JsonPath> for String {
  fn from(path: JsonPath) -> Self {
    path.raw
  }
}
