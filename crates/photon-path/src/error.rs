use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
  #[error("path '{path}' must start with '$'")]
  MissingRoot { path: String },

  #[error("path '{path}' has an empty member name at position {position}")]
  EmptyMember { path: String, position: usize },

  #[error("path '{path}' has an unterminated bracket at position {position}")]
  UnterminatedBracket { path: String, position: usize },

  #[error("path '{path}' has an invalid array index '{index}'")]
  InvalidIndex { path: String, index: String },

  #[error("path '{path}' has an unexpected character '{ch}' at position {position}")]
  UnexpectedChar {
    path: String,
    ch: char,
    position: usize,
  },

  #[error("cannot place value at '{path}': '{at}' is not an object")]
  NotAnObject { path: String, at: String },

  #[error("cannot place value at '{path}': '{at}' is not an array or index is out of bounds")]
  IndexOutOfBounds { path: String, at: String },
}
