//! JSONPath-lite for execution documents.
//!
//! Supports the subset of JSONPath that state definitions need to scope task
//! input and place task results:
//!
//! - `$` the whole document
//! - `$.field.nested` object member access
//! - `$.items[0]` array index access
//! - `$['key with spaces']` quoted member access
//!
//! Filters, wildcards and slices are not supported.

mod error;
mod path;

pub use error::PathError;
pub use path::{JsonPath, Segment};
