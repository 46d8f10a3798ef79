//! Photon Config
//!
//! This crate contains the serializable configuration types for Photon.
//! These types represent state machine definitions before they are validated
//! and locked by `photon-workflow`, plus the system configuration record that
//! wires task endpoints, storage and timeouts into the engine.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI, e.g. `photon run workflows/image-recognition.json`)
//! - Database storage (as JSON blobs)

mod condition;
pub mod error_class;
mod retry;
mod state;
mod system;
mod workflow;

pub use condition::{ChoiceRuleDef, ConditionDef};
pub use retry::{CatchRule, RetryPolicy};
pub use state::{BranchDef, StateDef, StateType};
pub use system::{SystemConfig, TaskEndpoint};
pub use workflow::WorkflowDef;
