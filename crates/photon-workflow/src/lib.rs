//! Photon Workflow
//!
//! This crate provides the "locked" workflow representation for Photon.
//! A locked workflow is a validated form of a [`photon_config::WorkflowDef`]
//! that is ready for execution and never mutated afterwards.
//!
//! Key differences from `photon-config`:
//! - Every transition target exists within its own graph (branches are closed)
//! - State ids are unique across the whole definition, branches included
//! - Every state is reachable from the start state and can reach a terminal
//! - Paths are parsed, retry/catch lists are checked for ordering mistakes
//! - Choice conditions are compiled into [`Predicate`]s

mod build;
mod error;
mod graph;
mod predicate;
mod state;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use predicate::Predicate;
pub use state::{
  CatchRule, ChoiceRule, ChoiceState, FailState, ParallelState, State, StateKind, TaskState,
  Transition, matches_error,
};
pub use workflow::{StateGraph, Workflow};
