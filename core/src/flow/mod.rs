// core/src/flow/mod.rs

//! A small step-based workflow engine.
//!
//! A [`Flow`] is an ordered list of named steps run against shared state wrapped in
//! [`FlowContext`]. Each step has one or more async handlers that return a
//! [`StepControl`] signal. Flows are registered in a [`FlowRegistry`] keyed by the
//! type of the state they operate on, so callers only need to build the state and
//! hand it to `FlowRegistry::run`.
//!
//! Cart synchronization and order submission are both expressed as flows.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod registry;

pub use context_data::FlowContext;
pub use control::{FlowOutcome, StepControl};
pub use definition::{Flow, SkipCondition, StepDef, StepHandler};
pub use error::FlowError;
pub use registry::FlowRegistry;
