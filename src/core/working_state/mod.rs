//! Working-state derivation
//!
//! [`decision`] holds the pure transition rule; [`engine`] loads records,
//! applies the rule, persists and publishes.

pub mod decision;
pub mod engine;

pub use decision::{decide, ExportFacts, StateThresholds, TransitionReason};
pub use engine::{
    EngineSettings, Evaluation, TransitionSummary, WorkingStateEngine, WorkingStateSummary,
};
