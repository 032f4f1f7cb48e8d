//! Independent projection runs over named parameter overrides.

pub mod batch;

pub use batch::{
    apply_overrides, run_scenarios, ScenarioBatchInput, ScenarioBatchOutput, ScenarioResult,
    ScenarioSpec, ScenarioStatus,
};
