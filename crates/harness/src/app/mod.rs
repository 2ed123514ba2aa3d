mod loop_runner;
mod metrics;
mod world;

pub use loop_runner::{run_headless, AppError, LoopConfig, RunSummary, MAX_TICKS_ENV_VAR};
pub use world::{Scenario, ScenarioCommand, SimWorld};
