use std::process::ExitCode;

use harness::{run_headless, SimWorld};
use tracing::{error, warn};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut scenario,
    } = app;
    let mut world = SimWorld::default();
    match run_headless(&config, &mut scenario, &mut world) {
        Ok(summary) if summary.finished => ExitCode::SUCCESS,
        Ok(summary) => {
            warn!(
                ticks = summary.ticks,
                simulated_seconds = summary.simulated_seconds,
                "session_incomplete"
            );
            ExitCode::from(2)
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}
