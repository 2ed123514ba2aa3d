use harness::{
    resolve_app_paths, JsonLinesSink, LoopConfig, SinkError, StartupError, XmlModelResolver,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_scenario_config, ConfigError};
use super::scenario::PoseMatchScenario;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open data log: {0}")]
    DataLog(#[from] SinkError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scenario: PoseMatchScenario<XmlModelResolver>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== posematch startup ===");

    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        assets_dir = %app_paths.assets_dir.display(),
        logs_dir = %app_paths.logs_dir.display(),
        "startup"
    );

    let scenario_config = load_scenario_config(&app_paths.assets_dir)?;
    let log_path = app_paths.logs_dir.join(&scenario_config.log_file);
    let sink = JsonLinesSink::create(&log_path)?;
    info!(path = %log_path.display(), "data_log_opened");

    let resolver = XmlModelResolver::new(app_paths.assets_dir.clone());
    let config = scenario_config.loop_config();
    Ok(AppWiring {
        config,
        scenario: PoseMatchScenario::new(scenario_config, resolver, Box::new(sink)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
