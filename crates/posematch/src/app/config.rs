use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::Vec3;
use harness::{LoopConfig, MatchTolerance};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub(crate) const SCENARIO_ENV_VAR: &str = "HARNESS_SCENARIO";
const DEFAULT_SCENARIO_FILE: &str = "scenarios/pose_match.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read scenario config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse scenario config '{path}' at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scenario config '{path}': {field} {message}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        message: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct OperatorConfig {
    pub(crate) start_position: [f32; 3],
    pub(crate) linear_speed: f32,
    pub(crate) angular_speed_degrees: f32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            start_position: [0.0, 1.2, 0.0],
            linear_speed: 0.5,
            angular_speed_degrees: 90.0,
        }
    }
}

impl OperatorConfig {
    pub(crate) fn start_position(&self) -> Vec3 {
        Vec3::from_array(self.start_position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ParticleConfig {
    pub(crate) count: u32,
    pub(crate) spawn_height: f32,
    pub(crate) spawn_interval_seconds: f64,
    pub(crate) lifetime_seconds: f64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 12,
            spawn_height: 2.0,
            spawn_interval_seconds: 0.25,
            lifetime_seconds: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ScenarioConfig {
    pub(crate) tick_rate: u32,
    pub(crate) max_seconds: f64,
    pub(crate) realtime: bool,
    pub(crate) num_rounds: Option<usize>,
    pub(crate) tolerance: MatchTolerance,
    pub(crate) operator: OperatorConfig,
    pub(crate) particles: ParticleConfig,
    /// File name under the log directory.
    pub(crate) log_file: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_seconds: 120.0,
            realtime: false,
            num_rounds: None,
            tolerance: MatchTolerance::default(),
            operator: OperatorConfig::default(),
            particles: ParticleConfig::default(),
            log_file: "pose_match.jsonl".to_string(),
        }
    }
}

impl ScenarioConfig {
    pub(crate) fn max_ticks(&self) -> u64 {
        (self.max_seconds * f64::from(self.tick_rate)).ceil() as u64
    }

    pub(crate) fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.tick_rate,
            max_ticks: self.max_ticks(),
            realtime: self.realtime,
            metrics_log_interval: Duration::from_secs(1),
            ..LoopConfig::default()
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |field, message| ConfigError::Invalid {
            path: path.to_path_buf(),
            field,
            message,
        };
        if self.tick_rate == 0 {
            return Err(invalid("tick_rate", "must be at least 1"));
        }
        if !self.max_seconds.is_finite() || self.max_seconds <= 0.0 {
            return Err(invalid("max_seconds", "must be a positive number"));
        }
        if self.num_rounds == Some(0) {
            return Err(invalid("num_rounds", "must be at least 1 when set"));
        }
        if !(self.tolerance.linear > 0.0) {
            return Err(invalid("tolerance.linear", "must be positive"));
        }
        if !(self.tolerance.angular > 0.0 && self.tolerance.angular < 1.0) {
            return Err(invalid("tolerance.angular", "must lie in (0, 1)"));
        }
        if !(self.operator.linear_speed > 0.0) {
            return Err(invalid("operator.linear_speed", "must be positive"));
        }
        if !(self.operator.angular_speed_degrees > 0.0) {
            return Err(invalid("operator.angular_speed_degrees", "must be positive"));
        }
        if !(self.particles.lifetime_seconds > 0.0) {
            return Err(invalid("particles.lifetime_seconds", "must be positive"));
        }
        if !(self.particles.spawn_interval_seconds > 0.0) {
            return Err(invalid("particles.spawn_interval_seconds", "must be positive"));
        }
        if self.log_file.trim().is_empty() {
            return Err(invalid("log_file", "must not be empty"));
        }
        Ok(())
    }
}

/// Reads the scenario named by `HARNESS_SCENARIO`, else the stock scenario
/// under the asset root, else built-in defaults.
pub(crate) fn load_scenario_config(assets_dir: &Path) -> Result<ScenarioConfig, ConfigError> {
    let path = match env::var(SCENARIO_ENV_VAR) {
        Ok(value) => PathBuf::from(value),
        Err(env::VarError::NotPresent) => {
            let default_path = assets_dir.join(DEFAULT_SCENARIO_FILE);
            if !default_path.is_file() {
                info!(path = %default_path.display(), "scenario_config_defaults");
                return Ok(ScenarioConfig::default());
            }
            default_path
        }
        Err(source) => {
            return Err(ConfigError::EnvVar {
                var: SCENARIO_ENV_VAR,
                source,
            })
        }
    };

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = parse_scenario_config(&raw, &path)?;
    info!(path = %path.display(), "scenario_config_loaded");
    Ok(config)
}

pub(crate) fn parse_scenario_config(raw: &str, path: &Path) -> Result<ScenarioConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config = serde_path_to_error::deserialize::<_, ScenarioConfig>(&mut deserializer)
        .map_err(|error| {
            let json_path = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        })?;
    config.validate(path)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn parse(raw: &str) -> Result<ScenarioConfig, ConfigError> {
        parse_scenario_config(raw, Path::new("test.json"))
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config = parse("{}").expect("defaults");
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.max_ticks(), 7200);
    }

    #[test]
    fn nested_fields_override_defaults() {
        let config = parse(
            r#"{
                "tick_rate": 30,
                "num_rounds": 2,
                "tolerance": { "linear": 0.05 },
                "particles": { "count": 0 }
            }"#,
        )
        .expect("parse");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.num_rounds, Some(2));
        assert_eq!(config.tolerance.linear, 0.05);
        assert_eq!(config.tolerance.angular, 0.02);
        assert_eq!(config.particles.count, 0);
        assert_eq!(config.loop_config().target_tps, 30);
    }

    #[test]
    fn parse_errors_report_the_json_path() {
        let err = parse(r#"{ "operator": { "linear_speed": "fast" } }"#).expect_err("bad type");
        match err {
            ConfigError::Parse { json_path, .. } => assert_eq!(json_path, "operator.linear_speed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse(r#"{ "particles": { "colour": "blue" } }"#).expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn semantic_validation_names_the_field() {
        let err = parse(r#"{ "num_rounds": 0 }"#).expect_err("zero rounds");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "num_rounds",
                ..
            }
        ));
        let err = parse(r#"{ "tolerance": { "angular": 1.5 } }"#).expect_err("angular");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "tolerance.angular",
                ..
            }
        ));
    }

    #[test]
    fn stock_scenario_file_parses() {
        let raw = include_str!("../../../../assets/scenarios/pose_match.json");
        let config = parse(raw).expect("stock scenario");
        assert_eq!(config.num_rounds, Some(3));
        assert_eq!(config.log_file, "pose_match.jsonl");
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        if env::var_os(SCENARIO_ENV_VAR).is_some() {
            return;
        }
        let temp = TempDir::new().expect("tempdir");
        let config = load_scenario_config(temp.path()).expect("defaults");
        assert_eq!(config, ScenarioConfig::default());
    }
}
