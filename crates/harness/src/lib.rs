use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod math;
pub mod objects;
pub mod physics;
pub mod render;
pub mod resources;
pub mod sink;
pub mod task;
pub mod ui;

pub use app::{
    run_headless, AppError, LoopConfig, RunSummary, Scenario, ScenarioCommand, SimWorld,
    MAX_TICKS_ENV_VAR,
};
pub use math::{euler_xyz, Pose, Transform3};
pub use objects::{
    FetchError, Goal, LifecycleError, LifecycleState, ObjectContext, ObjectId, ObjectKind,
    ObjectOptions, SceneObject,
};
pub use physics::{HeadlessPhysics, PhysicsWorld};
pub use resources::{MemoryResolver, ResourceError, ResourceResolver, XmlModelResolver};
pub use sink::{DataSink, JsonLinesSink, LogRecord, MemorySink, SinkError};
pub use task::{
    pose_matches, FsmError, LiveFrame, MatchTolerance, PoseMatch, PoseMatchOptions, Round, Task,
    TaskError, TaskFsm, TaskState,
};

pub const ROOT_ENV_VAR: &str = "HARNESS_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub logs_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create log directory at {path}: {source}")]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "HARNESS_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\posematch\"\n\
Bash/zsh: export {env_var}=\"/path/to/posematch\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_at(root)
}

fn app_paths_at(root: PathBuf) -> Result<AppPaths, StartupError> {
    let assets_dir = root.join("assets");
    let logs_dir = root.join("logs");

    fs::create_dir_all(&logs_dir).map_err(|source| StartupError::CreateLogDir {
        path: logs_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        assets_dir,
        logs_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            find_root_from(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_from(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));

        let temp = TempDir::new().expect("tempdir");
        fs::create_dir(temp.path().join("assets")).expect("assets dir");
        assert!(!is_repo_marker(temp.path()));
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn root_is_found_from_a_nested_directory() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        let nested = temp.path().join("crates").join("posematch").join("target");
        fs::create_dir_all(&nested).expect("nested dirs");

        let root = find_root_from(&nested).expect("root");
        assert_eq!(root, normalize_path(temp.path()));
    }

    #[test]
    fn app_paths_create_the_log_directory() {
        let temp = TempDir::new().expect("tempdir");
        let paths = app_paths_at(temp.path().to_path_buf()).expect("paths");
        assert!(paths.logs_dir.is_dir());
        assert_eq!(paths.assets_dir, temp.path().join("assets"));
    }
}
