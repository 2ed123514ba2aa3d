use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::objects::LifecycleError;
use crate::task::TaskError;
use crate::StartupError;

use super::metrics::MetricsAccumulator;
use super::{Scenario, ScenarioCommand, SimWorld};

pub const MAX_TICKS_ENV_VAR: &str = "HARNESS_MAX_TICKS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// Hard stop for scenarios that never finish on their own.
    pub max_ticks: u64,
    /// Pace ticks against the wall clock instead of running them back to back.
    pub realtime: bool,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks: 60 * 60,
            realtime: false,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("scenario failed at tick {tick}: {source}")]
    Scenario {
        tick: u64,
        #[source]
        source: TaskError,
    },
    #[error("world update failed at tick {tick}: {source}")]
    World {
        tick: u64,
        #[source]
        source: LifecycleError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub simulated_seconds: f64,
    /// `false` when the tick budget ran out before the scenario finished.
    pub finished: bool,
}

/// Fixed-timestep driver. Each tick runs the scenario, applies deferred
/// spawns and despawns, steps physics and copies body poses onto meshes.
///
/// A failing tick still unloads the scenario and clears the world before the
/// error is returned.
pub fn run_headless(
    config: &LoopConfig,
    scenario: &mut dyn Scenario,
    world: &mut SimWorld,
) -> Result<RunSummary, AppError> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let max_ticks = resolve_max_ticks(config.max_ticks);

    if let Err(error) = load_scenario(scenario, world) {
        return Err(abort_run(scenario, world, error));
    }
    info!(
        prop_count = world.prop_count(),
        body_count = world.physics().body_count(),
        "scenario_loaded"
    );
    info!(
        target_tps,
        max_ticks,
        realtime = config.realtime,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut tick = 0u64;
    let mut finished = false;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_title: Option<String> = None;

    while tick < max_ticks && !finished {
        let ticks_to_run = if config.realtime {
            let now = Instant::now();
            let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            accumulator =
                accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

            let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
            accumulator = step_plan.remaining_accumulator;
            if step_plan.dropped_backlog > Duration::ZERO {
                warn!(
                    dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                    max_ticks_per_frame, "sim_clamp_triggered"
                );
            }
            if step_plan.ticks_to_run == 0 {
                thread::sleep(fixed_dt.saturating_sub(accumulator));
                continue;
            }
            step_plan.ticks_to_run
        } else {
            1
        };

        for _ in 0..ticks_to_run {
            let tick_start = Instant::now();
            let time_seconds = tick as f64 * fixed_dt.as_secs_f64();
            let command = match run_tick(scenario, world, tick, time_seconds, fixed_dt_seconds) {
                Ok(command) => command,
                Err(error) => return Err(abort_run(scenario, world, error)),
            };
            world.step(fixed_dt_seconds);
            world.sync_transforms();
            metrics_accumulator.record_tick(tick_start.elapsed());
            tick = tick.saturating_add(1);

            if command == ScenarioCommand::Finish {
                finished = true;
                info!(tick, "scenario_finished");
                break;
            }
            if tick >= max_ticks {
                break;
            }
        }

        let title = scenario.debug_title(world);
        if title != last_title {
            if let Some(title) = &title {
                info!(title = title.as_str(), tick, "scenario_status");
            }
            last_title = title;
        }

        let body_count = world.physics().body_count();
        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now(), body_count) {
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                body_count = snapshot.body_count,
                "loop_metrics"
            );
        }
    }

    if !finished {
        warn!(max_ticks, "tick_budget_exhausted");
    }
    scenario
        .unload(world)
        .map_err(|source| AppError::Scenario { tick, source })?;
    world
        .apply_pending()
        .map_err(|source| AppError::World { tick, source })?;

    let summary = RunSummary {
        ticks: tick,
        simulated_seconds: tick as f64 * fixed_dt.as_secs_f64(),
        finished,
    };
    info!(
        ticks = summary.ticks,
        simulated_seconds = summary.simulated_seconds,
        finished = summary.finished,
        "shutdown"
    );
    Ok(summary)
}

fn load_scenario(scenario: &mut dyn Scenario, world: &mut SimWorld) -> Result<(), AppError> {
    scenario
        .load(world)
        .map_err(|source| AppError::Scenario { tick: 0, source })?;
    world
        .apply_pending()
        .map_err(|source| AppError::World { tick: 0, source })
}

fn run_tick(
    scenario: &mut dyn Scenario,
    world: &mut SimWorld,
    tick: u64,
    time_seconds: f64,
    fixed_dt_seconds: f32,
) -> Result<ScenarioCommand, AppError> {
    let command = scenario
        .update(time_seconds, fixed_dt_seconds, world)
        .map_err(|source| AppError::Scenario { tick, source })?;
    world
        .apply_pending()
        .map_err(|source| AppError::World { tick, source })?;
    Ok(command)
}

/// Best-effort teardown after a failed tick. The original error wins; cleanup
/// failures are only logged.
fn abort_run(scenario: &mut dyn Scenario, world: &mut SimWorld, error: AppError) -> AppError {
    warn!(error = %error, "run_aborted");
    if let Err(unload_error) = scenario.unload(world) {
        warn!(error = %unload_error, "abort_unload_failed");
    }
    if let Err(clear_error) = world.clear() {
        warn!(error = %clear_error, "abort_clear_failed");
    }
    error
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn resolve_max_ticks(config_max_ticks: u64) -> u64 {
    match env::var(MAX_TICKS_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ticks) => ticks,
            Err(_) => {
                warn!(
                    env_var = MAX_TICKS_ENV_VAR,
                    value = value.as_str(),
                    "invalid max-ticks env var value; falling back to config"
                );
                config_max_ticks
            }
        },
        Err(env::VarError::NotPresent) => config_max_ticks,
        Err(err) => {
            warn!(
                env_var = MAX_TICKS_ENV_VAR,
                error = %err,
                "unable to read max-ticks env var; falling back to config"
            );
            config_max_ticks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ObjectKind, ObjectOptions, SceneObject};
    use crate::resources::MemoryResolver;
    use crate::sink::MemorySink;
    use crate::task::{LiveFrame, PoseMatch, PoseMatchOptions, Task, TaskState};

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn zero_durations_fall_back() {
        assert_eq!(
            normalize_non_zero_duration(Duration::ZERO, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), Duration::from_secs(1)),
            Duration::from_millis(5)
        );
    }

    struct CountingScenario {
        finish_after: Option<u64>,
        updates: u64,
        loaded: bool,
        unloaded: bool,
    }

    impl CountingScenario {
        fn new(finish_after: Option<u64>) -> Self {
            Self {
                finish_after,
                updates: 0,
                loaded: false,
                unloaded: false,
            }
        }
    }

    impl Scenario for CountingScenario {
        fn load(&mut self, _world: &mut SimWorld) -> Result<(), TaskError> {
            self.loaded = true;
            Ok(())
        }

        fn update(
            &mut self,
            _time_seconds: f64,
            _fixed_dt_seconds: f32,
            _world: &mut SimWorld,
        ) -> Result<ScenarioCommand, TaskError> {
            self.updates += 1;
            if self.finish_after == Some(self.updates) {
                Ok(ScenarioCommand::Finish)
            } else {
                Ok(ScenarioCommand::Continue)
            }
        }

        fn unload(&mut self, _world: &mut SimWorld) -> Result<(), TaskError> {
            self.unloaded = true;
            Ok(())
        }
    }

    #[test]
    fn finish_command_stops_the_loop() {
        let mut world = SimWorld::default();
        let mut scenario = CountingScenario::new(Some(5));
        let summary = run_headless(&LoopConfig::default(), &mut scenario, &mut world)
            .expect("run should succeed");

        assert!(summary.finished);
        assert_eq!(summary.ticks, 5);
        assert_eq!(scenario.updates, 5);
        assert!(scenario.loaded && scenario.unloaded);
        assert!((summary.simulated_seconds - 5.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn tick_budget_bounds_endless_scenarios() {
        let mut world = SimWorld::default();
        let mut scenario = CountingScenario::new(None);
        let config = LoopConfig {
            max_ticks: 12,
            ..LoopConfig::default()
        };
        let summary = run_headless(&config, &mut scenario, &mut world).expect("run");

        assert!(!summary.finished);
        assert_eq!(summary.ticks, 12);
        assert!(scenario.unloaded);
    }

    struct FailingScenario;

    impl Scenario for FailingScenario {
        fn load(&mut self, _world: &mut SimWorld) -> Result<(), TaskError> {
            Ok(())
        }

        fn update(
            &mut self,
            time_seconds: f64,
            _fixed_dt_seconds: f32,
            world: &mut SimWorld,
        ) -> Result<ScenarioCommand, TaskError> {
            if time_seconds > 0.0 {
                let mut orphan =
                    SceneObject::new(world.allocate_id(), ObjectKind::Target, ObjectOptions::default());
                orphan.load(world.object_context())?;
            }
            Ok(ScenarioCommand::Continue)
        }

        fn unload(&mut self, _world: &mut SimWorld) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn lifecycle_errors_abort_the_run_with_the_tick() {
        let mut world = SimWorld::default();
        let err = run_headless(&LoopConfig::default(), &mut FailingScenario, &mut world)
            .expect_err("unfetched load must fail");
        match err {
            AppError::Scenario { tick, source } => {
                assert_eq!(tick, 1);
                assert!(matches!(source, TaskError::Lifecycle(LifecycleError::NotFetched { .. })));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct ScriptedPoseMatch {
        task: Option<PoseMatch>,
        sink: MemorySink,
        particle: Option<crate::objects::ObjectId>,
        ticks: u64,
    }

    impl Scenario for ScriptedPoseMatch {
        fn load(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
            let resolver = MemoryResolver::new()
                .with_model(ObjectKind::GripperGoal.asset_key(), &["palm"])
                .with_model(ObjectKind::WaterParticle.asset_key(), &["drop"]);
            let mut task = pollster::block_on(PoseMatch::init(
                "pose-match",
                PoseMatchOptions::default(),
                world,
                &resolver,
                Box::new(self.sink.clone()),
            ))?;
            task.start(world)?;
            self.task = Some(task);

            let id = world.reserve_id();
            let particle = pollster::block_on(SceneObject::init(
                id,
                ObjectKind::WaterParticle,
                ObjectOptions::default().at(glam::Vec3::new(0.0, 3.0, 0.0)),
                &resolver,
            ))?;
            world.spawn(particle)?;
            self.particle = Some(id);
            Ok(())
        }

        fn update(
            &mut self,
            time_seconds: f64,
            _fixed_dt_seconds: f32,
            world: &mut SimWorld,
        ) -> Result<ScenarioCommand, TaskError> {
            let Some(task) = self.task.as_mut() else {
                return Ok(ScenarioCommand::Finish);
            };
            // Jump straight onto the goal every other tick.
            self.ticks += 1;
            let end_effector = if self.ticks % 2 == 1 {
                task.current_round().goal().target_pose()
            } else {
                crate::math::Pose::default()
            };
            task.update(time_seconds, &LiveFrame { end_effector }, world);
            task.log(time_seconds, world)?;
            if task.is_complete() {
                if let Some(id) = self.particle.take() {
                    world.despawn(id);
                }
                return Ok(ScenarioCommand::Finish);
            }
            Ok(ScenarioCommand::Continue)
        }

        fn unload(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
            if let Some(mut task) = self.task.take() {
                task.destruct(world)?;
            }
            Ok(())
        }
    }

    #[test]
    fn pose_match_runs_to_completion_and_cleans_up() {
        let mut world = SimWorld::default();
        let sink = MemorySink::new();
        let mut scenario = ScriptedPoseMatch {
            task: None,
            sink: sink.clone(),
            particle: None,
            ticks: 0,
        };
        let summary =
            run_headless(&LoopConfig::default(), &mut scenario, &mut world).expect("run");

        assert!(summary.finished);
        assert_eq!(summary.ticks, 5);
        let records = sink.records();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].fields[1], TaskState::Complete.label());
        assert_eq!(world.physics().body_count(), 0);
        assert!(world.registry().is_empty());
        assert!(world.scene().is_empty());
        assert_eq!(world.prop_count(), 0);
    }

    #[test]
    fn realtime_mode_paces_ticks_against_the_clock() {
        let mut world = SimWorld::default();
        let mut scenario = CountingScenario::new(Some(4));
        let config = LoopConfig {
            target_tps: 200,
            realtime: true,
            ..LoopConfig::default()
        };
        let started = Instant::now();
        let summary = run_headless(&config, &mut scenario, &mut world).expect("run");

        assert!(summary.finished);
        assert_eq!(summary.ticks, 4);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    struct HalfLoadedScenario {
        task: Option<PoseMatch>,
    }

    impl Scenario for HalfLoadedScenario {
        fn load(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
            let resolver =
                MemoryResolver::new().with_model(ObjectKind::GripperGoal.asset_key(), &["palm"]);
            let mut task = pollster::block_on(PoseMatch::init(
                "pose-match",
                PoseMatchOptions::default(),
                world,
                &resolver,
                Box::new(MemorySink::new()),
            ))?;
            task.start(world)?;
            self.task = Some(task);

            let mut orphan =
                SceneObject::new(world.allocate_id(), ObjectKind::Target, ObjectOptions::default());
            orphan.load(world.object_context())?;
            Ok(())
        }

        fn update(
            &mut self,
            _time_seconds: f64,
            _fixed_dt_seconds: f32,
            _world: &mut SimWorld,
        ) -> Result<ScenarioCommand, TaskError> {
            Ok(ScenarioCommand::Continue)
        }

        fn unload(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
            if let Some(mut task) = self.task.take() {
                task.destruct(world)?;
            }
            Ok(())
        }
    }

    #[test]
    fn failed_load_still_unloads_what_was_started() {
        let mut world = SimWorld::default();
        let mut scenario = HalfLoadedScenario { task: None };
        let err = run_headless(&LoopConfig::default(), &mut scenario, &mut world)
            .expect_err("orphan load must fail");

        assert!(matches!(err, AppError::Scenario { tick: 0, .. }));
        assert!(scenario.task.is_none());
        assert_eq!(world.physics().body_count(), 0);
        assert!(world.registry().is_empty());
        assert!(world.scene().is_empty());
        assert_eq!(world.ui().visible_count(), 0);
    }
}
