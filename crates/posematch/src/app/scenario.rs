use std::collections::VecDeque;

use glam::Vec3;
use harness::{
    DataSink, LiveFrame, ObjectId, ObjectKind, ObjectOptions, PoseMatch, PoseMatchOptions,
    ResourceResolver, Scenario, ScenarioCommand, SceneObject, SimWorld, Task, TaskError,
};
use tracing::{debug, info, warn};

use super::config::ScenarioConfig;
use super::operator::ScriptedOperator;

const TASK_ID: &str = "pose-match";
const TARGET_POSITION: Vec3 = Vec3::new(0.0, 0.8, 0.0);
// Drops fan out around the emitter so they do not stack.
const PARTICLE_RING_RADIUS: f32 = 0.1;
const PARTICLE_ANGLE_STEP: f32 = 2.4;

#[derive(Debug, Clone, Copy)]
struct LiveParticle {
    id: ObjectId,
    expires_at: f64,
}

/// Pose-matching session: the task with its goals, a decorative target
/// ring, a scripted operator and a stream of short-lived water particles.
pub(crate) struct PoseMatchScenario<R> {
    config: ScenarioConfig,
    resolver: R,
    sink: Option<Box<dyn DataSink>>,
    task: Option<PoseMatch>,
    operator: ScriptedOperator,
    particles: VecDeque<LiveParticle>,
    particles_emitted: u32,
    next_emit_at: f64,
    target: Option<ObjectId>,
}

impl<R: ResourceResolver> PoseMatchScenario<R> {
    pub(crate) fn new(config: ScenarioConfig, resolver: R, sink: Box<dyn DataSink>) -> Self {
        let operator = ScriptedOperator::new(&config.operator);
        Self {
            config,
            resolver,
            sink: Some(sink),
            task: None,
            operator,
            particles: VecDeque::new(),
            particles_emitted: 0,
            next_emit_at: 0.0,
            target: None,
        }
    }

    fn emit_particles(&mut self, time_seconds: f64, world: &mut SimWorld) -> Result<(), TaskError> {
        let settings = &self.config.particles;
        while self.particles_emitted < settings.count && time_seconds >= self.next_emit_at {
            let id = world.reserve_id();
            let angle = self.particles_emitted as f32 * PARTICLE_ANGLE_STEP;
            let position = Vec3::new(
                angle.sin() * PARTICLE_RING_RADIUS,
                settings.spawn_height,
                angle.cos() * PARTICLE_RING_RADIUS,
            );
            let particle = pollster::block_on(SceneObject::init(
                id,
                ObjectKind::WaterParticle,
                ObjectOptions::default().at(position),
                &self.resolver,
            ))?;
            if world.spawn(particle)? {
                self.particles.push_back(LiveParticle {
                    id,
                    expires_at: time_seconds + settings.lifetime_seconds,
                });
            }
            self.particles_emitted += 1;
            self.next_emit_at += settings.spawn_interval_seconds;
        }
        Ok(())
    }

    fn expire_particles(&mut self, time_seconds: f64, world: &mut SimWorld) {
        while let Some(particle) = self.particles.front().copied() {
            if particle.expires_at > time_seconds {
                break;
            }
            self.particles.pop_front();
            world.despawn(particle.id);
            debug!(object = particle.id.0, time_seconds, "particle_expired");
        }
    }

    fn despawn_all(&mut self, world: &mut SimWorld) {
        for particle in self.particles.drain(..) {
            world.despawn(particle.id);
        }
        if let Some(target) = self.target.take() {
            world.despawn(target);
        }
    }

    #[cfg(test)]
    fn task(&self) -> Option<&PoseMatch> {
        self.task.as_ref()
    }
}

impl<R: ResourceResolver> Scenario for PoseMatchScenario<R> {
    fn load(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
        let Some(sink) = self.sink.take() else {
            warn!(task = TASK_ID, "scenario_already_loaded");
            return Ok(());
        };
        let options = PoseMatchOptions {
            num_rounds: self.config.num_rounds,
            tolerance: self.config.tolerance,
            extra_text: vec![format!(
                "Match {} poses within {} m",
                self.config.num_rounds.unwrap_or(3),
                self.config.tolerance.linear
            )],
        };
        let mut task =
            pollster::block_on(PoseMatch::init(TASK_ID, options, world, &self.resolver, sink))?;
        task.start(world)?;
        self.task = Some(task);

        let id = world.reserve_id();
        let target = pollster::block_on(SceneObject::init(
            id,
            ObjectKind::Target,
            ObjectOptions::default().at(TARGET_POSITION),
            &self.resolver,
        ))?;
        if world.spawn(target)? {
            self.target = Some(id);
        }
        info!(task = TASK_ID, "scenario_ready");
        Ok(())
    }

    fn update(
        &mut self,
        time_seconds: f64,
        fixed_dt_seconds: f32,
        world: &mut SimWorld,
    ) -> Result<ScenarioCommand, TaskError> {
        self.emit_particles(time_seconds, world)?;
        self.expire_particles(time_seconds, world);

        let Some(task) = self.task.as_mut() else {
            return Ok(ScenarioCommand::Finish);
        };
        let goal = task.current_round().goal().current_pose(world.scene());
        self.operator.step(&goal, fixed_dt_seconds);
        let live = LiveFrame {
            end_effector: self.operator.pose(),
        };
        task.update(time_seconds, &live, world);
        task.log(time_seconds, world)?;

        if task.is_complete() {
            self.despawn_all(world);
            return Ok(ScenarioCommand::Finish);
        }
        Ok(ScenarioCommand::Continue)
    }

    fn unload(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
        self.despawn_all(world);
        if let Some(mut task) = self.task.take() {
            task.destruct(world)?;
        }
        Ok(())
    }

    fn debug_title(&self, _world: &SimWorld) -> Option<String> {
        self.task
            .as_ref()
            .map(|task| format!("{} {}", task.id(), task.fsm().label()))
    }
}

#[cfg(test)]
mod tests {
    use harness::{run_headless, LoopConfig, MemoryResolver, MemorySink, TaskState};

    use super::*;
    use crate::app::config::ParticleConfig;

    fn resolver() -> MemoryResolver {
        MemoryResolver::new()
            .with_model(ObjectKind::Target.asset_key(), &["ring"])
            .with_model(ObjectKind::WaterParticle.asset_key(), &["droplet"])
            .with_model(ObjectKind::GripperGoal.asset_key(), &["palm", "finger_left"])
    }

    fn run(config: ScenarioConfig) -> (MemorySink, SimWorld, bool, Option<TaskState>) {
        let sink = MemorySink::new();
        let mut world = SimWorld::default();
        let loop_config = LoopConfig {
            max_ticks: config.max_ticks(),
            ..LoopConfig::default()
        };
        let mut scenario = PoseMatchScenario::new(config, resolver(), Box::new(sink.clone()));
        let summary = run_headless(&loop_config, &mut scenario, &mut world).expect("run");
        let state = scenario.task().map(|task| task.state());
        (sink, world, summary.finished, state)
    }

    #[test]
    fn scripted_session_completes_every_round_and_cleans_up() {
        let (sink, world, finished, state) = run(ScenarioConfig::default());

        assert!(finished);
        assert!(state.is_none(), "task is destructed on unload");
        let records = sink.records();
        assert!(!records.is_empty());
        assert_eq!(
            records.last().expect("last").fields[1],
            TaskState::Complete.label()
        );
        for round in ["ROUND_1", "ROUND_2", "ROUND_3"] {
            assert!(records.iter().any(|record| record.fields[1] == round));
        }
        assert_eq!(world.prop_count(), 0);
        assert_eq!(world.physics().body_count(), 0);
        assert!(world.registry().is_empty());
        assert!(world.scene().is_empty());
    }

    #[test]
    fn particles_expire_after_their_lifetime() {
        let config = ScenarioConfig {
            max_seconds: 1.0,
            particles: ParticleConfig {
                count: 4,
                spawn_interval_seconds: 0.1,
                lifetime_seconds: 0.2,
                ..ParticleConfig::default()
            },
            ..ScenarioConfig::default()
        };
        let mut world = SimWorld::default();
        let mut scenario =
            PoseMatchScenario::new(config, resolver(), Box::new(MemorySink::new()));
        scenario.load(&mut world).expect("load");
        world.apply_pending().expect("apply");
        let base_props = world.prop_count();

        let dt = 1.0 / 60.0;
        let mut peak = 0;
        for tick in 0..60 {
            let time = f64::from(tick) * f64::from(dt);
            scenario.update(time, dt, &mut world).expect("update");
            world.apply_pending().expect("apply");
            peak = peak.max(world.prop_count() - base_props);
        }
        assert!(peak >= 2);
        assert_eq!(world.prop_count(), base_props);
        assert_eq!(scenario.particles_emitted, 4);

        scenario.unload(&mut world).expect("unload");
        world.apply_pending().expect("apply");
        assert_eq!(world.physics().body_count(), 0);
    }

    #[test]
    fn round_limit_flows_into_the_task() {
        let config = ScenarioConfig {
            num_rounds: Some(1),
            particles: ParticleConfig {
                count: 0,
                ..ParticleConfig::default()
            },
            ..ScenarioConfig::default()
        };
        let (sink, _world, finished, _) = run(config);
        assert!(finished);
        assert!(sink
            .records()
            .iter()
            .all(|record| record.fields[1] == "ROUND_1" || record.fields[1] == "COMPLETE"));
    }

    #[test]
    fn second_load_leaves_the_world_untouched() {
        let mut world = SimWorld::default();
        let mut scenario =
            PoseMatchScenario::new(ScenarioConfig::default(), resolver(), Box::new(MemorySink::new()));
        scenario.load(&mut world).expect("load");
        world.apply_pending().expect("apply");
        let bodies = world.physics().body_count();
        let props = world.prop_count();

        scenario.load(&mut world).expect("second load");
        world.apply_pending().expect("apply");
        assert_eq!(world.physics().body_count(), bodies);
        assert_eq!(world.prop_count(), props);
        assert_eq!(scenario.task().map(|task| task.state()), Some(TaskState::Round(0)));

        scenario.unload(&mut world).expect("unload");
        world.apply_pending().expect("apply");
        assert_eq!(world.physics().body_count(), 0);
    }
}
