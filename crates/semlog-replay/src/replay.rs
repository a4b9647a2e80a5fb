//! Drives a [`SemanticLogger`] from a parsed trace.
//!
//! Leading `entity` records populate the registry before `init`. The first
//! timed record sets the start time. Every record moves the manual clock to
//! its timestamp before it is applied. Ctrl-C ends the episode early with a
//! forced finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use semlog_core::{
    FinishSummary, GraspSignal, LoggerConfig, LoggerDeps, OverlapSignal, SemanticLogger,
};
use semlog_events::VerticalSupportTest;
use semlog_types::{Entity, EntityRecord, InMemoryRegistry, ManualClock, Pose};
use tracing::{debug, info, warn};

use crate::scene::SceneState;
use crate::trace::{EntityRecordLine, GraspLine, OverlapLine, TraceRecord};

/// Pacing of the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Apply records as fast as possible.
    AsFastAsPossible,
    /// Sleep between records to match trace time.
    RealTime,
}

struct Replay {
    logger: SemanticLogger,
    registry: Arc<InMemoryRegistry>,
    scene: Arc<SceneState>,
    clock: ManualClock,
}

/// Replay `records` through a logger built from `config`.
///
/// `interrupt` resolves when the replay should stop early (Ctrl-C in the
/// binary); the episode is then finished with `forced` set.
pub async fn run<F>(
    config: LoggerConfig,
    records: Vec<TraceRecord>,
    pacing: Pacing,
    interrupt: F,
) -> anyhow::Result<FinishSummary>
where
    F: Future,
{
    let mut records = records.into_iter().peekable();
    let registry = Arc::new(InMemoryRegistry::new());
    let scene = Arc::new(SceneState::new());

    let mut preloaded = 0_usize;
    while let Some(TraceRecord::Entity(line)) =
        records.next_if(|r| matches!(r, TraceRecord::Entity(_)))
    {
        register(&registry, &scene, &line);
        preloaded = preloaded.saturating_add(1);
    }

    let start_time = records.peek().and_then(TraceRecord::time).unwrap_or(0.0);
    let clock = ManualClock::new(start_time);
    let deps = LoggerDeps {
        registry: registry.clone(),
        clock: Arc::new(clock.clone()),
        poses: scene.clone(),
        support_test: Box::new(VerticalSupportTest::new(
            scene.clone(),
            config.events.max_relative_vertical_speed,
        )),
    };

    let mut replay = Replay {
        logger: SemanticLogger::new(config, deps),
        registry,
        scene,
        clock,
    };
    replay.logger.init().context("logger init failed")?;
    replay.logger.start().context("logger start failed")?;
    info!(
        entities = preloaded,
        start_time,
        episode_id = replay.logger.episode_id().unwrap_or_default(),
        "replay started"
    );

    let mut interrupt = std::pin::pin!(interrupt);
    let mut last_time = start_time;
    let mut forced = false;
    let mut applied = 0_u64;

    for record in records {
        let pause = match (pacing, record.time()) {
            (Pacing::RealTime, Some(time)) => {
                Duration::try_from_secs_f64(time - last_time).unwrap_or(Duration::ZERO)
            }
            _ => Duration::ZERO,
        };
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                warn!(applied, "replay interrupted");
                forced = true;
                break;
            }
            () = tokio::time::sleep(pause) => {}
        }

        if let Some(time) = record.time() {
            last_time = last_time.max(time);
        }
        replay.apply(record);
        applied = applied.saturating_add(1);
    }

    let summary = replay.logger.finish(forced);
    debug!(applied, "replay loop done");
    Ok(summary)
}

impl Replay {
    fn apply(&mut self, record: TraceRecord) {
        if let Some(time) = record.time() {
            self.clock.set(time);
        }
        match record {
            TraceRecord::Entity(line) => {
                if let Some(entity) = register(&self.registry, &self.scene, &line) {
                    let record = EntityRecord {
                        entity,
                        kind: line.kind,
                    };
                    if let Err(e) = self.logger.track_entity(record) {
                        warn!(error = %e, id = %line.id, "could not track late entity");
                    }
                }
            }
            TraceRecord::Pose(line) => {
                let bones = line
                    .bones
                    .map(|bones| bones.into_iter().map(Into::into).collect());
                self.scene.update(
                    line.handle,
                    line.location,
                    line.rotation,
                    line.velocity,
                    bones,
                );
            }
            TraceRecord::OverlapBegin(line) => self.logger.on_overlap_begin(&signal(line)),
            TraceRecord::OverlapEnd(line) => self.logger.on_overlap_end(&signal(line)),
            TraceRecord::GraspBegin(line) => self.logger.on_grasp_overlap_begin(&grasp(line)),
            TraceRecord::GraspEnd(line) => self.logger.on_grasp_overlap_end(&grasp(line)),
            TraceRecord::HandReleased { time, hand } => self.logger.on_hand_released(hand, time),
            TraceRecord::Tick { .. } => self.logger.tick(),
        }
    }
}

fn register(
    registry: &InMemoryRegistry,
    scene: &SceneState,
    line: &EntityRecordLine,
) -> Option<Entity> {
    let entity = Entity::new(line.id.clone(), line.class.clone(), line.handle);
    if let Err(e) = registry.register(entity.clone(), line.kind) {
        warn!(error = %e, id = %line.id, "entity not registered");
        return None;
    }
    scene.spawn(line.handle, Pose::new(line.location, line.rotation));
    debug!(id = %line.id, handle = %line.handle, kind = ?line.kind, "entity registered");
    Some(entity)
}

const fn signal(line: OverlapLine) -> OverlapSignal {
    OverlapSignal {
        owner: line.owner,
        other: line.other,
        time: line.time,
        other_is_contact_area: line.other_is_contact_area,
    }
}

fn grasp(line: GraspLine) -> GraspSignal {
    GraspSignal {
        hand: line.hand,
        object: line.object,
        shape: line.shape,
        group: line.group,
        time: line.time,
    }
}
