//! Integration tests for the semantic logger lifecycle.
//!
//! Each test wires a [`SemanticLogger`] to an in-memory registry, a manual
//! clock and a scripted scene, then drives it the way a host simulation
//! would: init, start, a stream of ticks and overlap signals, finish.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use semlog_core::{
    ConfigError, GraspSignal, LoggerConfig, LoggerDeps, LoggerError, LoggerState, OverlapSignal,
    SemanticLogger,
};
use semlog_events::{Kinematics, KinematicsSource, VerticalSupportTest};
use semlog_types::{
    Clock, Entity, EntityHandle, EntityKind, EntityRecord, GraspGroup, InMemoryRegistry,
    ManualClock, Pose, SemanticEvent, Vec3,
};
use semlog_world::PoseSource;
use semlog_writer::{MemoryWriter, WriterBackendKind};

const CUP: EntityHandle = EntityHandle(1);
const TABLE: EntityHandle = EntityHandle(2);
const PLATE: EntityHandle = EntityHandle(3);
const HAND: EntityHandle = EntityHandle(4);
const UNTAGGED: EntityHandle = EntityHandle(99);

/// Scene state shared by the pose source and the support test.
#[derive(Default)]
struct Scene {
    bodies: Mutex<BTreeMap<EntityHandle, Kinematics>>,
    gate: Option<Gate>,
}

/// Blocks pose reads while armed so a cycle can be held in flight.
struct Gate {
    armed: AtomicBool,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl Scene {
    fn place(&self, handle: EntityHandle, location: Vec3) {
        self.bodies.lock().unwrap().insert(
            handle,
            Kinematics {
                location,
                velocity: Vec3::ZERO,
            },
        );
    }
}

impl PoseSource for Scene {
    fn pose(&self, handle: EntityHandle) -> Option<Pose> {
        if let Some(gate) = &self.gate {
            if gate.armed.load(Ordering::Acquire) {
                let _ = gate.entered.send(());
                let _ = gate.release.recv();
            }
        }
        self.bodies
            .lock()
            .unwrap()
            .get(&handle)
            .map(|k| Pose::at(k.location))
    }
}

impl KinematicsSource for Scene {
    fn kinematics(&self, handle: EntityHandle) -> Option<Kinematics> {
        self.bodies.lock().unwrap().get(&handle).copied()
    }
}

struct Harness {
    logger: SemanticLogger,
    registry: Arc<InMemoryRegistry>,
    clock: ManualClock,
    scene: Arc<Scene>,
    writer: Arc<MemoryWriter>,
}

fn registry() -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    registry
        .register(Entity::new("Cup", "Cup", CUP), EntityKind::Dynamic)
        .unwrap();
    registry
        .register(Entity::new("Table", "Table", TABLE), EntityKind::Static)
        .unwrap();
    registry
        .register(Entity::new("Plate", "Plate", PLATE), EntityKind::Dynamic)
        .unwrap();
    registry
}

fn memory_config() -> LoggerConfig {
    let mut config = LoggerConfig::default();
    config.writer.backend = WriterBackendKind::Memory;
    config.episode.id = Some("episode-test".to_owned());
    config
}

fn harness_with(config: LoggerConfig, scene: Scene) -> Harness {
    let scene = Arc::new(scene);
    scene.place(CUP, Vec3::new(0.0, 0.0, 85.0));
    scene.place(TABLE, Vec3::new(0.0, 0.0, 80.0));
    scene.place(PLATE, Vec3::new(10.0, 0.0, 85.0));

    let clock = ManualClock::new(0.0);
    let writer = Arc::new(MemoryWriter::new());
    let registry = registry();
    let deps = LoggerDeps {
        registry: registry.clone(),
        clock: Arc::new(clock.clone()),
        poses: scene.clone(),
        support_test: Box::new(VerticalSupportTest::new(scene.clone(), 0.5)),
    };
    let logger = SemanticLogger::new(config, deps).with_writer(writer.clone());
    Harness {
        logger,
        registry,
        clock,
        scene,
        writer,
    }
}

fn harness() -> Harness {
    harness_with(memory_config(), Scene::default())
}

fn signal(owner: EntityHandle, other: EntityHandle, time: f64) -> OverlapSignal {
    OverlapSignal {
        owner,
        other,
        time,
        other_is_contact_area: false,
    }
}

/// Advance the clock to `until` in `step` increments, ticking each frame.
fn run_until(h: &mut Harness, until: f64, step: f64) {
    while h.clock.now() < until {
        h.clock.advance(step);
        h.logger.tick();
    }
}

#[test]
fn cup_resting_on_table_yields_contact_and_support() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();
    assert_eq!(h.logger.state(), LoggerState::Started);

    // Baseline covers every registered entity, static ones included.
    let baseline = h.writer.snapshots();
    assert_eq!(baseline.len(), 1);
    assert_eq!(baseline.first().unwrap().len(), 3);

    h.logger.on_overlap_begin(&signal(CUP, TABLE, 0.0));
    assert_eq!(h.logger.open_contacts(), 1);

    run_until(&mut h, 0.5, 0.05);
    assert_eq!(h.logger.open_supports(), 1);
    assert!(h.logger.support_pair_id(CUP, TABLE).is_some());

    h.clock.set(1.0);
    h.logger.on_overlap_end(&signal(CUP, TABLE, 1.0));
    assert_eq!(h.logger.open_contacts(), 0);
    assert_eq!(h.logger.open_supports(), 0);

    let summary = h.logger.finish(false);
    assert_eq!(summary.contacts_published, 1);
    assert_eq!(summary.supported_by_published, 1);
    assert!(summary.snapshots_written >= 1);
    assert!(!summary.forced);

    let events = h.writer.events();
    assert_eq!(events.len(), 2);
    let contact = events
        .iter()
        .find(|e| matches!(e, SemanticEvent::Contact(_)))
        .unwrap();
    assert_eq!(contact.start_time(), 0.0);
    assert_eq!(contact.end_time(), Some(1.0));

    let support = events
        .iter()
        .find_map(|e| match e {
            SemanticEvent::SupportedBy(s) => Some(s),
            _ => None,
        })
        .unwrap();
    assert_eq!(support.supported.id.as_str(), "Cup");
    assert_eq!(support.supporting.id.as_str(), "Table");
    assert!(support.end_time.unwrap() - support.start_time >= 0.4);
}

#[test]
fn short_contact_is_not_written() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();
    h.logger.on_overlap_begin(&signal(CUP, PLATE, 0.0));
    h.logger.on_overlap_end(&signal(CUP, PLATE, 0.1));
    let summary = h.logger.finish(false);
    assert_eq!(summary.contacts_published, 0);
    assert!(h.writer.events().is_empty());
}

#[test]
fn untagged_entities_are_ignored() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();
    h.logger.on_overlap_begin(&signal(CUP, UNTAGGED, 0.0));
    h.logger.on_overlap_begin(&signal(UNTAGGED, CUP, 0.0));
    assert_eq!(h.logger.open_contacts(), 0);
    h.logger.on_overlap_end(&signal(CUP, UNTAGGED, 1.0));
    assert_eq!(h.logger.finish(false).contacts_published, 0);
}

#[test]
fn signals_before_start_are_ignored() {
    let mut h = harness();
    h.logger.on_overlap_begin(&signal(CUP, PLATE, 0.0));
    h.logger.init().unwrap();
    h.logger.on_overlap_begin(&signal(CUP, PLATE, 0.0));
    assert_eq!(h.logger.open_contacts(), 0);
}

#[test]
fn state_machine_transitions() {
    let mut h = harness();
    assert!(matches!(
        h.logger.start(),
        Err(LoggerError::InvalidState {
            state: LoggerState::Uninitialized,
            ..
        })
    ));

    h.logger.init().unwrap();
    h.logger.init().unwrap();
    assert_eq!(h.logger.episode_id(), Some("episode-test"));
    h.logger.start().unwrap();
    h.logger.start().unwrap();
    assert_eq!(h.writer.snapshots().len(), 1);

    let first = h.logger.finish(false);
    let second = h.logger.finish(true);
    assert_eq!(first, second);
    assert_eq!(h.logger.state(), LoggerState::Finished);
    assert!(h.logger.init().is_err());
    assert!(h.logger.start().is_err());
}

#[test]
fn finish_without_init_is_terminal() {
    let mut h = harness();
    let summary = h.logger.finish(true);
    assert_eq!(summary.contacts_published, 0);
    assert!(summary.forced);
    assert_eq!(h.logger.state(), LoggerState::Finished);
    assert!(h.logger.init().is_err());
}

#[test]
fn forced_finish_flushes_open_events_as_interrupted() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();
    h.logger.on_overlap_begin(&signal(CUP, PLATE, 0.0));
    h.logger.on_overlap_begin(&signal(PLATE, TABLE, 1.9));

    h.clock.set(2.0);
    let summary = h.logger.finish(true);
    assert_eq!(summary.contacts_published, 1);
    assert!(summary.forced);

    let events = h.writer.events();
    assert_eq!(events.len(), 1);
    let event = events.first().unwrap();
    assert!(event.interrupted());
    assert_eq!(event.end_time(), Some(2.0));
}

#[test]
fn invalid_config_fails_init() {
    let mut config = memory_config();
    config.events.min_supported_by_duration = -0.4;
    let mut h = harness_with(config, Scene::default());
    assert!(matches!(
        h.logger.init(),
        Err(LoggerError::Config {
            source: ConfigError::Invalid { .. }
        })
    ));
    assert_eq!(h.logger.state(), LoggerState::Uninitialized);
}

#[test]
fn static_entities_are_pruned_after_baseline() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();

    h.scene.place(TABLE, Vec3::new(500.0, 0.0, 80.0));
    h.scene.place(CUP, Vec3::new(5.0, 0.0, 85.0));
    h.clock.set(0.1);
    h.logger.tick();
    h.logger.finish(false);

    let snapshots = h.writer.snapshots();
    let moved = snapshots.get(1).unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved.samples.first().unwrap().entity_id.as_str(), "Cup");
}

#[test]
fn entity_tracked_mid_run_is_logged() {
    let mut h = harness();
    h.logger.init().unwrap();
    h.logger.start().unwrap();

    let spoon = EntityHandle(4);
    h.scene.place(spoon, Vec3::new(1.0, 1.0, 86.0));
    h.logger
        .track_entity(EntityRecord {
            entity: Entity::new("Spoon", "Spoon", spoon),
            kind: EntityKind::Dynamic,
        })
        .unwrap();

    h.clock.set(0.1);
    h.logger.tick();
    h.logger.finish(false);

    let snapshots = h.writer.snapshots();
    let last = snapshots.last().unwrap();
    assert_eq!(last.timestamp, 0.1);
    assert!(last.samples.iter().any(|s| s.entity_id.as_str() == "Spoon"));
}

#[test]
fn overlapping_snapshot_cycle_is_skipped() {
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let scene = Scene {
        bodies: Mutex::default(),
        gate: Some(Gate {
            armed: AtomicBool::new(false),
            entered: entered_tx,
            release: release_rx,
        }),
    };
    let mut h = harness_with(memory_config(), scene);
    h.logger.init().unwrap();
    h.logger.start().unwrap();

    let gate = h.scene.gate.as_ref().unwrap();
    gate.armed.store(true, Ordering::Release);
    h.clock.set(0.1);
    h.logger.tick();
    entered_rx.recv().unwrap();

    // Worker is stuck mid-cycle: the next request is dropped.
    h.clock.set(0.2);
    h.logger.tick();

    gate.armed.store(false, Ordering::Release);
    release_tx.send(()).unwrap();

    let summary = h.logger.finish(false);
    assert_eq!(summary.skipped_cycles, 1);
    let timestamps: Vec<f64> = h.writer.snapshots().iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![0.0, 0.1]);
}

#[test]
fn dropping_started_logger_writes_json_logs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LoggerConfig::default();
    config.episode.id = Some("kitchen".to_owned());
    config.episode.log_directory = dir.path().to_path_buf();

    let scene = Arc::new(Scene::default());
    scene.place(CUP, Vec3::new(0.0, 0.0, 85.0));
    scene.place(PLATE, Vec3::new(10.0, 0.0, 85.0));
    let clock = ManualClock::new(0.0);
    let registry = registry();
    let deps = LoggerDeps {
        registry: registry.clone(),
        clock: Arc::new(clock.clone()),
        poses: scene.clone(),
        support_test: Box::new(VerticalSupportTest::new(scene, 0.5)),
    };

    {
        let mut logger = SemanticLogger::new(config, deps);
        logger.init().unwrap();
        logger.start().unwrap();
        logger.on_overlap_begin(&signal(CUP, PLATE, 0.0));
        clock.set(1.0);
    }

    let events = std::fs::read_to_string(dir.path().join("kitchen_ED.json")).unwrap();
    let lines: Vec<&str> = events.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines.first().unwrap()).unwrap();
    assert_eq!(value["kind"], "Contact");
    assert_eq!(value["interrupted"], true);
    assert_eq!(value["end_time"], 1.0);

    let world = std::fs::read_to_string(dir.path().join("kitchen_WS.json")).unwrap();
    assert!(!world.lines().next().unwrap().is_empty());
    assert!(dir.path().join("kitchen_META.json").exists());
}

#[test]
fn unwritable_log_directory_fails_init() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let mut config = LoggerConfig::default();
    config.episode.log_directory = blocker;
    let scene = Arc::new(Scene::default());
    let registry = registry();
    let deps = LoggerDeps {
        registry: registry.clone(),
        clock: Arc::new(ManualClock::new(0.0)),
        poses: scene.clone(),
        support_test: Box::new(VerticalSupportTest::new(scene, 0.5)),
    };
    let mut logger = SemanticLogger::new(config, deps);
    assert!(matches!(logger.init(), Err(LoggerError::Writer { .. })));
    assert_eq!(logger.state(), LoggerState::Uninitialized);
}

fn finger(shape: &str, group: GraspGroup, time: f64) -> GraspSignal {
    GraspSignal {
        hand: HAND,
        object: CUP,
        shape: shape.to_owned(),
        group,
        time,
    }
}

#[test]
fn opposing_fingers_on_cup_yield_grasp() {
    let mut h = harness();
    h.registry
        .register(Entity::new("RightHand", "Hand", HAND), EntityKind::Skeletal)
        .unwrap();
    h.logger.init().unwrap();
    h.logger.start().unwrap();

    h.logger.on_grasp_overlap_begin(&finger("index_03", GraspGroup::B, 0.0));
    assert_eq!(h.logger.open_grasps(), 0);
    h.logger.on_grasp_overlap_begin(&finger("thumb_03", GraspGroup::A, 0.1));
    assert_eq!(h.logger.open_grasps(), 1);

    // Untagged objects never reach the tracker.
    let mut stray = finger("middle_03", GraspGroup::B, 0.2);
    stray.object = UNTAGGED;
    h.logger.on_grasp_overlap_begin(&stray);

    h.clock.set(1.0);
    h.logger.on_grasp_overlap_end(&finger("thumb_03", GraspGroup::A, 1.0));
    assert_eq!(h.logger.open_grasps(), 0);

    let summary = h.logger.finish(false);
    assert_eq!(summary.grasps_published, 1);
    let grasp = h
        .writer
        .events()
        .into_iter()
        .find_map(|e| match e {
            SemanticEvent::Grasp(g) => Some(g),
            _ => None,
        })
        .unwrap();
    assert_eq!(grasp.hand.id.as_str(), "RightHand");
    assert_eq!(grasp.object.id.as_str(), "Cup");
    assert_eq!(grasp.start_time, 0.1);
    assert_eq!(grasp.end_time, Some(1.0));
}

#[test]
fn released_hand_and_forced_finish_close_grasps() {
    let mut h = harness();
    h.registry
        .register(Entity::new("RightHand", "Hand", HAND), EntityKind::Skeletal)
        .unwrap();
    h.logger.init().unwrap();
    h.logger.start().unwrap();

    h.logger.on_grasp_overlap_begin(&finger("thumb_03", GraspGroup::A, 0.0));
    h.logger.on_grasp_overlap_begin(&finger("index_03", GraspGroup::B, 0.0));
    h.logger.on_hand_released(HAND, 0.5);
    assert_eq!(h.logger.open_grasps(), 0);

    h.logger.on_grasp_overlap_begin(&finger("thumb_03", GraspGroup::A, 1.0));
    h.logger.on_grasp_overlap_begin(&finger("index_03", GraspGroup::B, 1.0));
    h.clock.set(2.0);
    let summary = h.logger.finish(true);
    assert_eq!(summary.grasps_published, 2);

    let grasps: Vec<_> = h
        .writer
        .events()
        .into_iter()
        .filter(|e| matches!(e, SemanticEvent::Grasp(_)))
        .collect();
    assert_eq!(grasps.len(), 2);
    assert!(!grasps.first().unwrap().interrupted());
    assert!(grasps.get(1).unwrap().interrupted());
}
