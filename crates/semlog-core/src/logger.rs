//! The semantic logger orchestrator.
//!
//! [`SemanticLogger`] owns one episode: the event trackers, the snapshot
//! worker and the writer they share. Hosts drive it from the simulation
//! thread:
//!
//! ```text
//! new --> init --> start --> { tick | on_overlap_* | on_grasp_overlap_* }* --> finish
//! ```
//!
//! State machine: `Uninitialized -> Initialized -> Started -> Finished`.
//! `init` and `start` are idempotent once reached, `finish` is accepted in
//! any state and is terminal. Dropping an unfinished logger finishes it
//! with `forced` set.
//!
//! Collaborators are injected: the entity registry resolves raw handles,
//! the clock stamps lifecycle calls, the pose source feeds the snapshot
//! worker and the support test decides supported-by promotion.

use std::sync::Arc;

use semlog_events::{ContactTracker, GraspTracker, SupportTest, SupportedByTracker, WriterSink};
use semlog_types::{
    Clock, Entity, EntityHandle, EntityRecord, EntityRegistry, GraspGroup, PairId,
    RecurringTimer,
};
use semlog_world::{PoseSource, SnapshotError, SnapshotWorkerHandle, WorldStateWorker};
use semlog_writer::{EpisodicWriter, create_writer};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::LoggerConfig;
use crate::error::LoggerError;

/// Lifecycle state of a [`SemanticLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// Constructed, nothing opened yet.
    Uninitialized,
    /// Writer open and snapshot worker running; no events recorded yet.
    Initialized,
    /// Baseline snapshot taken; events and snapshots are being recorded.
    Started,
    /// Flushed and closed. Terminal.
    Finished,
}

impl core::fmt::Display for LoggerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// One overlap notification from the host physics layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapSignal {
    /// Entity owning the overlap area that fired.
    pub owner: EntityHandle,
    /// Entity that entered or left the area.
    pub other: EntityHandle,
    /// Simulation time of the notification in seconds.
    pub time: f64,
    /// Whether `other` carries a contact area of its own. Entities without
    /// one can only ever be the supporting side.
    pub other_is_contact_area: bool,
}

/// One finger overlap notification from a hand's grasp shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct GraspSignal {
    /// The hand carrying the shape.
    pub hand: EntityHandle,
    /// Entity the shape touched.
    pub object: EntityHandle,
    /// Name of the finger shape (usually its bone).
    pub shape: String,
    /// Side of the hand the shape belongs to.
    pub group: GraspGroup,
    /// Simulation time of the notification in seconds.
    pub time: f64,
}

/// Host collaborators injected into the logger.
pub struct LoggerDeps {
    /// Resolves raw handles to tagged entities.
    pub registry: Arc<dyn EntityRegistry>,
    /// Simulation time source.
    pub clock: Arc<dyn Clock>,
    /// Live entity poses for the snapshot worker.
    pub poses: Arc<dyn PoseSource>,
    /// Geometric supported-by test.
    pub support_test: Box<dyn SupportTest + Send>,
}

/// Counters reported by [`SemanticLogger::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinishSummary {
    /// Contact events that reached the writer.
    pub contacts_published: u64,
    /// Supported-by events that reached the writer.
    pub supported_by_published: u64,
    /// Grasp events that reached the writer.
    pub grasps_published: u64,
    /// Snapshots the writer accepted.
    pub snapshots_written: u64,
    /// Snapshot cycles skipped because the worker was busy.
    pub skipped_cycles: u64,
    /// Whether the episode ended abnormally.
    pub forced: bool,
}

struct Session {
    episode_id: String,
    writer: Arc<dyn EpisodicWriter>,
    contacts: ContactTracker<WriterSink>,
    support: SupportedByTracker<WriterSink>,
    grasps: GraspTracker<WriterSink>,
    snapshots: SnapshotWorkerHandle,
    snapshot_timer: Option<RecurringTimer>,
}

/// Episode orchestrator tying the trackers, the snapshot worker and the
/// writer to a host simulation.
pub struct SemanticLogger {
    config: LoggerConfig,
    registry: Arc<dyn EntityRegistry>,
    clock: Arc<dyn Clock>,
    poses: Arc<dyn PoseSource>,
    support_test: Box<dyn SupportTest + Send>,
    writer_override: Option<Arc<dyn EpisodicWriter>>,
    state: LoggerState,
    session: Option<Session>,
    summary: Option<FinishSummary>,
}

impl core::fmt::Debug for SemanticLogger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SemanticLogger")
            .field("state", &self.state)
            .field("episode_id", &self.episode_id())
            .field("backend", &self.config.writer.backend)
            .finish_non_exhaustive()
    }
}

impl SemanticLogger {
    /// Create an uninitialized logger.
    pub fn new(config: LoggerConfig, deps: LoggerDeps) -> Self {
        Self {
            config,
            registry: deps.registry,
            clock: deps.clock,
            poses: deps.poses,
            support_test: deps.support_test,
            writer_override: None,
            state: LoggerState::Uninitialized,
            session: None,
            summary: None,
        }
    }

    /// Use `writer` instead of opening the configured backend at init.
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<dyn EpisodicWriter>) -> Self {
        self.writer_override = Some(writer);
        self
    }

    /// Validate the configuration, open the writer and spawn the snapshot
    /// worker over every registered entity.
    ///
    /// Configuration and writer errors are the only failures surfaced to
    /// the host; on error the logger stays uninitialized.
    pub fn init(&mut self) -> Result<(), LoggerError> {
        match self.state {
            LoggerState::Initialized | LoggerState::Started => return Ok(()),
            LoggerState::Finished => {
                return Err(LoggerError::InvalidState {
                    operation: "init",
                    state: self.state,
                });
            }
            LoggerState::Uninitialized => {}
        }

        self.config.validate()?;
        let episode_id = self
            .config
            .episode
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let writer = match &self.writer_override {
            Some(writer) => Arc::clone(writer),
            None => create_writer(
                self.config.writer.backend,
                &self.config.episode.log_directory,
                &episode_id,
            )?,
        };

        let records = self.registry.entities();
        let tracked = records.len();
        let worker = WorldStateWorker::with_entities(
            &self.config.world_state,
            Arc::clone(&self.poses),
            records,
        );
        let snapshots = SnapshotWorkerHandle::spawn(worker, Arc::clone(&writer))?;

        self.session = Some(Session {
            contacts: ContactTracker::new(
                self.config.events.contact(),
                WriterSink::new(Arc::clone(&writer)),
            ),
            support: SupportedByTracker::new(
                self.config.events.support(),
                WriterSink::new(Arc::clone(&writer)),
            ),
            grasps: GraspTracker::new(
                self.config.events.grasp(),
                WriterSink::new(Arc::clone(&writer)),
            ),
            episode_id,
            writer,
            snapshots,
            snapshot_timer: None,
        });
        self.state = LoggerState::Initialized;
        info!(
            episode_id = self.episode_id().unwrap_or_default(),
            backend = %self.config.writer.backend,
            tracked,
            "semantic logger initialized"
        );
        Ok(())
    }

    /// Take the baseline snapshot (blocking), prune static entities and
    /// arm the periodic timers.
    pub fn start(&mut self) -> Result<(), LoggerError> {
        match self.state {
            LoggerState::Started => return Ok(()),
            LoggerState::Uninitialized | LoggerState::Finished => {
                return Err(LoggerError::InvalidState {
                    operation: "start",
                    state: self.state,
                });
            }
            LoggerState::Initialized => {}
        }
        let Some(session) = self.session.as_mut() else {
            return Err(LoggerError::InvalidState {
                operation: "start",
                state: self.state,
            });
        };

        let now = self.clock.now();
        let baseline = session.snapshots.run_blocking(now)?;
        session.snapshots.remove_static_items()?;
        session.support.start(now);
        session.snapshot_timer = Some(RecurringTimer::new(self.config.world_state.update_rate, now));

        self.state = LoggerState::Started;
        info!(
            time = now,
            baseline_samples = baseline.samples,
            "semantic logger started"
        );
        Ok(())
    }

    /// Per-frame driver: evaluates support candidates when their timer is
    /// due and requests a snapshot cycle when the snapshot timer is due.
    ///
    /// A cycle requested while the previous one is still running is
    /// skipped and counted.
    pub fn tick(&mut self) {
        if self.state != LoggerState::Started {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let now = self.clock.now();

        session.support.tick(now, self.support_test.as_ref());
        session.snapshots.poll();

        let due = session
            .snapshot_timer
            .as_mut()
            .is_some_and(|timer| timer.poll(now));
        if !due {
            return;
        }
        match session.snapshots.try_start(now) {
            Ok(()) | Err(SnapshotError::CycleInFlight { .. }) => {}
            Err(e) => warn!(error = %e, time = now, "snapshot cycle not started"),
        }
    }

    /// Route an overlap begin to the contact and supported-by trackers.
    pub fn on_overlap_begin(&mut self, signal: &OverlapSignal) {
        let Some((owner, other)) = self.resolve(signal) else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.contacts.on_overlap_begin(&owner, &other, signal.time);
        session
            .support
            .add_candidate(&owner, &other, !signal.other_is_contact_area, signal.time);
    }

    /// Route an overlap end to the contact and supported-by trackers.
    pub fn on_overlap_end(&mut self, signal: &OverlapSignal) {
        let Some((owner, other)) = self.resolve(signal) else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.contacts.on_overlap_end(&owner, &other, signal.time);
        session.support.on_contact_end(&owner, &other, signal.time);
    }

    /// Route a finger shape touching an object to the grasp tracker.
    pub fn on_grasp_overlap_begin(&mut self, signal: &GraspSignal) {
        let Some((hand, object)) = self.resolve_pair(signal.hand, signal.object) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            session.grasps.on_finger_overlap_begin(
                &hand,
                &object,
                &signal.shape,
                signal.group,
                signal.time,
            );
        }
    }

    /// Route a finger shape leaving an object to the grasp tracker.
    pub fn on_grasp_overlap_end(&mut self, signal: &GraspSignal) {
        let Some((hand, object)) = self.resolve_pair(signal.hand, signal.object) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            session.grasps.on_finger_overlap_end(
                &hand,
                &object,
                &signal.shape,
                signal.group,
                signal.time,
            );
        }
    }

    /// The host stopped reporting finger overlaps for `hand`; close its
    /// grasps at `time`.
    pub fn on_hand_released(&mut self, hand: EntityHandle, time: f64) {
        if self.state != LoggerState::Started {
            return;
        }
        let Some(hand) = self.registry.lookup(hand) else {
            debug!(handle = %hand, "untagged hand, release ignored");
            return;
        };
        if let Some(session) = self.session.as_mut() {
            session.grasps.release_hand(&hand, time);
        }
    }

    /// Host notification that support ended for either of two pair ids.
    pub fn on_supported_by_end(&mut self, first: PairId, second: PairId, time: f64) {
        if self.state != LoggerState::Started {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.support.on_supported_by_end(first, second, time);
        }
    }

    /// Add an entity to the world-state log. It is sampled unconditionally
    /// on the next cycle.
    pub fn track_entity(&self, record: EntityRecord) -> Result<(), LoggerError> {
        match (&self.session, self.state) {
            (Some(session), LoggerState::Initialized | LoggerState::Started) => {
                debug!(entity = %record.entity.id, "tracking entity mid-episode");
                session.snapshots.track_entity(record)?;
                Ok(())
            }
            _ => Err(LoggerError::InvalidState {
                operation: "track entity",
                state: self.state,
            }),
        }
    }

    /// Close every open event, wait for the in-flight snapshot cycle, stop
    /// the worker and flush the writer.
    ///
    /// `forced` marks an abnormal end; events closed here are flagged as
    /// interrupted. Calling again returns the first summary unchanged.
    pub fn finish(&mut self, forced: bool) -> FinishSummary {
        if let Some(summary) = self.summary {
            return summary;
        }

        let mut summary = FinishSummary {
            forced,
            ..FinishSummary::default()
        };
        if let Some(mut session) = self.session.take() {
            let now = self.clock.now();
            session.contacts.finish(now, forced);
            session.support.finish(now, forced);
            session.grasps.finish(now, forced);
            if let Err(e) = session.snapshots.shutdown() {
                warn!(error = %e, "snapshot worker did not stop cleanly");
            }
            if let Err(e) = session.writer.flush() {
                warn!(error = %e, "failed to flush episode logs");
            }

            summary.contacts_published = session.contacts.published();
            summary.supported_by_published = session.support.published();
            summary.grasps_published = session.grasps.published();
            summary.snapshots_written = session.snapshots.written();
            summary.skipped_cycles = session.snapshots.skipped();

            info!(
                episode_id = %session.episode_id,
                time = now,
                contacts = summary.contacts_published,
                supported_by = summary.supported_by_published,
                grasps = summary.grasps_published,
                snapshots = summary.snapshots_written,
                skipped_cycles = summary.skipped_cycles,
                write_failures = session
                    .contacts
                    .sink()
                    .write_failures()
                    .saturating_add(session.support.sink().write_failures())
                    .saturating_add(session.grasps.sink().write_failures()),
                forced,
                "semantic logger finished"
            );
        }

        self.state = LoggerState::Finished;
        self.summary = Some(summary);
        summary
    }

    fn resolve(&self, signal: &OverlapSignal) -> Option<(Entity, Entity)> {
        self.resolve_pair(signal.owner, signal.other)
    }

    fn resolve_pair(&self, owner: EntityHandle, other: EntityHandle) -> Option<(Entity, Entity)> {
        if self.state != LoggerState::Started {
            trace!(state = %self.state, "overlap signal outside started state ignored");
            return None;
        }
        let Some(owner_entity) = self.registry.lookup(owner) else {
            debug!(handle = %owner, "untagged owner, overlap ignored");
            return None;
        };
        let Some(other_entity) = self.registry.lookup(other) else {
            debug!(handle = %other, "untagged entity, overlap ignored");
            return None;
        };
        Some((owner_entity, other_entity))
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> LoggerState {
        self.state
    }

    /// Active configuration.
    pub const fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Episode id, once initialized and until finished.
    pub fn episode_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.episode_id.as_str())
    }

    /// Summary of the finished episode.
    pub const fn summary(&self) -> Option<FinishSummary> {
        self.summary
    }

    /// Number of open contact events.
    pub fn open_contacts(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.contacts.open_count())
    }

    /// Number of open grasps.
    pub fn open_grasps(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.grasps.open_count())
    }

    /// Number of open supported-by events.
    pub fn open_supports(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.support.open_count())
    }

    /// Pair id of the open supported-by event between two entities.
    pub fn support_pair_id(&self, a: EntityHandle, b: EntityHandle) -> Option<PairId> {
        let session = self.session.as_ref()?;
        let a = self.registry.lookup(a)?;
        let b = self.registry.lookup(b)?;
        session.support.open_pair_id(&a, &b)
    }
}

impl Drop for SemanticLogger {
    fn drop(&mut self) {
        if matches!(self.state, LoggerState::Initialized | LoggerState::Started) {
            warn!("semantic logger dropped without finish, forcing");
            self.finish(true);
        }
    }
}
