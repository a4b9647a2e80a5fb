//! Dedicated snapshot worker thread.
//!
//! The simulation thread talks to the worker through a command channel and
//! learns about finished cycles on a completion channel. It never blocks on
//! the worker except in [`SnapshotWorkerHandle::run_blocking`] (the initial
//! baseline) and during shutdown.
//!
//! ```text
//!  simulation thread                         worker thread
//!  -----------------                         -------------
//!  try_start(t) --Cycle{t}------------------> run_once(t)
//!                                              writer.write_snapshot()
//!  poll()       <-------------CycleReport---- done
//!  track_entity --Track(record)-------------> (between cycles)
//!  shutdown()   --Shutdown------------------> exit
//! ```
//!
//! Commands are processed strictly in order, so entity-set changes can only
//! land between cycles. At most one cycle is in flight: a start request while
//! the previous cycle runs is rejected and counted, never queued.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use semlog_types::EntityRecord;
use semlog_writer::EpisodicWriter;
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::worker::{PoseSource, WorldStateWorker};

enum Command {
    Cycle { timestamp: f64 },
    Track(EntityRecord),
    RemoveStatic,
    Shutdown,
}

/// Outcome of one completed snapshot cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Timestamp the cycle was started with.
    pub timestamp: f64,
    /// Pose samples in the snapshot.
    pub samples: usize,
    /// Whether the writer accepted the snapshot.
    pub written: bool,
}

/// Simulation-side handle to the snapshot worker thread.
#[derive(Debug)]
pub struct SnapshotWorkerHandle {
    commands: Sender<Command>,
    completions: Receiver<CycleReport>,
    thread: Option<JoinHandle<()>>,
    in_flight: bool,
    completed: u64,
    written: u64,
    skipped: u64,
}

impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cycle { timestamp } => write!(f, "Cycle({timestamp})"),
            Self::Track(record) => write!(f, "Track({})", record.entity.id),
            Self::RemoveStatic => f.write_str("RemoveStatic"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl SnapshotWorkerHandle {
    /// Move `worker` onto a new thread that writes each snapshot to `writer`.
    pub fn spawn<P>(
        worker: WorldStateWorker<P>,
        writer: Arc<dyn EpisodicWriter>,
    ) -> Result<Self, SnapshotError>
    where
        P: PoseSource + 'static,
    {
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (completion_tx, completions) = crossbeam_channel::bounded(1);

        let thread = thread::Builder::new()
            .name("semlog-world-state".to_owned())
            .spawn(move || run_worker(worker, writer.as_ref(), &command_rx, &completion_tx))?;

        Ok(Self {
            commands,
            completions,
            thread: Some(thread),
            in_flight: false,
            completed: 0,
            written: 0,
            skipped: 0,
        })
    }

    /// Start a cycle stamped `timestamp` if the worker is idle.
    ///
    /// Rejects with [`SnapshotError::CycleInFlight`] while a previous cycle
    /// is still running; the rejection is counted as a skipped cycle.
    pub fn try_start(&mut self, timestamp: f64) -> Result<(), SnapshotError> {
        self.poll();
        if self.in_flight {
            self.skipped = self.skipped.saturating_add(1);
            warn!(
                timestamp,
                skipped_cycles = self.skipped,
                "snapshot worker busy, skipping cycle"
            );
            return Err(SnapshotError::CycleInFlight { timestamp });
        }
        self.send(Command::Cycle { timestamp })?;
        self.in_flight = true;
        Ok(())
    }

    /// Collect a finished cycle without blocking.
    pub fn poll(&mut self) -> Option<CycleReport> {
        if !self.in_flight {
            return None;
        }
        let report = self.completions.try_recv().ok()?;
        self.record(report);
        Some(report)
    }

    /// Whether no cycle is in flight.
    pub fn is_idle(&mut self) -> bool {
        self.poll();
        !self.in_flight
    }

    /// Block until the in-flight cycle completes. Returns `Ok(None)` when
    /// the worker was already idle.
    pub fn wait_for_cycle(&mut self) -> Result<Option<CycleReport>, SnapshotError> {
        if !self.in_flight {
            return Ok(None);
        }
        let report = self
            .completions
            .recv()
            .map_err(|_disconnected| SnapshotError::WorkerGone)?;
        self.record(report);
        Ok(Some(report))
    }

    /// Start a cycle and block until it completes.
    pub fn run_blocking(&mut self, timestamp: f64) -> Result<CycleReport, SnapshotError> {
        self.try_start(timestamp)?;
        self.wait_for_cycle()?.ok_or(SnapshotError::WorkerGone)
    }

    /// Queue a new entity; it joins the set before the next cycle.
    pub fn track_entity(&self, record: EntityRecord) -> Result<(), SnapshotError> {
        self.send(Command::Track(record))
    }

    /// Queue removal of static entities from the worker's set.
    pub fn remove_static_items(&self) -> Result<(), SnapshotError> {
        self.send(Command::RemoveStatic)
    }

    /// Wait for the in-flight cycle, stop the thread and join it.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), SnapshotError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let drained = self.wait_for_cycle();
        // The worker may already be gone; joining below reports why.
        let _ = self.commands.send(Command::Shutdown);
        thread.join().map_err(|_panic| SnapshotError::WorkerPanicked)?;
        drained?;
        info!(
            completed = self.completed,
            written = self.written,
            skipped_cycles = self.skipped,
            "snapshot worker stopped"
        );
        Ok(())
    }

    /// Cycles that ran to completion.
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Snapshots the writer accepted.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Cycle requests rejected because one was already in flight.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    fn send(&self, command: Command) -> Result<(), SnapshotError> {
        self.commands
            .send(command)
            .map_err(|_disconnected| SnapshotError::WorkerGone)
    }

    fn record(&mut self, report: CycleReport) {
        self.in_flight = false;
        self.completed = self.completed.saturating_add(1);
        if report.written {
            self.written = self.written.saturating_add(1);
        }
    }
}

impl Drop for SnapshotWorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "snapshot worker did not shut down cleanly");
        }
    }
}

fn run_worker<P: PoseSource>(
    mut worker: WorldStateWorker<P>,
    writer: &dyn EpisodicWriter,
    commands: &Receiver<Command>,
    completions: &Sender<CycleReport>,
) {
    debug!(tracked = worker.tracked_count(), "snapshot worker started");
    for command in commands {
        match command {
            Command::Cycle { timestamp } => {
                let snapshot = worker.run_once(timestamp);
                let written = match writer.write_snapshot(&snapshot) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, timestamp, "failed to persist snapshot");
                        false
                    }
                };
                let report = CycleReport {
                    timestamp,
                    samples: snapshot.len(),
                    written,
                };
                if completions.send(report).is_err() {
                    break;
                }
            }
            Command::Track(record) => {
                worker.track(record);
            }
            Command::RemoveStatic => {
                worker.remove_static_items();
            }
            Command::Shutdown => break,
        }
    }
    if let Err(e) = writer.flush() {
        warn!(error = %e, "failed to flush world-state log");
    }
    debug!(cycles = worker.cycles(), "snapshot worker exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use crossbeam_channel::{Receiver, Sender};
    use parking_lot::Mutex;
    use semlog_types::{Entity, EntityHandle, EntityKind, Pose, Vec3};
    use semlog_writer::MemoryWriter;

    use super::*;
    use crate::worker::WorldStateConfig;

    /// Pose source whose reads block until the test releases them.
    struct Gated {
        entered: Sender<()>,
        release: Receiver<()>,
        gated: Mutex<bool>,
    }

    impl PoseSource for Gated {
        fn pose(&self, _handle: EntityHandle) -> Option<Pose> {
            if *self.gated.lock() {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            Some(Pose::at(Vec3::ZERO))
        }
    }

    struct Still;

    impl PoseSource for Still {
        fn pose(&self, _handle: EntityHandle) -> Option<Pose> {
            Some(Pose::at(Vec3::new(1.0, 2.0, 3.0)))
        }
    }

    fn record(id: &str, handle: u64, kind: EntityKind) -> EntityRecord {
        EntityRecord {
            entity: Entity::new(id, "Thing", EntityHandle(handle)),
            kind,
        }
    }

    #[test]
    fn blocking_cycle_writes_baseline() {
        let writer = Arc::new(MemoryWriter::new());
        let worker = WorldStateWorker::with_entities(
            &WorldStateConfig::default(),
            Still,
            [
                record("Cup", 1, EntityKind::Dynamic),
                record("Table", 2, EntityKind::Static),
            ],
        );
        let mut handle = SnapshotWorkerHandle::spawn(worker, writer.clone()).unwrap();

        let report = handle.run_blocking(0.0).unwrap();
        assert_eq!(report.samples, 2);
        assert!(report.written);

        handle.try_start(0.1).unwrap();
        let second = handle.wait_for_cycle().unwrap().unwrap();
        assert_eq!(second.samples, 0);

        handle.shutdown().unwrap();
        let snapshots = writer.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.get(1).unwrap().timestamp, 0.1);
        assert_eq!(writer.flush_count(), 1);
        assert_eq!(handle.written(), 2);
    }

    #[test]
    fn overlapping_cycle_is_rejected() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let source = Arc::new(Gated {
            entered: entered_tx,
            release: release_rx,
            gated: Mutex::new(true),
        });
        let worker = WorldStateWorker::with_entities(
            &WorldStateConfig::default(),
            source.clone(),
            [record("Cup", 1, EntityKind::Dynamic)],
        );
        let writer = Arc::new(MemoryWriter::new());
        let mut handle = SnapshotWorkerHandle::spawn(worker, writer.clone()).unwrap();

        handle.try_start(0.0).unwrap();
        entered_rx.recv().unwrap();

        assert!(!handle.is_idle());
        assert!(matches!(
            handle.try_start(0.1),
            Err(SnapshotError::CycleInFlight { .. })
        ));
        assert_eq!(handle.skipped(), 1);

        *source.gated.lock() = false;
        release_tx.send(()).unwrap();
        let report = handle.wait_for_cycle().unwrap().unwrap();
        assert_eq!(report.timestamp, 0.0);
        assert!(handle.is_idle());

        handle.shutdown().unwrap();
        // Only the accepted cycle ever reached the writer.
        assert_eq!(writer.snapshots().len(), 1);
    }

    #[test]
    fn entity_changes_apply_between_cycles() {
        let writer = Arc::new(MemoryWriter::new());
        let worker = WorldStateWorker::with_entities(
            &WorldStateConfig::default(),
            Still,
            [record("Table", 2, EntityKind::Static)],
        );
        let mut handle = SnapshotWorkerHandle::spawn(worker, writer.clone()).unwrap();
        handle.run_blocking(0.0).unwrap();
        handle.remove_static_items().unwrap();
        handle.track_entity(record("Cup", 1, EntityKind::Dynamic)).unwrap();

        let report = handle.run_blocking(0.5).unwrap();
        assert_eq!(report.samples, 1);
        handle.shutdown().unwrap();

        let last = writer.snapshots().pop().unwrap();
        assert_eq!(last.samples.first().unwrap().entity_id.as_str(), "Cup");
    }

    #[test]
    fn shutdown_is_idempotent() {
        let worker = WorldStateWorker::new(&WorldStateConfig::default(), Still);
        let mut handle = SnapshotWorkerHandle::spawn(worker, Arc::new(MemoryWriter::new())).unwrap();
        handle.shutdown().unwrap();
        handle.shutdown().unwrap();
        assert!(matches!(
            handle.try_start(1.0),
            Err(SnapshotError::WorkerGone)
        ));
    }
}
