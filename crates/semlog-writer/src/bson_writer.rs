//! BSON writer.
//!
//! Records are appended as raw BSON documents back to back, the layout
//! `mongorestore` and `bsondump` read directly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use parking_lot::Mutex;
use semlog_types::{SemanticEvent, Snapshot};

use crate::backend::{EpisodeFiles, WriterBackendKind, open_log};
use crate::error::WriterError;
use crate::EpisodicWriter;

/// Writer producing `<episode>_ED.bson` and `<episode>_WS.bson`.
#[derive(Debug)]
pub struct BsonWriter {
    files: EpisodeFiles,
    events: Mutex<BufWriter<File>>,
    world_state: Mutex<BufWriter<File>>,
}

impl BsonWriter {
    /// Open (or create) both logs in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Io`] if either file cannot be opened.
    pub fn open(files: EpisodeFiles) -> Result<Self, WriterError> {
        let events = open_log(&files.events)?;
        let world_state = open_log(&files.world_state)?;
        Ok(Self {
            files,
            events,
            world_state,
        })
    }

    /// Log file layout.
    pub const fn files(&self) -> &EpisodeFiles {
        &self.files
    }
}

fn append_document<T: serde::Serialize>(
    log: &Mutex<BufWriter<File>>,
    path: &Path,
    record: &T,
) -> Result<(), WriterError> {
    let document = bson::to_document(record)?;
    let mut bytes = Vec::new();
    document.to_writer(&mut bytes)?;
    log.lock()
        .write_all(&bytes)
        .map_err(|e| WriterError::io(path, e))
}

impl EpisodicWriter for BsonWriter {
    fn write_event(&self, event: &SemanticEvent) -> Result<(), WriterError> {
        append_document(&self.events, &self.files.events, event)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), WriterError> {
        append_document(&self.world_state, &self.files.world_state, snapshot)
    }

    fn flush(&self) -> Result<(), WriterError> {
        self.events
            .lock()
            .flush()
            .map_err(|e| WriterError::io(&self.files.events, e))?;
        self.world_state
            .lock()
            .flush()
            .map_err(|e| WriterError::io(&self.files.world_state, e))
    }

    fn backend(&self) -> WriterBackendKind {
        WriterBackendKind::Bson
    }
}
