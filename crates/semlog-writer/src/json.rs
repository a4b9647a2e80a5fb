//! JSON-lines writer.
//!
//! Each event and each snapshot becomes one JSON document on its own line,
//! which keeps the logs appendable and streamable by line-oriented tools.

use std::fs::File;
use std::io::{BufWriter, Write};

use parking_lot::Mutex;
use semlog_types::{SemanticEvent, Snapshot};

use crate::backend::{EpisodeFiles, WriterBackendKind, open_log};
use crate::error::WriterError;
use crate::EpisodicWriter;

/// Writer producing `<episode>_ED.json` and `<episode>_WS.json`.
#[derive(Debug)]
pub struct JsonWriter {
    files: EpisodeFiles,
    events: Mutex<BufWriter<File>>,
    world_state: Mutex<BufWriter<File>>,
}

impl JsonWriter {
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

fn append_line<T: serde::Serialize>(
    log: &Mutex<BufWriter<File>>,
    path: &std::path::Path,
    record: &T,
) -> Result<(), WriterError> {
    // Serialize first so a failure never leaves half a line in the file.
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    log.lock()
        .write_all(&line)
        .map_err(|e| WriterError::io(path, e))
}

impl EpisodicWriter for JsonWriter {
    fn write_event(&self, event: &SemanticEvent) -> Result<(), WriterError> {
        append_line(&self.events, &self.files.events, event)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), WriterError> {
        append_line(&self.world_state, &self.files.world_state, snapshot)
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
        WriterBackendKind::Json
    }
}
