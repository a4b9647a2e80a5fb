//! Backend selection and episode file layout.

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WriterError;
use crate::{BsonWriter, EpisodicWriter, JsonWriter, MemoryWriter};

/// Supported writer backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterBackendKind {
    /// One JSON document per line.
    #[default]
    Json,
    /// Concatenated BSON documents.
    Bson,
    /// Records held in memory.
    Memory,
}

impl WriterBackendKind {
    /// File extension used by file backends.
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Json => Some("json"),
            Self::Bson => Some("bson"),
            Self::Memory => None,
        }
    }

    /// Whether this backend writes to disk.
    pub const fn is_file_backed(self) -> bool {
        self.extension().is_some()
    }
}

impl core::fmt::Display for WriterBackendKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Bson => f.write_str("bson"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Paths of the files making up one episode on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeFiles {
    /// Event log (`<episode>_ED.<ext>`).
    pub events: PathBuf,
    /// World-state log (`<episode>_WS.<ext>`).
    pub world_state: PathBuf,
    /// Episode metadata (`<episode>_META.json`).
    pub metadata: PathBuf,
}

impl EpisodeFiles {
    /// Compute the layout for an episode in `directory`.
    pub fn new(directory: &Path, episode_id: &str, extension: &str) -> Self {
        Self {
            events: directory.join(format!("{episode_id}_ED.{extension}")),
            world_state: directory.join(format!("{episode_id}_WS.{extension}")),
            metadata: directory.join(format!("{episode_id}_META.json")),
        }
    }
}

/// Descriptive record written next to the logs of a file-backed episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    /// Episode identifier.
    pub episode_id: String,
    /// Backend that produced the logs.
    pub backend: WriterBackendKind,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Log file layout.
    pub files: EpisodeFiles,
}

/// Create a writer for `kind`.
///
/// File backends create `directory` if needed and open both logs in append
/// mode, so re-running an episode id extends its logs.
///
/// # Errors
///
/// Returns [`WriterError::InvalidTarget`] if the directory or episode id is
/// unusable, or [`WriterError::Io`] if a file cannot be created.
pub fn create_writer(
    kind: WriterBackendKind,
    directory: &Path,
    episode_id: &str,
) -> Result<Arc<dyn EpisodicWriter>, WriterError> {
    let Some(extension) = kind.extension() else {
        return Ok(Arc::new(MemoryWriter::new()));
    };

    validate_episode_id(episode_id)?;
    prepare_directory(directory)?;

    let files = EpisodeFiles::new(directory, episode_id, extension);
    write_metadata(&EpisodeMetadata {
        episode_id: episode_id.to_owned(),
        backend: kind,
        created_at: Utc::now(),
        files: files.clone(),
    })?;

    info!(
        backend = %kind,
        events = %files.events.display(),
        world_state = %files.world_state.display(),
        "Episodic writer created"
    );

    let writer: Arc<dyn EpisodicWriter> = match kind {
        WriterBackendKind::Bson => Arc::new(BsonWriter::open(files)?),
        WriterBackendKind::Json => Arc::new(JsonWriter::open(files)?),
        WriterBackendKind::Memory => Arc::new(MemoryWriter::new()),
    };
    Ok(writer)
}

fn validate_episode_id(episode_id: &str) -> Result<(), WriterError> {
    if episode_id.trim().is_empty() {
        return Err(WriterError::InvalidTarget {
            reason: "episode id must not be empty".to_owned(),
        });
    }
    if episode_id.contains(['/', '\\']) {
        return Err(WriterError::InvalidTarget {
            reason: format!("episode id {episode_id:?} must not contain path separators"),
        });
    }
    Ok(())
}

fn prepare_directory(directory: &Path) -> Result<(), WriterError> {
    if directory.as_os_str().is_empty() {
        return Err(WriterError::InvalidTarget {
            reason: "log directory must not be empty".to_owned(),
        });
    }
    if directory.exists() && !directory.is_dir() {
        return Err(WriterError::InvalidTarget {
            reason: format!("{} exists and is not a directory", directory.display()),
        });
    }
    std::fs::create_dir_all(directory).map_err(|e| WriterError::io(directory, e))
}

fn write_metadata(metadata: &EpisodeMetadata) -> Result<(), WriterError> {
    let path = &metadata.files.metadata;
    let file = File::create(path).map_err(|e| WriterError::io(path, e))?;
    serde_json::to_writer_pretty(file, metadata)?;
    Ok(())
}

/// Open a log file for appending, wrapped for shared buffered writes.
pub(crate) fn open_log(path: &Path) -> Result<Mutex<BufWriter<File>>, WriterError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WriterError::io(path, e))?;
    Ok(Mutex::new(BufWriter::new(file)))
}
