//! Configuration loading and typed config structures for SemLog.
//!
//! The configuration lives in a YAML file (see `semlog-config.yaml` at the
//! project root). Every field has a default, so an empty document is a valid
//! configuration that logs JSON lines to `./SemLog`.

use std::path::{Path, PathBuf};

use semlog_events::{ContactConfig, GraspConfig, SupportConfig};
use semlog_world::WorldStateConfig;
use semlog_writer::WriterBackendKind;
use serde::Deserialize;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level logger configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoggerConfig {
    /// Episode identity and output location.
    #[serde(default)]
    pub episode: EpisodeConfig,

    /// Writer backend selection.
    #[serde(default)]
    pub writer: WriterConfig,

    /// Contact, supported-by and grasp thresholds.
    #[serde(default)]
    pub events: EventsConfig,

    /// World-state snapshot thresholds and rate.
    #[serde(default)]
    pub world_state: WorldStateConfig,

    /// Log output settings for binaries.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LoggerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SEMLOG_LOG_DIR` overrides `episode.log_directory`
    /// - `SEMLOG_EPISODE_ID` overrides `episode.id`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.episode.apply_env_overrides(env_var);
        Ok(config)
    }

    /// Parse configuration from a YAML string. Environment overrides apply
    /// as in [`from_file`](Self::from_file).
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.episode.apply_env_overrides(env_var);
        Ok(config)
    }

    /// Reject values the logger cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("events.min_contact_duration", self.events.min_contact_duration)?;
        non_negative(
            "events.min_supported_by_duration",
            self.events.min_supported_by_duration,
        )?;
        non_negative("events.support_check_interval", self.events.support_check_interval)?;
        non_negative("events.support_debounce", self.events.support_debounce)?;
        non_negative("events.min_grasp_duration", self.events.min_grasp_duration)?;
        non_negative(
            "events.max_relative_vertical_speed",
            self.events.max_relative_vertical_speed,
        )?;
        non_negative("world_state.distance_threshold", self.world_state.distance_threshold)?;
        non_negative("world_state.rotation_step", self.world_state.rotation_step)?;
        non_negative("world_state.update_rate", self.world_state.update_rate)?;

        if self.writer.backend.is_file_backed() && self.episode.log_directory.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "episode.log_directory",
                reason: format!("required by the {} backend", self.writer.backend),
            });
        }
        if self.episode.id.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Invalid {
                field: "episode.id",
                reason: "must not be empty when set".to_owned(),
            });
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("expected a finite non-negative number, got {value}"),
        })
    }
}

/// Episode identity and output location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EpisodeConfig {
    /// Episode id. Generated at init when absent.
    #[serde(default)]
    pub id: Option<String>,

    /// Directory that receives the episode's log files.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            log_directory: default_log_directory(),
        }
    }
}

impl EpisodeConfig {
    /// Apply `SEMLOG_LOG_DIR` and `SEMLOG_EPISODE_ID` overrides, reading
    /// variables through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("SEMLOG_LOG_DIR") {
            self.log_directory = PathBuf::from(val);
        }
        if let Some(val) = lookup("SEMLOG_EPISODE_ID") {
            self.id = Some(val);
        }
    }
}

/// Writer backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct WriterConfig {
    /// Output format. Unknown names fail at parse time.
    #[serde(default)]
    pub backend: WriterBackendKind,
}

/// Event detection thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventsConfig {
    /// Minimum contact duration in seconds.
    #[serde(default = "default_min_contact_duration")]
    pub min_contact_duration: f64,

    /// Minimum supported-by duration in seconds.
    #[serde(default = "default_min_supported_by_duration")]
    pub min_supported_by_duration: f64,

    /// Seconds between support candidate evaluations.
    #[serde(default = "default_support_check_interval")]
    pub support_check_interval: f64,

    /// Minimum candidate age in seconds before promotion.
    #[serde(default = "default_support_debounce")]
    pub support_debounce: f64,

    /// Relative vertical speed above which two entities are not resting on
    /// each other.
    #[serde(default = "default_max_relative_vertical_speed")]
    pub max_relative_vertical_speed: f64,

    /// Minimum grasp duration in seconds.
    #[serde(default = "default_min_grasp_duration")]
    pub min_grasp_duration: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            min_contact_duration: default_min_contact_duration(),
            min_supported_by_duration: default_min_supported_by_duration(),
            support_check_interval: default_support_check_interval(),
            support_debounce: default_support_debounce(),
            max_relative_vertical_speed: default_max_relative_vertical_speed(),
            min_grasp_duration: default_min_grasp_duration(),
        }
    }
}

impl EventsConfig {
    /// Contact tracker settings.
    pub const fn contact(&self) -> ContactConfig {
        ContactConfig {
            min_duration: self.min_contact_duration,
        }
    }

    /// Supported-by tracker settings.
    pub const fn support(&self) -> SupportConfig {
        SupportConfig {
            min_duration: self.min_supported_by_duration,
            check_interval: self.support_check_interval,
            debounce: self.support_debounce,
        }
    }

    /// Grasp tracker settings.
    pub const fn grasp(&self) -> GraspConfig {
        GraspConfig {
            min_duration: self.min_grasp_duration,
        }
    }
}

/// Logging configuration for binaries embedding the logger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_log_directory() -> PathBuf {
    PathBuf::from("SemLog")
}

const fn default_min_contact_duration() -> f64 {
    0.3
}

const fn default_min_supported_by_duration() -> f64 {
    0.4
}

const fn default_support_check_interval() -> f64 {
    0.1
}

const fn default_support_debounce() -> f64 {
    0.1
}

const fn default_max_relative_vertical_speed() -> f64 {
    0.5
}

const fn default_min_grasp_duration() -> f64 {
    0.3
}

fn default_log_level() -> String {
    "info".to_owned()
}
