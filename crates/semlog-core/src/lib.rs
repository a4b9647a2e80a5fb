//! Configuration and lifecycle orchestration for the SemLog episodic logger.
//!
//! A host simulation embeds one [`SemanticLogger`] per episode. The logger
//! turns overlap notifications into contact, supported-by and grasp events,
//! samples world state on a background thread, and writes both to an
//! episode log.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration ([`LoggerConfig`])
//! - [`logger`] -- [`SemanticLogger`] state machine and signal routing
//! - [`error`] -- [`LoggerError`]

pub mod config;
pub mod error;
pub mod logger;

pub use config::{
    ConfigError, EpisodeConfig, EventsConfig, LoggerConfig, LoggingConfig, WriterConfig,
};
pub use error::LoggerError;
pub use logger::{
    FinishSummary, GraspSignal, LoggerDeps, LoggerState, OverlapSignal, SemanticLogger,
};
