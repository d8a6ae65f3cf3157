//! Error types for the loam windowed chart engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The main error type for all loam operations.
///
/// Lookups of unknown series are not errors on the primary API: `get` and
/// `get_window` return `None`. The variants below only surface from calls
/// that explicitly ask for a `Result`.
#[derive(Error, Debug)]
pub enum LoamError {
    /// Error resolving a series.
    #[error("series error: {0}")]
    Series(#[from] SeriesError),

    /// Error during an insert (write path).
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Error loading, saving or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error raised by a rendering adapter.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Error parsing a textual reading.
    #[error("reading error: {0}")]
    Reading(#[from] ReadingError),
}

/// Errors that can occur when resolving series.
#[derive(Error, Debug)]
pub enum SeriesError {
    /// No data point was ever submitted for this series name.
    #[error("unknown series '{name}'")]
    UnknownSeries {
        /// The series name that was looked up.
        name: String,
    },

    /// The handle does not belong to this registry.
    #[error("invalid series handle: {id}")]
    InvalidHandle {
        /// The raw handle id.
        id: u32,
    },

    /// The registry cannot address another series.
    #[error("series limit reached: {max} series registered")]
    LimitReached {
        /// The number of series already registered.
        max: usize,
    },
}

/// Errors that can occur while inserting a point.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The timestamp is older than the newest retained point of the series.
    #[error(
        "timestamp {timestamp_ms} for series '{series}' is older than newest retained point {newest_ms}"
    )]
    NonMonotonicTimestamp {
        /// The series the point was submitted for.
        series: String,
        /// The rejected timestamp in epoch milliseconds.
        timestamp_ms: i64,
        /// The newest retained timestamp in epoch milliseconds.
        newest_ms: i64,
    },
}

/// Errors that can occur while handling chart configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The retention window is zero or not representable in milliseconds.
    #[error("invalid window {window:?}: {reason}")]
    InvalidWindow {
        /// The configured window.
        window: Duration,
        /// Why the window is invalid.
        reason: String,
    },

    /// The axis time format is empty.
    #[error("axis time format cannot be empty")]
    EmptyTimeFormat,

    /// The axis time format contains a specifier chrono does not know.
    #[error("invalid axis time format '{format}'")]
    InvalidTimeFormat {
        /// The configured format.
        format: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("failed to write config '{}': {source}", path.display())]
    Write {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a chart config.
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors reported by rendering adapters.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The adapter could not build its plot context.
    #[error("failed to create plot: {reason}")]
    PlotCreation {
        /// Description of the failure.
        reason: String,
    },
}

/// Errors that can occur while parsing a `series,timestamp_ms,value` line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadingError {
    /// The line does not have three comma-separated fields.
    #[error("expected 'series,timestamp_ms,value', got '{line}'")]
    Malformed {
        /// The offending line.
        line: String,
    },

    /// The timestamp field is not an integer.
    #[error("invalid timestamp '{field}'")]
    InvalidTimestamp {
        /// The timestamp field as read.
        field: String,
    },

    /// The value field is not a number.
    #[error("invalid value '{field}'")]
    InvalidValue {
        /// The value field as read.
        field: String,
    },
}

/// Type alias for `Result<T, LoamError>`.
pub type Result<T> = std::result::Result<T, LoamError>;
