//! Chart configuration for loam.
//!
//! A [`ChartConfig`] fixes everything about a chart that is decided at
//! construction time: the retention window, the plot kind, the axis labels and
//! time format handed to the rendering adapter, and the policy applied to
//! readings that arrive out of timestamp order.
//!
//! Configurations serialize to JSON so they can be kept next to the data
//! source that feeds the chart:
//!
//! ```json
//! {
//!   "title": "Moisture",
//!   "x_axis_label": "Time",
//!   "y_axis_label": "Moisture level",
//!   "kind": "curve",
//!   "window": 120.0,
//!   "time_format": "%H:%M:%S",
//!   "ordering": "reject"
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default retention window: two minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

/// Default axis time format (`HH:mm:ss`).
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// How a chart draws the line between consecutive points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Continuous curve through every point.
    #[default]
    Curve,
    /// Step function holding each value until the next point.
    Step,
}

/// What a window buffer does with a timestamp older than its newest point.
///
/// Eviction trims from the oldest end relative to the incoming timestamp, so
/// it is only exact when each series receives non-decreasing timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Reject the point with [`RecordError::NonMonotonicTimestamp`] and leave
    /// the buffer untouched.
    ///
    /// [`RecordError::NonMonotonicTimestamp`]: crate::error::RecordError::NonMonotonicTimestamp
    #[default]
    Reject,
    /// Trust the caller: evict relative to the incoming timestamp and append
    /// at the tail regardless of order. Out-of-order input may leave the
    /// buffer unsorted or evict too little.
    Assume,
    /// Insert at the sorted position and evict relative to the newest
    /// timestamp seen. A point already older than the window is dropped.
    Sorted,
}

/// Configuration for a windowed chart.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use loam::config::{ChartConfig, ChartKind};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ChartConfig {
///     title: "Greenhouse".to_string(),
///     kind: ChartKind::Step,
///     window: Duration::from_secs(300),
///     ..ChartConfig::default()
/// };
/// config.validate()?;
/// assert_eq!(config.window_ms(), 300_000);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Chart title, also used as the rendering window title.
    pub title: String,

    /// Label of the time (x) axis.
    pub x_axis_label: String,

    /// Label of the value (y) axis.
    pub y_axis_label: String,

    /// Curve or step rendering.
    pub kind: ChartKind,

    /// Retention horizon measured back from the newest point of each series.
    #[serde(with = "duration_serde")]
    pub window: Duration,

    /// `chrono` format string for time axis labels. Cosmetic only.
    pub time_format: String,

    /// Handling of out-of-order timestamps.
    pub ordering: OrderingPolicy,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: "Moisture".to_string(),
            x_axis_label: "Time".to_string(),
            y_axis_label: "Moisture level".to_string(),
            kind: ChartKind::Curve,
            window: DEFAULT_WINDOW,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            ordering: OrderingPolicy::Reject,
        }
    }
}

impl ChartConfig {
    /// Creates a validated configuration with default labels.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWindow`] if the window is not usable.
    pub fn new(title: impl Into<String>, kind: ChartKind, window: Duration) -> Result<Self> {
        let config = Self {
            title: title.into(),
            kind,
            window,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidWindow`] if the window is shorter than one
    ///   millisecond or does not fit in an `i64` millisecond count
    /// - [`ConfigError::EmptyTimeFormat`] if the time format is empty
    /// - [`ConfigError::InvalidTimeFormat`] if chrono cannot parse the format
    pub fn validate(&self) -> Result<()> {
        if self.window.as_millis() == 0 {
            return Err(ConfigError::InvalidWindow {
                window: self.window,
                reason: "window must be at least one millisecond".to_string(),
            }
            .into());
        }

        if i64::try_from(self.window.as_millis()).is_err() {
            return Err(ConfigError::InvalidWindow {
                window: self.window,
                reason: "window does not fit in i64 milliseconds".to_string(),
            }
            .into());
        }

        if self.time_format.trim().is_empty() {
            return Err(ConfigError::EmptyTimeFormat.into());
        }

        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat {
                format: self.time_format.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Returns the retention window in milliseconds, saturating at `i64::MAX`.
    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file
    /// cannot be loaded, or a validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] or [`ConfigError::Write`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?)
    }
}

/// Serde helper for `Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(de::Error::custom)
    }
}
