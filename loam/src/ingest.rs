//! Background ingestion and redraw scheduling.
//!
//! A [`WindowedChart`](crate::chart::WindowedChart) has a single writer.
//! When readings arrive from another thread, they go through an `mpsc`
//! channel to one consumer spawned by [`spawn_ingest`], which owns every
//! insert. Repaints are issued separately by [`spawn_redraw_driver`] on a
//! fixed interval. Both share the chart as a [`SharedChart`].
//!
//! ```rust
//! use std::sync::{Arc, Mutex, mpsc};
//! use loam::chart::WindowedChart;
//! use loam::config::ChartConfig;
//! use loam::ingest::{Reading, spawn_ingest};
//! use loam::render::MemoryRenderer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let renderer = MemoryRenderer::new();
//! let chart = Arc::new(Mutex::new(WindowedChart::open(
//!     ChartConfig::default(),
//!     renderer.clone(),
//! )?));
//!
//! let (tx, rx) = mpsc::channel();
//! let worker = spawn_ingest(Arc::clone(&chart), rx);
//!
//! tx.send("bed-1,1000,41.5".parse::<Reading>()?)?;
//! tx.send(Reading::new("bed-1", 2_000, 42.0))?;
//! drop(tx);
//!
//! let stats = worker.join().map_err(|_| "ingest thread panicked")?;
//! assert_eq!(stats.accepted, 2);
//! assert_eq!(renderer.trace("bed-1").map(|t| t.len()), Some(2));
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chart::SharedChart;
use crate::error::ReadingError;
use crate::render::RenderAdapter;
use crate::window::Placement;

/// One sensor reading addressed to a named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Series name.
    pub series: String,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Measured value.
    pub value: f64,
}

impl Reading {
    /// Creates a new reading.
    pub fn new(series: impl Into<String>, timestamp_ms: i64, value: f64) -> Self {
        Self {
            series: series.into(),
            timestamp_ms,
            value,
        }
    }
}

impl FromStr for Reading {
    type Err = ReadingError;

    /// Parses `series,timestamp_ms,value`.
    ///
    /// Fields are trimmed. The series name is everything before the last two
    /// commas, so it may itself contain commas.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.rsplitn(3, ',');
        let (Some(value), Some(timestamp), Some(series)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ReadingError::Malformed {
                line: line.to_string(),
            });
        };

        let timestamp = timestamp.trim();
        let timestamp_ms = timestamp
            .parse::<i64>()
            .map_err(|_| ReadingError::InvalidTimestamp {
                field: timestamp.to_string(),
            })?;

        let value = value.trim();
        let value = value.parse::<f64>().map_err(|_| ReadingError::InvalidValue {
            field: value.to_string(),
        })?;

        Ok(Self::new(series.trim(), timestamp_ms, value))
    }
}

/// Parses a block of reading lines.
///
/// Blank lines and lines starting with `#` are skipped, as is a first line
/// beginning with `series,`. Each item carries its 1-based line number.
pub fn parse_readings(
    input: &str,
) -> impl Iterator<Item = (usize, Result<Reading, ReadingError>)> + '_ {
    input
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(number, line)| {
            !line.is_empty()
                && !line.starts_with('#')
                && !(*number == 1 && line.to_ascii_lowercase().starts_with("series,"))
        })
        .map(|(number, line)| (number, line.parse()))
}

/// Counters reported by an ingest thread when its channel closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Readings taken off the channel.
    pub received: u64,
    /// Readings stored in a window.
    pub accepted: u64,
    /// Readings refused by the chart.
    pub rejected: u64,
    /// Readings dropped as already stale under the sorted policy.
    pub dropped: u64,
    /// Points evicted while ingesting.
    pub evicted: u64,
}

/// Spawns the single consumer that feeds `chart` from `receiver`.
///
/// The thread runs until every sender is dropped and returns its counters.
/// Rejected readings are logged and counted; they never stop the thread.
pub fn spawn_ingest<A>(
    chart: SharedChart<A>,
    receiver: Receiver<Reading>,
) -> JoinHandle<IngestStats>
where
    A: RenderAdapter + Send + 'static,
    A::Handle: Send + 'static,
{
    thread::spawn(move || {
        let mut stats = IngestStats::default();

        for reading in receiver {
            stats.received += 1;

            let Ok(mut guard) = chart.lock() else {
                tracing::error!("chart lock poisoned, stopping ingest");
                break;
            };

            match guard.add_data_point(&reading.series, reading.timestamp_ms, reading.value) {
                Ok(insertion) => {
                    stats.evicted += insertion.evicted as u64;
                    if insertion.placement == Placement::Dropped {
                        stats.dropped += 1;
                    } else {
                        stats.accepted += 1;
                    }
                }
                Err(e) => {
                    stats.rejected += 1;
                    tracing::warn!(series = %reading.series, "rejected reading: {e}");
                }
            }
        }

        tracing::debug!(
            received = stats.received,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "ingest finished"
        );
        stats
    })
}

/// Spawns a driver that refreshes `chart` every `interval` until `stop` is set.
///
/// Returns the number of redraws issued.
pub fn spawn_redraw_driver<A>(
    chart: SharedChart<A>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<u64>
where
    A: RenderAdapter + Send + 'static,
    A::Handle: Send + 'static,
{
    thread::spawn(move || {
        let mut redraws = 0;

        while !stop.load(Ordering::Acquire) {
            thread::sleep(interval);
            if stop.load(Ordering::Acquire) {
                break;
            }

            if let Ok(mut guard) = chart.lock() {
                guard.refresh();
                redraws += 1;
            }
        }

        tracing::debug!(redraws, "redraw driver stopped");
        redraws
    })
}
