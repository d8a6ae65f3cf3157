//! Sliding window buffer for a single series.
//!
//! A [`WindowBuffer`] retains only the points that lie within a fixed
//! retention horizon of the newest point. Eviction is driven by data arrival:
//! every insert first trims stale points from the oldest end relative to the
//! incoming timestamp, then stores the new point. There is no timer. A series
//! that stops receiving data keeps its last window indefinitely.
//!
//! # Design
//!
//! - Points live in a `VecDeque` ordered by non-decreasing timestamp
//! - Eviction is a prefix trim, amortized O(1) per insert
//! - A point is stale when `anchor - point.timestamp_ms > window_ms`; a point
//!   exactly `window_ms` old is kept
//! - Out-of-order timestamps are handled per [`OrderingPolicy`]

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OrderingPolicy;

/// A single reading: epoch-millisecond timestamp and value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// The reading.
    pub value: f64,
}

impl DataPoint {
    /// Creates a new data point.
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

impl From<(i64, f64)> for DataPoint {
    fn from((timestamp_ms, value): (i64, f64)) -> Self {
        Self::new(timestamp_ms, value)
    }
}

impl From<DataPoint> for (i64, f64) {
    fn from(point: DataPoint) -> Self {
        (point.timestamp_ms, point.value)
    }
}

/// Where an inserted point ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Appended at the tail.
    Appended,
    /// Inserted before the tail at the given index.
    Inserted(usize),
    /// Older than the window relative to the newest point; not stored.
    Dropped,
}

/// Outcome of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// Number of points evicted from the oldest end.
    pub evicted: usize,
    /// Where the new point was placed.
    pub placement: Placement,
}

impl Insertion {
    /// Returns `true` if the buffer changed only by appending one point.
    ///
    /// Mirrors can then append instead of replacing their whole trace.
    pub fn is_plain_append(&self) -> bool {
        self.evicted == 0 && self.placement == Placement::Appended
    }
}

/// The reason a point could not be inserted.
///
/// Carries the newest retained timestamp so the caller can build a
/// [`RecordError`](crate::error::RecordError) naming the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfOrder {
    /// The newest timestamp currently retained.
    pub newest_ms: i64,
}

/// Time-ordered point buffer bounded by a retention window.
///
/// # Thread Safety
///
/// Single writer. Callers sharing a buffer across threads must serialize
/// access externally.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    /// Retained points, oldest first.
    points: VecDeque<DataPoint>,
    /// Retention horizon in milliseconds.
    window_ms: i64,
}

impl WindowBuffer {
    /// Creates an empty buffer with the given retention window.
    ///
    /// Windows longer than `i64::MAX` milliseconds saturate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use loam::window::WindowBuffer;
    ///
    /// let buffer = WindowBuffer::new(Duration::from_secs(120));
    /// assert!(buffer.is_empty());
    /// assert_eq!(buffer.window_ms(), 120_000);
    /// ```
    pub fn new(window: Duration) -> Self {
        Self::with_window_ms(i64::try_from(window.as_millis()).unwrap_or(i64::MAX))
    }

    /// Creates an empty buffer with a window given in milliseconds.
    pub fn with_window_ms(window_ms: i64) -> Self {
        Self {
            points: VecDeque::new(),
            window_ms: window_ms.max(0),
        }
    }

    /// Returns the retention window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Returns the retention window as a `Duration`.
    #[allow(clippy::cast_sign_loss)] // window_ms is clamped to >= 0
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms as u64)
    }

    /// Inserts a point, evicting stale points first.
    ///
    /// Eviction runs before the point is stored, anchored on the incoming
    /// timestamp, so the decision never depends on the previous tail. Under
    /// [`OrderingPolicy::Sorted`] the anchor is the newer of the incoming and
    /// the current newest timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfOrder`] under [`OrderingPolicy::Reject`] when the
    /// timestamp is older than the newest retained point. The buffer is left
    /// untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use loam::config::OrderingPolicy;
    /// use loam::window::{DataPoint, WindowBuffer};
    ///
    /// let mut buffer = WindowBuffer::new(Duration::from_secs(120));
    /// buffer.insert(DataPoint::new(0, 10.0), OrderingPolicy::Reject).unwrap();
    /// buffer.insert(DataPoint::new(60_000, 12.0), OrderingPolicy::Reject).unwrap();
    /// let insertion = buffer
    ///     .insert(DataPoint::new(130_000, 15.0), OrderingPolicy::Reject)
    ///     .unwrap();
    ///
    /// assert_eq!(insertion.evicted, 1);
    /// assert_eq!(buffer.oldest(), Some(DataPoint::new(60_000, 12.0)));
    /// ```
    pub fn insert(
        &mut self,
        point: DataPoint,
        policy: OrderingPolicy,
    ) -> Result<Insertion, OutOfOrder> {
        let newest = self.points.back().map(|p| p.timestamp_ms);
        let out_of_order = newest.is_some_and(|n| point.timestamp_ms < n);

        match policy {
            OrderingPolicy::Reject if out_of_order => Err(OutOfOrder {
                // out_of_order implies a newest point exists
                newest_ms: newest.unwrap_or(point.timestamp_ms),
            }),
            OrderingPolicy::Reject | OrderingPolicy::Assume => {
                let evicted = self.evict(point.timestamp_ms);
                self.points.push_back(point);
                Ok(Insertion {
                    evicted,
                    placement: Placement::Appended,
                })
            }
            OrderingPolicy::Sorted => Ok(self.insert_sorted(point, newest)),
        }
    }

    /// Sorted insert: evict relative to the newest timestamp, then place the
    /// point after any existing points with the same timestamp.
    fn insert_sorted(&mut self, point: DataPoint, newest: Option<i64>) -> Insertion {
        let anchor = newest.map_or(point.timestamp_ms, |n| n.max(point.timestamp_ms));
        let evicted = self.evict(anchor);

        if self.is_stale(point.timestamp_ms, anchor) {
            return Insertion {
                evicted,
                placement: Placement::Dropped,
            };
        }

        let index = self
            .points
            .partition_point(|p| p.timestamp_ms <= point.timestamp_ms);
        let placement = if index == self.points.len() {
            Placement::Appended
        } else {
            Placement::Inserted(index)
        };
        self.points.insert(index, point);

        Insertion { evicted, placement }
    }

    /// Removes points from the oldest end that are stale relative to `anchor`.
    fn evict(&mut self, anchor: i64) -> usize {
        let mut evicted = 0;
        while let Some(oldest) = self.points.front() {
            if !self.is_stale(oldest.timestamp_ms, anchor) {
                break;
            }
            self.points.pop_front();
            evicted += 1;
        }
        evicted
    }

    #[inline]
    fn is_stale(&self, timestamp_ms: i64, anchor: i64) -> bool {
        anchor.saturating_sub(timestamp_ms) > self.window_ms
    }

    /// Removes every point. The window is unchanged.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Returns the number of retained points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns whether no points are retained.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over retained points, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DataPoint> + ExactSizeIterator {
        self.points.iter()
    }

    /// Copies the retained points into a vector, oldest first.
    pub fn points(&self) -> Vec<DataPoint> {
        self.points.iter().copied().collect()
    }

    /// Returns the retained points as two contiguous slices, oldest first.
    pub fn as_slices(&self) -> (&[DataPoint], &[DataPoint]) {
        self.points.as_slices()
    }

    /// Returns the oldest retained point.
    pub fn oldest(&self) -> Option<DataPoint> {
        self.points.front().copied()
    }

    /// Returns the most recently stored point at the tail.
    pub fn newest(&self) -> Option<DataPoint> {
        self.points.back().copied()
    }

    /// Returns the time between the oldest and newest point, or `None` when
    /// the buffer is empty.
    pub fn span_ms(&self) -> Option<i64> {
        match (self.points.front(), self.points.back()) {
            (Some(oldest), Some(newest)) => {
                Some(newest.timestamp_ms.saturating_sub(oldest.timestamp_ms))
            }
            _ => None,
        }
    }

    /// Returns the points with `start_ms <= timestamp < end_ms`, oldest first.
    ///
    /// An empty or inverted range yields nothing.
    pub fn range(&self, start_ms: i64, end_ms: i64) -> impl Iterator<Item = &DataPoint> {
        self.points
            .iter()
            .filter(move |p| p.timestamp_ms >= start_ms && p.timestamp_ms < end_ms)
    }
}

impl<'a> IntoIterator for &'a WindowBuffer {
    type Item = &'a DataPoint;
    type IntoIter = std::collections::vec_deque::Iter<'a, DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
