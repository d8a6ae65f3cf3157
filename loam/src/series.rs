//! Series registration and window management.
//!
//! The [`SeriesRegistry`] maps series names to entries that hold a
//! [`WindowBuffer`] together with the render handle that mirrors it. Buffer
//! and handle are owned as one unit and are never exposed for independent
//! mutation, so the visual trace cannot drift from the retained data.
//!
//! # Registration Flow
//!
//! 1. Client calls `ensure_series(name, adapter)`
//! 2. If the name is known, the existing handle is returned
//! 3. Otherwise the adapter creates a trace, an empty buffer is allocated and
//!    a new [`SeriesHandle`] is returned
//! 4. Subsequent inserts go through `record(handle, ...)`, which mirrors the
//!    buffer into the trace after every change
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use loam::config::OrderingPolicy;
//! use loam::render::NullRenderer;
//! use loam::series::SeriesRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut adapter = NullRenderer;
//! let mut registry = SeriesRegistry::new(Duration::from_secs(120));
//!
//! let bed = registry.ensure_series("bed-1", &mut adapter)?;
//! registry.record(bed, 1_000, 41.5, OrderingPolicy::Reject)?;
//!
//! assert_eq!(registry.get("bed-1").map(|w| w.len()), Some(1));
//! assert!(registry.get("bed-2").is_none());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crate::config::OrderingPolicy;
use crate::error::{RecordError, Result, SeriesError};
use crate::render::{RenderAdapter, RenderHandle};
use crate::window::{DataPoint, Insertion, WindowBuffer};

/// Opaque handle for a registered series.
///
/// The handle is `Copy` and indexes directly into the registry, so repeated
/// inserts skip the name lookup. Handles are only minted by
/// [`SeriesRegistry::ensure_series`] and [`SeriesRegistry::get_handle`].
///
/// ```compile_fail
/// let forged = loam::series::SeriesHandle { id: 0 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesHandle {
    /// Position of the series in registration order.
    id: u32,
}

impl SeriesHandle {
    /// Returns the position of the series in registration order.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// A registered series: name, retained window and its visual trace.
struct SeriesEntry<H> {
    name: String,
    buffer: WindowBuffer,
    trace: H,
}

impl<H: RenderHandle> SeriesEntry<H> {
    /// Inserts into the buffer and brings the trace back in line with it.
    fn record(&mut self, point: DataPoint, policy: OrderingPolicy) -> Result<Insertion> {
        let insertion = self.buffer.insert(point, policy).map_err(|out_of_order| {
            RecordError::NonMonotonicTimestamp {
                series: self.name.clone(),
                timestamp_ms: point.timestamp_ms,
                newest_ms: out_of_order.newest_ms,
            }
        })?;

        if insertion.is_plain_append() {
            self.trace.append(point);
        } else {
            self.sync_trace();
        }

        if insertion.evicted > 0 {
            tracing::trace!(
                series = %self.name,
                evicted = insertion.evicted,
                retained = self.buffer.len(),
                "evicted stale points"
            );
        }

        Ok(insertion)
    }

    /// Replaces the trace with the buffer contents.
    fn sync_trace(&mut self) {
        let (front, back) = self.buffer.as_slices();
        if back.is_empty() {
            self.trace.set_points(front);
        } else {
            self.trace.set_points(&self.buffer.points());
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.trace.clear();
    }
}

/// Registry of named series and their windows.
///
/// # Thread Safety
///
/// The registry is designed for single-threaded access patterns. External
/// synchronization must be provided if used across multiple threads.
pub struct SeriesRegistry<H> {
    /// Retention window applied to every new buffer.
    window: Duration,
    /// Entries in registration order, indexed by `SeriesHandle::id`.
    entries: Vec<SeriesEntry<H>>,
    /// Map from series name to entry index.
    index: HashMap<String, u32>,
}

impl<H: RenderHandle> SeriesRegistry<H> {
    /// Creates an empty registry whose buffers retain `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the handle for `name`, creating the series on first sight.
    ///
    /// A new series gets an empty [`WindowBuffer`] and a trace created by
    /// `adapter`, which adds it to its dataset. Calling this again with the
    /// same name returns the same handle and creates nothing. Any string,
    /// including the empty string, is a valid name.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::LimitReached`] if `u32::MAX` series are
    /// already registered.
    pub fn ensure_series<A>(&mut self, name: &str, adapter: &mut A) -> Result<SeriesHandle>
    where
        A: RenderAdapter<Handle = H>,
    {
        if let Some(&id) = self.index.get(name) {
            return Ok(SeriesHandle { id });
        }

        let id = u32::try_from(self.entries.len()).map_err(|_| SeriesError::LimitReached {
            max: self.entries.len(),
        })?;
        let trace = adapter.create_series(name);

        self.entries.push(SeriesEntry {
            name: name.to_string(),
            buffer: WindowBuffer::new(self.window),
            trace,
        });
        self.index.insert(name.to_string(), id);

        tracing::debug!(series = %name, id, "registered series");

        Ok(SeriesHandle { id })
    }

    /// Inserts a point into a registered series and mirrors it to its trace.
    ///
    /// # Errors
    ///
    /// - [`SeriesError::InvalidHandle`] if the handle is not from this registry
    /// - [`RecordError::NonMonotonicTimestamp`] under [`OrderingPolicy::Reject`]
    ///   when the timestamp is older than the newest retained point
    pub fn record(
        &mut self,
        handle: SeriesHandle,
        timestamp_ms: i64,
        value: f64,
        policy: OrderingPolicy,
    ) -> Result<Insertion> {
        let entry = self
            .entries
            .get_mut(handle.id as usize)
            .ok_or(SeriesError::InvalidHandle { id: handle.id })?;

        entry.record(DataPoint::new(timestamp_ms, value), policy)
    }

    /// Empties every buffer and trace. Registrations and handles survive.
    pub fn clear_all(&mut self) {
        for entry in &mut self.entries {
            entry.clear();
        }
    }

    /// Looks up a series window without creating it.
    pub fn get(&self, name: &str) -> Option<&WindowBuffer> {
        self.index
            .get(name)
            .and_then(|&id| self.entries.get(id as usize))
            .map(|entry| &entry.buffer)
    }

    /// Looks up a series window, failing for unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownSeries`] if `name` was never registered.
    pub fn window_or_err(&self, name: &str) -> Result<&WindowBuffer> {
        self.get(name).ok_or_else(|| {
            SeriesError::UnknownSeries {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Returns the handle for a registered name.
    pub fn get_handle(&self, name: &str) -> Option<SeriesHandle> {
        self.index.get(name).map(|&id| SeriesHandle { id })
    }

    /// Returns the window of a registered handle.
    pub fn window(&self, handle: SeriesHandle) -> Option<&WindowBuffer> {
        self.entries.get(handle.id as usize).map(|entry| &entry.buffer)
    }

    /// Returns the name of a registered handle.
    pub fn name(&self, handle: SeriesHandle) -> Option<&str> {
        self.entries.get(handle.id as usize).map(|entry| entry.name.as_str())
    }

    /// Iterates over series names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Iterates over `(name, window)` pairs in registration order.
    pub fn windows(&self) -> impl Iterator<Item = (&str, &WindowBuffer)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), &entry.buffer))
    }

    /// Returns the number of registered series.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no series is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the total number of retained points across all series.
    pub fn total_points(&self) -> usize {
        self.entries.iter().map(|entry| entry.buffer.len()).sum()
    }

    /// Returns the retention window applied to new buffers.
    pub fn retention(&self) -> Duration {
        self.window
    }
}

impl<H> std::fmt::Debug for SeriesRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesRegistry")
            .field("window", &self.window)
            .field("series", &self.index.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoamError;
    use crate::render::{MemoryHandle, MemoryRenderer};

    fn registry() -> (SeriesRegistry<MemoryHandle>, MemoryRenderer) {
        (
            SeriesRegistry::new(Duration::from_secs(120)),
            MemoryRenderer::new(),
        )
    }

    fn assert_synced(registry: &SeriesRegistry<MemoryHandle>, renderer: &MemoryRenderer) {
        for (name, window) in registry.windows() {
            assert_eq!(
                renderer.trace(name),
                Some(window.points()),
                "trace for '{name}' drifted from its window"
            );
        }
    }

    #[test]
    fn test_series_handle_creation() {
        let handle = SeriesHandle { id: 7 };
        assert_eq!(handle.id(), 7);
        assert_eq!(handle, SeriesHandle { id: 7 });
    }

    #[test]
    fn test_registry_new() {
        let (registry, _) = registry();

        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.total_points(), 0);
        assert_eq!(registry.retention(), Duration::from_secs(120));
    }

    #[test]
    fn test_ensure_series_is_idempotent() {
        let (mut registry, mut renderer) = registry();

        let first = registry.ensure_series("A", &mut renderer).unwrap();
        let second = registry.ensure_series("A", &mut renderer).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(renderer.trace_count(), 1);
    }

    #[test]
    fn test_different_names_different_handles() {
        let (mut registry, mut renderer) = registry();

        let a = registry.ensure_series("A", &mut renderer).unwrap();
        let b = registry.ensure_series("B", &mut renderer).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(registry.name(b), Some("B"));
    }

    #[test]
    fn test_get_handle_matches_registration() {
        let (mut registry, mut renderer) = registry();

        let a = registry.ensure_series("A", &mut renderer).unwrap();
        let b = registry.ensure_series("B", &mut renderer).unwrap();

        assert_eq!(registry.get_handle("A"), Some(a));
        assert_eq!(registry.get_handle("B").map(|h| h.id()), Some(b.id()));
        assert_eq!(registry.name(a), Some("A"));
        assert!(registry.get_handle("C").is_none());
    }

    #[test]
    fn test_empty_name_accepted() {
        let (mut registry, mut renderer) = registry();

        let handle = registry.ensure_series("", &mut renderer).unwrap();
        registry.record(handle, 1_000, 1.0, OrderingPolicy::Reject).unwrap();

        assert_eq!(registry.get("").map(WindowBuffer::len), Some(1));
    }

    #[test]
    fn test_get_unknown_series() {
        let (registry, _) = registry();

        assert!(registry.get("never-seen").is_none());
        assert!(registry.get_handle("never-seen").is_none());
        assert!(matches!(
            registry.window_or_err("never-seen").unwrap_err(),
            LoamError::Series(SeriesError::UnknownSeries { .. })
        ));
    }

    #[test]
    fn test_record_mirrors_appends_and_evictions() {
        let (mut registry, mut renderer) = registry();
        let handle = registry.ensure_series("A", &mut renderer).unwrap();

        for (ts, value) in [(0, 10.0), (60_000, 12.0), (130_000, 15.0)] {
            registry.record(handle, ts, value, OrderingPolicy::Reject).unwrap();
            assert_synced(&registry, &renderer);
        }

        assert_eq!(
            renderer.trace("A"),
            Some(vec![DataPoint::new(60_000, 12.0), DataPoint::new(130_000, 15.0)])
        );
    }

    #[test]
    fn test_record_mirrors_sorted_inserts() {
        let (mut registry, mut renderer) = registry();
        let handle = registry.ensure_series("A", &mut renderer).unwrap();

        for ts in [10_000, 30_000, 20_000, 5_000] {
            registry.record(handle, ts, 1.0, OrderingPolicy::Sorted).unwrap();
            assert_synced(&registry, &renderer);
        }

        let timestamps: Vec<i64> = registry
            .get("A")
            .unwrap()
            .iter()
            .map(|p| p.timestamp_ms)
            .collect();
        assert_eq!(timestamps, vec![5_000, 10_000, 20_000, 30_000]);
    }

    #[test]
    fn test_record_mirrors_after_wraparound() {
        let (mut registry, mut renderer) = registry();
        let handle = registry.ensure_series("A", &mut renderer).unwrap();

        // Enough evictions to move the deque's head around its ring.
        for i in 0..200_i32 {
            registry
                .record(handle, i64::from(i) * 10_000, f64::from(i), OrderingPolicy::Reject)
                .unwrap();
        }
        registry.record(handle, 2_000_000, 0.0, OrderingPolicy::Reject).unwrap();
        assert_synced(&registry, &renderer);
    }

    #[test]
    fn test_rejected_record_leaves_trace_untouched() {
        let (mut registry, mut renderer) = registry();
        let handle = registry.ensure_series("A", &mut renderer).unwrap();

        registry.record(handle, 10_000, 1.0, OrderingPolicy::Reject).unwrap();
        let result = registry.record(handle, 5_000, 2.0, OrderingPolicy::Reject);

        match result.unwrap_err() {
            LoamError::Record(RecordError::NonMonotonicTimestamp {
                series,
                timestamp_ms,
                newest_ms,
            }) => {
                assert_eq!(series, "A");
                assert_eq!(timestamp_ms, 5_000);
                assert_eq!(newest_ms, 10_000);
            }
            other => panic!("Expected NonMonotonicTimestamp error, got: {other:?}"),
        }

        assert_eq!(renderer.trace("A"), Some(vec![DataPoint::new(10_000, 1.0)]));
    }

    #[test]
    fn test_record_invalid_handle() {
        let (mut registry, _) = registry();

        let result = registry.record(SeriesHandle { id: 3 }, 0, 1.0, OrderingPolicy::Reject);
        assert!(matches!(
            result.unwrap_err(),
            LoamError::Series(SeriesError::InvalidHandle { id: 3 })
        ));
    }

    #[test]
    fn test_clear_all_preserves_registrations() {
        let (mut registry, mut renderer) = registry();
        let a = registry.ensure_series("A", &mut renderer).unwrap();
        let b = registry.ensure_series("B", &mut renderer).unwrap();

        registry.record(a, 1_000, 1.0, OrderingPolicy::Reject).unwrap();
        registry.record(b, 2_000, 2.0, OrderingPolicy::Reject).unwrap();

        registry.clear_all();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.total_points(), 0);
        assert_eq!(registry.get("A").map(WindowBuffer::len), Some(0));
        assert_eq!(renderer.trace("A"), Some(vec![]));
        assert_eq!(renderer.trace("B"), Some(vec![]));

        // Same handle, same trace, no new registration.
        assert_eq!(registry.ensure_series("A", &mut renderer).unwrap(), a);
        registry.record(a, 500, 3.0, OrderingPolicy::Reject).unwrap();
        assert_eq!(renderer.trace_count(), 2);
        assert_eq!(renderer.trace("A"), Some(vec![DataPoint::new(500, 3.0)]));
    }

    #[test]
    fn test_windows_are_independent() {
        let (mut registry, mut renderer) = registry();
        let a = registry.ensure_series("A", &mut renderer).unwrap();
        let b = registry.ensure_series("B", &mut renderer).unwrap();

        registry.record(a, 0, 1.0, OrderingPolicy::Reject).unwrap();
        registry.record(b, 0, 1.0, OrderingPolicy::Reject).unwrap();
        registry.record(a, 500_000, 2.0, OrderingPolicy::Reject).unwrap();

        // Eviction in A never touches B.
        assert_eq!(registry.window(a).map(WindowBuffer::len), Some(1));
        assert_eq!(registry.window(b).map(WindowBuffer::len), Some(1));
        assert_eq!(registry.total_points(), 2);
    }
}
