//! Chart module for the loam windowed chart engine.
//!
//! This module provides the top-level API that ties all components together.
//! A [`WindowedChart`] owns the configuration, the series registry and the
//! rendering adapter, and exposes the insert, clear, inspect, refresh and
//! close operations.
//!
//! # Design
//!
//! The chart acts as the central coordinator:
//! - Acquires the rendering context in [`WindowedChart::open`]
//! - Owns the [`SeriesRegistry`] that pairs each window with its trace
//! - Creates series lazily on the first point submitted for a name
//! - Releases the rendering context exactly once, in [`WindowedChart::close`]
//!   or on drop
//!
//! # Example Usage
//!
//! ```rust
//! use loam::chart::WindowedChart;
//! use loam::config::ChartConfig;
//! use loam::render::MemoryRenderer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let renderer = MemoryRenderer::new();
//! let mut chart = WindowedChart::open(ChartConfig::default(), renderer.clone())?;
//!
//! chart.add_data_point("A", 0, 10.0)?;
//! chart.add_data_point("A", 60_000, 12.0)?;
//! chart.add_data_point("A", 130_000, 15.0)?;
//!
//! // The first point is more than two minutes older than the newest one.
//! assert_eq!(chart.get_window("A").map(|w| w.len()), Some(2));
//! assert_eq!(renderer.trace("A").map(|t| t.len()), Some(2));
//!
//! chart.refresh();
//! chart.close();
//! assert_eq!(renderer.disposals(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use crate::config::ChartConfig;
use crate::error::Result;
use crate::render::RenderAdapter;
use crate::series::SeriesRegistry;
use crate::window::{Insertion, WindowBuffer};

/// A chart shared between an ingest thread and a redraw driver.
pub type SharedChart<A> = Arc<Mutex<WindowedChart<A>>>;

/// Sliding-window chart over any number of named series.
///
/// # Thread Safety
///
/// The chart is single-writer. Wrap it in a [`SharedChart`] to feed it from
/// one thread while another drives redraws.
pub struct WindowedChart<A: RenderAdapter> {
    /// Validated configuration fixed at open time.
    config: ChartConfig,
    /// Series windows and their traces.
    registry: SeriesRegistry<A::Handle>,
    /// Rendering backend.
    adapter: A,
    /// Whether `dispose` has been called on the adapter.
    disposed: bool,
}

impl<A: RenderAdapter> WindowedChart<A> {
    /// Validates the configuration and builds the plot context.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::error::ConfigError) if the
    /// configuration is invalid, or the adapter's error if it cannot create
    /// its plot. The adapter is not disposed in either case since nothing was
    /// acquired.
    pub fn open(config: ChartConfig, mut adapter: A) -> Result<Self> {
        config.validate()?;
        adapter.create_plot(&config)?;

        tracing::debug!(
            title = %config.title,
            kind = ?config.kind,
            window_ms = config.window_ms(),
            ordering = ?config.ordering,
            "opened chart"
        );

        Ok(Self {
            registry: SeriesRegistry::new(config.window),
            config,
            adapter,
            disposed: false,
        })
    }

    /// Records a reading for `series`, creating the series on first sight.
    ///
    /// Points older than the window relative to `timestamp_ms` are evicted
    /// from that series before the new point is stored, and the series' trace
    /// is updated to match. Other series are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NonMonotonicTimestamp`] under
    /// [`OrderingPolicy::Reject`] when `timestamp_ms` is older than the
    /// series' newest point. The window and trace are left unchanged.
    ///
    /// [`RecordError::NonMonotonicTimestamp`]: crate::error::RecordError::NonMonotonicTimestamp
    /// [`OrderingPolicy::Reject`]: crate::config::OrderingPolicy::Reject
    pub fn add_data_point(
        &mut self,
        series: &str,
        timestamp_ms: i64,
        value: f64,
    ) -> Result<Insertion> {
        let handle = self.registry.ensure_series(series, &mut self.adapter)?;
        self.registry.record(handle, timestamp_ms, value, self.config.ordering)
    }

    /// Empties every series window and trace. Series stay registered.
    pub fn clear_all(&mut self) {
        self.registry.clear_all();
        tracing::debug!(series = self.registry.len(), "cleared all series");
    }

    /// Returns the retained window of `series`, or `None` if no point was
    /// ever submitted for it.
    pub fn get_window(&self, series: &str) -> Option<&WindowBuffer> {
        self.registry.get(series)
    }

    /// Asks the adapter to repaint. Data is unchanged.
    pub fn refresh(&mut self) {
        self.adapter.request_redraw();
    }

    /// Releases the rendering context.
    pub fn close(mut self) {
        self.dispose();
    }

    /// Returns the number of registered series.
    pub fn series_count(&self) -> usize {
        self.registry.len()
    }

    /// Iterates over series names in registration order.
    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    /// Returns the series registry.
    pub fn registry(&self) -> &SeriesRegistry<A::Handle> {
        &self.registry
    }

    /// Returns the chart configuration.
    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Returns the rendering adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.adapter.dispose();

        tracing::debug!(
            title = %self.config.title,
            series = self.registry.len(),
            points = self.registry.total_points(),
            "closed chart"
        );
    }
}

impl<A: RenderAdapter> Drop for WindowedChart<A> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<A: RenderAdapter + std::fmt::Debug> std::fmt::Debug for WindowedChart<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedChart")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("adapter", &self.adapter)
            .field("disposed", &self.disposed)
            .finish()
    }
}
