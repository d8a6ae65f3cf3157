//! Rendering seam between the window engine and a plotting backend.
//!
//! The engine never draws anything itself. It talks to a [`RenderAdapter`]
//! that owns the plot context and hands out one [`RenderHandle`] per series.
//! Handles are write-only from the engine's point of view: after every
//! mutation the engine pushes the series' retained points into its handle,
//! and never reads them back.
//!
//! Two headless adapters ship with the crate:
//!
//! - [`MemoryRenderer`] keeps traces in shared memory and can produce a
//!   serializable [`PlotSnapshot`]
//! - [`NullRenderer`] discards everything

use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ChartConfig, ChartKind};
use crate::error::Result;
use crate::window::DataPoint;

/// Per-series visual trace.
pub trait RenderHandle {
    /// Replaces the trace with the given points, oldest first.
    fn set_points(&mut self, points: &[DataPoint]);

    /// Appends one point at the end of the trace.
    fn append(&mut self, point: DataPoint);

    /// Removes every point from the trace.
    fn clear(&mut self);
}

/// Plotting backend that owns the rendering context.
pub trait RenderAdapter {
    /// Handle type for a single series trace.
    type Handle: RenderHandle;

    /// Builds the plot context: kind, title, axis labels and time format.
    ///
    /// Called once when a chart is opened.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`](crate::error::RenderError) if the backend
    /// cannot create its plot.
    fn create_plot(&mut self, config: &ChartConfig) -> Result<()>;

    /// Creates an empty trace for `name` and adds it to the dataset.
    fn create_series(&mut self, name: &str) -> Self::Handle;

    /// Asks the backend to repaint.
    fn request_redraw(&mut self);

    /// Releases rendering resources. No other call follows.
    fn dispose(&mut self);
}

/// Formats an epoch-millisecond timestamp with a `chrono` format string in UTC.
///
/// Timestamps outside chrono's range and formats chrono cannot render fall
/// back to the raw millisecond count.
///
/// # Examples
///
/// ```rust
/// use loam::render::format_axis_time;
///
/// assert_eq!(format_axis_time(3_723_000, "%H:%M:%S"), "01:02:03");
/// ```
pub fn format_axis_time(timestamp_ms: i64, format: &str) -> String {
    let Some(dt) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        return timestamp_ms.to_string();
    };

    let mut label = String::new();
    match write!(label, "{}", dt.format(format)) {
        Ok(()) => label,
        Err(_) => timestamp_ms.to_string(),
    }
}

/// Adapter that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

/// Handle returned by [`NullRenderer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandle;

impl RenderHandle for NullHandle {
    fn set_points(&mut self, _points: &[DataPoint]) {}
    fn append(&mut self, _point: DataPoint) {}
    fn clear(&mut self) {}
}

impl RenderAdapter for NullRenderer {
    type Handle = NullHandle;

    fn create_plot(&mut self, _config: &ChartConfig) -> Result<()> {
        Ok(())
    }

    fn create_series(&mut self, _name: &str) -> Self::Handle {
        NullHandle
    }

    fn request_redraw(&mut self) {}

    fn dispose(&mut self) {}
}

/// Headless adapter keeping every trace in memory.
///
/// Clones share the same plot state, so a caller can keep one clone to
/// inspect what the chart pushed into the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    state: Arc<Mutex<PlotState>>,
}

/// Plot state behind a [`MemoryRenderer`].
#[derive(Debug, Default)]
struct PlotState {
    plot: Option<PlotContext>,
    traces: Vec<Trace>,
    redraws: u64,
    disposals: u32,
}

/// Settings captured by `create_plot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotContext {
    /// Chart title.
    pub title: String,
    /// Time axis label.
    pub x_axis_label: String,
    /// Value axis label.
    pub y_axis_label: String,
    /// Curve or step.
    pub kind: ChartKind,
    /// Time axis format.
    pub time_format: String,
}

/// One series trace as held by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    /// Series name.
    pub name: String,
    /// Points, oldest first.
    pub points: Vec<DataPoint>,
}

/// Serializable view of a [`MemoryRenderer`]'s plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSnapshot {
    /// Plot settings, `None` before `create_plot`.
    pub plot: Option<PlotContext>,
    /// Traces in dataset order.
    pub traces: Vec<Trace>,
    /// Time axis bounds and their labels, `None` when every trace is empty.
    pub time_axis: Option<TimeAxis>,
    /// Number of redraw requests received.
    pub redraws: u64,
    /// Whether the plot has been disposed.
    pub disposed: bool,
}

/// Time axis extent with formatted labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAxis {
    /// Earliest timestamp across all traces.
    pub start_ms: i64,
    /// Latest timestamp across all traces.
    pub end_ms: i64,
    /// `start_ms` formatted with the plot's time format.
    pub start_label: String,
    /// `end_ms` formatted with the plot's time format.
    pub end_label: String,
}

impl MemoryRenderer {
    /// Creates an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recovers the state even if a writer panicked mid-update.
    fn lock(&self) -> MutexGuard<'_, PlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the points of the first trace named `name`.
    pub fn trace(&self, name: &str) -> Option<Vec<DataPoint>> {
        self.lock()
            .traces
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.points.clone())
    }

    /// Returns the number of traces in the dataset.
    pub fn trace_count(&self) -> usize {
        self.lock().traces.len()
    }

    /// Returns the number of redraw requests received.
    pub fn redraws(&self) -> u64 {
        self.lock().redraws
    }

    /// Returns how many times `dispose` was called.
    pub fn disposals(&self) -> u32 {
        self.lock().disposals
    }

    /// Returns the captured plot settings.
    pub fn plot(&self) -> Option<PlotContext> {
        self.lock().plot.clone()
    }

    /// Takes a serializable snapshot of the whole plot.
    pub fn snapshot(&self) -> PlotSnapshot {
        let state = self.lock();

        let bounds = state
            .traces
            .iter()
            .flat_map(|t| t.points.iter().map(|p| p.timestamp_ms))
            .fold(None, |acc: Option<(i64, i64)>, ts| match acc {
                Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
                None => Some((ts, ts)),
            });

        let format = state
            .plot
            .as_ref()
            .map_or(crate::config::DEFAULT_TIME_FORMAT, |p| p.time_format.as_str());

        let time_axis = bounds.map(|(start_ms, end_ms)| TimeAxis {
            start_ms,
            end_ms,
            start_label: format_axis_time(start_ms, format),
            end_label: format_axis_time(end_ms, format),
        });

        PlotSnapshot {
            plot: state.plot.clone(),
            traces: state.traces.clone(),
            time_axis,
            redraws: state.redraws,
            disposed: state.disposals > 0,
        }
    }
}

/// Handle into one trace of a [`MemoryRenderer`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<PlotState>>,
    index: usize,
}

impl MemoryHandle {
    fn with_trace(&self, f: impl FnOnce(&mut Vec<DataPoint>)) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(trace) = state.traces.get_mut(self.index) {
            f(&mut trace.points);
        }
    }
}

impl RenderHandle for MemoryHandle {
    fn set_points(&mut self, points: &[DataPoint]) {
        self.with_trace(|trace| {
            trace.clear();
            trace.extend_from_slice(points);
        });
    }

    fn append(&mut self, point: DataPoint) {
        self.with_trace(|trace| trace.push(point));
    }

    fn clear(&mut self) {
        self.with_trace(Vec::clear);
    }
}

impl RenderAdapter for MemoryRenderer {
    type Handle = MemoryHandle;

    fn create_plot(&mut self, config: &ChartConfig) -> Result<()> {
        self.lock().plot = Some(PlotContext {
            title: config.title.clone(),
            x_axis_label: config.x_axis_label.clone(),
            y_axis_label: config.y_axis_label.clone(),
            kind: config.kind,
            time_format: config.time_format.clone(),
        });
        Ok(())
    }

    fn create_series(&mut self, name: &str) -> Self::Handle {
        let mut state = self.lock();
        let index = state.traces.len();
        state.traces.push(Trace {
            name: name.to_string(),
            points: Vec::new(),
        });

        MemoryHandle {
            state: Arc::clone(&self.state),
            index,
        }
    }

    fn request_redraw(&mut self) {
        self.lock().redraws += 1;
    }

    fn dispose(&mut self) {
        self.lock().disposals += 1;
    }
}
