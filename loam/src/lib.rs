//! # loam
//!
//! Sliding-window chart engine for multi-series sensor readings.
//!
//! loam keeps the last few minutes of readings per named series (soil
//! moisture probes, typically) and discards anything older as new points
//! arrive. Each series' retained window is mirrored into a trace owned by a
//! pluggable rendering backend, so what is drawn is always exactly what is
//! retained.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Bounded memory per series: retention is a time horizon, not a count
//! - Eviction runs on every insert, relative to the incoming timestamp
//! - Series are created lazily on the first reading for a name
//! - Rendering stays behind a trait; headless adapters ship with the crate
//! - No background threads unless asked for through [`ingest`]
//!
//! ## Quick Start
//!
//! ```rust
//! use loam::{ChartConfig, ChartKind, MemoryRenderer, WindowedChart};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Step chart keeping two minutes of data per series
//! let config = ChartConfig::new("Greenhouse", ChartKind::Step, Duration::from_secs(120))?;
//!
//! let renderer = MemoryRenderer::new();
//! let mut chart = WindowedChart::open(config, renderer.clone())?;
//!
//! // Record readings; series are created on first sight
//! chart.add_data_point("bed-1", 1_700_000_000_000, 41.5)?;
//! chart.add_data_point("bed-2", 1_700_000_000_500, 38.0)?;
//! chart.refresh();
//!
//! // Inspect what is retained
//! if let Some(window) = chart.get_window("bed-1") {
//!     for point in window {
//!         println!("{}: {}", point.timestamp_ms, point.value);
//!     }
//! }
//!
//! chart.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`WindowedChart`]: Top-level handle; owns config, series and the renderer
//! - [`ChartConfig`]: Window length, chart kind, labels and ordering policy
//! - [`WindowBuffer`]: Time-ordered points of one series, bounded by the window
//! - [`RenderAdapter`]: Seam to the plotting backend
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`chart`]: Chart lifecycle, insert, clear, refresh
//! - [`config`]: Chart configuration and JSON persistence
//! - [`series`]: Series registration and window/trace pairing
//! - [`window`]: Window buffer and eviction
//! - [`render`]: Rendering traits and headless adapters
//! - [`ingest`]: Channel-fed ingest thread and redraw driver
//! - [`error`]: Error types

pub mod chart;
pub mod config;
pub mod error;
pub mod ingest;
pub mod render;
pub mod series;
pub mod window;

// Re-export primary API types at crate root for convenience.
pub use chart::{SharedChart, WindowedChart};
pub use config::{ChartConfig, ChartKind, OrderingPolicy};
pub use error::{LoamError, Result};
pub use ingest::Reading;
pub use render::{MemoryRenderer, NullRenderer, RenderAdapter, RenderHandle};
pub use series::SeriesHandle;
pub use window::{DataPoint, WindowBuffer};
