//! CLI for the loam sliding-window chart engine.
//!
//! Provides commands for replaying recorded readings, emitting configuration,
//! and benchmarking the write path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use loam::WindowedChart;
use loam::config::{ChartConfig, ChartKind, OrderingPolicy};
use loam::ingest::{parse_readings, spawn_ingest};
use loam::render::{MemoryRenderer, NullRenderer, format_axis_time};
use tracing_subscriber::EnvFilter;

/// loam: sliding-window multi-series sensor chart engine CLI.
#[derive(Parser)]
#[command(name = "loam", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Replay recorded readings through a chart and print what it retains.
    Replay {
        /// File with one `series,timestamp_ms,value` reading per line.
        input: PathBuf,

        /// Chart configuration file (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Retention window (e.g., "500ms", "90s", "2m", "1h").
        #[arg(long)]
        window: Option<String>,

        /// Chart kind.
        #[arg(long)]
        kind: Option<KindArg>,

        /// Handling of out-of-order timestamps.
        #[arg(long)]
        ordering: Option<OrderingArg>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the default chart configuration as JSON.
    Config {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a write-path microbenchmark.
    Bench {
        /// Number of data points to write.
        #[arg(long, default_value = "1000000")]
        points: u64,

        /// Number of series to write to.
        #[arg(long, default_value = "30")]
        series: u32,
    },
}

/// Output format for replay results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values, one retained point per line.
    Csv,
    /// JSON plot snapshot with ingest counters.
    Json,
}

/// Chart kind argument.
#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// Continuous curve.
    Curve,
    /// Step function.
    Step,
}

impl From<KindArg> for ChartKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Curve => ChartKind::Curve,
            KindArg::Step => ChartKind::Step,
        }
    }
}

/// Ordering policy argument.
#[derive(Clone, Copy, ValueEnum)]
enum OrderingArg {
    /// Reject readings older than the newest point of their series.
    Reject,
    /// Append in arrival order.
    Assume,
    /// Insert at the sorted position.
    Sorted,
}

impl From<OrderingArg> for OrderingPolicy {
    fn from(ordering: OrderingArg) -> Self {
        match ordering {
            OrderingArg::Reject => OrderingPolicy::Reject,
            OrderingArg::Assume => OrderingPolicy::Assume,
            OrderingArg::Sorted => OrderingPolicy::Sorted,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            input,
            config,
            window,
            kind,
            ordering,
            format,
        } => build_config(config.as_deref(), window.as_deref(), kind, ordering)
            .and_then(|config| cmd_replay(&input, config, &format)),
        Commands::Config { output } => cmd_config(output.as_deref()),
        Commands::Bench { points, series } => cmd_bench(points, series),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Loads the base configuration and applies command-line overrides.
fn build_config(
    path: Option<&Path>,
    window: Option<&str>,
    kind: Option<KindArg>,
    ordering: Option<OrderingArg>,
) -> Result<ChartConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ChartConfig::load(path)?,
        None => ChartConfig::default(),
    };

    if let Some(window) = window {
        config.window = parse_duration(window)?;
    }
    if let Some(kind) = kind {
        config.kind = kind.into();
    }
    if let Some(ordering) = ordering {
        config.ordering = ordering.into();
    }

    config.validate()?;
    Ok(config)
}

/// Implements `loam replay <input>`.
fn cmd_replay(
    input: &Path,
    config: ChartConfig,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| format!("Cannot read '{}': {e}", input.display()))?;

    let renderer = MemoryRenderer::new();
    let time_format = config.time_format.clone();
    let chart = Arc::new(Mutex::new(WindowedChart::open(config, renderer.clone())?));

    let (tx, rx) = mpsc::channel();
    let worker = spawn_ingest(Arc::clone(&chart), rx);

    let mut parse_errors = 0u64;
    for (line, parsed) in parse_readings(&text) {
        match parsed {
            Ok(reading) => tx.send(reading)?,
            Err(e) => {
                parse_errors += 1;
                tracing::warn!(line, "skipping reading: {e}");
            }
        }
    }
    drop(tx);

    let stats = worker.join().map_err(|_| "ingest thread panicked")?;
    tracing::info!(
        received = stats.received,
        accepted = stats.accepted,
        rejected = stats.rejected,
        parse_errors,
        "replay finished"
    );

    let chart = chart.lock().map_err(|_| "chart lock poisoned")?;

    match format {
        OutputFormat::Csv => {
            println!(
                "# readings={}, accepted={}, rejected={}, dropped={}, evicted={}",
                stats.received, stats.accepted, stats.rejected, stats.dropped, stats.evicted
            );
            println!("# parse_errors={parse_errors}");
            for (name, window) in chart.registry().windows() {
                let span = window.span_ms().unwrap_or(0);
                println!("# series={name}, points={}, span_ms={span}", window.len());
            }
            println!("series,timestamp_ms,time,value");
            for (name, window) in chart.registry().windows() {
                for point in window {
                    println!(
                        "{name},{},{},{}",
                        point.timestamp_ms,
                        format_axis_time(point.timestamp_ms, &time_format),
                        point.value
                    );
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "config": chart.config(),
                "ingest": stats,
                "parse_errors": parse_errors,
                "snapshot": renderer.snapshot(),
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `loam config`.
fn cmd_config(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ChartConfig::default();

    match output {
        Some(path) => {
            config.save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => println!("{}", config.to_json()?),
    }

    Ok(())
}

/// Implements `loam bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(points: u64, series_count: u32) -> Result<(), Box<dyn std::error::Error>> {
    if series_count == 0 {
        return Err("At least one series is required".into());
    }

    println!("loam write-path benchmark");
    println!("  Points: {points}");
    println!("  Series: {series_count}");
    println!();

    let mut chart = WindowedChart::open(ChartConfig::default(), NullRenderer)?;
    let names: Vec<String> = (0..series_count).map(|i| format!("bed-{i}")).collect();

    println!("Writing {points} data points across {series_count} series...");

    let base_time = 1_700_000_000_000_i64;
    let mut ts = base_time;
    let points_per_series = points / u64::from(series_count);

    let start = Instant::now();

    for _ in 0..points_per_series {
        ts += 1_000;
        for (i, name) in names.iter().enumerate() {
            chart.add_data_point(name, ts, i as f64)?;
        }
    }

    let elapsed = start.elapsed();
    let total_writes = points_per_series * u64::from(series_count);
    let ns_per_write = elapsed.as_nanos() as f64 / total_writes.max(1) as f64;
    let writes_per_sec = total_writes as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results:");
    println!("  Total writes: {total_writes}");
    println!("  Retained points: {}", chart.registry().total_points());
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_write:.1} ns/write");
    println!("  Throughput: {writes_per_sec:.0} writes/sec");
    println!();

    chart.close();

    Ok(())
}

/// Parses a human-readable duration string (e.g., "500ms", "90s", "2m", "1h").
fn parse_duration(s: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".into());
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(num_str.parse()?));
    }

    let Some((unit_start, _)) = s.char_indices().next_back() else {
        return Err("Empty duration string".into());
    };
    let (num_str, unit) = s.split_at(unit_start);
    let num: u64 = num_str.parse()?;

    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => {
            return Err(
                format!("Unknown duration unit: '{unit}'. Use ms, s, m, h, or d.").into(),
            );
        }
    };
    let secs = num.checked_mul(multiplier).ok_or("Duration too large")?;

    Ok(Duration::from_secs(secs))
}
