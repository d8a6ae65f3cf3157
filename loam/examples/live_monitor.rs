//! Example simulating live moisture probes feeding a shared chart.
//!
//! This example shows how to:
//! - Share a chart between an ingest thread and a redraw driver
//! - Feed readings from several producer threads through one channel
//! - Inspect retained windows and the rendered snapshot
//!
//! Run with: `cargo run -p loam --example live_monitor`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use loam::WindowedChart;
use loam::config::{ChartConfig, ChartKind};
use loam::ingest::{Reading, spawn_ingest, spawn_redraw_driver};
use loam::render::{MemoryRenderer, format_axis_time};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Short window so eviction is visible within the run
    let config = ChartConfig::new("Greenhouse", ChartKind::Curve, Duration::from_secs(1))?;
    let renderer = MemoryRenderer::new();
    let chart = Arc::new(Mutex::new(WindowedChart::open(config, renderer.clone())?));

    let stop = Arc::new(AtomicBool::new(false));
    let driver = spawn_redraw_driver(
        Arc::clone(&chart),
        Duration::from_millis(100),
        Arc::clone(&stop),
    );

    let (tx, rx) = mpsc::channel();
    let worker = spawn_ingest(Arc::clone(&chart), rx);

    println!("Sampling three probes for 3 seconds...");

    let probes: Vec<_> = [("bed-1", 42.0), ("bed-2", 37.5), ("bed-3", 55.0)]
        .into_iter()
        .map(|(name, base)| {
            let tx = tx.clone();
            thread::spawn(move || {
                for step in 0..30_i32 {
                    let drift = f64::from(step % 10) * 0.1;
                    if tx.send(Reading::new(name, now_ms(), base - drift)).is_err() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            })
        })
        .collect();
    drop(tx);

    for probe in probes {
        probe.join().map_err(|_| "probe thread panicked")?;
    }

    let stats = worker.join().map_err(|_| "ingest thread panicked")?;
    stop.store(true, Ordering::Release);
    let redraws = driver.join().map_err(|_| "redraw thread panicked")?;

    println!(
        "\nIngested {} readings, {} evicted, {redraws} redraws",
        stats.accepted, stats.evicted
    );

    {
        let chart = chart.lock().map_err(|_| "chart lock poisoned")?;
        let time_format = "%H:%M:%S%.3f";

        for (name, window) in chart.registry().windows() {
            let (Some(oldest), Some(newest)) = (window.oldest(), window.newest()) else {
                continue;
            };
            println!(
                "  {name}: {} points from {} to {}",
                window.len(),
                format_axis_time(oldest.timestamp_ms, time_format),
                format_axis_time(newest.timestamp_ms, time_format),
            );
        }
    }

    let snapshot = renderer.snapshot();
    println!("\nSnapshot traces: {}", snapshot.traces.len());
    if let Some(axis) = snapshot.time_axis {
        println!("Time axis: {} .. {}", axis.start_label, axis.end_label);
    }

    Ok(())
}
