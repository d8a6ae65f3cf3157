//! Integration tests for the chart lifecycle and window retention.

use std::time::Duration;

use loam::WindowedChart;
use loam::config::{ChartConfig, ChartKind, OrderingPolicy};
use loam::error::{LoamError, RecordError, Result};
use loam::render::MemoryRenderer;
use loam::window::DataPoint;

fn open_chart(config: ChartConfig) -> (WindowedChart<MemoryRenderer>, MemoryRenderer) {
    let renderer = MemoryRenderer::new();
    let chart = WindowedChart::open(config, renderer.clone()).unwrap();
    (chart, renderer)
}

/// Asserts that every retained point is within the window of the newest one
/// and that every trace matches its window.
fn assert_invariants(chart: &WindowedChart<MemoryRenderer>, renderer: &MemoryRenderer) {
    let window_ms = chart.config().window_ms();

    for name in chart.series_names() {
        let window = chart.get_window(name).unwrap();

        if let Some(newest) = window.newest() {
            for point in window {
                assert!(
                    newest.timestamp_ms - point.timestamp_ms <= window_ms,
                    "series '{name}' retains {} with newest {}",
                    point.timestamp_ms,
                    newest.timestamp_ms
                );
            }
        }

        assert_eq!(renderer.trace(name), Some(window.points()), "trace '{name}' out of sync");
    }
}

#[test]
fn test_eviction_relative_to_newest_point() -> Result<()> {
    let (mut chart, renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("A", 0, 10.0)?;
    chart.add_data_point("A", 60_000, 12.0)?;
    chart.add_data_point("A", 130_000, 15.0)?;

    // 130000 - 0 > 120000, so the first point goes.
    let expected = vec![DataPoint::new(60_000, 12.0), DataPoint::new(130_000, 15.0)];
    assert_eq!(chart.get_window("A").unwrap().points(), expected);
    assert_eq!(renderer.trace("A"), Some(expected));

    Ok(())
}

#[test]
fn test_single_point_is_never_evicted() -> Result<()> {
    let (mut chart, _renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("B", 5_000, 3.3)?;

    assert_eq!(
        chart.get_window("B").unwrap().points(),
        vec![DataPoint::new(5_000, 3.3)]
    );

    Ok(())
}

#[test]
fn test_cleared_series_is_empty_not_missing() -> Result<()> {
    let (mut chart, renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("C", 1_000, 1.0)?;
    chart.clear_all();

    let window = chart.get_window("C").expect("cleared series must still be found");
    assert!(window.is_empty());
    assert_eq!(renderer.trace("C"), Some(vec![]));

    Ok(())
}

#[test]
fn test_unknown_series_is_missing() {
    let (chart, renderer) = open_chart(ChartConfig::default());

    assert!(chart.get_window("never-seen").is_none());
    assert_eq!(chart.series_count(), 0);
    assert_eq!(renderer.trace_count(), 0);
}

#[test]
fn test_point_exactly_one_window_old_is_retained() -> Result<()> {
    let (mut chart, _renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("A", 0, 1.0)?;
    chart.add_data_point("A", 120_000, 2.0)?;
    assert_eq!(chart.get_window("A").map(loam::WindowBuffer::len), Some(2));

    chart.add_data_point("A", 120_001, 3.0)?;
    assert_eq!(
        chart.get_window("A").unwrap().oldest(),
        Some(DataPoint::new(120_000, 2.0))
    );

    Ok(())
}

#[test]
fn test_invariants_hold_over_mixed_stream() -> Result<()> {
    let config = ChartConfig::new("stream", ChartKind::Step, Duration::from_secs(30))?;
    let (mut chart, renderer) = open_chart(config);

    let mut ts = 1_700_000_000_000_i64;
    for step in 0..500_i32 {
        // Irregular spacing with occasional long gaps and duplicates.
        ts += match step % 7 {
            0 => 0,
            3 => 45_000,
            _ => 1_250,
        };
        let series = ["north", "south", "east"][usize::try_from(step % 3).unwrap()];
        chart.add_data_point(series, ts, f64::from(step))?;
        assert_invariants(&chart, &renderer);
    }

    assert_eq!(chart.series_count(), 3);
    assert_eq!(renderer.trace_count(), 3);

    Ok(())
}

#[test]
fn test_series_are_independent() -> Result<()> {
    let (mut chart, renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("A", 0, 1.0)?;
    chart.add_data_point("B", 0, 1.0)?;
    chart.add_data_point("A", 1_000_000, 2.0)?;

    // A evicted its old point; B has seen nothing newer and keeps its own.
    assert_eq!(chart.get_window("A").map(loam::WindowBuffer::len), Some(1));
    assert_eq!(chart.get_window("B").map(loam::WindowBuffer::len), Some(1));
    assert_invariants(&chart, &renderer);

    Ok(())
}

#[test]
fn test_reject_policy_leaves_state_untouched() -> Result<()> {
    let (mut chart, renderer) = open_chart(ChartConfig::default());

    chart.add_data_point("A", 50_000, 1.0)?;
    chart.add_data_point("A", 60_000, 2.0)?;
    let before = chart.get_window("A").unwrap().points();

    let err = chart.add_data_point("A", 55_000, 3.0).unwrap_err();
    assert!(matches!(
        err,
        LoamError::Record(RecordError::NonMonotonicTimestamp {
            timestamp_ms: 55_000,
            newest_ms: 60_000,
            ..
        })
    ));

    assert_eq!(chart.get_window("A").unwrap().points(), before);
    assert_eq!(renderer.trace("A"), Some(before));

    Ok(())
}

#[test]
fn test_assume_policy_appends_at_tail() -> Result<()> {
    let config = ChartConfig {
        ordering: OrderingPolicy::Assume,
        ..ChartConfig::default()
    };
    let (mut chart, renderer) = open_chart(config);

    chart.add_data_point("A", 60_000, 1.0)?;
    chart.add_data_point("A", 10_000, 2.0)?;

    // Stored in arrival order; the trace still mirrors the buffer.
    let timestamps: Vec<i64> = chart
        .get_window("A")
        .unwrap()
        .iter()
        .map(|p| p.timestamp_ms)
        .collect();
    assert_eq!(timestamps, vec![60_000, 10_000]);
    assert_eq!(renderer.trace("A"), Some(chart.get_window("A").unwrap().points()));

    Ok(())
}

#[test]
fn test_sorted_policy_keeps_order_and_invariants() -> Result<()> {
    let config = ChartConfig {
        ordering: OrderingPolicy::Sorted,
        ..ChartConfig::default()
    };
    let (mut chart, renderer) = open_chart(config);

    for ts in [30_000, 10_000, 200_000, 20_000, 150_000, 90_000, 85_000] {
        chart.add_data_point("A", ts, 1.0)?;
        assert_invariants(&chart, &renderer);
    }

    let timestamps: Vec<i64> = chart
        .get_window("A")
        .unwrap()
        .iter()
        .map(|p| p.timestamp_ms)
        .collect();
    assert_eq!(timestamps, vec![85_000, 90_000, 150_000, 200_000]);

    Ok(())
}

#[test]
fn test_lifecycle_disposes_exactly_once() {
    let renderer = MemoryRenderer::new();
    {
        let chart = WindowedChart::open(ChartConfig::default(), renderer.clone()).unwrap();
        chart.close();
    }
    assert_eq!(renderer.disposals(), 1);

    let renderer = MemoryRenderer::new();
    {
        let mut chart = WindowedChart::open(ChartConfig::default(), renderer.clone()).unwrap();
        chart.add_data_point("A", 0, 1.0).unwrap();
    }
    assert_eq!(renderer.disposals(), 1);
}

#[test]
fn test_snapshot_reflects_chart() -> Result<()> {
    let config = ChartConfig::new("Beds", ChartKind::Step, Duration::from_secs(120))?;
    let (mut chart, renderer) = open_chart(config);

    chart.add_data_point("bed-1", 3_600_000, 40.0)?;
    chart.add_data_point("bed-2", 3_630_000, 35.0)?;
    chart.refresh();

    let snapshot = renderer.snapshot();
    let plot = snapshot.plot.unwrap();
    assert_eq!(plot.title, "Beds");
    assert_eq!(plot.kind, ChartKind::Step);
    assert_eq!(snapshot.traces.len(), 2);
    assert_eq!(snapshot.redraws, 1);

    let axis = snapshot.time_axis.unwrap();
    assert_eq!(axis.start_label, "01:00:00");
    assert_eq!(axis.end_label, "01:00:30");

    Ok(())
}
