//! Sliding-window roll-up over a forecast series.
//!
//! For a task of duration `D` over a series with period `P`, the
//! roll-up at start offset `i` is the arithmetic mean of the minimum
//! `k = max(1, ceil(D/P))` consecutive samples covering the task.
//! Windows whose samples straddle a gap in the series are skipped.

use core::error::Error;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use error_stack::Report;

use crate::forecast::ForecastPoint;

/// Gap handling for durations shorter than the forecast period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollupMode {
    /// `D < P` uses a single sample (`k = 1`)
    #[default]
    Permissive,
    /// `D < P` is rejected with [`RollupError::PeriodExceedsDuration`]
    Strict,
}

#[derive(Debug, derive_more::Display)]
pub enum RollupError {
    #[display("forecast period ({period_seconds}s) is longer than the task duration ({duration_seconds}s)")]
    PeriodExceedsDuration {
        period_seconds: i64,
        duration_seconds: i64,
    },
    #[display("invalid forecast data point period: {seconds} seconds")]
    InvalidPeriod { seconds: i64 },
}

impl Error for RollupError {}

/// Mean intensity of one candidate start.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupPoint {
    /// Index of the first contributing sample
    pub index: usize,
    /// Start time of the window (== the first sample's time)
    pub start: DateTime<Utc>,
    /// Arithmetic mean of the `k` contributing values
    pub avg: f64,
}

/// Number of consecutive samples needed to cover `duration`.
pub fn bucket_count(duration: Duration, period: Duration) -> usize {
    let d = duration.num_seconds();
    let p = period.num_seconds();
    if p <= 0 {
        return 1;
    }
    let k = (d + p - 1) / p;
    k.max(1) as usize
}

/// Roll up `points` with a fixed window of `k` samples.
///
/// Output has one entry per start offset whose `k` samples are
/// contiguous on the `period` grid; offsets that cross a gap are
/// silently skipped. The sum is accumulated in f64 and divided once.
pub fn rollup_windows(points: &[ForecastPoint], period: Duration, k: usize) -> Vec<RollupPoint> {
    if k == 0 || points.len() < k {
        return Vec::new();
    }

    let expected_span = period * (k as i32 - 1);
    let mut out = Vec::with_capacity(points.len() - k + 1);
    for i in 0..=(points.len() - k) {
        let start = points[i].point_time;
        let last = points[i + k - 1].point_time;
        if last - start != expected_span {
            continue;
        }
        let sum: f64 = points[i..i + k].iter().map(|p| p.value).sum();
        out.push(RollupPoint {
            index: i,
            start,
            avg: sum / k as f64,
        });
    }
    out
}

/// Roll up `points` for a task of `duration`.
pub fn rollup(
    points: &[ForecastPoint],
    period: Duration,
    duration: Duration,
    mode: RollupMode,
) -> Result<Vec<RollupPoint>, Report<RollupError>> {
    let period_seconds = period.num_seconds();
    if period_seconds <= 0 {
        return Err(Report::new(RollupError::InvalidPeriod {
            seconds: period_seconds,
        }));
    }
    if mode == RollupMode::Strict && duration < period {
        return Err(Report::new(RollupError::PeriodExceedsDuration {
            period_seconds,
            duration_seconds: duration.num_seconds(),
        }));
    }

    let k = bucket_count(duration, period);
    Ok(rollup_windows(points, period, k))
}
