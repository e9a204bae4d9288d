//! Scheduler core: pick the carbon-optimal start time.
//!
//! Given candidate windows, a task duration and a power zone, fetch
//! the forecast, roll it up at task granularity, and return the
//! ideal option together with worst/naive/median baselines and the
//! savings against each.

use core::error::Error;

use api_types::CarbonSavings;
use api_types::ScheduleOption;
use api_types::ScheduleResponse;
use api_types::TimeRange;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use error_stack::Report;
use error_stack::ResultExt;
use tracing::warn;

use crate::forecast::ForecastPoint;
use crate::forecast::ForecastProvider;
use crate::forecast::SIGNAL_CO2_MOER;
use crate::rollup::rollup_windows;
use crate::rollup::RollupPoint;
use crate::zones::PowerZone;

/// Scheduling failures, split into request validation (client
/// errors) and planning/upstream failures (server errors).
#[derive(Debug, derive_more::Display)]
pub enum ScheduleError {
    #[display("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[display("invalid duration format '{input}'")]
    InvalidDuration { input: String },
    #[display("invalid window: start must not be after end")]
    InvalidWindow,
    #[display("invalid zone identifier provided: {zone}")]
    UnknownZone { zone: String },
    #[display("multi-zone scheduling is not yet supported; specify only one zone")]
    MultiZoneUnsupported,
    #[display("numOptions must be between 2 and 10 (inclusive), got {got}")]
    InvalidNumOptions { got: usize },
    #[display("no valid scheduling windows found for the requested duration")]
    NoFeasibleWindow,
    #[display("invalid forecast data point period: {seconds} seconds")]
    InvalidPeriod { seconds: i64 },
    #[display("forecast contains no data points for region {region}")]
    ForecastEmpty { region: String },
    #[display("failed to retrieve carbon forecast data")]
    Forecast,
}

impl Error for ScheduleError {}

impl ScheduleError {
    /// Whether this is a request problem (HTTP 400) as opposed to a
    /// planning or upstream failure (HTTP 500).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidDuration { .. }
                | Self::InvalidWindow
                | Self::UnknownZone { .. }
                | Self::MultiZoneUnsupported
                | Self::InvalidNumOptions { .. }
        )
    }
}

/// Compute the carbon-optimal schedule for one zone.
///
/// `power_zones` must contain exactly one entry (the API boundary
/// rejects multi-zone requests); each option's `zone` field echoes
/// the first entry of `requested_zone_identifiers` for legibility.
pub async fn calculate_best_schedule(
    provider: &dyn ForecastProvider,
    windows: &[TimeRange],
    duration_str: &str,
    power_zones: &[PowerZone],
    requested_zone_identifiers: &[String],
    num_options: usize,
) -> Result<ScheduleResponse, Report<ScheduleError>> {
    let first_zone = power_zones
        .first()
        .ok_or_else(|| Report::new(ScheduleError::MissingField { field: "zones" }))?;

    let forecast = provider
        .get_forecast(first_zone, SIGNAL_CO2_MOER)
        .await
        .change_context(ScheduleError::Forecast)?;

    if forecast.data.is_empty() {
        return Err(Report::new(ScheduleError::ForecastEmpty {
            region: first_zone.as_str().to_string(),
        }));
    }

    let duration = parse_task_duration(duration_str)?;

    // The task may start anywhere in [s, e] but its mean intensity
    // needs samples up to e + D.
    let extended: Vec<(TimeRange, DateTime<Utc>)> = windows
        .iter()
        .map(|win| (*win, win.end + duration))
        .collect();

    let filtered: Vec<ForecastPoint> = forecast
        .data
        .iter()
        .filter(|dp| {
            extended
                .iter()
                .any(|(win, ext_end)| dp.point_time >= win.start && dp.point_time <= *ext_end)
        })
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Err(Report::new(ScheduleError::NoFeasibleWindow)
            .attach_printable("no forecast data points within the allowed time windows"));
    }

    let period_seconds = forecast.meta.data_point_period_seconds;
    if period_seconds <= 0 {
        return Err(Report::new(ScheduleError::InvalidPeriod {
            seconds: period_seconds,
        }));
    }
    let period = Duration::seconds(period_seconds);

    if duration.num_seconds() % period_seconds != 0 {
        warn!(
            duration = %duration_str,
            period_seconds,
            "requested duration is not an exact multiple of the forecast period; results may be approximate"
        );
    }
    let points_needed = ((duration.num_seconds() / period_seconds).max(1)) as usize;

    // Candidates: contiguous runs of `points_needed` samples whose
    // start lies inside one of the original windows.
    let candidates: Vec<RollupPoint> = rollup_windows(&filtered, period, points_needed)
        .into_iter()
        .filter(|rp| windows.iter().any(|win| win.contains(rp.start)))
        .collect();

    if candidates.is_empty() {
        return Err(Report::new(ScheduleError::NoFeasibleWindow));
    }

    let mut sorted = candidates.clone();
    sorted.sort_by(|a, b| a.avg.total_cmp(&b.avg).then(a.start.cmp(&b.start)));

    let zone_string = requested_zone_identifiers
        .first()
        .cloned()
        .unwrap_or_default();
    let to_option = |rp: &RollupPoint| ScheduleOption {
        time: rp.start,
        zone: zone_string.clone(),
        co2_intensity: rp.avg,
    };

    let options: Vec<ScheduleOption> = sorted.iter().take(num_options).map(to_option).collect();
    let ideal = options[0].clone();

    // Equal-avg candidates sort earlier-first, so the last entry is
    // the latest start within the highest-intensity bucket.
    let worst_case = to_option(sorted.last().unwrap_or(&sorted[0]));

    let naive = find_naive_case(&filtered, windows, period, points_needed).unwrap_or_else(|| {
        warn!("could not determine naive case from a forward scan, using earliest candidate");
        earliest_candidate(&candidates)
    });
    let naive_case = to_option(&naive);

    let median_case = to_option(&sorted[sorted.len() / 2]);

    let carbon_savings = CarbonSavings {
        vs_worst_case: savings_pct(worst_case.co2_intensity, ideal.co2_intensity),
        vs_naive_case: savings_pct(naive_case.co2_intensity, ideal.co2_intensity),
        vs_median_case: savings_pct(median_case.co2_intensity, ideal.co2_intensity),
    };

    Ok(ScheduleResponse {
        ideal,
        options,
        worst_case,
        naive_case,
        median_case,
        carbon_savings,
    })
}

fn parse_task_duration(input: &str) -> Result<Duration, Report<ScheduleError>> {
    let std_duration =
        api_types::parse_duration(input).change_context(ScheduleError::InvalidDuration {
            input: input.to_string(),
        })?;
    Duration::from_std(std_duration).change_context(ScheduleError::InvalidDuration {
        input: input.to_string(),
    })
}

/// First-start semantics: the first filtered point that lies in a
/// window and heads a contiguous run of `k` samples.
fn find_naive_case(
    filtered: &[ForecastPoint],
    windows: &[TimeRange],
    period: Duration,
    k: usize,
) -> Option<RollupPoint> {
    if k == 0 || filtered.len() < k {
        return None;
    }
    let expected_span = period * (k as i32 - 1);
    for i in 0..=(filtered.len() - k) {
        let start = filtered[i].point_time;
        if !windows.iter().any(|win| win.contains(start)) {
            continue;
        }
        if filtered[i + k - 1].point_time - start != expected_span {
            continue;
        }
        let sum: f64 = filtered[i..i + k].iter().map(|p| p.value).sum();
        return Some(RollupPoint {
            index: i,
            start,
            avg: sum / k as f64,
        });
    }
    None
}

fn earliest_candidate(candidates: &[RollupPoint]) -> RollupPoint {
    candidates
        .iter()
        .min_by_key(|rp| rp.start)
        .cloned()
        .unwrap_or_else(|| candidates[0].clone())
}

/// Percent saved by `ideal` against `reference`; 0 when the
/// reference is non-positive.
fn savings_pct(reference: f64, ideal: f64) -> f64 {
    if reference > 0.0 {
        (reference - ideal) / reference * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::forecast::ForecastMeta;
    use crate::forecast::ForecastSeries;
    use crate::forecast::MockForecastProvider;

    fn instant(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn hours(h: i64) -> i64 {
        h * 3600
    }

    fn series(start_secs: i64, period_secs: i64, values: &[f64]) -> ForecastSeries {
        ForecastSeries {
            data: values
                .iter()
                .enumerate()
                .map(|(i, &value)| ForecastPoint {
                    point_time: instant(start_secs + i as i64 * period_secs),
                    value,
                })
                .collect(),
            meta: ForecastMeta {
                region: "CAISO_NORTH".to_string(),
                data_point_period_seconds: period_secs,
                signal_type: SIGNAL_CO2_MOER.to_string(),
                generated_at: Some(instant(start_secs - hours(1))),
                units: None,
                warnings: None,
            },
        }
    }

    async fn schedule(
        forecast: ForecastSeries,
        windows: &[TimeRange],
        duration: &str,
        num_options: usize,
    ) -> Result<ScheduleResponse, Report<ScheduleError>> {
        let provider = MockForecastProvider::with_series(forecast);
        calculate_best_schedule(
            &provider,
            windows,
            duration,
            &[PowerZone::new("CAISO_NORTH")],
            &["gcp:us-west2".to_string()],
            num_options,
        )
        .await
    }

    fn window(start_secs: i64, end_secs: i64) -> TimeRange {
        TimeRange {
            start: instant(start_secs),
            end: instant(end_secs),
        }
    }

    #[tokio::test]
    async fn flat_forecast_prefers_earliest_start() {
        // S1: flat series, task equals period: ideal is the window
        // start and options are ordered by time.
        let forecast = series(0, 3600, &[1.0, 1.0, 1.0, 1.0]);
        let response = schedule(forecast, &[window(0, hours(4))], "PT1H", 3)
            .await
            .unwrap();

        assert_eq!(response.ideal.time, instant(0));
        assert_eq!(response.ideal.co2_intensity, 1.0);
        assert_eq!(response.ideal, response.options[0]);
        let times: Vec<_> = response.options.iter().map(|o| o.time).collect();
        assert_eq!(times, vec![instant(0), instant(3600), instant(7200)]);
    }

    #[tokio::test]
    async fn v_shaped_forecast_finds_the_dip() {
        // S2: the 50 at T+1h wins.
        let forecast = series(0, 3600, &[100.0, 50.0, 100.0, 100.0]);
        let response = schedule(forecast, &[window(0, hours(4))], "PT1H", 3)
            .await
            .unwrap();

        assert_eq!(response.ideal.time, instant(3600));
        assert_eq!(response.ideal.co2_intensity, 50.0);
    }

    #[tokio::test]
    async fn monotonic_descent_scales_with_duration() {
        // S3: [100, 50, 10, 0] hourly.
        let values = [100.0, 50.0, 10.0, 0.0];
        let windows = [window(0, hours(4))];

        let response = schedule(series(0, 3600, &values), &windows, "PT3H", 3)
            .await
            .unwrap();
        assert_eq!(response.ideal.time, instant(hours(1)));
        assert_eq!(response.ideal.co2_intensity, 20.0);

        let response = schedule(series(0, 3600, &values), &windows, "PT2H", 3)
            .await
            .unwrap();
        assert_eq!(response.ideal.time, instant(hours(2)));
        assert_eq!(response.ideal.co2_intensity, 5.0);

        let response = schedule(series(0, 3600, &values), &windows, "PT1H", 3)
            .await
            .unwrap();
        assert_eq!(response.ideal.time, instant(hours(3)));
        assert_eq!(response.ideal.co2_intensity, 0.0);

        // D < P: a single sample covers the task.
        let response = schedule(series(0, 3600, &values), &windows, "PT30M", 3)
            .await
            .unwrap();
        assert_eq!(response.ideal.time, instant(hours(3)));
        assert_eq!(response.ideal.co2_intensity, 0.0);
    }

    #[tokio::test]
    async fn ties_break_by_earliest_time() {
        // S5: two equal minima; the earlier one wins.
        let forecast = series(0, 300, &[50.0, 50.0, 100.0]);
        let response = schedule(forecast, &[window(0, 900)], "PT5M", 3)
            .await
            .unwrap();

        assert_eq!(response.options[0].time, instant(0));
        assert_eq!(response.options[1].time, instant(300));
        assert_eq!(response.ideal.co2_intensity, 50.0);
    }

    #[tokio::test]
    async fn naive_case_is_earliest_feasible_start() {
        // P6 plus the worst/median/savings contract on a known shape.
        let values = [500.0, 400.0, 600.0, 650.0, 700.0, 750.0, 800.0];
        let forecast = series(0, 300, &values);
        let response = schedule(forecast, &[window(0, 35 * 60)], "PT5M", 3)
            .await
            .unwrap();

        assert_eq!(response.naive_case.time, instant(0));
        assert_eq!(response.naive_case.co2_intensity, 500.0);
        assert_eq!(response.ideal.time, instant(300));
        assert_eq!(response.ideal.co2_intensity, 400.0);
        assert_eq!(response.worst_case.co2_intensity, 800.0);
        // 7 candidates sorted ascending: median is the 4th (650).
        assert_eq!(response.median_case.co2_intensity, 650.0);

        // P7: all savings non-negative, and exact on this shape.
        assert!((response.carbon_savings.vs_worst_case - 50.0).abs() < 1e-9);
        assert!((response.carbon_savings.vs_naive_case - 20.0).abs() < 1e-9);
        assert!(response.carbon_savings.vs_median_case > 0.0);
    }

    #[tokio::test]
    async fn ideal_is_minimal_over_every_candidate() {
        // P5 on an arbitrary series.
        let forecast = series(0, 300, &[9.0, 3.0, 7.0, 5.0, 4.0, 8.0]);
        let response = schedule(forecast, &[window(0, 1800)], "PT10M", 10)
            .await
            .unwrap();

        for option in &response.options {
            assert!(response.ideal.co2_intensity <= option.co2_intensity);
        }
        assert!(response.naive_case.time <= response.options.iter().map(|o| o.time).min().unwrap());
    }

    #[tokio::test]
    async fn sort_is_deterministic_for_equal_inputs() {
        // P4: same multiset of samples, same options byte for byte.
        let values = [70.0, 30.0, 30.0, 70.0, 50.0];
        let first = schedule(series(0, 300, &values), &[window(0, 1500)], "PT5M", 5)
            .await
            .unwrap();
        let second = schedule(series(0, 300, &values), &[window(0, 1500)], "PT5M", 5)
            .await
            .unwrap();

        assert_eq!(first.options, second.options);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn task_may_start_near_window_end() {
        // The window extension admits samples past the window end so
        // a start at the boundary still has full coverage.
        let forecast = series(0, 3600, &[100.0, 90.0, 10.0, 20.0]);
        // Window ends at T+2h; the start at exactly T+2h needs the
        // T+3h sample for a 2-hour task.
        let response = schedule(forecast, &[window(0, hours(2))], "PT2H", 3)
            .await
            .unwrap();

        assert_eq!(response.ideal.time, instant(hours(2)));
        assert_eq!(response.ideal.co2_intensity, 15.0);
    }

    #[tokio::test]
    async fn gaps_exclude_straddling_candidates() {
        // Hourly grid missing T+2h: a 2-hour task cannot start at
        // T+1h.
        let mut forecast = series(0, 3600, &[100.0, 10.0]);
        forecast.data.push(ForecastPoint {
            point_time: instant(hours(3)),
            value: 5.0,
        });
        forecast.data.push(ForecastPoint {
            point_time: instant(hours(4)),
            value: 5.0,
        });

        let response = schedule(forecast, &[window(0, hours(3))], "PT2H", 5)
            .await
            .unwrap();

        let starts: Vec<_> = response.options.iter().map(|o| o.time).collect();
        assert!(starts.contains(&instant(0)));
        assert!(starts.contains(&instant(hours(3))));
        assert!(!starts.contains(&instant(hours(1))), "straddles the gap");
        assert!(!starts.contains(&instant(hours(2))), "missing sample");
    }

    #[tokio::test]
    async fn empty_forecast_is_reported() {
        let forecast = series(0, 3600, &[]);
        let report = schedule(forecast, &[window(0, hours(4))], "PT1H", 3)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            ScheduleError::ForecastEmpty { .. }
        ));
    }

    #[tokio::test]
    async fn forecast_outside_windows_is_infeasible() {
        let forecast = series(hours(10), 3600, &[1.0, 1.0]);
        let report = schedule(forecast, &[window(0, hours(4))], "PT1H", 3)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            ScheduleError::NoFeasibleWindow
        ));
    }

    #[tokio::test]
    async fn invalid_period_is_reported() {
        let forecast = series(0, 0, &[1.0, 1.0]);
        let report = schedule(forecast, &[window(0, hours(4))], "PT1H", 3)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            ScheduleError::InvalidPeriod { seconds: 0 }
        ));
    }

    #[tokio::test]
    async fn malformed_duration_is_reported() {
        let forecast = series(0, 3600, &[1.0, 1.0]);
        let report = schedule(forecast, &[window(0, hours(4))], "banana", 3)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            ScheduleError::InvalidDuration { .. }
        ));
    }

    #[tokio::test]
    async fn provider_failure_maps_to_forecast_error() {
        let provider = MockForecastProvider::with_error(
            crate::forecast::ForecastError::ProviderUnavailable {
                message: "WattTime API unavailable".to_string(),
            },
        );
        let report = calculate_best_schedule(
            &provider,
            &[window(0, hours(4))],
            "PT1H",
            &[PowerZone::new("CAISO_NORTH")],
            &["gcp:us-west2".to_string()],
            3,
        )
        .await
        .unwrap_err();

        assert!(matches!(report.current_context(), ScheduleError::Forecast));
    }

    #[test]
    fn savings_guard_against_non_positive_reference() {
        assert_eq!(savings_pct(0.0, 0.0), 0.0);
        assert_eq!(savings_pct(-5.0, 1.0), 0.0);
        assert!((savings_pct(200.0, 100.0) - 50.0).abs() < 1e-9);
    }
}
