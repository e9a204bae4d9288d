//! Shared scheduling API type definitions
//!
//! This crate contains the wire types exchanged between the
//! carbon-aware scheduling service and its clients: time windows,
//! schedule requests, schedule options with carbon intensities, and
//! the savings summary. It also provides the task-duration parsing
//! and formatting helpers both sides agree on.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub mod duration;

pub use duration::format_iso8601;
pub use duration::parse_duration;
pub use duration::DurationParseError;

/// A time window with inclusive start and end instants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start (RFC 3339)
    pub start: DateTime<Utc>,
    /// Window end (RFC 3339); must not precede `start`
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Whether `instant` lies inside the window, bounds included.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Request body for the schedule endpoint.
///
/// Unknown fields are rejected so that client typos surface as 400s
/// instead of being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleRequest {
    /// Candidate windows the task may start in
    pub windows: Vec<TimeRange>,
    /// Task duration, ISO-8601 (`PT1H30M`) or compact (`1h30m`)
    pub duration: String,
    /// Cloud region identifiers (`provider:name`); exactly one is supported
    pub zones: Vec<String>,
    /// Number of options to return, 2..=10 (default 3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_options: Option<usize>,
}

/// A candidate start time with its forecast mean carbon intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOption {
    /// Proposed task start
    pub time: DateTime<Utc>,
    /// The requested zone identifier, echoed for legibility
    pub zone: String,
    /// Mean carbon intensity over the task duration (gCO2eq/kWh)
    pub co2_intensity: f64,
}

/// Percentage savings of the ideal option against each baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonSavings {
    /// Saved vs the highest-intensity candidate
    pub vs_worst_case: f64,
    /// Saved vs starting at the earliest feasible time
    pub vs_naive_case: f64,
    /// Saved vs the median candidate
    pub vs_median_case: f64,
}

/// Response body for the schedule endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    /// The carbon-optimal option; always equals `options[0]`
    pub ideal: ScheduleOption,
    /// Candidates sorted by (intensity asc, time asc)
    pub options: Vec<ScheduleOption>,
    /// The highest-intensity candidate
    pub worst_case: ScheduleOption,
    /// The earliest feasible start ("just run now")
    pub naive_case: ScheduleOption,
    /// The middle candidate of the intensity sort
    pub median_case: ScheduleOption,
    /// Savings of `ideal` against the baselines
    pub carbon_savings: CarbonSavings,
}
