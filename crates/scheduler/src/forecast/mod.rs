//! Carbon-intensity forecast sources.
//!
//! A [`ForecastProvider`] turns a power zone into a time-indexed
//! series of forecast carbon intensities. The production provider
//! talks to the WattTime v3 API; a deterministic mock satisfies the
//! same contract for tests.

use core::error::Error;

use chrono::DateTime;
use chrono::Utc;
use error_stack::Report;
use serde::Deserialize;

use crate::zones::PowerZone;

mod mock;
mod watttime;

pub use mock::MockForecastProvider;
pub use watttime::WattTimeProvider;

/// The production marginal-emissions signal type.
pub const SIGNAL_CO2_MOER: &str = "co2_moer";

/// A single forecast data point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastPoint {
    /// Start of the period this value covers
    pub point_time: DateTime<Utc>,
    /// Forecast carbon intensity (gCO2eq/kWh); non-negative
    pub value: f64,
}

/// Metadata accompanying a forecast series.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastMeta {
    /// Power zone the forecast covers
    pub region: String,
    /// Spacing of the data points in seconds
    pub data_point_period_seconds: i64,
    /// Signal type, e.g. `co2_moer`
    #[serde(default)]
    pub signal_type: String,
    /// When the provider generated the forecast
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// A forecast series: metadata plus points in strictly increasing
/// time order on a grid of `data_point_period_seconds`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastSeries {
    pub data: Vec<ForecastPoint>,
    pub meta: ForecastMeta,
}

/// Failures surfaced by forecast providers.
#[derive(Debug, Clone, derive_more::Display)]
pub enum ForecastError {
    /// The provider could not be reached or returned a server error
    #[display("forecast provider unavailable: {message}")]
    ProviderUnavailable { message: String },
    /// Authentication failed, including after the single retry
    #[display("forecast provider authentication failed: {message}")]
    AuthFailed { message: String },
    /// The provider does not know the requested zone
    #[display("unknown forecast zone: {zone}")]
    UnknownZone { zone: String },
    /// The provider's response could not be interpreted
    #[display("malformed forecast response: {message}")]
    Malformed { message: String },
}

impl Error for ForecastError {}

/// A source of carbon-intensity forecast series.
#[async_trait::async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Fetch the provider's best current forecast for `zone`.
    async fn get_forecast(
        &self,
        zone: &PowerZone,
        signal_type: &str,
    ) -> Result<ForecastSeries, Report<ForecastError>>;
}
