//! Deterministic forecast provider for tests.

use error_stack::Report;

use super::ForecastError;
use super::ForecastProvider;
use super::ForecastSeries;
use crate::zones::PowerZone;

/// Returns a canned series or a canned error; never performs I/O.
#[derive(Debug, Default)]
pub struct MockForecastProvider {
    series: Option<ForecastSeries>,
    error: Option<ForecastError>,
}

impl MockForecastProvider {
    /// A provider that always returns `series`.
    pub fn with_series(series: ForecastSeries) -> Self {
        Self {
            series: Some(series),
            error: None,
        }
    }

    /// A provider that always fails with `error`.
    pub fn with_error(error: ForecastError) -> Self {
        Self {
            series: None,
            error: Some(error),
        }
    }
}

#[async_trait::async_trait]
impl ForecastProvider for MockForecastProvider {
    async fn get_forecast(
        &self,
        zone: &PowerZone,
        _signal_type: &str,
    ) -> Result<ForecastSeries, Report<ForecastError>> {
        if let Some(error) = &self.error {
            return Err(Report::new(error.clone()));
        }
        self.series.clone().ok_or_else(|| {
            Report::new(ForecastError::ProviderUnavailable {
                message: format!("mock has no series for zone {zone}"),
            })
        })
    }
}
