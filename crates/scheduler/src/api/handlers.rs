//! Request handlers for the scheduling API.

use std::sync::Arc;

use api_types::ScheduleRequest;
use api_types::ScheduleResponse;
use error_stack::Report;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Json;
use poem::Body;
use poem::Response;
use tracing::info;
use tracing::warn;

use super::errors::schedule_error_response;
use super::AppState;
use crate::scheduling::calculate_best_schedule;
use crate::scheduling::ScheduleError;
use crate::zones::PowerZone;

const DEFAULT_NUM_OPTIONS: usize = 3;
const MIN_NUM_OPTIONS: usize = 2;
const MAX_NUM_OPTIONS: usize = 10;

/// Core logic for a schedule request: validate, then plan.
async fn schedule_impl(
    state: &AppState,
    request: ScheduleRequest,
) -> Result<ScheduleResponse, Report<ScheduleError>> {
    if request.windows.is_empty() {
        return Err(Report::new(ScheduleError::MissingField { field: "windows" }));
    }
    if request.windows.iter().any(|win| win.start > win.end) {
        return Err(Report::new(ScheduleError::InvalidWindow));
    }
    if request.duration.trim().is_empty() {
        return Err(Report::new(ScheduleError::MissingField {
            field: "duration",
        }));
    }
    if request.zones.is_empty() {
        return Err(Report::new(ScheduleError::MissingField { field: "zones" }));
    }

    let mut power_zones: Vec<PowerZone> = Vec::with_capacity(request.zones.len());
    for zone in &request.zones {
        match state.zones.get_power_zone(zone) {
            Some(power_zone) => power_zones.push(power_zone),
            None => {
                return Err(Report::new(ScheduleError::UnknownZone { zone: zone.clone() }));
            }
        }
    }
    if power_zones.len() > 1 {
        return Err(Report::new(ScheduleError::MultiZoneUnsupported));
    }

    let num_options = match request.num_options {
        None => DEFAULT_NUM_OPTIONS,
        Some(n) if (MIN_NUM_OPTIONS..=MAX_NUM_OPTIONS).contains(&n) => n,
        Some(got) => return Err(Report::new(ScheduleError::InvalidNumOptions { got })),
    };

    calculate_best_schedule(
        state.provider.as_ref(),
        &request.windows,
        &request.duration,
        &power_zones,
        &request.zones,
        num_options,
    )
    .await
}

/// `POST /v0/schedule/`: compute the carbon-optimal schedule.
#[handler]
pub async fn schedule(
    state: Data<&Arc<AppState>>,
    body: Body,
) -> poem::Result<Json<ScheduleResponse>> {
    state.metrics.record_request();

    let bytes = body
        .into_bytes()
        .await
        .map_err(|e| poem::Error::from_string(format!("Bad Request: {e}"), StatusCode::BAD_REQUEST))?;
    let request: ScheduleRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            warn!("failed to decode schedule request: {e}");
            state.metrics.record_validation_failure();
            return Err(poem::Error::from_string(
                "Bad Request",
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    match schedule_impl(&state, request).await {
        Ok(response) => {
            info!(
                ideal_time = %response.ideal.time,
                ideal_co2 = response.ideal.co2_intensity,
                "schedule computed"
            );
            Ok(Json(response))
        }
        Err(report) => {
            if report.current_context().is_validation() {
                state.metrics.record_validation_failure();
                info!("schedule request rejected: {report:?}");
            } else {
                state.metrics.record_planning_failure();
                warn!("schedule computation failed: {report:?}");
            }
            Err(schedule_error_response(&report))
        }
    }
}

/// `GET /health`
#[handler]
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /metrics`: Prometheus text exposition.
#[handler]
pub async fn get_metrics(state: Data<&Arc<AppState>>) -> Response {
    Response::builder()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.render())
}
