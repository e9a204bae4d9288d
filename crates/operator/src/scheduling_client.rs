//! Client for the carbon-aware scheduling service.
//!
//! Wraps the HTTP API with a single-window request shaped from the
//! workload's submission time and flex window. Task durations go out
//! in ISO-8601, the canonical client form.

use core::error::Error;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use api_types::format_iso8601;
use api_types::ScheduleRequest;
use api_types::ScheduleResponse;
use api_types::TimeRange;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use error_stack::Report;
use error_stack::ResultExt;

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Failures talking to the scheduling service.
#[derive(Debug, Clone, derive_more::Display)]
pub enum SchedulingClientError {
    /// The request could not be sent or timed out
    #[display("network error calling scheduling API: {message}")]
    Network { message: String },
    /// The service answered with a non-200 status
    #[display("scheduling API returned unexpected status code: {status}")]
    Status { status: u16 },
    /// The response body could not be decoded
    #[display("scheduling API returned a malformed body: {message}")]
    MalformedBody { message: String },
}

impl Error for SchedulingClientError {}

/// Computes the optimal start time for a deferred workload.
#[async_trait::async_trait]
pub trait SchedulingClient: Send + Sync {
    /// Plan the window `[submission, submission + max_delay]` for a
    /// task of `job_duration` running in `location`.
    async fn get_optimal_schedule(
        &self,
        submission_time: DateTime<Utc>,
        max_delay: Duration,
        job_duration: Duration,
        location: &str,
    ) -> Result<ScheduleResponse, Report<SchedulingClientError>>;
}

/// Build the request body sent to the scheduling service.
pub fn build_schedule_request(
    submission_time: DateTime<Utc>,
    max_delay: Duration,
    job_duration: Duration,
    location: &str,
) -> ScheduleRequest {
    ScheduleRequest {
        windows: vec![TimeRange {
            start: submission_time,
            end: submission_time + max_delay,
        }],
        duration: format_iso8601(job_duration.to_std().unwrap_or_default()),
        zones: vec![location.to_string()],
        num_options: None,
    }
}

/// HTTP implementation against a deployed scheduling service.
pub struct HttpSchedulingClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSchedulingClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Report<SchedulingClientError>> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .change_context(SchedulingClientError::Network {
                message: "failed to create HTTP client".to_string(),
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait::async_trait]
impl SchedulingClient for HttpSchedulingClient {
    async fn get_optimal_schedule(
        &self,
        submission_time: DateTime<Utc>,
        max_delay: Duration,
        job_duration: Duration,
        location: &str,
    ) -> Result<ScheduleResponse, Report<SchedulingClientError>> {
        let request = build_schedule_request(submission_time, max_delay, job_duration, location);

        let response = self
            .http
            .post(format!("{}/v0/schedule/", self.base_url))
            .json(&request)
            .send()
            .await
            .change_context(SchedulingClientError::Network {
                message: "failed to send schedule request".to_string(),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Report::new(SchedulingClientError::Status {
                status: status.as_u16(),
            }));
        }

        response
            .json::<ScheduleResponse>()
            .await
            .change_context(SchedulingClientError::MalformedBody {
                message: "could not decode schedule response".to_string(),
            })
    }
}

/// One recorded call to the mock client.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedScheduleCall {
    pub submission_time: DateTime<Utc>,
    pub max_delay: Duration,
    pub job_duration: Duration,
    pub location: String,
}

/// Canned-answer client for controller tests; records every call.
#[derive(Debug, Default)]
pub struct MockSchedulingClient {
    response: Option<ScheduleResponse>,
    error: Option<SchedulingClientError>,
    calls: Mutex<Vec<RecordedScheduleCall>>,
}

impl MockSchedulingClient {
    pub fn with_response(response: ScheduleResponse) -> Self {
        Self {
            response: Some(response),
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_error(error: SchedulingClientError) -> Self {
        Self {
            response: None,
            error: Some(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedScheduleCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SchedulingClient for MockSchedulingClient {
    async fn get_optimal_schedule(
        &self,
        submission_time: DateTime<Utc>,
        max_delay: Duration,
        job_duration: Duration,
        location: &str,
    ) -> Result<ScheduleResponse, Report<SchedulingClientError>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedScheduleCall {
                submission_time,
                max_delay,
                job_duration,
                location: location.to_string(),
            });
        }

        if let Some(error) = &self.error {
            return Err(Report::new(error.clone()));
        }
        self.response.clone().ok_or_else(|| {
            Report::new(SchedulingClientError::Status { status: 500 })
        })
    }
}
