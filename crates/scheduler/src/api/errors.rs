//! API error mapping.

use core::error::Error;

use error_stack::Report;
use poem::http::StatusCode;

use crate::scheduling::ScheduleError;

/// Server-side failures of the API itself.
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Server error: {message}")]
    ServerError { message: String },
}

impl Error for ApiError {}

/// Map a scheduling failure to the HTTP response the caller sees:
/// request problems are 400s, planning and upstream failures 500s.
pub fn schedule_error_response(report: &Report<ScheduleError>) -> poem::Error {
    let context = report.current_context();
    let status = if context.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    poem::Error::from_string(context.to_string(), status)
}
