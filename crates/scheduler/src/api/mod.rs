//! HTTP boundary of the scheduling service.

use std::sync::Arc;

use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::post;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio::sync::oneshot;
use tracing::error;
use tracing::info;

mod errors;
mod handlers;

pub use errors::ApiError;

use crate::forecast::ForecastProvider;
use crate::metrics::Metrics;
use crate::zones::ZoneLookup;

/// Dependencies shared by the request handlers.
pub struct AppState {
    pub provider: Arc<dyn ForecastProvider>,
    pub zones: Arc<dyn ZoneLookup>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(provider: Arc<dyn ForecastProvider>, zones: Arc<dyn ZoneLookup>) -> Self {
        Self {
            provider,
            zones,
            metrics: Metrics::new(),
        }
    }
}

/// Build the route table.
///
/// `/v0/schedule/` is the canonical endpoint; `/api/schedule` is kept
/// for callers of the earlier deployment. Unmatched paths 404 and
/// wrong methods on matched paths 405 via the method router.
pub fn build_app(state: Arc<AppState>) -> impl Endpoint {
    Route::new()
        .at("/v0/schedule/", post(handlers::schedule))
        .at("/api/schedule", post(handlers::schedule))
        .at("/health", get(handlers::health))
        .at("/metrics", get(handlers::get_metrics))
        .data(state)
        .with(Tracing)
}

/// HTTP server for the scheduling API.
pub struct ApiServer {
    state: Arc<AppState>,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Serve schedule requests until the listener fails or
    /// `shutdown_rx` fires.
    pub async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<(), Report<ApiError>> {
        let listen_addr = self.listen_addr;
        info!(%listen_addr, "Scheduling API accepting schedule requests");

        let app = build_app(self.state);
        let server = Server::new(TcpListener::bind(&listen_addr));

        tokio::select! {
            result = server.run(app) => {
                result.map_err(|e| {
                    error!(%listen_addr, "scheduling API listener failed: {e}");
                    Report::new(ApiError::ServerError {
                        message: format!("listener on {listen_addr} failed: {e}"),
                    })
                })?;
                info!("Scheduling API listener closed, no further schedule requests will be served");
                Ok(())
            }
            _ = &mut shutdown_rx => {
                info!("Shutdown requested, stopping the scheduling API");
                Ok(())
            }
        }
    }
}
