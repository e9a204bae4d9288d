//! WattTime v3 API client.
//!
//! Authenticates with basic credentials against `/login`, caches the
//! returned bearer token, and fetches `/v3/forecast` series. Token
//! access follows a read/write discipline: forecast calls share the
//! token under a read lock; refresh takes the write lock and
//! re-checks the token after acquiring it, so concurrent first
//! callers cannot stampede the login endpoint.

use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

use super::ForecastError;
use super::ForecastProvider;
use super::ForecastSeries;
use crate::zones::PowerZone;

const DEFAULT_BASE_URL: &str = "https://api.watttime.org";
const LOGIN_PATH: &str = "/login";
const FORECAST_PATH: &str = "/v3/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Client for the WattTime forecast API.
pub struct WattTimeProvider {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl WattTimeProvider {
    /// Create a client against the production API endpoint.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Report<ForecastError>> {
        Self::with_base_url(username, password, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, Report<ForecastError>> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(Report::new(ForecastError::AuthFailed {
                message: "WATTIME_USERNAME and WATTIME_PASSWORD must be set".to_string(),
            }));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .change_context(ForecastError::ProviderUnavailable {
                message: "failed to create HTTP client".to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            username,
            password,
            token: RwLock::new(None),
        })
    }

    /// Fetch an API token using basic authentication.
    ///
    /// A waiter that acquires the write lock and finds a token left
    /// by another caller does not refresh again.
    async fn login(&self) -> Result<(), Report<ForecastError>> {
        let mut guard = self.token.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let login_url = format!("{}{}", self.base_url, LOGIN_PATH);
        let response = self
            .http
            .get(&login_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .change_context(ForecastError::ProviderUnavailable {
                message: "login request failed".to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Report::new(ForecastError::AuthFailed {
                message: format!("login failed with status {status}: {body}"),
            }));
        }

        let login: LoginResponse =
            response
                .json()
                .await
                .change_context(ForecastError::Malformed {
                    message: "could not decode login response".to_string(),
                })?;
        if login.token.is_empty() {
            return Err(Report::new(ForecastError::AuthFailed {
                message: "login succeeded but token is empty".to_string(),
            }));
        }

        info!("Obtained WattTime token");
        *guard = Some(login.token);
        Ok(())
    }

    async fn current_token(&self) -> Result<String, Report<ForecastError>> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| {
                Report::new(ForecastError::AuthFailed {
                    message: "token missing after login".to_string(),
                })
            })
    }

    async fn forecast_request(
        &self,
        token: &str,
        zone: &PowerZone,
        signal_type: &str,
    ) -> Result<reqwest::Response, Report<ForecastError>> {
        let forecast_url = format!("{}{}", self.base_url, FORECAST_PATH);
        self.http
            .get(&forecast_url)
            .query(&[("region", zone.as_str()), ("signal_type", signal_type)])
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .change_context(ForecastError::ProviderUnavailable {
                message: "forecast request failed".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl ForecastProvider for WattTimeProvider {
    async fn get_forecast(
        &self,
        zone: &PowerZone,
        signal_type: &str,
    ) -> Result<ForecastSeries, Report<ForecastError>> {
        let token = self.current_token().await?;
        let mut response = self.forecast_request(&token, zone, signal_type).await?;

        // Token may have expired; invalidate, re-login and retry once.
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!(zone = %zone, "WattTime token rejected, re-authenticating");
            *self.token.write().await = None;
            self.login().await?;
            let token = self.current_token().await?;
            response = self.forecast_request(&token, zone, signal_type).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ForecastError::AuthFailed {
                    message: format!("forecast request rejected after retry: {body}"),
                },
                StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => ForecastError::UnknownZone {
                    zone: zone.as_str().to_string(),
                },
                _ => ForecastError::ProviderUnavailable {
                    message: format!("forecast request failed with status {status}: {body}"),
                },
            };
            return Err(Report::new(error));
        }

        let series: ForecastSeries =
            response
                .json()
                .await
                .change_context(ForecastError::Malformed {
                    message: "could not decode forecast response".to_string(),
                })?;

        if series.meta.region != zone.as_str() {
            warn!(
                requested = %zone,
                received = %series.meta.region,
                "forecast response region does not match requested zone"
            );
        }

        Ok(series)
    }
}
