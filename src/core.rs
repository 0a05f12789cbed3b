use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use std::sync::Arc;
use std::time::Duration;

use super::config::{EdinetConfig, RetryPolicy};
use super::error::{EdinetError, Result};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Sleeper, TokioSleeper, Transport};

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Query parameter carrying the subscription key.
const SUBSCRIPTION_KEY_PARAM: &str = "Subscription-Key";

#[derive(Debug, Clone)]
pub struct Edinet {
    /// Sends individual attempts
    pub(crate) transport: Arc<dyn Transport>,

    /// Performs backoff waits
    pub(crate) sleeper: Arc<dyn Sleeper>,

    /// Pacing limiter shared by every call made through this client
    pub(crate) rate_limiter: Arc<Governor>,

    /// Retry and backoff settings
    pub(crate) retry: RetryPolicy,

    /// Subscription key, appended to every request
    api_key: String,

    /// Base URL of the document API
    pub(crate) base_url: String,
}

/// HTTP client for the EDINET document API with built-in pacing and retry logic.
///
/// `Edinet` is the only component that performs network calls. The catalog fetcher
/// ([`CatalogOperations`](crate::CatalogOperations)) and the downloader
/// ([`DocumentOperations`](crate::DocumentOperations)) are implemented on top of
/// [`Edinet::call`].
///
/// # Pacing
///
/// The configured `requests_per_second` becomes a token bucket with room for one
/// request, refilled every `1 / requests_per_second` seconds:
///
/// ```text
/// ─┬──────────┬──────────┬──────────┬─▶ time
///  │ request  │ request  │ request  │
///  └── 1/rps ─┴── 1/rps ─┴── 1/rps ─┘
/// ```
///
/// A call that arrives before its slot waits for it; pacing never turns into an error.
/// Retries go through the same limiter.
///
/// # Retries
///
/// HTTP 429, 5xx and transport failures are retried up to `max_retry_attempts` times
/// with exponential backoff (`base × 2^retry`, capped). 401/403 and 404 are returned
/// immediately.
///
/// # Examples
///
/// ```rust
/// # use edinetkit::Edinet;
/// let edinet = Edinet::new("my-subscription-key")?;
/// # Ok::<(), edinetkit::EdinetError>(())
/// ```
impl Edinet {
    /// Creates a client with the default base URL, one request per second, and the
    /// default retry policy.
    pub fn new(api_key: &str) -> Result<Self> {
        let today = chrono::Local::now().date_naive();
        Self::with_config(&EdinetConfig::new(api_key, today, today))
    }

    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `EdinetError::ConfigError` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn with_config(config: &EdinetConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Self::with_transport(config, Arc::new(transport), Arc::new(TokioSleeper))
    }

    /// Creates a client with a custom transport and sleeper.
    ///
    /// Useful for pointing the client at a mock service or recording backoff waits.
    pub fn with_transport(
        config: &EdinetConfig,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        config.validate()?;

        let period = Duration::try_from_secs_f64(1.0 / config.requests_per_second).map_err(|_| {
            EdinetError::ConfigError(format!(
                "Request rate {} is too low to pace",
                config.requests_per_second
            ))
        })?;
        let quota = Quota::with_period(period).ok_or_else(|| {
            EdinetError::ConfigError(format!(
                "Request rate {} is too high to pace",
                config.requests_per_second
            ))
        })?;

        Ok(Edinet {
            transport,
            sleeper,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            retry: config.retry.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Performs one logical call: pacing, the attempt, and retries.
    ///
    /// The subscription key is appended here so callers and logs never see it.
    ///
    /// # Errors
    ///
    /// * `EdinetError::AuthError` - HTTP 401/403, not retried
    /// * `EdinetError::NotFound` - HTTP 404, not retried
    /// * `EdinetError::RateLimitExceeded` - still 429 after the last retry
    /// * `EdinetError::TransientNetworkError` - still 5xx or unreachable after the last retry
    /// * `EdinetError::InvalidResponse` - any other status
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let signed = request
            .clone()
            .with_query(SUBSCRIPTION_KEY_PARAM, self.api_key.clone());
        let max_attempts = self.retry.max_retry_attempts + 1;
        let mut retries = 0;

        loop {
            self.rate_limiter.until_ready().await;
            let attempt = retries + 1;

            let wait = match self.transport.send(&self.base_url, &signed).await {
                Ok(response) => match response.status {
                    200..=299 => {
                        tracing::debug!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = response.status,
                            outcome = "ok",
                            "request succeeded"
                        );
                        return Ok(response);
                    }
                    401 | 403 => {
                        tracing::error!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = response.status,
                            outcome = "auth_error",
                            "request rejected"
                        );
                        return Err(EdinetError::AuthError {
                            status: response.status,
                            message: response.preview(),
                        });
                    }
                    404 => {
                        tracing::warn!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = 404,
                            outcome = "not_found",
                            "resource not found"
                        );
                        return Err(EdinetError::NotFound(request.path.clone()));
                    }
                    429 => {
                        if retries >= self.retry.max_retry_attempts {
                            tracing::error!(
                                method = %request.method,
                                path = %request.path,
                                attempt,
                                status = 429,
                                outcome = "rate_limited",
                                "giving up after {} attempts",
                                max_attempts
                            );
                            return Err(EdinetError::RateLimitExceeded { attempts: attempt });
                        }
                        let wait = response
                            .retry_after
                            .map(|d| d.min(self.retry.backoff_max))
                            .unwrap_or_else(|| self.retry.backoff(retries));
                        tracing::warn!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = 429,
                            outcome = "retry",
                            "rate limit hit. Attempt {}/{}. Waiting for {:?} before retry.",
                            attempt,
                            max_attempts,
                            wait
                        );
                        wait
                    }
                    500..=599 => {
                        if retries >= self.retry.max_retry_attempts {
                            tracing::error!(
                                method = %request.method,
                                path = %request.path,
                                attempt,
                                status = response.status,
                                outcome = "server_error",
                                "giving up after {} attempts",
                                max_attempts
                            );
                            return Err(EdinetError::TransientNetworkError {
                                attempts: attempt,
                                message: format!(
                                    "status {}: {}",
                                    response.status,
                                    response.preview()
                                ),
                            });
                        }
                        let wait = self.retry.backoff(retries);
                        tracing::warn!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = response.status,
                            outcome = "retry",
                            "server error. Attempt {}/{}. Retrying in {:?}.",
                            attempt,
                            max_attempts,
                            wait
                        );
                        wait
                    }
                    other => {
                        tracing::error!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            status = other,
                            outcome = "invalid_response",
                            "unexpected status"
                        );
                        return Err(EdinetError::InvalidResponse(format!(
                            "Unexpected status code: {} for {}. Response preview: {}",
                            other,
                            request.path,
                            response.preview()
                        )));
                    }
                },
                Err(e) => {
                    if retries >= self.retry.max_retry_attempts {
                        tracing::error!(
                            method = %request.method,
                            path = %request.path,
                            attempt,
                            outcome = "network_error",
                            "giving up after {} attempts: {}",
                            max_attempts,
                            e
                        );
                        return Err(EdinetError::TransientNetworkError {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let wait = self.retry.backoff(retries);
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        attempt,
                        outcome = "retry",
                        "request failed: {}. Attempt {}/{}. Retrying in {:?}.",
                        e,
                        attempt,
                        max_attempts,
                        wait
                    );
                    wait
                }
            };

            self.sleeper.sleep(wait).await;
            retries += 1;
        }
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
