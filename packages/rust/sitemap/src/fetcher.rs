//! Resilient fetcher: one logical "retrieve document" with retry, exponential
//! backoff and cancellation.

use std::time::Duration;

use sitemapper_shared::{CrawlConfig, Result, SitemapperError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::transport::{HttpTransport, Transport};

/// Default number of attempts per resource.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How often and how patiently a single resource is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl From<&CrawlConfig> for RetryPolicy {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_retry_delay,
        }
    }
}

impl RetryPolicy {
    /// Total attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff after the failed attempt with zero-based index `attempt_index`:
    /// `initial_delay * 2^attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Retrieves documents through a [`Transport`], retrying retryable failures.
///
/// Outcomes:
/// - `Ok(body)` as soon as one attempt succeeds
/// - [`SitemapperError::Client`] immediately for non-retryable failures (4xx, ...)
/// - [`SitemapperError::ExhaustedRetries`] once the retry budget is spent,
///   carrying the last underlying error
/// - [`SitemapperError::Cancelled`] as soon as the token fires, even mid-backoff
#[derive(Debug)]
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl Fetcher<HttpTransport> {
    /// HTTP fetcher configured from `config`.
    pub fn from_config(config: &CrawlConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(config)?, RetryPolicy::from(config)))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `url`, retrying transport failures and 5xx responses.
    #[instrument(level = "debug", skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let attempts = self.policy.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(SitemapperError::Cancelled);
            }

            match self.transport.retrieve(url, cancel).await {
                Ok(body) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if !e.is_retryable() => return Err(into_client_error(url, e)),
                Err(e) => {
                    debug!(attempt = attempt + 1, attempts, error = %e, "retryable failure");

                    // No backoff after the final attempt.
                    if attempt + 1 < attempts {
                        let delay = self.policy.delay_for(attempt);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(SitemapperError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(SitemapperError::ExhaustedRetries {
            url: url.to_string(),
            attempts,
            source: Box::new(
                last_error.unwrap_or_else(|| SitemapperError::Network("no attempt made".into())),
            ),
        })
    }
}

/// Normalize a non-retryable failure into [`SitemapperError::Client`].
fn into_client_error(url: &str, err: SitemapperError) -> SitemapperError {
    match err {
        SitemapperError::Client { .. } => err,
        SitemapperError::Status { status, .. } => SitemapperError::client(url, format!("HTTP {status}")),
        other => SitemapperError::client(url, other.to_string()),
    }
}
