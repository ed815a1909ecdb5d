//! Error types for sitemapper.
//!
//! Library crates use [`SitemapperError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Resource-level failures ([`Client`](SitemapperError::Client),
//! [`ExhaustedRetries`](SitemapperError::ExhaustedRetries),
//! [`Parse`](SitemapperError::Parse)) are caught by the crawl phases and turn
//! into "this sitemap contributes nothing". Only the fatal variants
//! ([`Timeout`](SitemapperError::Timeout), [`Cancelled`](SitemapperError::Cancelled))
//! escape a crawl.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all sitemapper operations.
#[derive(Debug, thiserror::Error)]
pub enum SitemapperError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, DNS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Non-retryable failure for a single resource (4xx, oversized body, ...).
    #[error("client error for {url}: {reason}")]
    Client { url: String, reason: String },

    /// Every attempt allowed by the retry policy failed.
    #[error("gave up on {url} after {attempts} attempts: {source}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        #[source]
        source: Box<SitemapperError>,
    },

    /// Malformed sitemap document.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The global crawl deadline elapsed.
    #[error("crawl timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The crawl was cancelled by its caller.
    #[error("crawl cancelled")]
    Cancelled,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (bad root URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitemapperError>;

impl SitemapperError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a non-retryable client error for `url`.
    pub fn client(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Client {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt at the same request could succeed.
    ///
    /// Transport failures and 5xx statuses are retryable; 4xx statuses and
    /// everything else are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Whether this error must abort the whole crawl.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SitemapperError::config("bad concurrency");
        assert_eq!(err.to_string(), "config error: bad concurrency");

        let err = SitemapperError::Status {
            url: "https://x.com/sitemap.xml".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://x.com/sitemap.xml: HTTP 503");
    }

    #[test]
    fn retryable_classification() {
        assert!(SitemapperError::Network("connection reset".into()).is_retryable());
        assert!(
            SitemapperError::Status {
                url: "u".into(),
                status: 500
            }
            .is_retryable()
        );
        assert!(
            !SitemapperError::Status {
                url: "u".into(),
                status: 404
            }
            .is_retryable()
        );
        assert!(!SitemapperError::parse("eof").is_retryable());
        assert!(!SitemapperError::Cancelled.is_retryable());
    }

    #[test]
    fn only_timeout_and_cancel_are_fatal() {
        assert!(SitemapperError::Cancelled.is_fatal());
        assert!(
            SitemapperError::Timeout {
                elapsed: Duration::from_secs(1)
            }
            .is_fatal()
        );
        assert!(!SitemapperError::client("u", "HTTP 404").is_fatal());
        assert!(!SitemapperError::parse("bad").is_fatal());
    }

    #[test]
    fn exhausted_retries_keeps_source() {
        let err = SitemapperError::ExhaustedRetries {
            url: "https://x.com/a.xml".into(),
            attempts: 3,
            source: Box::new(SitemapperError::Network("timed out".into())),
        };
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "network error: timed out");
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
