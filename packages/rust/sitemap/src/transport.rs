//! Network transport: the single "retrieve document by URL" primitive the
//! fetcher retries around.

use std::future::Future;

use reqwest::Client;
use sitemapper_shared::{CrawlConfig, Result, SitemapperError};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// User-Agent string for sitemap requests.
const USER_AGENT: &str = concat!("sitemapper/", env!("CARGO_PKG_VERSION"));

/// Retrieves a document body by URL.
///
/// Implementations report transport failures as
/// [`SitemapperError::Network`], non-success responses as
/// [`SitemapperError::Status`], and must resolve to
/// [`SitemapperError::Cancelled`] promptly once `cancel` fires.
pub trait Transport: Send + Sync + 'static {
    fn retrieve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Direct HTTP(S) transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_response_bytes: u64,
}

impl HttpTransport {
    /// Build a client with the redirect, timeout and size limits from `config`.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SitemapperError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    async fn get(&self, url: &str) -> Result<String> {
        trace!(%url, "GET");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_builder() {
                // Unusable URL; retrying cannot help.
                SitemapperError::client(url, e.to_string())
            } else {
                SitemapperError::Network(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitemapperError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(self.too_large(url, len));
            }
        }

        // Chunked responses carry no content-length, so the ceiling is
        // enforced while streaming.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SitemapperError::Network(format!("{url}: failed to read body: {e}")))?
        {
            let len = (body.len() + chunk.len()) as u64;
            if len > self.max_response_bytes {
                return Err(self.too_large(url, len));
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body)
            .map_err(|e| SitemapperError::parse(format!("{url}: body is not UTF-8: {e}")))
    }

    fn too_large(&self, url: &str, len: u64) -> SitemapperError {
        SitemapperError::client(
            url,
            format!(
                "response too large ({len} bytes, max {})",
                self.max_response_bytes
            ),
        )
    }
}

impl Transport for HttpTransport {
    async fn retrieve(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SitemapperError::Cancelled),
            result = self.get(url) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn transport() -> HttpTransport {
        HttpTransport::new(&CrawlConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn retrieve_returns_body() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .and(wiremock::matchers::header_exists("user-agent"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<urlset/>"))
            .mount(&server)
            .await;

        let url = format!("{}/sitemap.xml", server.uri());
        let body = transport()
            .retrieve(&url, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "<urlset/>");
    }

    #[tokio::test]
    async fn non_success_becomes_status_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/gone.xml"))
            .respond_with(wiremock::ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let url = format!("{}/gone.xml", server.uri());
        let err = transport()
            .retrieve(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SitemapperError::Status { status: 410, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn oversized_body_is_client_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/huge.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let config = CrawlConfig {
            max_response_bytes: 16,
            ..CrawlConfig::default()
        };
        let url = format!("{}/huge.xml", server.uri());
        let err = HttpTransport::new(&config)
            .unwrap()
            .retrieve(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SitemapperError::Client { .. }));
    }

    #[tokio::test]
    async fn oversized_chunked_body_stops_early() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Streams chunks without a content-length and never finishes the body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            for _ in 0..4 {
                if socket.write_all(b"a\r\nxxxxxxxxxx\r\n").await.is_err() {
                    return;
                }
                socket.flush().await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = CrawlConfig {
            max_response_bytes: 16,
            ..CrawlConfig::default()
        };
        let url = format!("http://{addr}/chunked.xml");
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            HttpTransport::new(&config)
                .unwrap()
                .retrieve(&url, &CancellationToken::new()),
        )
        .await
        .expect("ceiling not enforced while streaming")
        .unwrap_err();

        match err {
            SitemapperError::Client { reason, .. } => assert!(reason.contains("too large")),
            other => panic!("expected Client, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_slow_response() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/slow.xml"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<urlset/>")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let url = format!("{}/slow.xml", server.uri());
        let err = transport().retrieve(&url, &cancel).await.unwrap_err();
        assert!(matches!(err, SitemapperError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_url_is_client_error() {
        let err = transport()
            .retrieve("not a url", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SitemapperError::Client { .. }));
    }
}
