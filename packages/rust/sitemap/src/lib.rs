//! Sitemap retrieval and reading.
//!
//! This crate provides the two building blocks every crawl phase consumes:
//! - [`Fetcher`]: retrieves one document with retry, exponential backoff and
//!   cancellation, on top of a pluggable [`Transport`] ([`HttpTransport`] by default)
//! - [`read_sitemap`]: parses a document and classifies it as a sitemap
//!   index or a leaf sitemap listing pages

mod fetcher;
mod parser;
mod transport;

pub use fetcher::{Fetcher, RetryPolicy};
pub use parser::{SitemapDocument, XmlElement, classify, parse_document, read_sitemap};
pub use transport::{HttpTransport, Transport};

use sitemapper_shared::Result;
use tokio_util::sync::CancellationToken;

/// Fetch `url` and read it as a sitemap document.
pub async fn fetch_sitemap<T: Transport>(
    fetcher: &Fetcher<T>,
    url: &str,
    cancel: &CancellationToken,
) -> Result<SitemapDocument> {
    let body = fetcher.fetch(url, cancel).await?;
    read_sitemap(&body)
}
