//! The three crawl phases and the context they share.
//!
//! - [`discovery`]: sequential BFS over the sitemap-index tree
//! - [`counting`]: pooled pass estimating the page total
//! - [`extraction`]: pooled pass collecting deduplicated entries

pub(crate) mod counting;
pub(crate) mod discovery;
pub(crate) mod extraction;

use std::sync::Arc;

use sitemapper_shared::{CrawlPhase, Result, SitemapperError};
use sitemapper_sitemap::{Fetcher, SitemapDocument, Transport, fetch_sitemap};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::progress::ProgressReporter;

/// A sitemap that contributed nothing because it failed to fetch or parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResource {
    /// Phase in which the failure happened.
    pub phase: CrawlPhase,
    /// Sitemap URL.
    pub url: String,
    /// Rendered error.
    pub error: String,
}

/// Everything a phase needs: the fetcher, the crawl's cancellation token,
/// the progress sink and the shared failure log.
pub(crate) struct PhaseContext<T> {
    pub(crate) fetcher: Arc<Fetcher<T>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) progress: Arc<dyn ProgressReporter>,
    pub(crate) failures: Arc<Mutex<Vec<FailedResource>>>,
    pub(crate) concurrency: usize,
}

// Manual impl: `T` itself need not be `Clone`.
impl<T> Clone for PhaseContext<T> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            cancel: self.cancel.clone(),
            progress: Arc::clone(&self.progress),
            failures: Arc::clone(&self.failures),
            concurrency: self.concurrency,
        }
    }
}

impl<T: Transport> PhaseContext<T> {
    /// Fail with [`SitemapperError::Cancelled`] once the crawl is cancelled.
    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SitemapperError::Cancelled);
        }
        Ok(())
    }

    /// Fetch and read one sitemap.
    ///
    /// Resource-level failures are logged, recorded and turned into `None`;
    /// only fatal errors (cancellation) are returned.
    pub(crate) async fn read(&self, phase: CrawlPhase, url: &str) -> Result<Option<SitemapDocument>> {
        match fetch_sitemap(&self.fetcher, url, &self.cancel).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(%phase, %url, error = %e, "skipping sitemap");
                self.failures.lock().await.push(FailedResource {
                    phase,
                    url: url.to_string(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }
}
