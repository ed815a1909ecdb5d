//! Sitemap crawl engine.
//!
//! Starting from a root sitemap URL, the crawler walks nested sitemap indexes
//! down to leaf sitemaps, optionally counts their pages, then extracts every
//! page entry with first-write-wins deduplication, all under one global
//! deadline and one cancellation token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sitemapper_shared::{CrawlConfig, Result, SitemapUrlEntry, SitemapperError};
use sitemapper_sitemap::{Fetcher, HttpTransport, RetryPolicy, Transport};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use crate::deadline::DeadlineGuard;
use crate::phases::{self, FailedResource, PhaseContext};
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// CrawlReport
// ---------------------------------------------------------------------------

/// Summary of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Unique page entries, sorted by URL.
    pub entries: Vec<SitemapUrlEntry>,
    /// Leaf sitemaps found during discovery, in discovery order.
    pub leaf_sitemaps: Vec<String>,
    /// Number of sitemap indexes traversed.
    pub index_sitemaps: usize,
    /// Page total from the counting phase, if it ran.
    pub estimated_pages: Option<usize>,
    /// Sitemaps skipped because they failed to fetch or parse.
    pub failures: Vec<FailedResource>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// SitemapCrawler
// ---------------------------------------------------------------------------

/// Crawls a sitemap tree with bounded concurrency and a global deadline.
pub struct SitemapCrawler<T: Transport = HttpTransport> {
    config: CrawlConfig,
    fetcher: Arc<Fetcher<T>>,
}

impl SitemapCrawler<HttpTransport> {
    /// Create a new HTTP crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config)?;
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
        })
    }
}

impl<T: Transport> SitemapCrawler<T> {
    /// Create a crawler that retrieves documents through `transport`.
    pub fn with_transport(config: CrawlConfig, transport: T) -> Self {
        let fetcher = Fetcher::new(transport, RetryPolicy::from(&config));
        Self {
            config,
            fetcher: Arc::new(fetcher),
        }
    }

    /// Crawl the sitemap tree rooted at `root`.
    pub async fn crawl(
        &self,
        root: &Url,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<CrawlReport> {
        self.crawl_with_cancel(root, progress, CancellationToken::new())
            .await
    }

    /// Crawl the sitemap tree rooted at `root`, aborting when `parent` is
    /// cancelled.
    ///
    /// Per-sitemap failures degrade the result but never fail the crawl.
    /// Fails with [`SitemapperError::Timeout`] when the configured deadline
    /// elapses and [`SitemapperError::Cancelled`] when `parent` fires; in both
    /// cases entries gathered so far are discarded.
    #[instrument(skip_all, fields(root = %root))]
    pub async fn crawl_with_cancel(
        &self,
        root: &Url,
        progress: Arc<dyn ProgressReporter>,
        parent: CancellationToken,
    ) -> Result<CrawlReport> {
        if !matches!(root.scheme(), "http" | "https") {
            return Err(SitemapperError::validation(format!(
                "sitemap URL must be http(s): {root}"
            )));
        }

        let start_time = Instant::now();
        let cancel = parent.child_token();
        // Disarmed on drop, whichever way this function returns.
        let deadline = DeadlineGuard::arm(self.config.timeout, cancel.clone());

        let ctx = PhaseContext {
            fetcher: Arc::clone(&self.fetcher),
            cancel,
            progress,
            failures: Arc::new(Mutex::new(Vec::new())),
            concurrency: self.config.concurrency,
        };

        info!(
            concurrency = self.config.concurrency,
            timeout_secs = self.config.timeout.as_secs(),
            max_attempts = self.fetcher.policy().attempts(),
            "starting crawl"
        );

        match self.run_phases(&ctx, root.as_str(), start_time).await {
            Ok(report) => {
                info!(
                    entries = report.entries.len(),
                    leaves = report.leaf_sitemaps.len(),
                    indexes = report.index_sitemaps,
                    failures = report.failures.len(),
                    duration_ms = report.duration.as_millis(),
                    "crawl completed"
                );
                Ok(report)
            }
            Err(SitemapperError::Cancelled) if deadline.fired() => {
                warn!(timeout = ?self.config.timeout, "crawl timed out");
                Err(SitemapperError::Timeout {
                    elapsed: start_time.elapsed(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn run_phases(
        &self,
        ctx: &PhaseContext<T>,
        root: &str,
        start_time: Instant,
    ) -> Result<CrawlReport> {
        let discovered = phases::discovery::discover(ctx, root).await?;

        let estimated_pages = if self.config.count_pages {
            Some(phases::counting::count(ctx, &discovered.leaves).await?)
        } else {
            None
        };

        let merged =
            phases::extraction::extract(ctx, &discovered.leaves, estimated_pages).await?;

        let mut entries: Vec<SitemapUrlEntry> = merged.into_values().collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));

        let failures = std::mem::take(&mut *ctx.failures.lock().await);

        Ok(CrawlReport {
            entries,
            leaf_sitemaps: discovered.leaves,
            index_sitemaps: discovered.index_count,
            estimated_pages,
            failures,
            duration: start_time.elapsed(),
        })
    }
}
