//! Counting: pooled pass that sums the entries of every leaf sitemap.
//!
//! Its only output is a denominator for extraction progress; failed leaves
//! count as zero and never affect the final entry set.

use std::sync::Arc;

use sitemapper_shared::{CrawlPhase, CrawlProgress, Result, SitemapperError};
use sitemapper_sitemap::Transport;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::PhaseContext;
use crate::pool::run_pool;

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    pages: usize,
}

/// Total number of page entries across `leaves`.
#[instrument(skip_all, fields(leaves = leaves.len()))]
pub(crate) async fn count<T: Transport>(ctx: &PhaseContext<T>, leaves: &[String]) -> Result<usize> {
    let total = leaves.len();
    let tally = Arc::new(Mutex::new(Tally::default()));

    let worker_ctx = ctx.clone();
    let worker_tally = Arc::clone(&tally);
    run_pool(leaves.to_vec(), ctx.concurrency, move |leaf: String| {
        let ctx = worker_ctx.clone();
        let tally = Arc::clone(&worker_tally);
        async move {
            ctx.ensure_active()?;
            let found = ctx
                .read(CrawlPhase::Counting, &leaf)
                .await?
                .map_or(0, |doc| doc.entry_count());

            // Report under the lock so `processed_count` stays monotonic.
            let mut tally = tally.lock().await;
            tally.processed += 1;
            tally.pages += found;

            let mut event = CrawlProgress::new(CrawlPhase::Counting, tally.processed, total);
            event.current_resource = Some(leaf);
            event.pages_found = tally.pages;
            ctx.progress.report(&event);
            Ok::<(), SitemapperError>(())
        }
    })
    .await?;

    let pages = tally.lock().await.pages;
    info!(pages, "counting complete");
    Ok(pages)
}
