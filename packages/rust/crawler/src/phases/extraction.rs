//! Extraction: pooled pass that merges leaf entries into one mapping.
//!
//! Merging is first-write-wins on the exact URL string. With a pool width of
//! one, "first" is queue (discovery) order.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use sitemapper_shared::{CrawlPhase, CrawlProgress, Result, SitemapperError, SitemapUrlEntry};
use sitemapper_sitemap::{SitemapDocument, Transport};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::PhaseContext;
use crate::pool::run_pool;

#[derive(Debug, Default)]
struct Merged {
    entries: HashMap<String, SitemapUrlEntry>,
    processed: usize,
}

/// Extract and deduplicate the entries of every leaf in `leaves`.
#[instrument(skip_all, fields(leaves = leaves.len()))]
pub(crate) async fn extract<T: Transport>(
    ctx: &PhaseContext<T>,
    leaves: &[String],
    total_url_estimate: Option<usize>,
) -> Result<HashMap<String, SitemapUrlEntry>> {
    let total = leaves.len();
    let merged = Arc::new(Mutex::new(Merged::default()));

    let worker_ctx = ctx.clone();
    let worker_merged = Arc::clone(&merged);
    let outcome = run_pool(leaves.to_vec(), ctx.concurrency, move |leaf: String| {
        let ctx = worker_ctx.clone();
        let merged = Arc::clone(&worker_merged);
        async move {
            ctx.ensure_active()?;
            let entries = match ctx.read(CrawlPhase::Crawling, &leaf).await? {
                Some(SitemapDocument::Leaf(entries)) => entries,
                Some(SitemapDocument::Index(_)) => {
                    warn!(url = %leaf, "leaf sitemap turned into an index, ignoring");
                    Vec::new()
                }
                None => Vec::new(),
            };

            let mut guard = merged.lock().await;
            let state = &mut *guard;

            for entry in entries {
                let url = entry.url.clone();
                match state.entries.entry(url.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                    Entry::Occupied(_) => continue,
                }

                let mut event = CrawlProgress::new(CrawlPhase::Crawling, state.processed, total);
                event.current_resource = Some(leaf.clone());
                event.pages_found = state.entries.len();
                event.last_url_found = Some(url);
                event.total_url_estimate = total_url_estimate;
                ctx.progress.report(&event);
            }

            state.processed += 1;
            let mut event = CrawlProgress::new(CrawlPhase::Crawling, state.processed, total);
            event.current_resource = Some(leaf);
            event.pages_found = state.entries.len();
            event.total_url_estimate = total_url_estimate;
            ctx.progress.report(&event);
            Ok::<(), SitemapperError>(())
        }
    })
    .await;

    let mut state = merged.lock().await;
    if let Err(e) = outcome {
        warn!(
            discarded = state.entries.len(),
            error = %e,
            "extraction aborted, discarding partial entries"
        );
        return Err(e);
    }

    info!(entries = state.entries.len(), "extraction complete");
    Ok(std::mem::take(&mut state.entries))
}
