//! Discovery: breadth-first walk of the sitemap-index tree.
//!
//! Runs sequentially because the tree's shape is only known once traversed.
//! Leaves are recorded, not read; their entries are extracted later.

use std::collections::{HashSet, VecDeque};

use sitemapper_shared::{CrawlPhase, CrawlProgress, Result};
use sitemapper_sitemap::{SitemapDocument, Transport};
use tracing::{debug, info, instrument};

use super::PhaseContext;

/// Leaf sitemaps found under a root, in discovery order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Discovered {
    pub(crate) leaves: Vec<String>,
    pub(crate) index_count: usize,
}

#[instrument(skip_all, fields(root = %root))]
pub(crate) async fn discover<T: Transport>(ctx: &PhaseContext<T>, root: &str) -> Result<Discovered> {
    let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
    let mut visited: HashSet<String> = HashSet::new();
    // Broken nodes referenced from several indexes are only tried once.
    let mut failed: HashSet<String> = HashSet::new();
    let mut found = Discovered::default();

    while let Some(url) = queue.pop_front() {
        ctx.ensure_active()?;

        if visited.contains(&url) || failed.contains(&url) {
            debug!(%url, "already handled, skipping");
            continue;
        }

        match ctx.read(CrawlPhase::Preflight, &url).await? {
            Some(SitemapDocument::Index(references)) => {
                debug!(%url, references = references.len(), "sitemap index");
                found.index_count += 1;
                queue.extend(references);
                visited.insert(url.clone());
            }
            Some(SitemapDocument::Leaf(entries)) => {
                debug!(%url, entries = entries.len(), "leaf sitemap");
                found.leaves.push(url.clone());
                visited.insert(url.clone());
            }
            None => {
                failed.insert(url.clone());
            }
        }

        // `total_estimate` grows as new indexes are found; it is a hint only.
        let mut event = CrawlProgress::new(
            CrawlPhase::Preflight,
            visited.len(),
            visited.len() + queue.len(),
        );
        event.current_resource = Some(url);
        ctx.progress.report(&event);
    }

    info!(
        leaves = found.leaves.len(),
        indexes = found.index_count,
        failed = failed.len(),
        "discovery complete"
    );

    Ok(found)
}
