//! Progress sink for phase-tagged crawl events.

use sitemapper_shared::CrawlProgress;

/// Receives [`CrawlProgress`] events while a crawl runs.
///
/// Calls are synchronous and may come from several worker tasks, one at a
/// time per phase. Within a phase `processed_count` never decreases, and
/// phases arrive in `preflight → counting → crawling` order. Event frequency
/// is not part of the contract.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &CrawlProgress);
}

/// No-op progress reporter for headless/test usage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _progress: &CrawlProgress) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(&CrawlProgress) + Send + Sync,
{
    fn report(&self, progress: &CrawlProgress) {
        self(progress)
    }
}
