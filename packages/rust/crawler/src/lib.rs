//! Sitemap discovery and extraction pipeline.
//!
//! This crate provides:
//! - [`SitemapCrawler`]: resolves a sitemap-index tree to its leaf sitemaps
//!   and extracts their deduplicated page entries under a global deadline
//! - [`pool`]: generic bounded-concurrency worker pool
//! - [`ProgressReporter`]: sink for phase-tagged progress events

mod deadline;
pub mod engine;
mod phases;
pub mod pool;
pub mod progress;

pub use engine::{CrawlReport, SitemapCrawler};
pub use phases::FailedResource;
pub use pool::{WorkQueue, run_pool};
pub use progress::{ProgressReporter, SilentProgress};
