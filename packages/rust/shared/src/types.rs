//! Core domain types for sitemap crawls.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SitemapUrlEntry
// ---------------------------------------------------------------------------

/// One page listed by a leaf sitemap.
///
/// Identity is the exact `url` string. No normalization is applied, so
/// `https://x.com/a` and `https://x.com/a/` are different entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapUrlEntry {
    /// Absolute page URL (`<loc>`).
    pub url: String,
    /// Raw `<lastmod>` value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// `<priority>` value, nominally in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
}

impl SitemapUrlEntry {
    /// An entry carrying only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_modified: None,
            priority: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CrawlProgress
// ---------------------------------------------------------------------------

/// Crawl phase a progress event belongs to.
///
/// Phases always run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    /// Walking the sitemap-index tree.
    Preflight,
    /// Estimating the number of pages across leaf sitemaps.
    Counting,
    /// Extracting and deduplicating page entries.
    Crawling,
}

impl std::fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::Counting => "counting",
            Self::Crawling => "crawling",
        };
        f.write_str(name)
    }
}

/// A progress event. Reporting signal only, never part of the crawl result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub phase: CrawlPhase,
    /// Units of work finished so far in this phase. Non-decreasing.
    pub processed_count: usize,
    /// Best-effort denominator for `processed_count`.
    pub total_estimate: usize,
    /// Sitemap URL that was just handled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<String>,
    /// Pages counted (counting) or unique entries extracted (crawling).
    pub pages_found: usize,
    /// Newest unique page URL (crawling only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_url_found: Option<String>,
    /// Page total from the counting phase, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_url_estimate: Option<usize>,
}

impl CrawlProgress {
    /// An event for `phase` with every optional field empty.
    pub fn new(phase: CrawlPhase, processed_count: usize, total_estimate: usize) -> Self {
        Self {
            phase,
            processed_count,
            total_estimate,
            current_resource: None,
            pages_found: 0,
            last_url_found: None,
            total_url_estimate: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serialization_skips_absent_fields() {
        let entry = SitemapUrlEntry::new("https://x.com/a");
        let json = serde_json::to_string(&entry).expect("serialize");
        assert_eq!(json, r#"{"url":"https://x.com/a"}"#);
    }

    #[test]
    fn entry_identity_is_exact_string() {
        let a = SitemapUrlEntry::new("https://x.com/a");
        let b = SitemapUrlEntry::new("https://x.com/a/");
        assert_ne!(a, b);
    }

    #[test]
    fn progress_phase_serializes_snake_case() {
        let mut event = CrawlProgress::new(CrawlPhase::Crawling, 1, 4);
        event.pages_found = 10;
        event.last_url_found = Some("https://x.com/b".into());

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["phase"], "crawling");
        assert_eq!(json["pages_found"], 10);
        assert!(json.get("current_resource").is_none());
    }

    #[test]
    fn phase_display() {
        assert_eq!(CrawlPhase::Preflight.to_string(), "preflight");
        assert_eq!(CrawlPhase::Counting.to_string(), "counting");
    }
}
