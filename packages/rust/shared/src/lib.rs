//! Shared types, error model, and configuration for sitemapper.
//!
//! This crate is the foundation depended on by all other sitemapper crates.
//! It provides:
//! - [`SitemapperError`]: the unified error type
//! - Domain types ([`SitemapUrlEntry`], [`CrawlProgress`], [`CrawlPhase`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, HttpSection, RetrySection, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, SitemapperError};
pub use types::{CrawlPhase, CrawlProgress, SitemapUrlEntry};
