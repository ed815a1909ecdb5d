//! Application configuration for sitemapper.
//!
//! User config lives at `~/.sitemapper/sitemapper.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitemapperError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitemapper.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitemapper";

// ---------------------------------------------------------------------------
// Config structs (matching sitemapper.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawl-wide settings.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpSection,

    /// Retry/backoff policy for single fetches.
    #[serde(default)]
    pub retry: RetrySection,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Worker-pool width for the counting and extraction phases.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Global deadline for one crawl, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Run the counting phase to get a stable page-total estimate.
    #[serde(default = "default_true")]
    pub count_pages: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            count_pages: true,
        }
    }
}

fn default_concurrency() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Largest response body accepted, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_redirects: default_max_redirects(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}
fn default_max_response_bytes() -> u64 {
    // Uncompressed size ceiling of the sitemap protocol.
    50 * 1024 * 1024
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Attempts per resource, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles after each attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Worker-pool width.
    pub concurrency: usize,
    /// Global deadline for the whole crawl.
    pub timeout: Duration,
    /// Whether the counting phase runs.
    pub count_pages: bool,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Redirects followed per request.
    pub max_redirects: usize,
    /// Largest response body accepted, in bytes.
    pub max_response_bytes: u64,
    /// Attempts per resource.
    pub max_attempts: u32,
    /// Backoff base delay.
    pub initial_retry_delay: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.crawl.concurrency,
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            count_pages: config.crawl.count_pages,
            request_timeout: Duration::from_secs(config.http.request_timeout_secs),
            max_redirects: config.http.max_redirects,
            max_response_bytes: config.http.max_response_bytes,
            max_attempts: config.retry.max_attempts,
            initial_retry_delay: Duration::from_millis(config.retry.initial_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitemapper/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitemapperError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitemapper/sitemapper.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitemapperError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SitemapperError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitemapperError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SitemapperError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitemapperError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values no crawl can run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.crawl.concurrency == 0 {
        return Err(SitemapperError::config("crawl.concurrency must be at least 1"));
    }
    if config.crawl.timeout_secs == 0 {
        return Err(SitemapperError::config("crawl.timeout_secs must be at least 1"));
    }
    if config.http.request_timeout_secs == 0 {
        return Err(SitemapperError::config("http.request_timeout_secs must be at least 1"));
    }
    if config.retry.max_attempts == 0 {
        return Err(SitemapperError::config("retry.max_attempts must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("concurrency = 8"));
        assert!(toml_str.contains("max_attempts = 3"));
    }

    #[test]
    fn crawl_config_defaults() {
        let crawl = CrawlConfig::default();
        assert_eq!(crawl.concurrency, 8);
        assert_eq!(crawl.timeout, Duration::from_secs(300));
        assert_eq!(crawl.max_attempts, 3);
        assert_eq!(crawl.initial_retry_delay, Duration::from_secs(1));
        assert!(crawl.count_pages);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[crawl]
concurrency = 2

[retry]
initial_delay_ms = 250
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let crawl = CrawlConfig::from(&config);
        assert_eq!(crawl.concurrency, 2);
        assert_eq!(crawl.initial_retry_delay, Duration::from_millis(250));
        assert_eq!(crawl.timeout, Duration::from_secs(300));
        assert_eq!(crawl.max_redirects, 5);
    }

    #[test]
    fn load_config_from_rejects_zero_concurrency() {
        let dir = std::env::temp_dir().join(format!("sitemapper-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("zero.toml");
        std::fs::write(&path, "[crawl]\nconcurrency = 0\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("concurrency"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_rejects_zero_request_timeout() {
        let config: AppConfig = toml::from_str("[http]\nrequest_timeout_secs = 0\n").expect("parse");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/sitemapper.toml")).unwrap_err();
        assert!(matches!(err, SitemapperError::Io { .. }));
    }
}
