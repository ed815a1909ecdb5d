//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitemapper_crawler::{CrawlReport, ProgressReporter, SitemapCrawler};
use sitemapper_shared::{
    AppConfig, CrawlConfig, CrawlPhase, CrawlProgress, init_config, load_config, load_config_from,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitemapper: list every page a site declares in its sitemaps.
#[derive(Parser)]
#[command(
    name = "sitemapper",
    version,
    about = "Resolve nested sitemap indexes and list every page URL they declare.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sitemapper/sitemapper.toml.
    #[arg(long, global = true, env = "SITEMAPPER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Result output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// One URL per line, followed by lastmod and priority when present.
    Text,
    /// JSON array of entries.
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a sitemap (or sitemap index) and print its page entries.
    Crawl {
        /// Root sitemap URL.
        url: String,

        /// Concurrent leaf sitemap fetches.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Global deadline in seconds.
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Attempts per sitemap, including the first.
        #[arg(long)]
        retries: Option<u32>,

        /// Backoff before the first retry, in milliseconds.
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Skip the page-counting pass.
        #[arg(long)]
        no_count: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr; stdout is reserved for crawl results.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitemapper=info",
        1 => "sitemapper=debug",
        _ => "sitemapper=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Crawl {
            url,
            concurrency,
            timeout,
            retries,
            retry_delay_ms,
            no_count,
            format,
        } => {
            let app = resolve_config(config_path.as_ref())?;
            let overrides = CrawlOverrides {
                concurrency,
                timeout,
                retries,
                retry_delay_ms,
                no_count,
            };
            cmd_crawl(&url, overrides.apply(CrawlConfig::from(&app))?, format).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_ref()).await,
        },
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Crawl flags that override the config file.
#[derive(Debug, Default)]
struct CrawlOverrides {
    concurrency: Option<usize>,
    timeout: Option<u64>,
    retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    no_count: bool,
}

impl CrawlOverrides {
    fn apply(self, mut config: CrawlConfig) -> Result<CrawlConfig> {
        if let Some(n) = self.concurrency {
            if n == 0 {
                return Err(eyre!("--concurrency must be at least 1"));
            }
            config.concurrency = n;
        }
        if let Some(secs) = self.timeout {
            if secs == 0 {
                return Err(eyre!("--timeout must be at least 1 second"));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.retries {
            if n == 0 {
                return Err(eyre!("--retries must be at least 1"));
            }
            config.max_attempts = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.initial_retry_delay = Duration::from_millis(ms);
        }
        if self.no_count {
            config.count_pages = false;
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(url: &str, config: CrawlConfig, format: OutputFormat) -> Result<()> {
    let root = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    info!(
        url,
        concurrency = config.concurrency,
        timeout_secs = config.timeout.as_secs(),
        "crawling sitemap"
    );

    let crawler = SitemapCrawler::new(config)?;

    // Ctrl-C cancels the crawl cooperatively.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling crawl");
            on_interrupt.cancel();
        }
    });

    let reporter = Arc::new(CliProgress::new());
    let outcome = crawler
        .crawl_with_cancel(&root, reporter.clone(), cancel)
        .await;
    reporter.finish();
    let report = outcome?;

    print_entries(&report, format)?;
    print_summary(&report);
    Ok(())
}

fn print_entries(report: &CrawlReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.entries)?);
        }
        OutputFormat::Text => {
            for entry in &report.entries {
                let mut line = entry.url.clone();
                if let Some(lastmod) = &entry.last_modified {
                    line.push('\t');
                    line.push_str(lastmod);
                }
                if let Some(priority) = entry.priority {
                    line.push_str(&format!("\t{priority}"));
                }
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn print_summary(report: &CrawlReport) {
    eprintln!();
    eprintln!(
        "  Pages:    {}{}",
        report.entries.len(),
        report
            .estimated_pages
            .map(|n| format!(" (of {n} listed)"))
            .unwrap_or_default()
    );
    eprintln!("  Sitemaps: {} leaf, {} index", report.leaf_sitemaps.len(), report.index_sitemaps);
    eprintln!("  Time:     {:.1}s", report.duration.as_secs_f64());

    if !report.failures.is_empty() {
        eprintln!("  Skipped:  {}", report.failures.len());
        for failure in &report.failures {
            eprintln!("    [{}] {}: {}", failure.phase, failure.url, failure.error);
        }
    }
    eprintln!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn report(&self, p: &CrawlProgress) {
        let message = match p.phase {
            CrawlPhase::Preflight => format!(
                "Discovering sitemaps [{}/~{}]",
                p.processed_count, p.total_estimate
            ),
            CrawlPhase::Counting => format!(
                "Counting pages [{}/{} sitemaps] {} pages",
                p.processed_count, p.total_estimate, p.pages_found
            ),
            CrawlPhase::Crawling => match p.total_url_estimate {
                Some(total) => format!(
                    "Extracting [{}/{} sitemaps] {}/{total} pages",
                    p.processed_count, p.total_estimate, p.pages_found
                ),
                None => format!(
                    "Extracting [{}/{} sitemaps] {} pages",
                    p.processed_count, p.total_estimate, p.pages_found
                ),
            },
        };
        self.spinner.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_crawl_flags() {
        let cli = Cli::try_parse_from([
            "sitemapper",
            "-vv",
            "crawl",
            "https://x.com/sitemap.xml",
            "--concurrency",
            "4",
            "--no-count",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Crawl {
                url,
                concurrency,
                no_count,
                format,
                ..
            } => {
                assert_eq!(url, "https://x.com/sitemap.xml");
                assert_eq!(concurrency, Some(4));
                assert!(no_count);
                assert!(matches!(format, OutputFormat::Json));
            }
            Command::Config { .. } => panic!("expected crawl"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let overrides = CrawlOverrides {
            concurrency: Some(2),
            timeout: Some(60),
            retries: Some(5),
            retry_delay_ms: Some(250),
            no_count: true,
        };
        let config = overrides.apply(CrawlConfig::default()).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_retry_delay, Duration::from_millis(250));
        assert!(!config.count_pages);
    }

    #[test]
    fn empty_overrides_keep_defaults() {
        let config = CrawlOverrides::default()
            .apply(CrawlConfig::default())
            .unwrap();
        assert_eq!(config.concurrency, 8);
        assert!(config.count_pages);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let overrides = CrawlOverrides {
            concurrency: Some(0),
            ..CrawlOverrides::default()
        };
        assert!(overrides.apply(CrawlConfig::default()).is_err());
    }
}
