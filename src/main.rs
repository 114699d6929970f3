//! Sumi-Sieve main entry point
//!
//! This is the command-line interface for the Sumi-Sieve crawler.

use clap::Parser;
use std::path::PathBuf;
use sumi_sieve::config::{load_config_with_hash, Config};
use sumi_sieve::crawler::{crawl, CrawlPlan};
use sumi_sieve::extract::ProcessorRegistry;
use sumi_sieve::output::print_summary;
use sumi_sieve::rules::Action;
use tracing_subscriber::EnvFilter;

/// Sumi-Sieve: a rule-driven crawler and structured-extraction engine
///
/// Sumi-Sieve walks a site from its seed URLs, follows links according to an
/// ordered rule table, and turns target pages into records through
/// declarative field pipelines.
#[derive(Parser, Debug)]
#[command(name = "sumi-sieve")]
#[command(version = "1.0.0")]
#[command(about = "A rule-driven crawler and structured-extraction engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the compiled rules without crawling
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many records (overrides crawler.item-cutoff)
    #[arg(long, value_name = "N")]
    max_items: Option<u64>,

    /// Write records here (overrides output.path)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(max_items) = cli.max_items {
        config.crawler.item_cutoff = Some(max_items);
    }
    if let Some(output) = &cli.output {
        config.output.path = output.to_string_lossy().into_owned();
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(config, cli.quiet).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sieve=info,warn"),
            1 => EnvFilter::new("sumi_sieve=debug,info"),
            2 => EnvFilter::new("sumi_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: compiles everything and shows the plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let plan = CrawlPlan::compile(config, &ProcessorRegistry::with_builtins())?;

    println!("=== Sumi-Sieve Dry Run: {} ===\n", config.crawler.name);

    println!("Crawler Configuration:");
    println!("  Concurrent requests: {}", config.crawler.concurrent_requests);
    println!("  Download delay: {}ms", config.crawler.download_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Obey robots.txt: {}", config.crawler.obey_robots_txt);
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    match config.crawler.item_cutoff {
        Some(cutoff) => println!("  Item cutoff: {}", cutoff),
        None => println!("  Item cutoff: none"),
    }

    println!("\nRetry:");
    if config.retry.enabled {
        println!("  Max retries: {}", config.retry.max_retries);
        println!("  HTTP codes: {:?}", config.retry.http_codes);
        println!(
            "  Backoff: {}ms doubling, capped at {}ms",
            config.retry.backoff_base_ms, config.retry.backoff_max_ms
        );
    } else {
        println!("  Disabled");
    }

    println!("\nAllowed Domains ({}):", config.crawler.allowed_domains.len());
    for domain in &config.crawler.allowed_domains {
        println!("  - {}", domain);
    }

    println!("\nSeeds ({}):", plan.seeds.len());
    for seed in &plan.seeds {
        println!("  * {}", seed);
    }

    println!("\nRules ({}):", plan.rules.len());
    for (idx, rule) in plan.rules.rules().iter().enumerate() {
        let action = match rule.action() {
            Action::Ignore => "ignore".to_string(),
            Action::Follow => "follow".to_string(),
            Action::FollowAndExtract(name) => format!("follow + extract '{}'", name),
            Action::Extract(name) => format!("extract '{}'", name),
        };
        match rule.restrict() {
            Some(region) => println!(
                "  {}. /{}/ within '{}' -> {}",
                idx + 1,
                rule.pattern(),
                region.expression(),
                action
            ),
            None => println!("  {}. /{}/ -> {}", idx + 1, rule.pattern(), action),
        }
    }

    println!("\nExtractors ({}):", plan.extractors.len());
    for extractor in plan.extractors.iter() {
        let fields: Vec<&str> = extractor.fields().iter().map(|f| f.name()).collect();
        let scope = if extractor.is_scoped() { " (per item)" } else { "" };
        println!("  - {}{}: {}", extractor.name(), scope, fields.join(", "));
    }

    println!("\nOutput:");
    println!("  {:?} -> {}", config.output.format, config.output.path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    let name = config.crawler.name.clone();

    match crawl(config).await {
        Ok(summary) => {
            if !quiet {
                print_summary(&name, &summary);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
