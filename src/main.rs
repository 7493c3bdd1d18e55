//! Resource Cache CLI application
//!
//! Command-line interface for fetching remote resources through the two-tier
//! cache and for inspecting and maintaining the cache directory.

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

use resource_cache::cli::{handle_cache, handle_config, handle_fetch, Cli, Commands};
use resource_cache::config::{AppConfig, LoggingConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    // Ignore errors if the file doesn't exist
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let mut config = AppConfig::load(cli.global.config.clone())
        .await
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.global.cache_dir.clone() {
        config = config.with_cache_dir(dir);
    }

    init_logging(&cli, &config.logging)?;
    info!("Resource Cache v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, config).await?;
        }
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(args, config).await?;
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, config, cli.global.config).await?;
        }
    }

    Ok(())
}

/// Initialize logging from CLI verbosity flags, falling back to the config
fn init_logging(cli: &Cli, logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = match cli.log_level() {
        Some(level) => level.to_string().to_lowercase(),
        None => logging.level.to_lowercase(),
    };

    let directive = format!("resource_cache={}", level)
        .parse::<Directive>()
        .context("Invalid log directive")?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(logging.colored_output)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }

    Ok(())
}
