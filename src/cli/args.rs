//! Command-line argument parsing for the resource cache
//!
//! This module defines the CLI structure using clap derive macros: fetching a
//! resource through the cache, inspecting and maintaining the cache, and
//! managing the configuration file.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::app::CacheKey;

/// Resource Cache - fetch and cache remote resources by key
#[derive(Parser, Debug)]
#[command(
    name = "resource_cache",
    version,
    about = "Fetch remote resources through a two-tier memory and disk cache",
    long_about = "Fetches byte resources over HTTP(S) and caches them on disk under hashed file names.
Repeated fetches of the same key are served from the cache without touching the network."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a resource through the cache
    Fetch(FetchArgs),

    /// Cache inspection and maintenance
    Cache(CacheArgs),

    /// Configuration file management
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URL of the resource
    #[arg(value_name = "URL")]
    pub url: Url,

    /// Explicit cache key
    #[arg(short, long, conflicts_with = "name", value_parser = CacheKey::from_str)]
    pub key: Option<CacheKey>,

    /// Item name the key is derived from (defaults to the URL)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Write the bytes to this file instead of printing a summary
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl FetchArgs {
    /// Cache key for this fetch
    pub fn cache_key(&self) -> CacheKey {
        match &self.key {
            Some(key) => key.clone(),
            None => CacheKey::derive(self.name.as_deref().unwrap_or(""), self.url.as_str()),
        }
    }
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache location, size and limits
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every cached file
    Clear,

    /// Run one eviction pass against the configured disk limits
    Evict,

    /// Remove one key from the cache
    Remove {
        /// Cache key to remove
        #[arg(value_name = "KEY", value_parser = CacheKey::from_str)]
        key: CacheKey,
    },
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested by flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_key_selection() {
        let cli = Cli::try_parse_from([
            "resource_cache",
            "fetch",
            "https://example.com/burger.png",
            "--name",
            "burger-banner",
        ])
        .unwrap();

        let Commands::Fetch(args) = cli.command else {
            panic!("Expected fetch command");
        };
        assert_eq!(args.cache_key(), CacheKey::new("burger-banner"));

        let cli =
            Cli::try_parse_from(["resource_cache", "fetch", "https://example.com/a.png"]).unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("Expected fetch command");
        };
        assert_eq!(args.cache_key().as_str(), "https://example.com/a.png");
    }

    #[test]
    fn test_key_and_name_conflict() {
        let result = Cli::try_parse_from([
            "resource_cache",
            "fetch",
            "https://example.com/a.png",
            "--key",
            "k",
            "--name",
            "n",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(Cli::try_parse_from(["resource_cache", "fetch", "not a url"]).is_err());
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(Cli::try_parse_from(["resource_cache", "cache", "remove", "  "]).is_err());
        assert!(Cli::try_parse_from([
            "resource_cache",
            "fetch",
            "https://example.com/a.png",
            "--key",
            "",
        ])
        .is_err());
    }

    #[test]
    fn test_explicit_key_is_kept() {
        let cli = Cli::try_parse_from([
            "resource_cache",
            "fetch",
            "https://example.com/a.png",
            "--key",
            "banner",
        ])
        .unwrap();

        let Commands::Fetch(args) = cli.command else {
            panic!("Expected fetch command");
        };
        assert_eq!(args.cache_key(), CacheKey::new("banner"));
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli::try_parse_from(["resource_cache", "-q", "config", "show"]).unwrap();
        let verbose = Cli::try_parse_from(["resource_cache", "config", "show", "-v"]).unwrap();
        let default = Cli::try_parse_from(["resource_cache", "config", "show"]).unwrap();

        assert_eq!(quiet.log_level(), Some(tracing::Level::ERROR));
        assert_eq!(verbose.log_level(), Some(tracing::Level::INFO));
        assert_eq!(default.log_level(), None);
    }

    #[test]
    fn test_global_overrides_parse() {
        let cli = Cli::try_parse_from([
            "resource_cache",
            "cache",
            "info",
            "--json",
            "--cache-dir",
            "/tmp/rc",
        ])
        .unwrap();

        assert_eq!(cli.global.cache_dir, Some(PathBuf::from("/tmp/rc")));
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheArgs {
                action: CacheAction::Info { json: true }
            })
        ));
    }
}
