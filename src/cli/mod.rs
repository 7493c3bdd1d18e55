//! Command-line interface components
//!
//! Argument parsing and the command handlers for the `resource_cache` binary.

pub mod args;
pub mod commands;

pub use args::{
    CacheAction, CacheArgs, Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs,
};
pub use commands::{handle_cache, handle_config, handle_fetch};
