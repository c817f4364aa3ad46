//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod settings;
pub mod tools;
pub mod watch;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::settings::{SetContext, SettingError, SettingRegistry};
use crate::cli::tools::{run_call, run_tools};
use crate::cli::watch::run_watch;
use crate::core::config::data::path_display;
use crate::core::config::{Config, ConfigError};
use crate::mcp::engine::{EngineConfig, EngineHandle};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    " (",
    env!("VERGEN_GIT_BRANCH"),
    ")\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "mcp-tester")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Exercise an MCP tool server over SSE + JSON-RPC")]
#[command(
    long_about = "mcp-tester connects to an MCP tool server that pushes JSON-RPC frames over \
a server-sent event stream and accepts requests by HTTP POST. It performs the \
initialize handshake, fetches the tool list, and lets you call tools from the terminal.\n\n\
Environment Variables (used when neither flags nor the config file set them):\n\
  MCP_TESTER_URL      Event stream URL (default http://localhost:8000/sse)\n\
  MCP_TESTER_TOKEN    Access token appended as ?token=\n\
  MCP_TESTER_CONFIG   Alternative config file path\n\
  RUST_LOG            Diagnostic log filter"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Event stream URL of the tool server
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Access token sent as the `token` query parameter
    #[arg(short = 't', long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Seconds to wait for the tool list and for tool responses
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write diagnostics to the given file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and print log entries and status changes (default)
    Watch,
    /// List the tools the server advertises
    Tools,
    /// Call a tool with KEY=VALUE arguments
    Call {
        /// Tool name
        tool: String,
        /// Arguments, typed according to the tool's input schema
        #[arg(value_name = "KEY=VALUE")]
        arguments: Vec<String>,
    },
    /// Set configuration values, or show them all when no key is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if let Err(err) = crate::logging::init_tracing(args.log.as_deref()) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(err) = runtime.block_on(async_main(args)) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Some(Commands::Set { ref key, ref value }) => {
            let config_path = Config::get_config_path()?;
            exit_on_setting_error(handle_set(&config_path, key.as_deref(), value));
            Ok(())
        }
        Some(Commands::Unset { ref key }) => {
            let config_path = Config::get_config_path()?;
            exit_on_setting_error(handle_unset(&config_path, key));
            Ok(())
        }
        Some(Commands::Tools) => {
            let (handle, wait) = connect(&args)?;
            run_tools(handle, wait).await
        }
        Some(Commands::Call {
            ref tool,
            ref arguments,
        }) => {
            let (handle, wait) = connect(&args)?;
            run_call(handle, tool, arguments, wait).await
        }
        Some(Commands::Watch) | None => {
            let (handle, _) = connect(&args)?;
            run_watch(handle).await
        }
    }
}

/// Layers command-line flags over the stored config. Flags win over the
/// file, which wins over the environment.
pub fn resolve_engine_config(args: &Args, stored: &Config) -> Result<EngineConfig, ConfigError> {
    let mut config = stored.clone();
    if let Some(url) = &args.url {
        config.sse_url = Some(url.clone());
    }
    if let Some(token) = &args.token {
        config.auth_token = Some(token.clone());
    }
    if let Some(timeout) = args.timeout {
        config.call_timeout_seconds = Some(timeout);
    }
    config.engine_config()
}

fn connect(args: &Args) -> Result<(EngineHandle, Duration), Box<dyn Error>> {
    let engine_config = resolve_engine_config(args, &Config::load()?)?;
    let wait = engine_config.call_timeout;
    eprintln!("📡 Connecting to {}", engine_config.sse_url);
    let handle = EngineHandle::connect(engine_config)?;
    Ok((handle, wait))
}

fn exit_on_setting_error(outcome: Result<(), SettingError>) {
    if let Err(err) = outcome {
        err.print();
        std::process::exit(err.exit_code());
    }
}

pub fn handle_set(
    config_path: &Path,
    key: Option<&str>,
    value: &[String],
) -> Result<(), SettingError> {
    let registry = SettingRegistry::new();
    let Some(key) = key else {
        print_all(&registry, config_path)?;
        return Ok(());
    };
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;

    let message = handler.set(value, &SetContext { config_path })?;
    println!("{message}");
    Ok(())
}

pub fn handle_unset(config_path: &Path, key: &str) -> Result<(), SettingError> {
    let registry = SettingRegistry::new();
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;

    let message = handler.unset(&SetContext { config_path })?;
    println!("{message}");
    Ok(())
}

/// Lines shown by a bare `mcp-tester set`.
pub fn format_all(registry: &SettingRegistry, config: &Config) -> Vec<String> {
    registry
        .keys_display_order()
        .iter()
        .filter_map(|key| registry.get(key))
        .map(|handler| handler.format(config))
        .collect()
}

fn print_all(registry: &SettingRegistry, config_path: &Path) -> Result<(), SettingError> {
    let config = Config::load_from_path(config_path)?;
    println!("Current configuration ({}):", path_display(config_path));
    for line in format_all(registry, &config) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
