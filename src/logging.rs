//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr by default so they never interleave with command
//! output on stdout. `--log <file>` redirects them to an append-only file and
//! raises the default level to `info`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when it parses; otherwise `default_level` applies.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn open_log_file(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Cannot open log file {}: {err}", path.display()))
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), String> {
    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter("warn"))
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .try_init();
        }
    }
    Ok(())
}
