use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::io::ConfigError;
use crate::mcp::engine::{EngineConfig, EngineSettings};
use crate::mcp::transport::RetryPolicy;

pub const DEFAULT_SSE_URL: &str = "http://localhost:8000/sse";
pub const URL_ENV_VAR: &str = "MCP_TESTER_URL";
pub const TOKEN_ENV_VAR: &str = "MCP_TESTER_TOKEN";

/// On-disk settings. Every field is optional; unset fields fall back to the
/// engine defaults.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub sse_url: Option<String>,
    pub auth_token: Option<String>,
    pub protocol_version: Option<String>,
    pub client_name: Option<String>,
    pub call_timeout_seconds: Option<u64>,
    pub post_timeout_seconds: Option<u64>,
    pub catalog_fetch_delay_ms: Option<u64>,
    pub retry_initial_ms: Option<u64>,
    pub retry_max_ms: Option<u64>,
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn positive(key: &'static str, value: Option<u64>) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::InvalidValue {
            key,
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other),
    }
}

impl Config {
    /// Resolves the engine configuration, using `MCP_TESTER_URL` and
    /// `MCP_TESTER_TOKEN` when the file leaves URL or token unset.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.engine_config_with_env(|name| std::env::var(name).ok())
    }

    pub(crate) fn engine_config_with_env(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();

        let sse_url = non_blank(&self.sse_url)
            .or_else(|| non_blank(&env(URL_ENV_VAR)))
            .unwrap_or_else(|| DEFAULT_SSE_URL.to_string());
        validate_url(&sse_url)?;
        let auth_token = non_blank(&self.auth_token).or_else(|| non_blank(&env(TOKEN_ENV_VAR)));

        let settings = EngineSettings {
            protocol_version: non_blank(&self.protocol_version)
                .unwrap_or(defaults.settings.protocol_version),
            client_name: non_blank(&self.client_name).unwrap_or(defaults.settings.client_name),
            client_version: defaults.settings.client_version,
            catalog_fetch_delay: self
                .catalog_fetch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settings.catalog_fetch_delay),
        };

        let retry = RetryPolicy {
            initial_delay: positive("retry-initial-ms", self.retry_initial_ms)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.initial_delay),
            max_delay: positive("retry-max-ms", self.retry_max_ms)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_delay),
        };
        if retry.max_delay < retry.initial_delay {
            return Err(ConfigError::InvalidValue {
                key: "retry-max-ms",
                reason: "must not be lower than the initial delay".to_string(),
            });
        }

        Ok(EngineConfig {
            sse_url,
            auth_token,
            settings,
            retry,
            post_timeout: positive("post-timeout", self.post_timeout_seconds)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.post_timeout),
            call_timeout: positive("call-timeout", self.call_timeout_seconds)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
        })
    }
}

pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|err| ConfigError::InvalidValue {
        key: "sse-url",
        reason: format!("{url}: {err}"),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidValue {
            key: "sse-url",
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
