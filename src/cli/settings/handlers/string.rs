//! Handlers for text-valued settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mask_secret, mutate_config, success_set, success_unset};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::{validate_url, Config, DEFAULT_SSE_URL};
use crate::core::config::ConfigError;
use crate::mcp::DEFAULT_PROTOCOL_VERSION;

/// Data-driven handler for settings stored as a single string.
pub struct StringHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    /// Hide all but the tail of the value when echoing it back.
    secret: bool,
    get: fn(&Config) -> Option<&str>,
    set_field: fn(&mut Config, Option<String>),
    validate: fn(&str) -> Result<(), ConfigError>,
}

impl StringHandler {
    fn display(&self, value: &str) -> String {
        if self.secret {
            mask_secret(value)
        } else {
            value.to_string()
        }
    }
}

impl SettingHandler for StringHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError> {
        let value = args.join(" ").trim().to_string();
        if value.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        (self.validate)(&value)?;
        let message = success_set(self.key, &self.display(&value));
        let set_field = self.set_field;
        mutate_config(ctx, move |config| {
            set_field(config, Some(value));
            Ok(())
        })?;
        Ok(message)
    }

    fn unset(&self, ctx: &SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config(ctx, move |config| {
            set_field(config, None);
            Ok(())
        })?;
        Ok(success_unset(self.key, self.default_display))
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) => format!("  {}: {}", self.key, self.display(value)),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

fn accept_any(_: &str) -> Result<(), ConfigError> {
    Ok(())
}

/// Create a handler for the `sse-url` setting.
pub fn sse_url_handler() -> StringHandler {
    StringHandler {
        key: "sse-url",
        hint: "To set the event stream URL, provide an http(s) URL:",
        example: "mcp-tester set sse-url http://localhost:8000/sse",
        default_display: DEFAULT_SSE_URL,
        secret: false,
        get: |c| c.sse_url.as_deref(),
        set_field: |c, v| c.sse_url = v,
        validate: validate_url,
    }
}

/// Create a handler for the `auth-token` setting.
pub fn auth_token_handler() -> StringHandler {
    StringHandler {
        key: "auth-token",
        hint: "To set the access token, provide the token value:",
        example: "mcp-tester set auth-token s3cr3t",
        default_display: "none",
        secret: true,
        get: |c| c.auth_token.as_deref(),
        set_field: |c, v| c.auth_token = v,
        validate: accept_any,
    }
}

/// Create a handler for the `protocol-version` setting.
pub fn protocol_version_handler() -> StringHandler {
    StringHandler {
        key: "protocol-version",
        hint: "To set the protocol version offered during initialize, provide it:",
        example: "mcp-tester set protocol-version 2025-06-18",
        default_display: DEFAULT_PROTOCOL_VERSION,
        secret: false,
        get: |c| c.protocol_version.as_deref(),
        set_field: |c, v| c.protocol_version = v,
        validate: accept_any,
    }
}
