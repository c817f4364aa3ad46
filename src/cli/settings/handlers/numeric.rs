//! Handlers for positive integer settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config, success_set, success_unset};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;

pub struct NumericHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    unit: &'static str,
    default_display: &'static str,
    get: fn(&Config) -> Option<u64>,
    set_field: fn(&mut Config, Option<u64>),
}

impl SettingHandler for NumericHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError> {
        let input = args.join(" ");
        let input = input.trim();
        if input.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let value = match input.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                return Err(SettingError::InvalidValue {
                    key: self.key,
                    reason: format!("'{input}' is not a positive whole number"),
                })
            }
        };

        let set_field = self.set_field;
        mutate_config(ctx, move |config| {
            set_field(config, Some(value));
            Ok(())
        })?;
        Ok(success_set(self.key, &format!("{value}{}", self.unit)))
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
            Some(value) => format!("  {}: {value}{}", self.key, self.unit),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

/// Create a handler for the `call-timeout` setting.
pub fn call_timeout_handler() -> NumericHandler {
    NumericHandler {
        key: "call-timeout",
        hint: "To set how long tool calls wait for a response, give seconds:",
        example: "mcp-tester set call-timeout 60",
        unit: "s",
        default_display: "30s",
        get: |c| c.call_timeout_seconds,
        set_field: |c, v| c.call_timeout_seconds = v,
    }
}
