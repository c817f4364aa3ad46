//! Helper functions for settings operations.

use crate::core::config::data::Config;
use crate::core::config::ConfigError;

use super::error::SettingError;
use super::SetContext;

/// Wrapper around `Config::mutate_at` that maps errors to `SettingError`.
pub fn mutate_config<F>(ctx: &SetContext<'_>, f: F) -> Result<(), SettingError>
where
    F: FnOnce(&mut Config) -> Result<(), ConfigError>,
{
    Config::mutate_at(ctx.config_path, f).map_err(SettingError::from)
}

pub fn success_set(key: &str, display: &str) -> String {
    format!("✅ Set {key} to: {display}")
}

pub fn success_unset(key: &str, default_display: &str) -> String {
    format!("✅ Unset {key} (will use default: {default_display})")
}

/// Masks all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}
