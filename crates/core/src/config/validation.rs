//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::section::ViewportMargin;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `app_name` is empty or contains whitespace
    /// - `cache_version` is 0
    /// - `origin` is not an http(s) origin
    /// - a manifest entry is neither origin-relative nor absolute
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `visibility_threshold` is outside `[0,1]`
    /// - `viewport_margin` does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.is_empty() || self.app_name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "app_name".into(),
                reason: "must be non-empty and contain no whitespace".into(),
            });
        }

        if self.cache_version == 0 {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must start at 1".into() });
        }

        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("{} is not an http(s) origin", self.origin),
            });
        }

        if self.manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "manifest".into(),
                hint: "list at least the root document \"/\"".into(),
            });
        }
        if let Some(entry) = self.manifest.iter().find(|e| !(e.starts_with('/') || e.contains("://"))) {
            return Err(ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("{entry} must be origin-relative (\"/...\") or absolute"),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(ConfigError::Invalid {
                field: "visibility_threshold".into(),
                reason: "must be within [0, 1]".into(),
            });
        }

        if let Err(e) = ViewportMargin::parse(&self.viewport_margin) {
            return Err(ConfigError::Invalid { field: "viewport_margin".into(), reason: e.to_string() });
        }

        if !self.manifest.iter().any(|e| e == "/") {
            tracing::warn!(
                manifest_len = self.manifest.len(),
                "manifest does not include the root document; offline navigation will have no app shell"
            );
        }

        Ok(())
    }
}
