//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FOLIO_*)
//! 2. TOML config file (if FOLIO_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Assets written into every new cache generation at install time.
///
/// Changing this list requires bumping `cache_version`.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/favicon.ico",
    "/dancing evernight.webp",
    "/comp 2.webp",
    "/billz png.png",
    "/vgen-logo.png",
    "/video bg.webm",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FOLIO_*)
/// 2. TOML config file (if FOLIO_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, used for the cache generation name and the
    /// visited flag key.
    ///
    /// Set via FOLIO_APP_NAME environment variable.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Cache generation version. Bump to purge the previous generation.
    ///
    /// Set via FOLIO_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// Origin the site is served from; decides same-origin population.
    ///
    /// Set via FOLIO_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths (origin-relative or absolute) cached eagerly at install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Path to SQLite storage database.
    ///
    /// Set via FOLIO_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via FOLIO_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via FOLIO_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    ///
    /// Set via FOLIO_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long the first-visit loading screen stays up, in milliseconds.
    ///
    /// Set via FOLIO_SPLASH_MS environment variable.
    #[serde(default = "default_splash_ms")]
    pub splash_ms: u64,

    /// Section that is active before any boundary reports.
    #[serde(default = "default_section")]
    pub default_section: String,

    /// Default fraction of a section that must be visible.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// Default viewport inset in rootMargin syntax.
    #[serde(default = "default_viewport_margin")]
    pub viewport_margin: String,
}

fn default_app_name() -> String {
    "billynabil-portfolio".into()
}

fn default_cache_version() -> u32 {
    1
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./folio-cache.sqlite")
}

fn default_user_agent() -> String {
    "folio/0.1".into()
}

fn default_max_bytes() -> usize {
    20_971_520 // 20MB, the showcase video is large
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_splash_ms() -> u64 {
    2_500
}

fn default_section() -> String {
    "home".into()
}

fn default_visibility_threshold() -> f64 {
    0.3
}

fn default_viewport_margin() -> String {
    "-100px 0px -100px 0px".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            splash_ms: default_splash_ms(),
            default_section: default_section(),
            visibility_threshold: default_visibility_threshold(),
            viewport_margin: default_viewport_margin(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// First-visit loading screen duration.
    pub fn splash(&self) -> Duration {
        Duration::from_millis(self.splash_ms)
    }

    /// Name of the current cache generation, e.g. `billynabil-portfolio-v1`.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.app_name, self.cache_version)
    }

    /// Local storage key gating the first-visit loading screen.
    pub fn visited_key(&self) -> String {
        crate::loading::visited_key(&self.app_name)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FOLIO_`
    /// 2. TOML file from `FOLIO_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FOLIO_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FOLIO_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
