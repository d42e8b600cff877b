//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MHTML2PDF_CONFIG` (environment variable)
//! 2. `~/.config/mhtml2pdf/config.toml` (Linux/macOS)
//!    `%APPDATA%\mhtml2pdf\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Page rendering.
    pub render: RenderConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Keep `<name>_files/` and `<name>.html` after a successful conversion.
    pub keep_intermediate: bool,
    /// Override the directory the log file is written to.
    pub cache_dir: Option<PathBuf>,
}

/// Settings for the browser that prints pages to PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Browser executable. Searched on `PATH` when unset.
    pub chrome_path: Option<PathBuf>,
    /// Additional command-line arguments for the browser (e.g. `--no-sandbox`).
    pub extra_args: Vec<String>,
    /// User-agent presented to the page.
    pub user_agent: String,
    /// Selector that must be visible before printing.
    pub wait_selector: String,
    /// Print background colors and images.
    pub print_background: bool,
    /// Seconds to wait for the browser before giving up.
    pub timeout_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            keep_intermediate: false,
            cache_dir: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_args: Vec::new(),
            user_agent: "WebScraper 1.0".to_string(),
            wait_selector: "body".to_string(),
            print_background: true,
            timeout_secs: 60,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MHTML2PDF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mhtml2pdf").join("config.toml"))
}

/// Return the directory for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mhtml2pdf")
}
