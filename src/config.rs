//! Optional config file loading. Search order: ./substack.toml, then
//! $XDG_CONFIG_HOME/substack-api/config.toml (or ~/.config/substack-api/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// JSON cookie file for authenticated (paywalled) access.
    pub cookies_path: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Minimum delay between consecutive requests, in milliseconds.
    pub request_delay_ms: Option<u64>,
    /// Follow renamed user handles (default: true).
    pub follow_redirects: Option<bool>,
}

fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Search order: (1) ./substack.toml, (2) $XDG_CONFIG_HOME/substack-api/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("substack.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("substack-api").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return read_config(path).map(Some);
        }
    }
    Ok(None)
}
