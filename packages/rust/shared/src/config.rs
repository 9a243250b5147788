//! Application configuration for AssetPilot.
//!
//! User config lives at `~/.assetpilot/assetpilot.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file — only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssetPilotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "assetpilot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".assetpilot";

// ---------------------------------------------------------------------------
// Config structs (matching assetpilot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Jobs dispatched concurrently per wave.
    #[serde(default = "default_wave_size")]
    pub wave_size: usize,

    /// Path to the history/monitor database.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            wave_size: default_wave_size(),
            database_path: default_database_path(),
        }
    }
}

fn default_wave_size() -> usize {
    20
}
fn default_database_path() -> String {
    "~/.assetpilot/assetpilot.db".into()
}

/// `[providers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Name of the env var holding the web-search provider key.
    #[serde(default = "default_search_key_env")]
    pub search_key_env: String,

    /// Name of the env var holding the general-purpose provider key.
    #[serde(default = "default_general_key_env")]
    pub general_key_env: String,

    /// Per-request timeout for completion calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            search_key_env: default_search_key_env(),
            general_key_env: default_general_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_search_key_env() -> String {
    "PERPLEXITY_API_KEY".into()
}
fn default_general_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_request_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.assetpilot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AssetPilotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.assetpilot/assetpilot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AssetPilotError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AssetPilotError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AssetPilotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AssetPilotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AssetPilotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve a leading `~/` in a configured path against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// API key loading & sanitization
// ---------------------------------------------------------------------------

/// API keys resolved from the environment, sanitized and ready to use.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Web-search provider key (`pplx-…`), if configured and well-formed.
    pub search: Option<String>,
    /// General-purpose provider key (`sk-…`), if configured and well-formed.
    pub general: Option<String>,
}

/// Load and sanitize API keys from the env vars named in the config.
///
/// Keys pasted from dashboards routinely arrive wrapped in quotes or angle
/// brackets, or embedded in surrounding text; sanitization recovers the
/// usable token instead of failing the whole run.
pub fn load_api_keys(config: &AppConfig) -> ApiKeys {
    let search = std::env::var(&config.providers.search_key_env)
        .ok()
        .map(|raw| sanitize_key(&raw))
        .filter(|key| is_usable_search_key(key));

    let general = std::env::var(&config.providers.general_key_env)
        .ok()
        .map(|raw| sanitize_key(&raw))
        .map(|key| extract_general_key(&key))
        .filter(|key| key.starts_with("sk-"));

    if search.is_none() {
        tracing::debug!(
            var = %config.providers.search_key_env,
            "no usable web-search provider key in environment"
        );
    }
    if general.is_none() {
        tracing::debug!(
            var = %config.providers.general_key_env,
            "no usable general-purpose provider key in environment"
        );
    }

    ApiKeys { search, general }
}

/// Strip whitespace and one layer of quoting (`"…"`, `'…'`, `<…>`).
pub fn sanitize_key(raw: &str) -> String {
    let mut key = raw.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('<', '>')] {
        if key.len() >= 2 && key.starts_with(open) && key.ends_with(close) {
            key = key[1..key.len() - 1].trim();
        }
    }
    key.to_string()
}

/// A web-search provider key is usable only with the expected prefix and a
/// plausible length.
pub fn is_usable_search_key(key: &str) -> bool {
    key.starts_with("pplx-") && key.len() > 10
}

/// Recover an `sk-…` token embedded in surrounding text, or return the
/// input unchanged.
fn extract_general_key(key: &str) -> String {
    if key.starts_with("sk-") {
        return key.to_string();
    }
    let project = regex::Regex::new(r"sk-proj-[A-Za-z0-9\-]{50,}").expect("static regex");
    let personal = regex::Regex::new(r"sk-[A-Za-z0-9]{20,}").expect("static regex");
    project
        .find(key)
        .or_else(|| personal.find(key))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("wave_size"));
        assert!(toml_str.contains("PERPLEXITY_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.wave_size, 20);
        assert_eq!(parsed.providers.search_key_env, "PERPLEXITY_API_KEY");
        assert_eq!(parsed.providers.request_timeout_secs, 60);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
wave_size = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.wave_size, 5);
        assert_eq!(config.providers.general_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn sanitize_strips_quotes_and_brackets() {
        assert_eq!(sanitize_key("  \"pplx-abcdef123456\"  "), "pplx-abcdef123456");
        assert_eq!(sanitize_key("'sk-test'"), "sk-test");
        assert_eq!(sanitize_key("<sk-test>"), "sk-test");
        assert_eq!(sanitize_key("sk-test"), "sk-test");
    }

    #[test]
    fn search_key_requires_prefix_and_length() {
        assert!(is_usable_search_key("pplx-abcdef123456"));
        assert!(!is_usable_search_key("pplx-x"));
        assert!(!is_usable_search_key("sk-abcdef123456"));
    }

    #[test]
    fn general_key_extracted_from_surrounding_text() {
        let embedded = format!("my key is sk-{}", "a".repeat(24));
        let extracted = extract_general_key(&embedded);
        assert!(extracted.starts_with("sk-"));
        assert!(!extracted.contains(' '));
    }

    #[test]
    fn expand_home_passes_through_absolute_paths() {
        assert_eq!(expand_home("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
    }
}
