//! Application configuration for Syllatrack.
//!
//! User config lives at `~/.syllatrack/syllatrack.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyllatrackError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "syllatrack.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".syllatrack";

/// Owner assigned to records when no user is given.
pub const DEFAULT_USER_ID: &str = "demo-user";

// ---------------------------------------------------------------------------
// Config structs (matching syllatrack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Document and blob storage locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Owner for records created without an explicit user.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// How many upcoming tasks the insights view lists.
    #[serde(default = "default_upcoming_limit")]
    pub upcoming_limit: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            upcoming_limit: default_upcoming_limit(),
        }
    }
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.into()
}
fn default_upcoming_limit() -> usize {
    10
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file holding courses and tasks.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory used as the syllabus blob container.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            blob_dir: default_blob_dir(),
        }
    }
}

fn default_database_path() -> String {
    "var/syllatrack.db".into()
}
fn default_blob_dir() -> String {
    "var/syllabi".into()
}

/// Which chat-completions dialect the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible `/chat/completions` with bearer auth.
    #[default]
    OpenAi,
    /// Azure OpenAI deployment addressing with an `api-key` header.
    Azure,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Endpoint dialect.
    #[serde(default)]
    pub provider: LlmProvider,

    /// Base URL (e.g. `https://api.openai.com/v1` or the Azure resource URL).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name, or deployment name for Azure.
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure `api-version` query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_version() -> String {
    "2024-08-01-preview".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    /// Parse and validate the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            SyllatrackError::config(format!("invalid llm endpoint '{}': {e}", self.endpoint))
        })
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP API binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7071".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.syllatrack/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SyllatrackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.syllatrack/syllatrack.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SyllatrackError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SyllatrackError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SyllatrackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SyllatrackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SyllatrackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &LlmConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SyllatrackError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.llm).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("demo-user"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let toml_str = r#"
[llm]
provider = "azure"
endpoint = "https://example.openai.azure.com"
model = "syllabus-gpt"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.provider, LlmProvider::Azure);
        assert_eq!(config.llm.model, "syllabus-gpt");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.defaults.user_id, DEFAULT_USER_ID);
        assert_eq!(config.defaults.upcoming_limit, 10);
        assert_eq!(config.server.bind, "127.0.0.1:7071");
    }

    #[test]
    fn endpoint_url_rejects_garbage() {
        let llm = LlmConfig {
            endpoint: "not a url".into(),
            ..Default::default()
        };
        assert!(llm.endpoint_url().is_err());
        assert!(LlmConfig::default().endpoint_url().is_ok());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "SYLLATRACK_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
