use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for sift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Context size a single request (prompt pair plus rows) must fit in
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on in-flight model requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Column holding the integer row id
    #[serde(default = "default_index_column")]
    pub index_column: String,

    #[serde(default = "default_comparison_column")]
    pub comparison_column: String,

    /// Comparison value kept by the summarize tasks
    #[serde(default = "default_opinion_label")]
    pub opinion_label: String,

    /// Column compared row by row when combining two files
    #[serde(default = "default_check_column")]
    pub check_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_current_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_current_dir")]
    pub audit_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_context_tokens: default_max_context_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            index_column: default_index_column(),
            comparison_column: default_comparison_column(),
            opinion_label: default_opinion_label(),
            check_column: default_check_column(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_current_dir(),
            audit_dir: default_current_dir(),
        }
    }
}

fn default_model_name() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_context_tokens() -> usize {
    1500
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_concurrency() -> usize {
    8
}

fn default_index_column() -> String {
    "no".to_string()
}

fn default_comparison_column() -> String {
    "category".to_string()
}

fn default_opinion_label() -> String {
    "의견".to_string()
}

fn default_check_column() -> String {
    "opinion".to_string()
}

fn default_cache_dir() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "sift", "sift") {
        dirs.cache_dir().join("responses")
    } else {
        PathBuf::from("cache")
    }
}

fn default_current_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> anyhow::Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => anyhow::bail!(
                "No API key found; set the {} environment variable",
                self.api_key_env
            ),
        }
    }
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.dispatch.max_concurrency > 0,
            "dispatch.max_concurrency must be at least 1"
        );
        anyhow::ensure!(
            self.model.max_context_tokens > 0,
            "model.max_context_tokens must be at least 1"
        );
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "sift", "sift") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.sift/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gpt-3.5-turbo");
        assert_eq!(config.model.max_context_tokens, 1500);
        assert_eq!(config.model.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.dispatch.max_concurrency, 8);
        assert_eq!(config.dataset.index_column, "no");
        assert_eq!(config.dataset.opinion_label, "의견");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.base_url, config.model.base_url);
        assert_eq!(parsed.paths.cache_dir, config.paths.cache_dir);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [model]
            name = "gpt-4o-mini"
            temperature = 0.2

            [dataset]
            index_column = "id"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.model.name, "gpt-4o-mini");
        assert_eq!(parsed.model.temperature, Some(0.2));
        assert_eq!(parsed.model.max_context_tokens, 1500);
        assert_eq!(parsed.dataset.index_column, "id");
        assert_eq!(parsed.dataset.comparison_column, "category");
        assert_eq!(parsed.dispatch.max_concurrency, 8);
    }

    #[test]
    fn test_load_from_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.dispatch.max_concurrency, 8);

        std::fs::write(&path, "[dispatch]\nmax_concurrency = 2\n").unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.dispatch.max_concurrency, 2);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch]\nmax_concurrency = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
