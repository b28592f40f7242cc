//! Configuration management for llm.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Where the Ollama API is listening
    pub base_url: String,
    /// Chat model identifier (e.g. `llama3.2`)
    pub model: String,
    /// Sampling temperature applied to every lesson unless overridden
    pub temperature: f32,
    /// Request timeout for chat calls
    pub timeout_secs: u64,
    /// Model used by the semantic retrieval lesson
    pub embedding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the lesson server binds to
    pub bind: String,
    /// Directory holding the SQLite databases
    pub data_dir: PathBuf,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.5,
            timeout_secs: 120,
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Config {
    /// Load llm.toml if one can be found, otherwise defaults; env overrides last
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_path() {
            Ok(path) => {
                debug!(path = %path.display(), "Loading configuration");
                Self::load_from(path)?
            }
            Err(_) => {
                debug!("llm.toml not found, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find llm.toml by searching current directory and parents
    pub fn find_config_path() -> Result<PathBuf> {
        let mut current = std::env::current_dir()?;

        for _ in 0..10 {
            let candidate = current.join("llm.toml");
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        anyhow::bail!("llm.toml not found in current directory or parents")
    }

    /// Override file values with environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(raw) = var("OLLAMA_TEMPERATURE") {
            match raw.parse() {
                Ok(temperature) => self.ollama.temperature = temperature,
                Err(_) => warn!(value = %raw, "Ignoring unparseable OLLAMA_TEMPERATURE"),
            }
        }
        if let Some(model) = var("OLLAMA_EMBEDDING_MODEL") {
            self.ollama.embedding_model = model;
        }
        if let Some(bind) = var("LESSONS_BIND") {
            self.server.bind = bind;
        }
        if let Some(dir) = var("LESSONS_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ollama.model.trim().is_empty() {
            anyhow::bail!("ollama.model must not be empty");
        }
        if !(self.ollama.base_url.starts_with("http://")
            || self.ollama.base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "ollama.base_url must start with http:// or https:// (got {})",
                self.ollama.base_url
            );
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            anyhow::bail!(
                "ollama.temperature must be between 0.0 and 2.0 (got {})",
                self.ollama.temperature
            );
        }
        Ok(())
    }

    /// Get Ollama base URL without a trailing slash
    pub fn ollama_url(&self) -> String {
        self.ollama.base_url.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[ollama]
base_url = "http://10.0.0.5:11434/"
model = "mistral"
temperature = 0.0

[server]
bind = "0.0.0.0:9000"
data_dir = "/var/lib/lessons"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.ollama.temperature, 0.0);
        assert_eq!(config.ollama.timeout_secs, 120);
        assert_eq!(config.ollama_url(), "http://10.0.0.5:11434");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ollama.model, "llama3.2");
        assert_eq!(config.ollama.temperature, 0.5);
        assert_eq!(config.server.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.toml");
        std::fs::write(&path, "[ollama]\nmodel = \"qwen2.5\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ollama.model, "qwen2.5");

        std::fs::write(&path, "[ollama\nmodel = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OLLAMA_MODEL", "phi3"),
            ("OLLAMA_TEMPERATURE", "0.9"),
            ("LESSONS_BIND", "127.0.0.1:1234"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ollama.model, "phi3");
        assert!((config.ollama.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.server.bind, "127.0.0.1:1234");
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_bad_temperature_env_is_ignored() {
        let mut config = Config::default();
        config.apply_vars(|key| (key == "OLLAMA_TEMPERATURE").then(|| "warm".to_string()));
        assert_eq!(config.ollama.temperature, 0.5);
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.ollama.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ollama.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ollama.model = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
