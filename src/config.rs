use crate::datasources::openrouter::FALLBACK_MODELS;
use crate::error::{PlantOpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub explainer: ExplainerConfig,
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplainerConfig {
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub timeout_secs: u64,
    pub backoff_ms: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 40,
            backoff_ms: 1000,
        }
    }
}

impl std::fmt::Debug for ExplainerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("models", &self.models)
            .field("timeout_secs", &self.timeout_secs)
            .field("backoff_ms", &self.backoff_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Directory holding the trained model weights; defaults to the
    /// XDG data directory.
    pub model_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => {
                if !p.exists() {
                    return Err(PlantOpsError::Config(format!(
                        "Config file not found at {:?}",
                        p
                    )));
                }
                p
            }
            None => match Self::find_config_path() {
                // Every setting has a default, so a missing config file
                // is not an error.
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| PlantOpsError::Config(format!("Failed to read config: {}", e)))?;

        let config_str = Self::substitute_env_vars(&config_str);

        let config: Config = serde_yaml::from_str(&config_str)
            .map_err(|e| PlantOpsError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Search for config.yaml in standard locations.
    fn find_config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("plantops").join("config.yaml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// API key for the explanation backend: config first, then the
    /// OPENROUTER_API_KEY and HF_API_KEY environment variables.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.explainer
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .or_else(|| std::env::var("HF_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// Directory for the trained estimator weights.
    pub fn model_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.estimator.model_dir {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }
        let dir = Self::data_dir()?.join("model");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Directory where per-plant analysis snapshots are written.
    pub fn snapshot_dir(&self) -> Result<PathBuf> {
        let dir = Self::data_dir()?.join("snapshots");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("PLANTOPS_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| PlantOpsError::Config("Cannot determine data directory".into()))?
            .join("plantops"))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }
}
