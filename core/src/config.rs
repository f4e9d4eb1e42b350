use crate::errors::CoreResult;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the model providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Model id used by the conversational router.
    pub chat_model: Option<String>,
    /// Model id the crew personas are bound to.
    pub crew_model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openai_api_key: None,
            chat_model: Some("gemini-2.5-flash".to_string()),
            crew_model: Some("gpt-3.5-turbo".to_string()),
            system_prompt: None,
            temperature: Some(0.7),
        }
    }
}

impl ModelConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                crate::errors::CoreError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                crate::errors::CoreError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> CoreResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            crate::errors::CoreError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                crate::errors::CoreError::ConfigError(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            crate::errors::CoreError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            gemini_api_key: other
                .gemini_api_key
                .clone()
                .or_else(|| self.gemini_api_key.clone()),
            openai_api_key: other
                .openai_api_key
                .clone()
                .or_else(|| self.openai_api_key.clone()),
            chat_model: other.chat_model.clone().or_else(|| self.chat_model.clone()),
            crew_model: other.crew_model.clone().or_else(|| self.crew_model.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            temperature: other.temperature.or(self.temperature),
        }
    }

    /// Fills missing credentials from the process environment.
    ///
    /// A missing key never fails here; the first provider call reports it.
    pub fn apply_env(mut self) -> Self {
        if self.gemini_api_key.is_none() {
            self.gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        }
        if self.openai_api_key.is_none() {
            self.openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }
        self
    }

    pub fn chat_model_name(&self) -> String {
        self.chat_model
            .clone()
            .unwrap_or_else(|| "gemini-2.5-flash".to_string())
    }

    pub fn crew_model_name(&self) -> String {
        self.crew_model
            .clone()
            .unwrap_or_else(|| "gpt-3.5-turbo".to_string())
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> CoreResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        crate::errors::CoreError::ConfigError("Could not determine home directory".to_string())
    })?;

    let config_dir = home_dir.join(".config").join(app_name);

    Ok(config_dir)
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> CoreResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
