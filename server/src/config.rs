use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use enhancer_core::{get_default_config_file, CoreError, CoreResult, ModelConfig};
use serde::{Deserialize, Serialize};

fn default_http_addr() -> SocketAddr {
    ([0, 0, 0, 0], 8000).into()
}

/// Service configuration: where to listen and which models to talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
    #[serde(default)]
    pub model: ModelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            model: ModelConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                CoreError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                CoreError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from the default location under the user config dir
    pub fn load_from_default() -> CoreResult<Self> {
        Self::load_from_file(&Self::default_config_path()?)
    }

    pub fn default_config_path() -> CoreResult<PathBuf> {
        get_default_config_file("browser-enhancer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_the_service_port() {
        let config = AppConfig::default();
        assert_eq!(config.http_addr.port(), 8000);
        assert_eq!(config.model.crew_model_name(), "gpt-3.5-turbo");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            "http_addr = \"127.0.0.1:9000\"\n\n[model]\nchat_model = \"gemini-2.0-flash\"\n",
        )
        .expect("parse");

        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.model.chat_model.as_deref(), Some("gemini-2.0-flash"));
        assert!(config.model.gemini_api_key.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).expect("load");
        assert_eq!(config.http_addr, default_http_addr());
    }
}
