use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::errors::{CoreError, CoreResult};
use crate::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};

/// Common trait for text-generation backends
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate text from a prompt
    async fn generate(&self, prompt: &str) -> CoreResult<String>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

/// Select a backend from a model identifier string.
///
/// "gpt-*" ids go to the OpenAI chat completions API, everything else to
/// the Gemini generateContent API.
pub fn text_model_for_id(model_id: &str, config: &ModelConfig) -> CoreResult<Arc<dyn TextModel>> {
    if model_id.starts_with("gpt") {
        Ok(Arc::new(OpenAiTextModel::new(
            config.openai_api_key.clone(),
            model_id.to_string(),
            config.temperature,
        )?))
    } else {
        Ok(Arc::new(GeminiTextModel::new(
            config.gemini_api_key.clone(),
            model_id.to_string(),
            config.temperature,
        )?))
    }
}

//------------------------------------------------------------------------------
// Gemini backend
//------------------------------------------------------------------------------

/// Gemini text-generation backend
#[derive(Debug, Clone)]
pub struct GeminiTextModel {
    api_key: Option<String>,
    model_name: String,
    temperature: Option<f32>,
    http_client: Client,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorBody {
    code: u32,
    message: String,
    status: String,
}

impl GeminiTextModel {
    pub fn new(
        api_key: Option<String>,
        model_name: String,
        temperature: Option<f32>,
    ) -> CoreResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::RequestError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model_name,
            temperature,
            http_client,
        })
    }

    fn api_url(&self) -> CoreResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::ConfigError("No Gemini API key configured (set GEMINI_API_KEY)".to_string())
        })?;

        Ok(format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, api_key
        ))
    }
}

#[async_trait]
impl TextModel for GeminiTextModel {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        debug!("Generating text with Gemini model: {}", self.model_name);

        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: None,
            tools: None,
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
                ..GenerationConfig::default()
            }),
        };

        let url = self.api_url()?;
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CoreError::ResponseError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&response_text)
            {
                return Err(CoreError::ApiError(format!(
                    "Gemini API error: {} (code: {}, status: {})",
                    error_response.error.message,
                    error_response.error.code,
                    error_response.error.status
                )));
            }
            return Err(CoreError::HttpError {
                status_code: status.as_u16(),
                message: response_text,
            });
        }

        let gemini_response: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| CoreError::ParsingError(format!("Failed to parse response: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.text())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CoreError::ResponseError(
                "No text generated by Gemini".to_string(),
            ));
        }

        Ok(text)
    }
}

//------------------------------------------------------------------------------
// OpenAI backend
//------------------------------------------------------------------------------

/// OpenAI chat completions backend
#[derive(Debug, Clone)]
pub struct OpenAiTextModel {
    api_key: Option<String>,
    model_name: String,
    temperature: Option<f32>,
    http_client: Client,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiErrorResponse {
    error: OpenAiErrorBody,
}

#[derive(Deserialize, Debug)]
struct OpenAiErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl OpenAiTextModel {
    pub fn new(
        api_key: Option<String>,
        model_name: String,
        temperature: Option<f32>,
    ) -> CoreResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(45))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::RequestError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model_name,
            temperature,
            http_client,
        })
    }
}

#[async_trait]
impl TextModel for OpenAiTextModel {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        debug!("Generating text with OpenAI model: {}", self.model_name);

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::ConfigError("No OpenAI API key configured (set OPENAI_API_KEY)".to_string())
        })?;

        let request = OpenAiRequest {
            model: &self.model_name,
            messages: vec![OpenAiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .http_client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CoreError::ResponseError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(&response_text)
            {
                return Err(CoreError::ApiError(format!(
                    "OpenAI API error: {} (type: {})",
                    error_response.error.message,
                    error_response.error.error_type.as_deref().unwrap_or("unknown")
                )));
            }
            return Err(CoreError::HttpError {
                status_code: status.as_u16(),
                message: response_text,
            });
        }

        let openai_response: OpenAiResponse = serde_json::from_str(&response_text)
            .map_err(|e| CoreError::ParsingError(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ResponseError("No choices in response".to_string()))?;

        if let Some(reason) = &choice.finish_reason {
            if reason != "stop" {
                warn!("OpenAI generation finish reason: {}", reason);
            }
        }

        choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| CoreError::ResponseError("OpenAI returned empty response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpt_ids_select_the_openai_backend() {
        let config = ModelConfig::default();
        let model = text_model_for_id("gpt-3.5-turbo", &config).expect("model");
        assert_eq!(model.provider_name(), "openai");
        assert_eq!(model.model_name(), "gpt-3.5-turbo");
    }

    #[test]
    fn other_ids_select_the_gemini_backend() {
        let config = ModelConfig::default();
        let model = text_model_for_id("gemini-2.5-flash", &config).expect("model");
        assert_eq!(model.provider_name(), "gemini");
        assert_eq!(model.model_name(), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn generate_without_credentials_is_a_config_error() {
        let model = OpenAiTextModel::new(None, "gpt-3.5-turbo".to_string(), None).expect("model");
        let err = model.generate("hi").await.expect_err("should fail");
        assert!(matches!(err, CoreError::ConfigError(_)));
    }
}
