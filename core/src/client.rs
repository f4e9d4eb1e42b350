use std::time::Duration;

use reqwest::Client;

use crate::config::ModelConfig;
use crate::errors::{CoreError, CoreResult};
use crate::types::*;

/// Client for the conversational chat model API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model_name: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    /// Create a new chat model client.
    ///
    /// A missing API key is tolerated here so the service can start without
    /// credentials; the first call to the provider fails instead.
    pub fn new(config: &ModelConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::RequestError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone(),
            model_name: config.chat_model_name(),
            temperature: config.temperature,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Get the base API URL
    fn get_base_url(&self) -> CoreResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::ConfigError("No Gemini API key configured (set GEMINI_API_KEY)".to_string())
        })?;

        Ok(format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, api_key
        ))
    }

    /// Generate content from the model
    pub async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> CoreResult<GenerateContentResponse> {
        let url = self.get_base_url()?;

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                CoreError::ResponseError(format!("Failed to read error response: {}", e))
            })?;

            return Err(CoreError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        let response_body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| CoreError::ParsingError(format!("Failed to parse response: {}", e)))?;

        Ok(response_body)
    }

    /// Build a chat request from a transcript, system prompt, and tool set.
    pub fn chat_request(
        &self,
        contents: Vec<Content>,
        system_prompt: &str,
        tools: &[Tool],
    ) -> GenerateContentRequest {
        let system_instruction = Content {
            parts: vec![Part::text(system_prompt.to_string())],
            role: Some("system".to_string()),
        };

        GenerateContentRequest {
            contents,
            system_instruction: Some(system_instruction),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
                ..GenerationConfig::default()
            }),
        }
    }

    /// Helper method to extract text from a response
    pub fn extract_text_from_response(response: &GenerateContentResponse) -> CoreResult<String> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| CoreError::ResponseError("No candidates in response".to_string()))?;

        let content = candidate
            .content
            .as_ref()
            .ok_or_else(|| CoreError::ResponseError("No content in candidate".to_string()))?;

        Ok(content.text())
    }

    /// Helper method to extract function calls from a response
    pub fn extract_function_calls_from_response(
        response: &GenerateContentResponse,
    ) -> Vec<FunctionCall> {
        response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.function_calls())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client(api_key: Option<&str>) -> GeminiClient {
        let config = ModelConfig {
            gemini_api_key: api_key.map(str::to_string),
            ..ModelConfig::default()
        };
        GeminiClient::new(&config).expect("client")
    }

    #[test]
    fn missing_api_key_fails_at_request_time_not_construction() {
        let client = test_client(None);
        let err = client.get_base_url().expect_err("should need a key");
        assert!(matches!(err, CoreError::ConfigError(_)));
    }

    #[test]
    fn chat_request_carries_system_prompt_and_tools() {
        let client = test_client(Some("key"));
        let tools = vec![Tool {
            function_declarations: vec![FunctionDeclaration {
                name: "enhance_memory_response".to_string(),
                description: None,
                parameters: json!({"type": "object"}),
            }],
        }];

        let request = client.chat_request(vec![Content::user("hi")], "be friendly", &tools);
        assert_eq!(
            request.system_instruction.as_ref().map(|c| c.text()),
            Some("be friendly".to_string())
        );
        assert_eq!(request.tools.as_ref().map(|t| t.len()), Some(1));
        assert_eq!(
            request
                .generation_config
                .as_ref()
                .and_then(|g| g.temperature),
            Some(0.7)
        );
    }

    #[test]
    fn empty_tool_set_is_omitted_from_the_request() {
        let client = test_client(Some("key"));
        let request = client.chat_request(vec![Content::user("hi")], "sys", &[]);
        assert!(request.tools.is_none());
    }

    #[test]
    fn extracts_text_and_function_calls() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "checking your browsing"},
                        {"functionCall": {"name": "enhance_memory_response", "args": {"query": "wassup"}}}
                    ]
                }
            }]
        }))
        .expect("parse");

        assert_eq!(
            GeminiClient::extract_text_from_response(&response).expect("text"),
            "checking your browsing"
        );
        let calls = GeminiClient::extract_function_calls_from_response(&response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "enhance_memory_response");
    }
}
