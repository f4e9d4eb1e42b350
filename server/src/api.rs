use enhancer_core::Content;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single pre-retrieved browsing-history snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserMemory {
    pub title: String,
    pub content: String,
    pub url: String,
    /// Relevance score from the retrieval system, in [0, 1].
    pub similarity: f64,
    #[serde(default)]
    pub timestamp: String,
}

/// Request model for memory enhancement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserMemoryRequest {
    pub query: String,
    pub relevant_memories: Vec<BrowserMemory>,
    #[serde(default)]
    pub user_context: Vec<String>,
}

/// Response model for memory enhancement
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementResponse {
    pub enhanced_response: String,
    pub agent_insights: Value,
    pub processing_details: Value,
}

/// One chat message on the streaming endpoint.
///
/// Accepts either `role` or the `type` key some chat clients send.
#[derive(Debug, Clone, Deserialize)]
pub struct InputMessage {
    #[serde(alias = "type")]
    pub role: String,
    pub content: String,
}

/// Ordered input chat for a streaming run.
#[derive(Debug, Clone, Deserialize)]
pub struct InputChat {
    pub messages: Vec<InputMessage>,
}

impl InputChat {
    /// Map wire roles onto transcript roles.
    pub fn into_contents(self) -> Vec<Content> {
        self.messages
            .into_iter()
            .map(|message| match message.role.as_str() {
                "ai" | "assistant" | "model" => Content::model(message.content),
                _ => Content::user(message.content),
            })
            .collect()
    }
}

/// Optional per-run configuration for a streaming request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl RunConfig {
    /// Fill in whatever a run requires that the caller omitted.
    pub fn ensure_valid(mut self) -> Self {
        if self.run_id.is_none() {
            self.run_id = Some(Uuid::new_v4());
        }
        self
    }
}

/// Streaming request: input chat plus optional run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub input: InputChat,
    #[serde(default)]
    pub config: Option<RunConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enhancement_request_parses_camel_case_fields() {
        let request: BrowserMemoryRequest = serde_json::from_value(json!({
            "query": "wassup",
            "relevantMemories": [{
                "title": "Rust Book",
                "content": "ownership",
                "url": "https://doc.rust-lang.org/book/",
                "similarity": 0.8
            }]
        }))
        .expect("parse");

        assert_eq!(request.query, "wassup");
        assert_eq!(request.relevant_memories.len(), 1);
        assert_eq!(request.relevant_memories[0].timestamp, "");
        assert!(request.user_context.is_empty());
    }

    #[test]
    fn input_chat_maps_wire_roles_onto_transcript_roles() {
        let chat: InputChat = serde_json::from_value(json!({
            "messages": [
                {"type": "human", "content": "wassup"},
                {"role": "ai", "content": "hey"},
            ]
        }))
        .expect("parse");

        let contents = chat.into_contents();
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].text(), "hey");
    }

    #[test]
    fn ensure_valid_fills_a_missing_run_id() {
        let config = RunConfig::default().ensure_valid();
        assert!(config.run_id.is_some());

        let fixed = Uuid::new_v4();
        let config = RunConfig {
            run_id: Some(fixed),
            ..RunConfig::default()
        }
        .ensure_valid();
        assert_eq!(config.run_id, Some(fixed));
    }
}
