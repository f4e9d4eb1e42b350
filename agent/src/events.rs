use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Event records emitted while the model/tool graph executes.
///
/// Serialized one per line on the streaming endpoint.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text produced by the conversational model.
    AgentMessage { run_id: Uuid, content: String },
    /// The model requested the enhancement capability.
    ToolCall {
        run_id: Uuid,
        name: String,
        arguments: Value,
    },
    /// The capability finished and its output was fed back to the model.
    ToolResult {
        run_id: Uuid,
        name: String,
        content: String,
    },
    /// The graph failed; the stream ends after this event.
    Error { run_id: Uuid, message: String },
    /// The graph reached its terminal state.
    RunCompleted { run_id: Uuid },
}
