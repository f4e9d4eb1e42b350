use async_trait::async_trait;
use enhancer_core::FunctionDeclaration;
use serde::Deserialize;

/// Fixed reply used when the enhancement capability fails.
pub const FALLBACK_REPLY: &str =
    "Hey! I see you've been browsing some interesting stuff. What's up?";

/// Arguments the model supplies when requesting the enhancement capability.
///
/// Missing fields default to empty strings; the model does not always fill
/// every slot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CapabilityArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub memories: String,
    #[serde(default)]
    pub user_context: String,
}

/// An external action the conversational model may request mid-turn.
///
/// The router declares the capability to the model as a function tool and
/// invokes it when the model emits a matching function call.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    /// Function declaration advertised to the model.
    fn declaration(&self) -> FunctionDeclaration;

    /// Produce response text for the given arguments.
    ///
    /// Errors are converted by the router into [`FALLBACK_REPLY`]; they are
    /// never surfaced to the client.
    async fn invoke(&self, args: CapabilityArgs) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_argument_fields_default_to_empty() {
        let args: CapabilityArgs =
            serde_json::from_value(json!({"query": "wassup"})).expect("parse");
        assert_eq!(args.query, "wassup");
        assert_eq!(args.memories, "");
        assert_eq!(args.user_context, "");
    }
}
