use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use enhancer_core::{Content, FunctionCall, GeminiClient, Part, Tool};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::{Capability, CapabilityArgs, FALLBACK_REPLY};
use crate::events::StreamEvent;

/// System prompt for the conversational model.
const SYSTEM_PROMPT: &str = "You are a friendly AI assistant with access to the user's browsing memory.\n\
When the user sends you a message, respond naturally and conversationally, like a friend would.\n\
You can reference things they've been browsing when relevant, but keep it casual and natural.\n\n\
For casual greetings like 'wassup', 'hey', 'hi' - just respond like a normal person would.\n\
Example: If they say 'wassup', you might say 'Hey! Not much, just been checking out your browsing history. I see you've been working on some cool AI stuff. What's up?'\n\n\
Use the memory enhancement tool to get context about their browsing, then respond conversationally.\n\
Don't explain what you're doing - just chat naturally.";

/// Matches the runtime's recursion limit: the graph gives up rather than
/// bouncing between model and capability forever.
const MAX_GRAPH_STEPS: usize = 25;

/// One model reply, before routing.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

/// A model reply tagged by what the graph should do next.
#[derive(Debug)]
pub enum ModelStep {
    /// The model answered directly; the turn is done.
    FinalAnswer(String),
    /// The model wants the enhancement capability before answering.
    CapabilityRequest {
        text: String,
        calls: Vec<FunctionCall>,
    },
}

/// Seam over the conversational model so the graph can be driven without a
/// network in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn reply(
        &self,
        contents: &[Content],
        system_prompt: &str,
        tools: &[Tool],
    ) -> anyhow::Result<ModelReply>;
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn reply(
        &self,
        contents: &[Content],
        system_prompt: &str,
        tools: &[Tool],
    ) -> anyhow::Result<ModelReply> {
        let request = self.chat_request(contents.to_vec(), system_prompt, tools);
        let response = self.generate_content(request).await?;

        let text = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.text())
            .unwrap_or_default();
        let function_calls = GeminiClient::extract_function_calls_from_response(&response);

        Ok(ModelReply {
            text,
            function_calls,
        })
    }
}

/// The conversational router: alternates model calls and capability calls
/// until the model produces a final answer.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    capability: Arc<dyn Capability>,
    system_prompt: String,
    tools: Vec<Tool>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, capability: Arc<dyn Capability>) -> Self {
        let tools = vec![Tool {
            function_declarations: vec![capability.declaration()],
        }];

        Self {
            model,
            capability,
            system_prompt: SYSTEM_PROMPT.to_string(),
            tools,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// One model call, tagged by whether the turn can end.
    async fn step(&self, transcript: &[Content]) -> anyhow::Result<ModelStep> {
        let reply = self
            .model
            .reply(transcript, &self.system_prompt, &self.tools)
            .await?;

        if reply.function_calls.is_empty() {
            Ok(ModelStep::FinalAnswer(reply.text))
        } else {
            Ok(ModelStep::CapabilityRequest {
                text: reply.text,
                calls: reply.function_calls,
            })
        }
    }

    /// Run the graph to completion and return the final reply text.
    pub async fn run(&self, mut transcript: Vec<Content>) -> anyhow::Result<String> {
        for _ in 0..MAX_GRAPH_STEPS {
            match self.step(&transcript).await? {
                ModelStep::FinalAnswer(text) => {
                    info!(response_len = text.len(), "Conversation turn completed");
                    return Ok(text);
                }
                ModelStep::CapabilityRequest { text, calls } => {
                    transcript.push(model_reply_content(&text, &calls));
                    for call in calls {
                        let result = self.invoke_capability(&call).await;
                        transcript.push(tool_result_content(&call.name, &result));
                    }
                }
            }
        }

        Err(anyhow!(
            "graph exceeded {} steps without a final answer",
            MAX_GRAPH_STEPS
        ))
    }

    /// Run the graph, emitting events as it executes. The stream ends when
    /// the graph reaches its terminal state or fails.
    pub async fn run_stream(
        &self,
        mut transcript: Vec<Content>,
        run_id: Uuid,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        for _ in 0..MAX_GRAPH_STEPS {
            let step = match self.step(&transcript).await {
                Ok(step) => step,
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error {
                            run_id,
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            match step {
                ModelStep::FinalAnswer(text) => {
                    let _ = tx
                        .send(StreamEvent::AgentMessage {
                            run_id,
                            content: text,
                        })
                        .await;
                    let _ = tx.send(StreamEvent::RunCompleted { run_id }).await;
                    return;
                }
                ModelStep::CapabilityRequest { text, calls } => {
                    if !text.is_empty() {
                        let _ = tx
                            .send(StreamEvent::AgentMessage {
                                run_id,
                                content: text.clone(),
                            })
                            .await;
                    }
                    transcript.push(model_reply_content(&text, &calls));

                    for call in calls {
                        let _ = tx
                            .send(StreamEvent::ToolCall {
                                run_id,
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            })
                            .await;

                        let result = self.invoke_capability(&call).await;
                        let _ = tx
                            .send(StreamEvent::ToolResult {
                                run_id,
                                name: call.name.clone(),
                                content: result.clone(),
                            })
                            .await;
                        transcript.push(tool_result_content(&call.name, &result));
                    }
                }
            }
        }

        let _ = tx
            .send(StreamEvent::Error {
                run_id,
                message: format!("graph exceeded {} steps without a final answer", MAX_GRAPH_STEPS),
            })
            .await;
    }

    /// Invoke the capability for one function call. Failures collapse to the
    /// fixed fallback reply; the graph keeps going.
    async fn invoke_capability(&self, call: &FunctionCall) -> String {
        if call.name != self.capability.name() {
            warn!(name = %call.name, "Model requested an unknown tool");
            return FALLBACK_REPLY.to_string();
        }

        let args: CapabilityArgs =
            serde_json::from_value(call.arguments.clone()).unwrap_or_default();
        debug!(query = %args.query, "Invoking enhancement capability");

        match self.capability.invoke(args).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Capability invocation failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Model reply as transcript content, text part first, then the calls.
fn model_reply_content(text: &str, calls: &[FunctionCall]) -> Content {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(Part::text(text.to_string()));
    }
    parts.extend(calls.iter().cloned().map(Part::function_call));

    Content {
        parts,
        role: Some("model".to_string()),
    }
}

/// Capability output as transcript content the model reads next turn.
fn tool_result_content(name: &str, result: &str) -> Content {
    Content {
        parts: vec![Part::function_response(
            name.to_string(),
            json!({ "result": result }),
        )],
        role: Some("user".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enhancer_core::FunctionDeclaration;
    use std::sync::Mutex;

    /// Chat model stub that replays scripted replies and records the
    /// transcript it was shown on each call.
    struct ScriptedChatModel {
        replies: Mutex<Vec<ModelReply>>,
        seen_transcripts: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedChatModel {
        fn new(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen_transcripts: Mutex::new(Vec::new()),
            }
        }

        fn transcripts(&self) -> Vec<Vec<Content>> {
            self.seen_transcripts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn reply(
            &self,
            contents: &[Content],
            _system_prompt: &str,
            _tools: &[Tool],
        ) -> anyhow::Result<ModelReply> {
            self.seen_transcripts
                .lock()
                .unwrap()
                .push(contents.to_vec());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(anyhow!("no scripted reply left"));
            }
            Ok(replies.remove(0))
        }
    }

    /// Capability stub recording invocations.
    struct StubCapability {
        invocations: Mutex<Vec<CapabilityArgs>>,
        result: Option<String>,
    }

    impl StubCapability {
        fn succeeding(result: &str) -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                result: Some(result.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                result: None,
            }
        }

        fn invocations(&self) -> Vec<CapabilityArgs> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Capability for StubCapability {
        fn name(&self) -> &str {
            "enhance_memory_response"
        }

        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: self.name().to_string(),
                description: None,
                parameters: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, args: CapabilityArgs) -> anyhow::Result<String> {
            self.invocations.lock().unwrap().push(args);
            match &self.result {
                Some(result) => Ok(result.clone()),
                None => Err(anyhow!("crew execution failed")),
            }
        }
    }

    fn final_reply(text: &str) -> ModelReply {
        ModelReply {
            text: text.to_string(),
            function_calls: vec![],
        }
    }

    fn tool_reply(args: serde_json::Value) -> ModelReply {
        ModelReply {
            text: String::new(),
            function_calls: vec![FunctionCall {
                name: "enhance_memory_response".to_string(),
                arguments: args,
            }],
        }
    }

    #[tokio::test]
    async fn plain_reply_ends_the_turn_without_the_capability() {
        let model = Arc::new(ScriptedChatModel::new(vec![final_reply("Hey! What's up?")]));
        let capability = Arc::new(StubCapability::succeeding("unused"));
        let agent = Agent::new(model.clone(), capability.clone());

        let reply = agent
            .run(vec![Content::user("wassup")])
            .await
            .expect("run");

        assert_eq!(reply, "Hey! What's up?");
        assert!(capability.invocations().is_empty());
        assert_eq!(model.transcripts().len(), 1);
    }

    #[tokio::test]
    async fn capability_request_feeds_the_result_back_to_the_model() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            tool_reply(json!({
                "query": "wassup",
                "memories": "Title: Rust Book",
                "user_context": "No previous context"
            })),
            final_reply("You've been reading the Rust Book!"),
        ]));
        let capability = Arc::new(StubCapability::succeeding("crew says hi"));
        let agent = Agent::new(model.clone(), capability.clone());

        let reply = agent
            .run(vec![Content::user("wassup")])
            .await
            .expect("run");
        assert_eq!(reply, "You've been reading the Rust Book!");

        let invocations = capability.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].query, "wassup");
        assert_eq!(invocations[0].memories, "Title: Rust Book");

        // Second model call sees the tool result appended to the transcript.
        let transcripts = model.transcripts();
        assert_eq!(transcripts.len(), 2);
        let last = transcripts[1].last().expect("tool result content");
        let response = last.parts[0]
            .function_response
            .as_ref()
            .expect("function response part");
        assert_eq!(response.response["result"], "crew says hi");
    }

    #[tokio::test]
    async fn capability_failure_becomes_the_fallback_reply() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            tool_reply(json!({"query": "wassup"})),
            final_reply("done"),
        ]));
        let capability = Arc::new(StubCapability::failing());
        let agent = Agent::new(model.clone(), capability.clone());

        agent
            .run(vec![Content::user("wassup")])
            .await
            .expect("run");

        let transcripts = model.transcripts();
        let last = transcripts[1].last().expect("tool result content");
        let response = last.parts[0]
            .function_response
            .as_ref()
            .expect("function response part");
        assert_eq!(response.response["result"], FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn model_errors_propagate_from_run() {
        let model = Arc::new(ScriptedChatModel::new(vec![]));
        let capability = Arc::new(StubCapability::succeeding("unused"));
        let agent = Agent::new(model, capability);

        let result = agent.run(vec![Content::user("wassup")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stream_emits_tool_and_completion_events_in_order() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            tool_reply(json!({"query": "wassup"})),
            final_reply("all done"),
        ]));
        let capability = Arc::new(StubCapability::succeeding("crew result"));
        let agent = Agent::new(model, capability);

        let (tx, mut rx) = mpsc::channel(16);
        let run_id = Uuid::new_v4();
        agent
            .run_stream(vec![Content::user("wassup")], run_id, tx)
            .await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], StreamEvent::ToolCall { .. }));
        assert!(matches!(events[1], StreamEvent::ToolResult { .. }));
        assert!(
            matches!(&events[2], StreamEvent::AgentMessage { content, .. } if content == "all done")
        );
        assert!(matches!(events[3], StreamEvent::RunCompleted { .. }));
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn stream_surfaces_model_errors_as_an_error_event() {
        let model = Arc::new(ScriptedChatModel::new(vec![]));
        let capability = Arc::new(StubCapability::succeeding("unused"));
        let agent = Agent::new(model, capability);

        let (tx, mut rx) = mpsc::channel(16);
        agent
            .run_stream(vec![Content::user("hi")], Uuid::new_v4(), tx)
            .await;

        let event = rx.recv().await.expect("error event");
        assert!(matches!(event, StreamEvent::Error { .. }));
        assert!(rx.recv().await.is_none());
    }
}
