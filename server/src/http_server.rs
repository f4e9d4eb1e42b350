use crate::api::{BrowserMemory, BrowserMemoryRequest, ChatRequest, EnhancementResponse};
use crate::config::AppConfig;
use axum::{
    body::StreamBody,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use enhancer_agent::Agent;
use enhancer_core::Content;
use futures_util::stream;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    agent: Arc<Agent>,
}

impl AppState {
    pub fn new(config: AppConfig, agent: Agent) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
        }
    }
}

/// Start the HTTP server
pub async fn run_server(config: AppConfig, agent: Agent, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let app = build_router(AppState::new(config, agent));

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Build the router with all routes and CORS
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(redirect_root_to_docs))
        .route("/docs", get(docs))
        .route("/enhance", post(enhance_browser_memories))
        .route("/stream_messages", post(stream_chat_events))
        .route("/feedback", post(collect_feedback))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Redirect the root URL to the API documentation
async fn redirect_root_to_docs() -> Redirect {
    Redirect::temporary("/docs")
}

const DOCS_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>browser-enhancer</title></head>\n<body>\n<h1>browser-enhancer</h1>\n<p>API for enhancing browser memory responses with multi-agent analysis.</p>\n<ul>\n<li><code>POST /enhance</code> - enhance a query with pre-retrieved browsing memories</li>\n<li><code>POST /stream_messages</code> - stream chat events for an input chat</li>\n<li><code>POST /feedback</code> - log a feedback payload</li>\n<li><code>GET /health</code> - liveness check</li>\n</ul>\n</body>\n</html>\n";

async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

/// Simple health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": "browser-enhancer"}))
}

/// Collect and log feedback
async fn collect_feedback(Json(feedback): Json<Value>) -> impl IntoResponse {
    info!(feedback = %feedback, "Feedback received");
    Json(json!({"status": "success"}))
}

/// Enhance browser memory responses using the conversational agent.
///
/// Failures are masked as soft degraded responses: the endpoint always
/// answers 200 with best-effort text, never an error status.
async fn enhance_browser_memories(
    State(state): State<AppState>,
    Json(request): Json<BrowserMemoryRequest>,
) -> Json<EnhancementResponse> {
    let prompt = build_prompt(&request);

    match state.agent.run(vec![Content::user(prompt)]).await {
        Ok(response_content) => {
            info!(
                query = %request.query,
                memories_count = request.relevant_memories.len(),
                response_length = response_content.len(),
                status = "success",
                "Enhanced browser memories"
            );

            Json(EnhancementResponse {
                enhanced_response: response_content,
                agent_insights: agent_insights(&request.relevant_memories),
                processing_details: json!({
                    "agentType": "multi_agent_crew",
                    "model": state.config.model.crew_model_name(),
                    "processedAt": chrono::Utc::now().to_rfc3339(),
                }),
            })
        }
        Err(e) => {
            error!(
                query = %request.query,
                error = %e,
                status = "error",
                "Enhancement failed"
            );

            Json(degraded_response(&request, &e.to_string()))
        }
    }
}

/// Stream chat events in response to an input request
async fn stream_chat_events(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let config = request.config.unwrap_or_default().ensure_valid();
    let run_id = config.run_id.unwrap_or_else(Uuid::new_v4);
    let transcript = request.input.into_contents();

    let (tx, rx) = mpsc::channel(16);
    let agent = Arc::clone(&state.agent);
    tokio::spawn(async move {
        agent.run_stream(transcript, run_id, tx).await;
    });

    let body = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut line = serde_json::to_string(&event).unwrap_or_default();
        line.push('\n');
        Some((Ok::<_, std::convert::Infallible>(line), rx))
    });

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        StreamBody::new(body),
    )
}

/// Render memories as a text blob, one block per memory, in input order.
fn format_memories(memories: &[BrowserMemory]) -> String {
    memories
        .iter()
        .map(|memory| {
            format!(
                "Title: {}\nURL: {}\nContent: {}\nRelevance: {:.2}",
                memory.title, memory.url, memory.content, memory.similarity
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Join context lines, or substitute the fixed placeholder when empty.
fn format_user_context(context: &[String]) -> String {
    if context.is_empty() {
        "No previous context".to_string()
    } else {
        context.join("\n")
    }
}

/// Single formatted prompt handed to the agent.
fn build_prompt(request: &BrowserMemoryRequest) -> String {
    format!(
        "Query: {}\n\nRelevant Memories:\n{}\n\nUser Context:\n{}",
        request.query,
        format_memories(&request.relevant_memories),
        format_user_context(&request.user_context)
    )
}

/// Best-effort metadata derived from the supplied memories.
fn agent_insights(memories: &[BrowserMemory]) -> Value {
    let top_topics: Vec<&str> = memories
        .iter()
        .take(3)
        .map(|memory| memory.title.as_str())
        .collect();

    let average_relevance = if memories.is_empty() {
        json!(0)
    } else {
        let sum: f64 = memories.iter().map(|memory| memory.similarity).sum();
        json!(sum / memories.len() as f64)
    };

    json!({
        "memoriesAnalyzed": memories.len(),
        "topTopics": top_topics,
        "averageRelevance": average_relevance,
    })
}

/// Templated apology returned when the agent fails.
fn degraded_response(request: &BrowserMemoryRequest, error: &str) -> EnhancementResponse {
    let detail = if request.relevant_memories.is_empty() {
        "No relevant memories were found.".to_string()
    } else {
        format!(
            "You have {} relevant memories that might help answer this question.",
            request.relevant_memories.len()
        )
    };

    EnhancementResponse {
        enhanced_response: format!(
            "I apologize, but I encountered an error while processing your request. \
             Here's what I can tell you based on your query '{}': {}",
            request.query, detail
        ),
        agent_insights: json!({"error": "Agent processing failed", "fallback": true}),
        processing_details: json!({"error": error}),
    }
}
