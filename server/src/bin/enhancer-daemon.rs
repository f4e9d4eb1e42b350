use clap::Parser;
use enhancer_agent::{Agent, MemoryCrewCapability};
use enhancer_core::{text_model_for_id, GeminiClient};
use enhancer_server::config::AppConfig;
use enhancer_server::http_server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "enhancer-daemon", about = "Browser memory enhancement service")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Gemini API key for the conversational model
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// OpenAI API key for crew personas bound to gpt models
    #[arg(long)]
    openai_api_key: Option<String>,

    /// Chat model id for the conversational router
    #[arg(short = 'o', long)]
    model: Option<String>,

    /// Model id the crew personas are bound to
    #[arg(long)]
    crew_model: Option<String>,

    /// System prompt override for the router
    #[arg(short, long)]
    system_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Pick up .env credentials before reading configuration
    dotenvy::dotenv().ok();

    info!("Starting enhancer daemon");

    let args = Args::parse();

    // Load config from file or use defaults
    let mut config = match &args.config {
        Some(config_path) => match AppConfig::load_from_file(config_path) {
            Ok(cfg) => {
                info!("Loaded configuration from {}", config_path.display());
                cfg
            }
            Err(e) => {
                error!(
                    "Failed to load configuration from {}: {}",
                    config_path.display(),
                    e
                );
                return Err(anyhow::anyhow!("Configuration error: {}", e));
            }
        },
        None => match AppConfig::load_from_default() {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                return Err(anyhow::anyhow!("Configuration error: {}", e));
            }
        },
    };

    // Environment credentials fill anything the file left empty
    config.model = config.model.apply_env();

    // Update config from CLI args
    if let Some(http_addr) = args.http_addr {
        config.http_addr = http_addr;
    }
    if let Some(api_key) = args.api_key {
        config.model.gemini_api_key = Some(api_key);
    }
    if let Some(openai_api_key) = args.openai_api_key {
        config.model.openai_api_key = Some(openai_api_key);
    }
    if let Some(model) = args.model {
        config.model.chat_model = Some(model);
    }
    if let Some(crew_model) = args.crew_model {
        config.model.crew_model = Some(crew_model);
    }
    if let Some(system_prompt) = args.system_prompt {
        config.model.system_prompt = Some(system_prompt);
    }

    if config.model.gemini_api_key.is_none() {
        // Startup continues; provider calls will fail until a key arrives.
        info!("No Gemini API key configured; model calls will fail");
    }

    // Initialize the conversational model client
    let chat_client = GeminiClient::new(&config.model)?;
    info!(model = %chat_client.model_name(), "Initialized chat model client");

    // Initialize the crew's text model and the enhancement capability
    let crew_model = text_model_for_id(&config.model.crew_model_name(), &config.model)?;
    info!(
        provider = crew_model.provider_name(),
        model = %crew_model.model_name(),
        "Initialized crew text model"
    );
    let capability = Arc::new(MemoryCrewCapability::new(crew_model));

    let mut agent = Agent::new(Arc::new(chat_client), capability);
    if let Some(system_prompt) = config.model.system_prompt.clone() {
        agent = agent.with_system_prompt(system_prompt);
    }

    let addr = config.http_addr;
    http_server::run_server(config, agent, addr).await
}
