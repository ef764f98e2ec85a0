mod repl;

use clap::{Parser, Subcommand};
use parley_agent::{ConversationRunner, ModelConfig};
use parley_session::ConversationStore;
use parley_tools::ToolRegistry;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parley", about = "Parley: streaming chat with tool calling")]
struct Cli {
    /// TOML config file; without it the backend is chosen from the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request complete responses instead of streams
    #[arg(long)]
    no_stream: bool,

    /// Bound on backend requests per user turn
    #[arg(long)]
    max_round_trips: Option<u32>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Interactive conversation (default)
    Chat,
    /// Run a single user turn and exit
    Ask {
        /// The message to send
        prompt: String,
    },
    /// List the registered tools
    Tools,
}

#[derive(Deserialize)]
struct ParleyConfig {
    model: ModelConfig,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ModelConfig> {
    let Some(path) = path else {
        return Ok(ModelConfig::from_env());
    };
    let raw = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())
    })?;
    let config: ParleyConfig = toml::from_str(&raw)?;
    Ok(config.model)
}

/// Loads the config and applies the command-line overrides on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<ModelConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.no_stream {
        config.stream = false;
    }
    if let Some(bound) = cli.max_round_trips {
        config.max_round_trips = bound;
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = resolve_config(&cli)?;

    let mut registry = ToolRegistry::new();
    parley_builtins::register_builtins(&mut registry);
    let tools = Arc::new(registry);

    info!(
        provider = ?config.provider,
        model = %config.model_id,
        stream = config.stream,
        "Backend selected"
    );

    let system_prompt = config.system_prompt.clone();
    let runner = ConversationRunner::new(config, tools.clone());
    let mut store = ConversationStore::new(system_prompt);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::chat(&runner, &mut store).await?,
        Commands::Ask { prompt } => repl::ask(&runner, &mut store, &prompt).await?,
        Commands::Tools => {
            for descriptor in tools.descriptors() {
                println!("{:<14} {}", descriptor.name, descriptor.description);
            }
        }
    }

    Ok(())
}
