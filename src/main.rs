use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use playflow_core::{AccountSecrets, AppConfig, EventBus, FlowContent, NodeExecutionEvent, RunEvent};
use playflow_llm::{create_chat_client, ElevenLabsClient, HuggingFaceClient};
use playflow_nodes::{IntegrationClients, NodeRegistry};
use playflow_runner::{validate_flow, BatchRunner, FlowExecutor, FlowInputs, PreparedFlow};

#[derive(Parser)]
#[command(name = "playflow", version, about = "Run prompt-engineering flow graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "playflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a flow for integrity, graph, and secret problems
    Validate {
        /// Flow content JSON file
        flow: PathBuf,
    },
    /// Run a flow once and print its outcome as JSON
    Run {
        /// Flow content JSON file
        flow: PathBuf,
        /// Flow input as NAME=VALUE; VALUE is parsed as JSON, else taken as a string
        #[arg(short, long = "input")]
        inputs: Vec<String>,
        /// Ask integration nodes for streamed output
        #[arg(long)]
        stream: bool,
    },
    /// Run a flow over every row of a JSON array of input objects
    Batch {
        /// Flow content JSON file
        flow: PathBuf,
        /// JSON file holding an array of input objects
        #[arg(long)]
        rows: PathBuf,
        /// Times to repeat every row
        #[arg(long, default_value = "1")]
        repeat: usize,
        /// Concurrent runs (defaults to the configured batch concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List the available node types
    NodeTypes,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("playflow=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    let registry = Arc::new(build_registry(&config)?);

    match cli.command {
        Commands::Validate { flow } => {
            let content = load_flow(&flow)?;
            let errors = validate_flow(&content, &registry, &config.secrets);
            if errors.is_empty() {
                println!("Flow is valid");
                return Ok(());
            }
            for error in &errors {
                println!("{}", error);
            }
            bail!("{} validation error(s)", errors.len());
        }
        Commands::Run {
            flow,
            inputs,
            stream,
        } => {
            config.run.prefer_streaming |= stream;
            let prepared = Arc::new(PreparedFlow::prepare(load_flow(&flow)?)?);
            let inputs = parse_inputs(&inputs)?;
            let executor = FlowExecutor::new(registry, config.run.clone(), config.secrets.clone());

            let events = Arc::new(EventBus::new(config.run.event_buffer.max(1)));
            let printer = spawn_event_printer(events.subscribe());
            let cancel = shutdown_token();

            let outcome = executor.run(prepared, inputs, Arc::clone(&events), cancel).await;
            drop(events);
            printer.await.ok();

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_success() {
                bail!("Flow run ended with status {:?}", outcome.status);
            }
        }
        Commands::Batch {
            flow,
            rows,
            repeat,
            concurrency,
        } => {
            let prepared = Arc::new(PreparedFlow::prepare(load_flow(&flow)?)?);
            let rows = load_rows(&rows)?;
            let concurrency = concurrency.unwrap_or(config.run.batch_concurrency);
            let executor = Arc::new(FlowExecutor::new(
                registry,
                config.run.clone(),
                config.secrets.clone(),
            ));

            let runner = BatchRunner::new(executor);
            let cancel = runner.cancel_token();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Cancelling batch...");
                cancel.cancel();
            });

            let mut results = runner.run_batch(prepared, rows, repeat, concurrency);
            let mut failed = 0usize;
            let mut stdout = io::stdout();
            while let Some(result) = results.next().await {
                if !result.outcome.is_success() {
                    failed += 1;
                }
                writeln!(stdout, "{}", serde_json::to_string(&result)?)?;
            }
            if failed > 0 {
                warn!(failed, "Some batch runs did not finish cleanly");
            }
        }
        Commands::NodeTypes => {
            for node_type in registry.list() {
                let definition = registry.get(node_type)?;
                println!("{:<28} {}", node_type.to_string(), definition.label());
            }
        }
        Commands::Config => {
            let mut shown = config.clone();
            shown.secrets = redact(&shown.secrets);
            println!("{:#?}", shown);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }
    info!("No config file found, reading secrets from the environment");
    Ok(env_config())
}

/// Minimal config from environment variables.
fn env_config() -> AppConfig {
    let var = |name: &str| std::env::var(name).ok();
    AppConfig {
        secrets: AccountSecrets {
            open_ai_api_key: var("OPENAI_API_KEY"),
            hugging_face_api_token: var("HUGGINGFACE_API_TOKEN"),
            eleven_labs_api_key: var("ELEVENLABS_API_KEY"),
        },
        ..AppConfig::default()
    }
}

fn build_registry(config: &AppConfig) -> anyhow::Result<NodeRegistry> {
    let clients = IntegrationClients {
        chat: create_chat_client(&config.openai)?,
        inference: Arc::new(HuggingFaceClient::new(&config.huggingface)),
        speech: Arc::new(ElevenLabsClient::new(&config.elevenlabs)),
    };
    Ok(NodeRegistry::with_builtins(clients))
}

fn load_flow(path: &Path) -> anyhow::Result<FlowContent> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading flow {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing flow {}", path.display()))
}

fn load_rows(path: &Path) -> anyhow::Result<Vec<FlowInputs>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading rows {}", path.display()))?;
    let rows: Vec<HashMap<String, Value>> =
        serde_json::from_str(&text).with_context(|| format!("parsing rows {}", path.display()))?;
    Ok(rows)
}

fn parse_inputs(pairs: &[String]) -> anyhow::Result<FlowInputs> {
    let mut inputs = FlowInputs::new();
    for pair in pairs {
        let Some((name, raw)) = pair.split_once('=') else {
            bail!("input '{}' is not NAME=VALUE", pair);
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(name.to_string(), value);
    }
    Ok(inputs)
}

fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Cancelling run...");
        cancel_clone.cancel();
    });
    cancel
}

fn spawn_event_printer(
    mut rx: tokio::sync::broadcast::Receiver<RunEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };
            match event {
                RunEvent::Node { node_id, event, .. } => match event {
                    NodeExecutionEvent::Started => eprintln!("[{}: started]", node_id),
                    NodeExecutionEvent::Errors(errors) => {
                        eprintln!("[{}: ERROR] {}", node_id, errors.join("; "))
                    }
                    NodeExecutionEvent::Finished => eprintln!("[{}: done]", node_id),
                    NodeExecutionEvent::PartialValues(_) => {}
                },
                RunEvent::LoopIteration {
                    node_id, iteration, ..
                } => eprintln!("[{}: iteration {}]", node_id, iteration),
                RunEvent::RunFinished { .. } => break,
                RunEvent::RunStarted { .. } => {}
            }
        }
    })
}

fn redact(secrets: &AccountSecrets) -> AccountSecrets {
    let mask = |value: &Option<String>| value.as_ref().map(|_| "***".to_string());
    AccountSecrets {
        open_ai_api_key: mask(&secrets.open_ai_api_key),
        hugging_face_api_token: mask(&secrets.hugging_face_api_token),
        eleven_labs_api_key: mask(&secrets.eleven_labs_api_key),
    }
}
