//! Weave CLI - knowledge extraction and graph retrieval

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use weave_core::config::Config;
use weave_core::domain::knowledge::{
    CalendarEventInput, ConversationMessage, ExtractionState, GraphStore, Intent, KnowledgeBatch,
    KnowledgePipeline, NodeType, StickyNoteInput, Subgraph,
};
use weave_core::infrastructure::knowledge::SqliteGraphStore;
use weave_core::llm::{CompletionService, LlmClient};
use weave_core::storage::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "weave")]
#[command(author, version, about = "Knowledge extraction and graph retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge from a source and persist it
    Extract {
        #[command(subcommand)]
        source: ExtractSource,
    },

    /// Retrieve the subgraph around a node
    Query {
        /// Starting node id (`search` only resolves right after an extraction)
        intent: String,
    },

    /// Promote every stored sticky to a task card
    LinkStickies,

    /// Show graph statistics
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ExtractSource {
    /// A chat message
    Chat { text: String },
    /// A calendar event
    Calendar {
        #[arg(long)]
        event_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Participant (repeatable)
        #[arg(long = "participant")]
        participants: Vec<String>,
    },
    /// A whiteboard sticky note
    Sticky {
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Stand-in service used when no API key is configured
struct MissingApiKey;

#[async_trait]
impl CompletionService for MissingApiKey {
    async fn complete(&self, _system: &str, _prompt: &str) -> weave_core::Result<String> {
        Err(weave_core::Error::LLMError(
            "no API key configured (set WEAVE_API_KEY or OPENROUTER_API_KEY)".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "missing-api-key"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_directive = if cli.quiet { "weave=warn" } else { "weave=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();

    match cli.command {
        Commands::Extract { ref source } => cmd_extract(&cli, source).await,
        Commands::Query { ref intent } => cmd_query(&cli, intent).await,
        Commands::LinkStickies => cmd_link_stickies(&cli).await,
        Commands::Stats => cmd_stats(&cli).await,
        Commands::Config { ref action } => cmd_config(action, cli.quiet),
        Commands::Doctor => cmd_doctor(&cli).await,
    }
}

// ============================================================================
// Setup
// ============================================================================

async fn open_database(cli: &Cli, config: &Config) -> anyhow::Result<Database> {
    let db_config = match &cli.db {
        Some(path) => DatabaseConfig::with_path(path),
        None => DatabaseConfig::from_storage_config(&config.storage)?,
    };
    Database::new(db_config).await
}

fn completion_service(config: &Config) -> anyhow::Result<Arc<dyn CompletionService>> {
    match config.llm.resolved_api_key()? {
        Some(key) => Ok(Arc::new(LlmClient::new(config.llm.clone(), key)?)),
        None => {
            debug!("No API key configured; model-backed extraction will return nothing");
            Ok(Arc::new(MissingApiKey))
        }
    }
}

async fn open_pipeline(cli: &Cli) -> anyhow::Result<(KnowledgePipeline<SqliteGraphStore>, Config)> {
    let config = Config::load()?;
    let db = open_database(cli, &config).await?;
    let store = Arc::new(SqliteGraphStore::new(db.pool().clone()));
    let pipeline = KnowledgePipeline::from_config(completion_service(&config)?, store, &config)?;
    Ok((pipeline, config))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_extract(cli: &Cli, source: &ExtractSource) -> anyhow::Result<()> {
    let (pipeline, config) = open_pipeline(cli).await?;

    let batch = match source {
        ExtractSource::Chat { text } => {
            let state = ExtractionState::from_message(ConversationMessage::user(text.as_str()));
            pipeline.extract_from_chat(&state).await?
        }
        ExtractSource::Calendar {
            event_id,
            title,
            start,
            end,
            description,
            participants,
        } => {
            let mut event = CalendarEventInput::new(event_id.as_str(), title.as_str())
                .with_participants(participants.clone());
            if let Some(start) = start {
                event = event.with_start(start.as_str());
            }
            if let Some(end) = end {
                event = event.with_end(end.as_str());
            }
            if let Some(description) = description {
                event = event.with_description(description.as_str());
            }
            event.validate()?;
            let state = ExtractionState::from_message(event.to_message());
            pipeline.extract_from_calendar_event(&state).await?
        }
        ExtractSource::Sticky { id, text } => {
            let sticky = StickyNoteInput::new(id.as_str(), text.as_str());
            sticky.validate()?;
            let mut state = ExtractionState::from_message(sticky.to_message());
            pipeline.process(&mut state).await?
        }
    };

    if batch.is_empty()
        && !matches!(source, ExtractSource::Sticky { .. })
        && config.llm.resolved_api_key()?.is_none()
    {
        warn!("Nothing extracted: no API key configured");
    }

    print_batch(cli, &batch)
}

async fn cmd_query(cli: &Cli, intent: &str) -> anyhow::Result<()> {
    let (pipeline, _) = open_pipeline(cli).await?;
    let state = ExtractionState::new().with_intent(Intent::parse(intent));
    let results = pipeline.retrieve_subgraph(&state).await?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => print_subgraph(&results.search_results, cli.quiet),
    }
    Ok(())
}

async fn cmd_link_stickies(cli: &Cli) -> anyhow::Result<()> {
    let (pipeline, _) = open_pipeline(cli).await?;
    let stickies = pipeline.store().list_nodes_by_type(&NodeType::Sticky).await?;
    let state = ExtractionState::new().with_nodes(stickies);

    let batch = pipeline.link_stickies_to_tasks(&state).await?;
    print_batch(cli, &batch)
}

async fn cmd_stats(cli: &Cli) -> anyhow::Result<()> {
    let (pipeline, _) = open_pipeline(cli).await?;
    let stats = pipeline.stats().await?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Nodes: {}", stats.total_nodes);
            for (node_type, count) in &stats.nodes_by_type {
                println!("  {:<12} {}", node_type, count);
            }
            println!("Edges: {}", stats.total_edges);
            for (edge_type, count) in &stats.edges_by_type {
                println!("  {:<12} {}", edge_type, count);
            }
            if stats.dangling_edges > 0 {
                println!("Dangling edges: {}", stats.dangling_edges);
            }
        }
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(cli: &Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    if !quiet {
        println!("Weave Health Check");
        println!("==================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            match config.llm.resolved_api_key() {
                Ok(Some(_)) => {
                    if !quiet {
                        let redacted = config.llm.redacted_api_key()?.unwrap_or_default();
                        println!("[OK] API Key: Configured ({})", redacted);
                    }
                }
                Ok(None) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] API Key: Not configured");
                        println!("     Set WEAVE_API_KEY or OPENROUTER_API_KEY environment variable");
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] API Key: Error - {}", e);
                    }
                }
            }
            Some(config)
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
            None
        }
    };

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    let config = config.unwrap_or_default();
    match open_database(cli, &config).await {
        Ok(db) => match db.health_check().await {
            Ok(()) => {
                if !quiet {
                    println!("[OK] Database: Connected");
                    println!("     Path: {}", db.path().display());
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => println!(
                            "[!!] Database: Migrations pending (v{} -> v{})",
                            status.current_version, status.target_version
                        ),
                        Ok(status) => println!("[OK] Database: Schema v{}", status.current_version),
                        Err(e) => println!("[!!] Database: Migration check failed - {}", e),
                    }
                    let store = SqliteGraphStore::new(db.pool().clone());
                    if let Ok(stats) = store.stats().await {
                        println!(
                            "     Graph: {} nodes, {} edges",
                            stats.total_nodes, stats.total_edges
                        );
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Database: Health check failed - {}", e);
                }
            }
        },
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Failed to initialize - {}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_batch(cli: &Cli, batch: &KnowledgeBatch) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(batch)?),
        OutputFormat::Text => {
            if !cli.quiet {
                println!(
                    "Extracted {} nodes, {} edges",
                    batch.knowledge_nodes.len(),
                    batch.knowledge_edges.len()
                );
            }
            for node in &batch.knowledge_nodes {
                println!("  [{}] {} - {}", node.node_type, node.id, node.content);
            }
            for edge in &batch.knowledge_edges {
                println!("  {} -{}-> {}", edge.source, edge.edge_type, edge.target);
            }
        }
    }
    Ok(())
}

fn print_subgraph(subgraph: &Subgraph, quiet: bool) {
    if subgraph.is_empty() {
        if !quiet {
            println!("No connected knowledge found.");
        }
        return;
    }

    println!("Nodes ({}):", subgraph.nodes.len());
    for node in &subgraph.nodes {
        println!("  [{}] {} - {}", node.node_type, node.id, node.content);
    }
    println!("Edges ({}):", subgraph.edges.len());
    for edge in &subgraph.edges {
        println!("  {} -{}-> {}", edge.source, edge.edge_type, edge.target);
    }
}
