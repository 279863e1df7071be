//! Kindred CLI entry point.
//!
//! Provides `chat`, `introduce`, `import-directory` and `check` subcommands.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use kindred::config::{load_config, runtime_paths, Config, RuntimePaths};
use kindred::conversation::memory::ConversationMemory;
use kindred::conversation::store::{SqliteStateStore, StateStore};
use kindred::conversation::{ConversationController, ConversationKey};
use kindred::credentials::{load_credentials, Credentials};
use kindred::directory::{Directory, SqliteDirectory};
use kindred::dispatch::slack::SlackMessenger;
use kindred::dispatch::{DeliveryTargets, Dispatcher};
use kindred::housing::TasteHousingAdvisor;
use kindred::introductions::{IntroductionRequest, IntroductionService};
use kindred::profile::Profile;
use kindred::providers::router::ModelRouter;
use kindred::scoring::{CommonalityScorer, ScorerSettings};
use kindred::taste::http::HttpTasteGraph;
use kindred::taste::TasteGraph;

/// Kindred: match colleagues by taste and help new hires relocate.
#[derive(Parser)]
#[command(name = "kindred", version, about)]
struct Cli {
    /// Path to config.toml (defaults to ~/.kindred/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Talk to the relocation assistant over stdin/stdout.
    Chat {
        /// User identity the conversation belongs to.
        #[arg(long)]
        user: String,
        /// Optional conversation scope (channel, thread).
        #[arg(long)]
        scope: Option<String>,
    },
    /// Score, rank and introduce candidates from a JSON request file.
    Introduce {
        /// Request file: `{"employee": {...}, "candidates": [...]}`.
        request: PathBuf,
        /// Compose messages but do not deliver them.
        #[arg(long)]
        no_dispatch: bool,
    },
    /// Upsert profiles from a JSON array into the directory.
    ImportDirectory {
        /// JSON file holding an array of profiles.
        profiles: PathBuf,
    },
    /// Load config and credentials and report what is configured.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths(cli.config.as_deref())?;

    match cli.command {
        Command::Chat { user, scope } => handle_chat(&paths, user, scope).await,
        Command::Introduce {
            request,
            no_dispatch,
        } => handle_introduce(&paths, &request, no_dispatch).await,
        Command::ImportDirectory { profiles } => handle_import(&paths, &profiles).await,
        Command::Check => handle_check(&paths),
    }
}

/// Runtime paths, with `config_toml` replaced by an explicit `--config`.
/// The credentials file is looked up next to the chosen config.
fn resolve_paths(config: Option<&Path>) -> anyhow::Result<RuntimePaths> {
    match config {
        Some(path) => {
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            let mut paths = RuntimePaths::under(root);
            paths.config_toml = path.to_path_buf();
            Ok(paths)
        }
        None => runtime_paths(),
    }
}

fn load_runtime(paths: &RuntimePaths) -> anyhow::Result<(Config, Credentials)> {
    let config = load_config(&paths.config_toml)
        .with_context(|| format!("failed to load {}", paths.config_toml.display()))?;
    let credentials = load_credentials(&paths.env_file)
        .with_context(|| format!("failed to load {}", paths.env_file.display()))?;
    Ok((config, credentials))
}

fn database_path(config: &Config, paths: &RuntimePaths) -> PathBuf {
    config
        .storage
        .database
        .clone()
        .unwrap_or_else(|| paths.database.clone())
}

fn build_graph(config: &Config, credentials: &Credentials) -> anyhow::Result<Arc<dyn TasteGraph>> {
    let api_key = credentials
        .require(&config.taste_graph.api_key_env)
        .context("taste graph API key is not configured")?;
    Ok(Arc::new(HttpTasteGraph::new(
        &config.taste_graph.base_url,
        api_key,
        Duration::from_secs(config.taste_graph.timeout_secs),
    )))
}

fn build_models(config: &Config, credentials: &Credentials) -> anyhow::Result<Arc<ModelRouter>> {
    let router = ModelRouter::from_config(&config.models, credentials)
        .context("failed to create model router")?;
    Ok(Arc::new(router))
}

/// Run the relocation dialogue on stdin/stdout until EOF.
async fn handle_chat(
    paths: &RuntimePaths,
    user: String,
    scope: Option<String>,
) -> anyhow::Result<()> {
    let _logging_guard = kindred::logging::init_production(&paths.logs_dir)?;
    let (config, credentials) = load_runtime(paths)?;

    let graph = build_graph(&config, &credentials)?;
    let models = build_models(&config, &credentials)?;
    let pool = kindred::db::open_database(&database_path(&config, paths)).await?;
    let store: Arc<dyn StateStore> = Arc::new(
        SqliteStateStore::new(pool)
            .await
            .context("failed to initialise state store")?,
    );

    let memory = ConversationMemory::new(
        Arc::clone(&store),
        Duration::from_secs(config.conversation.memory_ttl_secs),
    );
    let advisor = Arc::new(TasteHousingAdvisor::new(graph, models));
    let controller = ConversationController::new(
        store,
        memory,
        advisor,
        config.conversation.elicit_preferences,
    );
    let key = ConversationKey::new(user, scope);
    info!(key = %key.storage_key(), "chat session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let reply = controller.handle(&key, text).await?;
        stdout.write_all(reply.text.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("chat session ended");
    Ok(())
}

/// Run one introduction request and print the outcome as JSON.
async fn handle_introduce(
    paths: &RuntimePaths,
    request: &Path,
    no_dispatch: bool,
) -> anyhow::Result<()> {
    kindred::logging::init_cli();
    let (config, credentials) = load_runtime(paths)?;

    let raw = std::fs::read_to_string(request)
        .with_context(|| format!("failed to read {}", request.display()))?;
    let request: IntroductionRequest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", request.display()))?;

    let graph = build_graph(&config, &credentials)?;
    let models = build_models(&config, &credentials)?;

    let directory: Option<Arc<dyn Directory>> =
        match kindred::db::open_database(&database_path(&config, paths)).await {
            Ok(pool) => match SqliteDirectory::new(pool).await {
                Ok(dir) => Some(Arc::new(dir)),
                Err(e) => {
                    warn!(error = %e, "directory unavailable, using profiles as given");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "database unavailable, using profiles as given");
                None
            }
        };

    let dispatcher = if config.dispatch.enabled && !no_dispatch {
        match credentials.get(&config.messaging.bot_token_env) {
            Some(token) => Some(Dispatcher::new(
                Arc::new(SlackMessenger::new(
                    &config.messaging.base_url,
                    token.to_owned(),
                )),
                DeliveryTargets::from_config(&config.dispatch),
            )),
            None => {
                warn!(
                    key = %config.messaging.bot_token_env,
                    "no bot token configured, introductions will not be delivered"
                );
                None
            }
        }
    } else {
        None
    };

    let scorer = CommonalityScorer::new(
        graph,
        Arc::clone(&models),
        ScorerSettings {
            office_location_token: config.scoring.office_location_token.clone(),
            recommendation_type: config.taste_graph.recommendation_type.clone(),
        },
    );
    let service = IntroductionService::new(
        scorer,
        models,
        directory,
        dispatcher,
        config.dispatch.top_n,
    );

    let outcome = service.introduce(request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Import profiles into the directory.
async fn handle_import(paths: &RuntimePaths, profiles: &Path) -> anyhow::Result<()> {
    kindred::logging::init_cli();
    let (config, _credentials) = load_runtime(paths)?;

    let raw = std::fs::read_to_string(profiles)
        .with_context(|| format!("failed to read {}", profiles.display()))?;
    let profiles: Vec<Profile> =
        serde_json::from_str(&raw).context("profiles file must be a JSON array of profiles")?;

    let db_path = database_path(&config, paths);
    let pool = kindred::db::open_database(&db_path).await?;
    let directory = SqliteDirectory::new(pool)
        .await
        .context("failed to initialise directory")?;
    let count = directory.import(&profiles).await?;

    println!("imported {count} profiles into {}", db_path.display());
    Ok(())
}

/// Report configuration without making network calls.
fn handle_check(paths: &RuntimePaths) -> anyhow::Result<()> {
    kindred::logging::init_cli();
    let (config, credentials) = load_runtime(paths)?;

    println!("config:        {}", paths.config_toml.display());
    println!("credentials:   {}", paths.env_file.display());
    println!("database:      {}", database_path(&config, paths).display());
    println!("taste graph:   {}", config.taste_graph.base_url);
    println!(
        "taste api key: {}",
        present(credentials.get(&config.taste_graph.api_key_env).is_some())
    );
    println!(
        "bot token:     {}",
        present(credentials.get(&config.messaging.bot_token_env).is_some())
    );
    println!("default model: {}", config.models.default);
    match ModelRouter::from_config(&config.models, &credentials) {
        Ok(router) => println!("models ready:  {}", router.available_specs().join(", ")),
        Err(e) => println!("models ready:  no ({e})"),
    }
    println!(
        "dispatch:      {} (top {}, {} rank identities, default channel {})",
        if config.dispatch.enabled { "on" } else { "off" },
        config.dispatch.top_n,
        config
            .dispatch
            .rank_identities
            .iter()
            .filter(|id| !id.trim().is_empty())
            .count(),
        config.dispatch.default_channel.as_deref().unwrap_or("none"),
    );
    Ok(())
}

fn present(yes: bool) -> &'static str {
    if yes {
        "set"
    } else {
        "missing"
    }
}
