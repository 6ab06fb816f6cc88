//! StarSync CLI - Command line client for the game data sync layer.
//!
//! This tool loads the player's game state through the dual store, applies
//! one command, and replays any offline work when the backend is reachable.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use starsync_api::{
    ApiExecutor, ApiRequest, AuthProvider, BackendAuth, HttpApiClient, HttpMethod, Routes,
    StaticToken,
};
use starsync_game::{BattleRecord, DebitOutcome, GameDataManager, NftRef, ProfileUpdate};
use starsync_storage::{create_default_registry, FileLocalStore, LocalStore};
use starsync_sync::{CallOutcome, Connectivity, DualStore, OfflineQueue, SyncEngine, SyncReport};

use crate::config::ClientConfig;

#[derive(Parser)]
#[command(name = "starsync")]
#[command(about = "StarSync - Offline-first game data sync")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Local data directory, overriding the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Treat the backend as unreachable.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show game state and outstanding sync work.
    Status,

    /// Add earned stars.
    Credit {
        /// Number of stars.
        amount: u64,
    },

    /// Spend stars.
    Debit {
        /// Number of stars.
        amount: u64,
    },

    /// Inspect or change the collection.
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Battle history.
    Battle {
        #[command(subcommand)]
        command: BattleCommands,
    },

    /// Player profile.
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Write a backup of the game state.
    Export {
        /// Output file (default: stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the game state with a backup.
    Import {
        /// Backup file.
        file: PathBuf,
    },

    /// Inspect or manage the offline API queue.
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Reconcile pending writes and replay queued calls now.
    Sync,
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List collectibles.
    List,

    /// Add a collectible.
    Add {
        #[arg(short, long)]
        name: String,

        /// Image reference.
        #[arg(short, long)]
        img: String,

        #[arg(short, long, default_value = "common")]
        tier: String,

        #[arg(short, long)]
        price: Option<u64>,
    },

    /// Remove the collectible at a position.
    Remove {
        /// Zero-based position.
        index: usize,
    },

    /// Choose the collectible used in battle.
    Activate {
        /// Zero-based position; omit to clear.
        index: Option<usize>,
    },
}

#[derive(Subcommand)]
enum BattleCommands {
    /// Record a finished battle and report it to the backend.
    Add {
        #[arg(short, long)]
        opponent: String,

        /// The battle was won.
        #[arg(short, long)]
        won: bool,

        /// Stars won or lost.
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        delta: i64,
    },

    /// List recorded battles.
    List,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile.
    Show,

    /// Update profile fields.
    Set {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        avatar: Option<String>,

        #[arg(short, long)]
        level: Option<u32>,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List queued calls.
    List,

    /// Queue a call without attempting it.
    Add {
        /// HTTP method.
        method: String,

        /// Endpoint relative to the API base URL.
        endpoint: String,

        /// JSON body.
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Replay queued calls now.
    Drain,

    /// Drop every queued call.
    Clear,
}

/// Everything a command may need, wired once per run.
struct Client {
    engine: Arc<SyncEngine>,
    game: GameDataManager,
    routes: Routes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }

    let client = connect(&config, cli.offline).await?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Credit { amount } => cmd_credit(&client, amount).await,
        Commands::Debit { amount } => cmd_debit(&client, amount).await,
        Commands::Collection { command } => cmd_collection(&client, command).await,
        Commands::Battle { command } => cmd_battle(&client, command).await,
        Commands::Profile { command } => cmd_profile(&client, command).await,
        Commands::Export { out } => cmd_export(&client, out.as_deref()).await,
        Commands::Import { file } => cmd_import(&client, &file).await,
        Commands::Queue { command } => cmd_queue(&client, command).await,
        Commands::Sync => cmd_sync(&client).await,
    }
}

/// Build the stores, API client, sync engine and game state.
async fn connect(config: &ClientConfig, offline: bool) -> Result<Client> {
    let data_dir = config.data_dir();
    let user_id = config.user_id(&data_dir)?;

    let local: Arc<dyn LocalStore> = Arc::new(
        FileLocalStore::new(&data_dir)
            .with_context(|| format!("Failed to open local store at {}", data_dir.display()))?,
    );

    let registry = create_default_registry();
    let remote = registry
        .resolve(&config.remote.provider, config.remote.resolved(&config.api))
        .with_context(|| format!("Failed to create remote store '{}'", config.remote.provider))?;

    let auth: Arc<dyn AuthProvider> = match &config.api.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => {
            let base = url::Url::parse(&config.api.base_url).context("Invalid API base URL")?;
            Arc::new(
                BackendAuth::new(&base, user_id.clone(), config.api.user_data.clone())
                    .context("Failed to set up authentication")?,
            )
        }
    };
    let api = Arc::new(
        HttpApiClient::new(&config.api.base_url, auth).context("Failed to create API client")?,
    );

    let mut online = !offline && config.sync.start_online;
    if online && !api.ping().await {
        warn!("Backend at {} is not reachable, working offline", api.base_url());
        online = false;
    }
    let connectivity = Connectivity::new(online);

    let store = Arc::new(
        DualStore::new(local.clone(), remote, connectivity.clone())
            .context("Failed to load pending writes")?,
    );
    let queue = Arc::new(OfflineQueue::load(local).context("Failed to load API queue")?);
    let executor: Arc<dyn ApiExecutor> = api;
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        queue,
        executor,
        connectivity,
        config.sync.clone(),
    ));

    if let Some(report) = engine
        .sync_on_start()
        .await
        .context("Startup sync failed")?
    {
        log_report(&report);
    }

    let game = GameDataManager::new(store, config.game.clone());
    game.init().await.context("Failed to load game data")?;

    Ok(Client {
        engine,
        game,
        routes: Routes::new(user_id),
    })
}

fn log_report(report: &SyncReport) {
    let idle = report.reconcile.attempted == 0
        && report.drain.succeeded.is_empty()
        && report.drain.failed.is_empty();
    if idle {
        return;
    }
    info!(
        "Synced {}/{} pending writes, replayed {} queued calls ({} still queued)",
        report.reconcile.synced,
        report.reconcile.attempted,
        report.drain.succeeded.len(),
        report.drain.remaining
    );
}

/// Send a call through the offline-aware API and say what happened.
async fn send(client: &Client, request: ApiRequest) -> Result<()> {
    let description = request.to_string();
    match client.engine.offline_api().call(request).await? {
        CallOutcome::Delivered(_) => println!("Sent {}", description),
        CallOutcome::Queued(id) => println!("Queued {} as {}", description, id),
    }
    Ok(())
}

/// Show game state and sync status.
async fn cmd_status(client: &Client) -> Result<()> {
    let data = client.game.snapshot();
    let status = client.engine.status().await;

    println!("Player: {} {}", data.user_profile.avatar, data.user_profile.name);
    println!("  Level: {}", data.user_profile.level);
    println!("  Joined: {}", data.user_profile.join_date);
    println!("  Stars: {}", data.stars);
    println!("  Total earned: {}", data.total_stars_earned);
    println!("  Collection: {} items", data.collection.len());
    match &data.active_battle_nft {
        Some(nft) => println!("  Battle NFT: {} ({})", nft.name, nft.tier),
        None => println!("  Battle NFT: none"),
    }
    println!("  Battles: {}", data.battle_history.len());
    println!("Sync:");
    println!("  Online: {}", if status.online { "yes" } else { "no" });
    println!("  Pending writes: {}", status.pending_writes);
    println!("  Queued calls: {}", status.queued_calls);

    Ok(())
}

async fn cmd_credit(client: &Client, amount: u64) -> Result<()> {
    let balance = client
        .game
        .credit(amount)
        .await
        .context("Failed to add stars")?;
    println!("Added {} stars. Balance: {}", amount, balance);
    Ok(())
}

async fn cmd_debit(client: &Client, amount: u64) -> Result<()> {
    match client
        .game
        .debit(amount)
        .await
        .context("Failed to spend stars")?
    {
        DebitOutcome::Applied { remaining } => {
            println!("Spent {} stars. Balance: {}", amount, remaining);
            Ok(())
        }
        DebitOutcome::Declined(shortfall) => anyhow::bail!("Debit declined: {}", shortfall),
    }
}

async fn cmd_collection(client: &Client, command: CollectionCommands) -> Result<()> {
    match command {
        CollectionCommands::List => {
            let collection = client.game.collection();
            let active = client.game.active_battle_nft();
            if collection.is_empty() {
                println!("Collection is empty.");
            }
            for (index, nft) in collection.iter().enumerate() {
                let marker = if active.as_ref() == Some(nft) { "*" } else { " " };
                let price = nft.price.map(|p| format!(" {} stars", p)).unwrap_or_default();
                println!("{} [{}] {} ({}){}", marker, index, nft.name, nft.tier, price);
            }
        }
        CollectionCommands::Add {
            name,
            img,
            tier,
            price,
        } => {
            let mut nft = NftRef::new(name, img, tier);
            nft.price = price;
            client
                .game
                .add_to_collection(nft.clone())
                .await
                .context("Failed to add to collection")?;
            println!("Added {} to collection", nft.name);
        }
        CollectionCommands::Remove { index } => {
            let removed = client
                .game
                .remove_from_collection(index)
                .await
                .context("Failed to remove from collection")?;
            println!("Removed {}", removed.name);
        }
        CollectionCommands::Activate { index } => {
            let nft = match index {
                Some(index) => {
                    let collection = client.game.collection();
                    let nft = collection.get(index).cloned().ok_or_else(|| {
                        anyhow::anyhow!(
                            "Index {} out of range for collection of {}",
                            index,
                            collection.len()
                        )
                    })?;
                    Some(nft)
                }
                None => None,
            };
            client
                .game
                .set_active_battle_nft(nft.clone())
                .await
                .context("Failed to set battle NFT")?;
            match nft {
                Some(nft) => println!("Battle NFT: {}", nft.name),
                None => println!("Battle NFT cleared"),
            }
        }
    }
    Ok(())
}

async fn cmd_battle(client: &Client, command: BattleCommands) -> Result<()> {
    match command {
        BattleCommands::Add {
            opponent,
            won,
            delta,
        } => {
            let record = BattleRecord::new(opponent, won, delta);
            client
                .game
                .append_battle_record(record.clone())
                .await
                .context("Failed to record battle")?;
            println!("Recorded battle against {}", record.opponent);

            let payload = serde_json::to_value(&record).context("Failed to encode battle")?;
            send(client, client.routes.submit_battle_result(payload)).await?;
        }
        BattleCommands::List => {
            let history = client.game.battle_history();
            if history.is_empty() {
                println!("No battles yet.");
            }
            for record in history {
                println!(
                    "{}  {} vs {} ({:+} stars)",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    if record.won { "WON " } else { "LOST" },
                    record.opponent,
                    record.stars_delta
                );
            }
        }
    }
    Ok(())
}

async fn cmd_profile(client: &Client, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Show => {
            let profile = client.game.user_profile();
            println!(
                "{}",
                serde_json::to_string_pretty(&profile).context("Failed to encode profile")?
            );
        }
        ProfileCommands::Set {
            name,
            avatar,
            level,
        } => {
            let update = ProfileUpdate {
                name,
                avatar,
                level,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to update; pass --name, --avatar or --level");
            }
            let payload = serde_json::to_value(&update).context("Failed to encode profile")?;
            let profile = client
                .game
                .update_user_profile(update)
                .await
                .context("Failed to update profile")?;
            println!("Profile: {} {} (level {})", profile.avatar, profile.name, profile.level);

            send(client, client.routes.update_user_profile(payload)).await?;
        }
    }
    Ok(())
}

async fn cmd_export(client: &Client, out: Option<&Path>) -> Result<()> {
    let blob = client
        .game
        .export_snapshot()
        .context("Failed to export game data")?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &blob)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported game data to {}", path.display());
        }
        None => println!("{}", blob),
    }
    Ok(())
}

async fn cmd_import(client: &Client, file: &Path) -> Result<()> {
    let blob = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    client
        .game
        .import_snapshot(&blob)
        .await
        .context("Failed to import game data")?;

    println!("Imported game data from {}", file.display());
    Ok(())
}

async fn cmd_queue(client: &Client, command: QueueCommands) -> Result<()> {
    let queue = client.engine.queue();
    match command {
        QueueCommands::List => {
            let calls = queue.calls().await;
            if calls.is_empty() {
                println!("Queue is empty.");
            }
            for call in calls {
                println!(
                    "{}  {}  {}",
                    call.id,
                    call.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
                    call.request
                );
            }
        }
        QueueCommands::Add {
            method,
            endpoint,
            payload,
        } => {
            let method: HttpMethod = method.parse()?;
            let payload = payload
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("Payload is not valid JSON")?;
            let id = queue
                .enqueue_call(method, endpoint, payload)
                .await
                .context("Failed to queue call")?;
            println!("Queued call {}", id);
        }
        QueueCommands::Drain => {
            if !client.engine.connectivity().is_online() {
                anyhow::bail!("Backend is not reachable; nothing was replayed");
            }
            let report = client
                .engine
                .drain_queue()
                .await
                .context("Failed to drain queue")?;
            println!(
                "Replayed {} calls, {} failed, {} remaining",
                report.succeeded.len(),
                report.failed.len(),
                report.remaining
            );
        }
        QueueCommands::Clear => {
            let dropped = queue.len().await;
            queue.clear().await.context("Failed to clear queue")?;
            println!("Dropped {} queued calls", dropped);
        }
    }
    Ok(())
}

async fn cmd_sync(client: &Client) -> Result<()> {
    if !client.engine.connectivity().is_online() {
        anyhow::bail!("Backend is not reachable; run again when online");
    }

    let report = client
        .engine
        .on_connectivity_restored()
        .await
        .context("Sync failed")?;

    println!(
        "Pending writes: {}/{} synced",
        report.reconcile.synced, report.reconcile.attempted
    );
    for key in &report.reconcile.failed {
        println!("  failed: {}", key);
    }
    println!(
        "Queued calls: {} replayed, {} remaining",
        report.drain.succeeded.len(),
        report.drain.remaining
    );

    if !report.is_complete() {
        warn!("Some work is still outstanding");
    }
    Ok(())
}
