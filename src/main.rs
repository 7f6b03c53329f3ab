//! MicMacMoe CLI
//!
//! Command-line client for on-chain tic-tac-toe. The wallet given by
//! `CONNECTED_PRIVATE_KEY` plays the part of the user's connected wallet; the
//! game wallet it unlocks signs every game transaction.

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use micmacmoe_client::config::{AI_PRIVATE_KEY_ENV, CONNECTED_PRIVATE_KEY_ENV};
use micmacmoe_client::game::{
    fund_game_wallet, AiOpponent, GameId, GameSnapshot, GameSynchronizer, MicMacMoeContract,
    Outcome,
};
use micmacmoe_client::wallet::store::GAME_ID_KEY;
use micmacmoe_client::wallet::{
    export_private_key, IdentitySource, JsonFileStore, KeyValueStore, MemoryStore, UnlockedWallet,
};
use micmacmoe_client::{Config, Error, KeyCustodian, Result, RpcConfig, SecureWallet};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "micmacmoe")]
#[command(about = "Play MicMacMoe tic-tac-toe on chain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RPC endpoint, overriding MONAD_RPC_URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the challenge and restore or create the game wallet
    Unlock {
        /// Also print the game wallet private key for backup
        #[arg(long)]
        export: bool,
    },

    /// Deposit native currency into the game wallet
    Fund {
        /// Amount in whole tokens (e.g. 0.1)
        #[arg(short, long)]
        amount: String,
    },

    /// Create a game and make it the active game
    Create {
        /// Opponent address (defaults to the configured opponent)
        #[arg(short, long)]
        opponent: Option<String>,
    },

    /// Join an existing game by id
    Join {
        /// Game id (0x-prefixed bytes32)
        #[arg(short, long)]
        game: String,
    },

    /// Show the saved active game
    Resume,

    /// Play a cell (0-8, row by row) in the active game
    Move {
        #[arg(long)]
        cell: u8,
    },

    /// Follow the active game until it ends
    Watch,

    /// List games the game wallet takes part in
    Games,

    /// Let the automated opponent move in a game if it is its turn
    AiMove {
        /// Game id (0x-prefixed bytes32)
        #[arg(short, long)]
        game: String,
    },

    /// Delete the stored game wallet and the saved game
    Forget {
        /// Confirm deletion; the game wallet is unrecoverable afterwards
        #[arg(long)]
        yes: bool,
    },

    /// Show current configuration
    Config,
}

/// Everything a command needs once the game wallet is unlocked
struct Session {
    config: Config,
    rpc: RpcConfig,
    store: Arc<JsonFileStore>,
    connected: SecureWallet,
    unlocked: UnlockedWallet,
}

impl Session {
    async fn open(config: Config, rpc: RpcConfig) -> Result<Self> {
        let store = Arc::new(JsonFileStore::open(&config.storage_path)?);
        let connected = SecureWallet::from_env(CONNECTED_PRIVATE_KEY_ENV)?;

        let custodian = KeyCustodian::new(store.clone());
        let unlocked = custodian.unlock(&connected).await?;
        if unlocked.source == IdentitySource::Generated {
            println!(
                "New game wallet {} created. Fund it with `micmacmoe fund --amount <{}>`.",
                unlocked.game_wallet.address_string(),
                config.chain.native_symbol
            );
        }

        Ok(Self {
            config,
            rpc,
            store,
            connected,
            unlocked,
        })
    }

    fn synchronizer(&self) -> Result<GameSynchronizer<MicMacMoeContract>> {
        let contract = MicMacMoeContract::connect(
            self.rpc.url(),
            self.config.contract_address()?,
            &self.unlocked.game_wallet,
        )?
        .with_poll_interval(self.config.poll_interval());

        Ok(GameSynchronizer::new(
            Arc::new(contract),
            self.store.clone(),
            self.unlocked.game_wallet.address(),
        ))
    }

    /// Synchronizer with the saved game loaded
    async fn resumed(&self) -> Result<GameSynchronizer<MicMacMoeContract>> {
        let mut sync = self.synchronizer()?;
        sync.resume().await?.ok_or(Error::NoActiveGame)?;
        Ok(sync)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let rpc = match cli.rpc_url.as_deref() {
        Some(url) => RpcConfig::with_url(url)?,
        None => RpcConfig::from_env(),
    };

    match cli.command {
        Commands::Unlock { export } => run_unlock(config, rpc, export).await?,
        Commands::Fund { amount } => run_fund(config, rpc, amount).await?,
        Commands::Create { opponent } => run_create(config, rpc, opponent).await?,
        Commands::Join { game } => run_join(config, rpc, game).await?,
        Commands::Resume => {
            let session = Session::open(config, rpc).await?;
            let sync = session.resumed().await?;
            print_game(&session.unlocked.game_wallet, sync.snapshot());
        }
        Commands::Move { cell } => run_move(config, rpc, cell).await?,
        Commands::Watch => run_watch(config, rpc).await?,
        Commands::Games => {
            let session = Session::open(config, rpc).await?;
            let games = session.synchronizer()?.my_games().await?;
            if games.is_empty() {
                println!("No games yet");
            }
            for game_id in games {
                println!("{}", game_id);
            }
        }
        Commands::AiMove { game } => run_ai_move(config, rpc, game).await?,
        Commands::Forget { yes } => run_forget(config, yes)?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| Error::InvalidArgument(format!("Invalid address {}: {}", value, e)))
}

fn parse_game_id(value: &str) -> Result<GameId> {
    GameId::from_str(value.trim())
        .map_err(|e| Error::InvalidArgument(format!("Invalid game id {}: {}", value, e)))
}

fn print_game(me: &SecureWallet, snapshot: Option<&GameSnapshot>) {
    let Some(snapshot) = snapshot else {
        println!("No active game");
        return;
    };

    println!("Game {}", snapshot.game_id);
    println!("X: {}", snapshot.player1);
    println!("O: {}", snapshot.player2);
    if let Some(mark) = snapshot.mark_for(me.address()) {
        println!("You play {}", mark);
    }
    println!("{}", snapshot.board);

    match snapshot.outcome() {
        Some(outcome) => println!("{}", outcome),
        None if snapshot.is_turn_of(me.address()) => println!("Your turn"),
        None => println!("Waiting for {}", snapshot.current_turn),
    }
}

async fn run_unlock(config: Config, rpc: RpcConfig, export: bool) -> Result<()> {
    let session = Session::open(config, rpc).await?;
    let wallet = &session.unlocked.game_wallet;

    println!("Connected wallet: {}", session.unlocked.connected);
    println!("Game wallet:      {}", wallet.address_string());
    if export {
        println!("Private key:      {}", export_private_key(wallet).expose_secret());
    }
    Ok(())
}

async fn run_fund(config: Config, rpc: RpcConfig, amount: String) -> Result<()> {
    let session = Session::open(config, rpc).await?;

    let tx_hash = fund_game_wallet(
        session.rpc.url(),
        &session.connected,
        session.unlocked.game_wallet.address(),
        &amount,
    )
    .await?;

    println!(
        "Sent {} {} to {}",
        amount,
        session.config.chain.native_symbol,
        session.unlocked.game_wallet.address_string()
    );
    println!("{}", session.config.chain.tx_url(tx_hash));
    Ok(())
}

async fn run_create(config: Config, rpc: RpcConfig, opponent: Option<String>) -> Result<()> {
    let opponent = match opponent {
        Some(value) => parse_address(&value)?,
        None => config
            .default_opponent
            .or(config.ai_address)
            .ok_or_else(|| Error::InvalidArgument("No opponent given or configured".to_string()))?,
    };

    let session = Session::open(config, rpc).await?;
    let mut sync = session.synchronizer()?;
    let game_id = sync.create_game(opponent).await?;

    println!("Created game {}", game_id);
    print_game(&session.unlocked.game_wallet, sync.snapshot());
    Ok(())
}

async fn run_join(config: Config, rpc: RpcConfig, game: String) -> Result<()> {
    let game_id = parse_game_id(&game)?;
    let session = Session::open(config, rpc).await?;
    let mut sync = session.synchronizer()?;
    sync.join_game(game_id).await?;

    print_game(&session.unlocked.game_wallet, sync.snapshot());
    Ok(())
}

async fn run_move(config: Config, rpc: RpcConfig, cell: u8) -> Result<()> {
    let session = Session::open(config, rpc).await?;
    let mut sync = session.resumed().await?;
    sync.submit_move(cell).await?;

    print_game(&session.unlocked.game_wallet, sync.snapshot());
    Ok(())
}

enum Update {
    Moved(GameSnapshot),
    Ended(GameSnapshot, Outcome),
}

async fn run_watch(config: Config, rpc: RpcConfig) -> Result<()> {
    let session = Session::open(config, rpc).await?;
    let mut sync = session.resumed().await?;
    let me = &session.unlocked.game_wallet;
    print_game(me, sync.snapshot());
    if sync.outcome().is_some() {
        return Ok(());
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let end_tx = tx.clone();
    let subscription = sync.subscribe(
        move |snapshot| {
            let _ = tx.send(Update::Moved(snapshot));
        },
        move |snapshot, outcome| {
            let _ = end_tx.send(Update::Ended(snapshot, outcome));
        },
    )?;

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(Update::Moved(snapshot)) => {
                    if sync.apply_snapshot(snapshot) {
                        print_game(me, sync.snapshot());
                    }
                }
                Some(Update::Ended(snapshot, outcome)) => {
                    sync.apply_snapshot(snapshot);
                    print_game(me, sync.snapshot());
                    tracing::info!(%outcome, "Game finished");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopped watching");
                break;
            }
        }
    }

    subscription.shutdown().await;
    Ok(())
}

async fn run_ai_move(config: Config, rpc: RpcConfig, game: String) -> Result<()> {
    let game_id = parse_game_id(&game)?;
    let ai_wallet = SecureWallet::from_env(AI_PRIVATE_KEY_ENV)?;
    if let Some(expected) = config.ai_address {
        if expected != ai_wallet.address() {
            tracing::warn!(
                configured = %expected,
                actual = %ai_wallet.address(),
                "AI_PRIVATE_KEY does not match the configured AI address"
            );
        }
    }

    let contract = MicMacMoeContract::connect(rpc.url(), config.contract_address()?, &ai_wallet)?;
    // The opponent keeps no session of its own
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut sync = GameSynchronizer::new(Arc::new(contract), store, ai_wallet.address());
    sync.join_game(game_id).await?;

    let mut opponent = AiOpponent::new(sync);
    match opponent.take_turn().await? {
        Some((cell, snapshot)) => {
            println!("AI played cell {}", cell);
            print_game(&ai_wallet, Some(&snapshot));
        }
        None => println!("Nothing to do: not the AI's turn"),
    }
    Ok(())
}

fn run_forget(config: Config, yes: bool) -> Result<()> {
    if !yes {
        return Err(Error::InvalidArgument(
            "Refusing to delete the game wallet without --yes. Export its key first with `micmacmoe unlock --export`.".to_string(),
        ));
    }

    let connected = SecureWallet::from_env(CONNECTED_PRIVATE_KEY_ENV)?;
    let store = Arc::new(JsonFileStore::open(&config.storage_path)?);
    let custodian = KeyCustodian::new(store.clone());

    let removed = custodian.forget_identity(connected.address())?;
    store.remove(GAME_ID_KEY)?;

    if removed {
        println!("Deleted game wallet for {}", connected.address_string());
    } else {
        println!("No game wallet stored for {}", connected.address_string());
    }
    Ok(())
}
