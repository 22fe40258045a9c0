//! Cyberex Wallet CLI
//!
//! Manages the wallet store and drives page requests through an in-process
//! provider/bridge/dispatcher relay.

use clap::{Parser, Subcommand};
use cyberex_wallet::node::RpcConnector;
use cyberex_wallet::rpc::AuditLog;
use cyberex_wallet::{
    load_page, Config, Dispatcher, Error, JsonFileStorage, KeyStore, NetworkManager, Page, Result,
    RpcConfig, Storage,
};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var holding a private key for `import-key`
const PRIVATE_KEY_ENV: &str = "CYBEREX_PRIVATE_KEY";
/// Env var holding a recovery phrase for `import-mnemonic`
const MNEMONIC_ENV: &str = "CYBEREX_MNEMONIC";

#[derive(Parser)]
#[command(name = "cyberex")]
#[command(about = "Cyberex browser-extension wallet core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Wallet store (overrides the config file)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a wallet from a fresh 12-word recovery phrase
    Create {
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Import a wallet from a 12 or 24 word recovery phrase
    ImportMnemonic {
        /// Recovery phrase (read from CYBEREX_MNEMONIC when omitted)
        #[arg(long)]
        phrase: Option<String>,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Import a wallet from a raw private key
    ImportKey {
        /// Hex private key (read from CYBEREX_PRIVATE_KEY when omitted)
        #[arg(long)]
        key: Option<String>,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// List stored wallets
    List,

    /// Select the current wallet
    Select { address: String },

    /// Delete a wallet
    Delete { address: String },

    /// Remove every wallet and setting from the store
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// List supported networks
    Networks,

    /// Select the current network (ethereum, bsc, polygon, ...)
    SetNetwork { network: String },

    /// Show the current wallet and network
    Current,

    /// Issue a page request through the relay
    Request {
        /// Method, e.g. eth_requestAccounts
        method: String,

        /// Params as a JSON array
        #[arg(short = 'P', long)]
        params: Option<String>,

        /// Origin of the simulated page
        #[arg(long, default_value = "https://dapp.local")]
        origin: String,
    },

    /// Show current configuration
    Config,
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
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config
    let mut config = if let Some(config_path) = cli.config {
        let content =
            std::fs::read_to_string(&config_path).map_err(|e| Error::Config(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
    } else {
        Config::default()
    };
    if let Some(store) = cli.store {
        config.storage_path = store.display().to_string();
    }

    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::open(&config.storage_path).await?);
    let keys = KeyStore::new(storage.clone());
    let networks = NetworkManager::new(
        storage,
        Arc::new(RpcConnector::new(RpcConfig::from_env())),
    );

    match cli.command {
        Commands::Create { name } => {
            let wallet = keys.create(name.as_deref()).await?;
            println!("Created {}", wallet.address);
            if let Some(phrase) = &wallet.mnemonic {
                println!("Recovery phrase (back it up now):");
                println!("  {}", phrase);
            }
        }
        Commands::ImportMnemonic { phrase, name } => {
            let phrase = read_secret(phrase, MNEMONIC_ENV)?;
            let wallet = keys
                .import_from_mnemonic(phrase.expose_secret(), name.as_deref())
                .await?;
            println!("Imported {}", wallet.address);
        }
        Commands::ImportKey { key, name } => {
            let key = read_secret(key, PRIVATE_KEY_ENV)?;
            let wallet = keys
                .import_from_private_key(key.expose_secret(), name.as_deref())
                .await?;
            println!("Imported {}", wallet.address);
        }
        Commands::List => {
            let current = keys.current_address().await?;
            let wallets = keys.list().await?;
            if wallets.is_empty() {
                println!("No wallets");
            }
            for wallet in wallets {
                let marker = if current.as_deref() == Some(wallet.address.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}",
                    marker,
                    wallet.address,
                    wallet.name.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Select { address } => {
            keys.set_current(&address).await?;
            println!("Current wallet: {}", address.trim().to_lowercase());
        }
        Commands::Delete { address } => {
            if keys.delete(&address).await? {
                println!("Deleted {}", address.trim().to_lowercase());
            } else {
                println!("No wallet {}", address);
            }
        }
        Commands::Reset { yes } => {
            if !yes {
                return Err(Error::InvalidArgument(
                    "reset erases every wallet; pass --yes to confirm".to_string(),
                ));
            }
            keys.reset().await?;
            println!("Wallet store cleared");
        }
        Commands::Networks => {
            let current = networks.current_network().await?;
            for network in NetworkManager::all() {
                let marker = if *network == current { "*" } else { " " };
                println!(
                    "{} {:<10} {:>6}  {} ({})",
                    marker,
                    network.key(),
                    network.chain_id(),
                    network.name(),
                    network.native_currency().symbol
                );
            }
        }
        Commands::SetNetwork { network } => {
            let network = networks.set_current_network(&network).await?;
            println!("Current network: {} ({})", network.name(), network.chain_id());
        }
        Commands::Current => {
            let network = networks.current_network().await?;
            match keys.get_current().await? {
                Some(wallet) => println!("Wallet:  {}", wallet.address),
                None => println!("Wallet:  none"),
            }
            println!("Network: {} ({})", network.name(), network.chain_id());
        }
        Commands::Request {
            method,
            params,
            origin,
        } => {
            let params = parse_params(params.as_deref())?;
            let mut dispatcher = Dispatcher::new(keys, networks);
            if let Some(path) = &config.audit_log_path {
                dispatcher = dispatcher.with_audit_log(AuditLog::new(path));
            }
            let timeout = config.request_timeout_ms.map(Duration::from_millis);
            run_request(dispatcher, &origin, &method, params, timeout).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Secret from the command line or, failing that, the environment
fn read_secret(arg: Option<String>, env: &str) -> Result<SecretString> {
    let value = match arg {
        Some(value) => value,
        None => std::env::var(env)
            .map_err(|_| Error::InvalidArgument(format!("pass the value or set {}", env)))?,
    };
    Ok(SecretString::from(value))
}

fn parse_params(params: Option<&str>) -> Result<Vec<serde_json::Value>> {
    let Some(raw) = params else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(raw)? {
        serde_json::Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

async fn run_request(
    dispatcher: Dispatcher,
    origin: &str,
    method: &str,
    params: Vec<serde_json::Value>,
    timeout: Option<Duration>,
) -> Result<()> {
    let (transport, _dispatcher) = dispatcher.spawn(32);
    let page = Page::new(origin);
    let (provider, relay) = load_page(&page, transport, timeout);
    let provider = provider.ok_or(Error::Disconnected)?;

    tracing::info!(origin, method, "Issuing page request");
    let outcome = provider.send(method, params).await;

    page.unload();
    if let Some(relay) = relay {
        if let Err(e) = relay.await {
            tracing::warn!(error = %e, "Relay task ended abnormally");
        }
    }

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
