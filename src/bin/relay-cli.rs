use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use near_relay_client::config::{load_config, ClientConfig, StorageMode};
use near_relay_client::observability::init_logging;
use near_relay_client::rpc::BlockReference;
use near_relay_client::NearClient;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Inspect and manage a persisted NEAR client session", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured network
    #[arg(short, long)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active network and signed-in account
    Status,
    /// List recorded transactions
    History,
    /// Call a contract view method
    View {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        method: String,
        /// JSON arguments
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Look up a transaction by hash
    Tx {
        #[arg(long)]
        hash: String,
        #[arg(long)]
        account: String,
    },
    /// Clear the persisted session
    SignOut,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(network) = &cli.network {
        config.network = near_relay_client::config::NetworkConfig::for_network(network);
    }
    // The CLI only makes sense against persisted state.
    config.storage.mode = StorageMode::Durable;
    init_logging(&config.observability);

    let client = NearClient::from_config(config).await?;

    match cli.command {
        Commands::Status => print_json(&serde_json::to_value(client.selected().await)?)?,
        Commands::History => print_json(&serde_json::to_value(client.history())?)?,
        Commands::View {
            contract,
            method,
            args,
        } => {
            let args: Value = serde_json::from_str(&args)?;
            let result = client
                .view(&contract, &method, &args, BlockReference::Optimistic)
                .await?;
            print_json(&result)?;
        }
        Commands::Tx { hash, account } => {
            print_json(&client.query_tx(&hash, &account).await?)?;
        }
        Commands::SignOut => {
            client.sign_out().await?;
            println!("Signed out of {}", client.network_id());
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
