//! Pandora GATT server
//!
//! Serves `pandora.GATT` on top of the local Bluetooth adapter.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pandora_ble::BtleplugPlatform;
use pandora_gatt::{Config, GattService, default_config_path};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pandora-server")]
#[command(about = "GATT client operations for the Pandora test harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gRPC server
    Serve {
        /// Address to listen on, overrides the config file
        #[arg(short, long)]
        addr: Option<String>,
        /// Config file, defaults to $PANDORA_HOME/gatt.json
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bluetooth adapter index, overrides the config file
        #[arg(long)]
        adapter: Option<usize>,
    },
    /// Print the effective configuration as JSON
    PrintConfig {
        /// Config file, defaults to $PANDORA_HOME/gatt.json
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config, pandora_gatt::ConfigError> {
    let path = path.unwrap_or_else(default_config_path);
    tracing::debug!(path = %path.display(), "loading config");
    Config::load(&path)
}

fn apply_overrides(mut config: Config, addr: Option<String>, adapter: Option<usize>) -> Config {
    if let Some(addr) = addr {
        config.listen_addr = addr;
    }
    if let Some(adapter) = adapter {
        config.adapter_index = adapter;
    }
    config
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen_addr()?;
    let platform = BtleplugPlatform::new(config.adapter_index).await?;
    let service = GattService::new(Arc::new(platform), &config);

    tracing::info!(%addr, "pandora.GATT listening");
    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            config,
            adapter,
        } => {
            let config = apply_overrides(load_config(config)?, addr, adapter);
            serve(config).await?;
        }
        Commands::PrintConfig { config } => {
            println!("{}", serde_json::to_string_pretty(&load_config(config)?)?);
        }
    }

    Ok(())
}
