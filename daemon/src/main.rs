//! Vouch daemon: entry point for running a Vouch node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use vouch_network::LocalHub;
use vouch_node::{
    init_logging, wait_for_signal, LogFormat, NodeConfig, NodeIdentity, NodeRole, StorageBackend, VouchNode,
};
use vouch_types::NetworkId;

#[derive(Parser)]
#[command(name = "vouchd", about = "Vouch review network node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "VOUCH_CONFIG")]
    config: Option<PathBuf>,

    /// Network to replicate with: "production", "staging" or "experimental".
    #[arg(long, env = "VOUCH_NETWORK")]
    network: Option<NetworkId>,

    /// Node role: "customer", "collector" or "gateway".
    #[arg(long, env = "VOUCH_ROLE")]
    role: Option<String>,

    /// Data directory for storage and the node identity key.
    #[arg(long, env = "VOUCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory instead of LMDB.
    #[arg(long, env = "VOUCH_IN_MEMORY")]
    in_memory: bool,

    /// Base URL of the blockchain API used to confirm anchors.
    #[arg(long, env = "VOUCH_ANCHOR_API")]
    anchor_api: Option<String>,

    /// Log level filter, e.g. "info" or "debug,vouch_node=trace".
    #[arg(long, env = "VOUCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "VOUCH_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run,
    /// Print this node's DID, creating its key on first use.
    Identity,
    /// Check the LMDB databases under the data directory.
    Check,
    /// Print the effective configuration as TOML.
    Config,
}

fn parse_role(s: &str) -> anyhow::Result<NodeRole> {
    match s.to_ascii_lowercase().as_str() {
        "customer" => Ok(NodeRole::Customer),
        "collector" => Ok(NodeRole::Collector),
        "gateway" => Ok(NodeRole::Gateway),
        other => anyhow::bail!("unknown role '{other}'"),
    }
}

/// Layer CLI flags over the config file (or defaults).
fn effective_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(role) = &cli.role {
        config.role = parse_role(role)?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.in_memory {
        config.storage = StorageBackend::Memory;
    }
    if let Some(url) = &cli.anchor_api {
        config.anchor.api_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = effective_config(&cli)?;
    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    if cli.config.is_some() {
        tracing::info!(path = ?cli.config, "loaded config file");
    }

    match cli.command {
        Command::Run => {
            tracing::info!(
                role = ?config.role,
                network = %config.network,
                data_dir = %config.data_dir.display(),
                storage = ?config.storage,
                "starting Vouch node"
            );
            // Peer-to-peer transport is provided by the embedding deployment;
            // standalone the node runs on an in-process hub.
            let hub = LocalHub::default();
            let mut node = VouchNode::open(config, Arc::new(hub))?;
            node.start().await?;
            tracing::info!(did = %node.did(), "node running");

            wait_for_signal().await;
            tracing::info!("shutdown signal received, stopping node");
            node.stop().await?;
            tracing::info!("Vouch daemon exited cleanly");
        }
        Command::Identity => {
            let identity = NodeIdentity::load_or_create(&config.data_dir)?;
            println!("{}", identity.did);
        }
        Command::Check => {
            let path = config.data_dir.join("lmdb");
            vouch_store_lmdb::integrity::check_data_dir(&path).map_err(anyhow::Error::msg)?;
            let env = vouch_store_lmdb::LmdbEnvironment::open(&path, config.map_size)?;
            let report = vouch_store_lmdb::check_integrity(&env)?;
            println!(
                "databases: {}, entries: {}, index entries without content: {}",
                report.databases_checked, report.total_entries, report.missing_content
            );
            for error in &report.errors {
                println!("error: {error}");
            }
            if !report.is_healthy() {
                anyhow::bail!("{} integrity errors", report.errors.len());
            }
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
