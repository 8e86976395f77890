use clap::{Parser, Subcommand};
use vigil_crypto::keys::GuardianKey;
use vigil_node::config::{NodeConfig, CONFIG_FILE_NAME};
use vigil_node::{Node, NodeError};
use vigil_types::primitives::guardian_address_to_hex;

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Vigil guardian node: observes, signs and aggregates cross-chain messages",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the guardian node
    Run {
        /// Path to config file
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: String,
        /// Override the gossip listen address
        #[arg(long)]
        listen_addr: Option<String>,
        /// Peer to push gossip to, `host:port` (can be specified multiple times)
        #[arg(long = "peer")]
        peers: Vec<String>,
        /// Storage backend: "memory" or "rocksdb"
        #[arg(long)]
        storage: Option<String>,
        /// Override data directory path
        #[arg(long)]
        data_dir: Option<String>,
        /// Disable the chain governor regardless of config
        #[arg(long)]
        no_governor: bool,
    },
    /// Write a single-guardian configuration with a new key
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
    },
    /// Generate a guardian key
    Keygen,
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run {
            config,
            listen_addr,
            peers,
            storage,
            data_dir,
            no_governor,
        } => {
            let mut config = NodeConfig::load(&config)?;
            crate::init_tracing(&config.logging.level);

            if let Some(addr) = listen_addr {
                config.network.listen_addr = addr;
            }
            config.network.peers.extend(peers);
            if let Some(db) = storage {
                config.storage.db_type = db;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            if no_governor {
                config.governor.enabled = false;
            }

            tracing::info!(
                listen_addr = %config.network.listen_addr,
                peers = config.network.peers.len(),
                storage = %config.storage.db_type,
                guardian_set = config.guardian_set.index,
                guardians = config.guardian_set.keys.len(),
                governor = config.governor.enabled,
                "starting guardian node"
            );

            let node = Node::new(config).await?;
            node.run_until_ctrl_c().await
        }
        Command::Init { dir } => {
            crate::init_tracing("info");
            let key = NodeConfig::init(&dir)?;
            tracing::info!(
                dir = %dir,
                guardian = %guardian_address_to_hex(&key.address()),
                "node configuration initialized"
            );
            Ok(())
        }
        Command::Keygen => {
            let key = GuardianKey::generate();
            println!("Secret:  {}", key.to_hex());
            println!("Address: {}", guardian_address_to_hex(&key.address()));
            Ok(())
        }
    }
}
