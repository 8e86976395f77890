use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_crypto::keys::GuardianKey;
use vigil_governor::config::GovernorConfig;
use vigil_processor::config::ProcessorConfig;
use vigil_relay::config::{RelayConfig, DEFAULT_GOSSIP_PORT};
use vigil_types::guardian_set::GuardianSet;
use vigil_types::primitives::{guardian_address_from_hex, guardian_address_to_hex};

use crate::error::NodeError;

/// File name written by `vigil init`.
pub const CONFIG_FILE_NAME: &str = "vigil.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub guardian: GuardianConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    /// The guardian set installed at startup.
    pub guardian_set: GuardianSetConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Hex-encoded 32-byte secp256k1 secret. Takes precedence over `key_path`.
    #[serde(default)]
    pub key_hex: Option<String>,
    /// File holding the hex-encoded secret.
    #[serde(default)]
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_addr: String,
    /// Peers to push gossip to, as `host:port`.
    pub peers: Vec<String>,
    pub peer_queue_size: usize,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Storage backend: "memory" or "rocksdb".
    pub db_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianSetConfig {
    pub index: u32,
    /// Guardian addresses in set order, hex-encoded.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Interval between stats and metrics log lines.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            guardian: GuardianConfig {
                key_hex: None,
                key_path: None,
            },
            network: NetworkConfig {
                listen_addr: format!("0.0.0.0:{DEFAULT_GOSSIP_PORT}"),
                peers: Vec::new(),
                peer_queue_size: 1024,
                reconnect_delay_secs: 5,
            },
            storage: StorageConfig {
                data_dir: "./vigil-data".to_string(),
                db_type: "rocksdb".to_string(),
            },
            guardian_set: GuardianSetConfig::default(),
            processor: ProcessorConfig::default(),
            governor: GovernorConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                stats_interval_secs: default_stats_interval_secs(),
            },
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to parse config file '{}': {}", path, e),
        })?;
        Ok(config)
    }

    /// Write a single-guardian configuration with a freshly generated key
    /// into `dir`. Refuses to overwrite an existing file.
    pub fn init(dir: &str) -> Result<GuardianKey, NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }
        let config_path = dir_path.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(NodeError::ConfigError {
                reason: format!("{} already exists", config_path.display()),
            });
        }

        let key = GuardianKey::generate();
        let mut config = NodeConfig::default();
        config.guardian.key_hex = Some(key.to_hex());
        config.guardian_set.keys = vec![guardian_address_to_hex(&key.address())];
        config.storage.data_dir = dir_path.join("data").to_string_lossy().into_owned();

        let toml_str = toml::to_string_pretty(&config).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to serialize default config: {}", e),
        })?;
        std::fs::write(&config_path, toml_str)?;
        Ok(key)
    }

    /// The guardian signing key, from `key_hex` or `key_path`.
    pub fn guardian_key(&self) -> Result<GuardianKey, NodeError> {
        let secret = match (&self.guardian.key_hex, &self.guardian.key_path) {
            (Some(hex), _) => hex.trim().to_string(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| NodeError::ConfigError {
                    reason: format!("failed to read guardian key '{}': {}", path, e),
                })?
                .trim()
                .to_string(),
            (None, None) => {
                return Err(NodeError::ConfigError {
                    reason: "no guardian key configured (set guardian.key_hex or guardian.key_path)"
                        .to_string(),
                })
            }
        };
        GuardianKey::from_hex(&secret).map_err(|e| NodeError::ConfigError {
            reason: format!("invalid guardian key: {}", e),
        })
    }

    /// The initial guardian set, or `None` if no keys are configured.
    pub fn guardian_set(&self) -> Result<Option<GuardianSet>, NodeError> {
        if self.guardian_set.keys.is_empty() {
            return Ok(None);
        }
        let keys = self
            .guardian_set
            .keys
            .iter()
            .map(|k| {
                guardian_address_from_hex(k).map_err(|e| NodeError::ConfigError {
                    reason: format!("invalid guardian address '{}': {}", k, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(NodeError::ConfigError {
                    reason: format!(
                        "duplicate guardian address {}",
                        guardian_address_to_hex(key)
                    ),
                });
            }
        }
        Ok(Some(GuardianSet::new(self.guardian_set.index, keys)))
    }

    pub fn relay_config(&self) -> Result<RelayConfig, NodeError> {
        let listen_addr: SocketAddr =
            self.network
                .listen_addr
                .parse()
                .map_err(|e| NodeError::ConfigError {
                    reason: format!("invalid listen address '{}': {}", self.network.listen_addr, e),
                })?;
        Ok(RelayConfig {
            listen_addr,
            peers: self.network.peers.clone(),
            peer_queue_size: self.network.peer_queue_size,
            reconnect_delay: Duration::from_secs(self.network.reconnect_delay_secs),
            ..RelayConfig::default()
        })
    }
}
