//! Ledger and node configuration.

use crate::error::{LedgerError, Result};
use crate::nodes::normalize_address;
use petchain_consensus::MAX_DIFFICULTY;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex characters required of every mined block hash.
    pub difficulty: u32,
    /// Maximum pending transactions per block, excluding the reward.
    pub max_block_transactions: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            max_block_transactions: 1000,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.max_block_transactions == 0 {
            return Err(LedgerError::Config(
                "max_block_transactions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Node configuration, as stored in `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    /// Identifier credited by mining rewards. Random when absent.
    pub node_id: String,
    /// sled database directory. The chain is kept in memory only when unset.
    pub data_dir: Option<PathBuf>,
    /// HTTP listen address.
    pub bind: String,
    /// Peers registered at startup.
    pub peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            node_id: generate_node_id(),
            data_dir: None,
            bind: "127.0.0.1:5001".to_string(),
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load and validate a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: NodeConfig = serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| LedgerError::Config(format!("failed to write {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        if self.node_id.trim().is_empty() {
            return Err(LedgerError::Config("node_id must not be empty".into()));
        }
        self.bind
            .parse::<SocketAddr>()
            .map_err(|e| LedgerError::Config(format!("invalid bind address `{}`: {}", self.bind, e)))?;
        for peer in &self.peers {
            normalize_address(peer)?;
        }
        Ok(())
    }
}

/// A random 32-character hex node identifier.
pub fn generate_node_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
