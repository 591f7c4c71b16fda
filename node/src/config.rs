use anyhow::{Context, Result};
use mnlib::crypto::PrivateKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Chain id of the development network; enode ports must match it.
pub const DEFAULT_CHAIN_ID: u64 = 39797;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Account {
    /// hex secp256k1 secret key
    pub secret: String,
    pub password: String,
    /// initial collateral, in whole coins
    #[serde(default)]
    pub balance: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading node config {}", path.display()))?;
        let config: NodeConfig =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing node config {}", path.display()))
    }

    /// Config with one freshly generated, funded account.
    pub fn sample() -> Self {
        NodeConfig {
            chain_id: DEFAULT_CHAIN_ID,
            accounts: vec![Account {
                secret: PrivateKey::new_key().to_hex(),
                password: "changeme".to_string(),
                balance: 2 * mnlib::MASTERNODE_MIN_COLLATERAL,
            }],
        }
    }
}
