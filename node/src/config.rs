//! Deployment configuration.
//!
//! A deployment is fully described by the manager's initial storage and its
//! code; the address follows from those. Example:
//!
//! ```json
//! {
//!   "owner": "0:83df...31a8",
//!   "asset_issuer": "0:1f2e...9a0b",
//!   "asset_handler_template": "b5ee9c72...",
//!   "code": "b5ee9c72...",
//!   "initial_balance": 1000000000
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use custody_contracts::{BalanceManager, BalanceManagerStorage};
use custody_protocol::{Address, Cell, ContractRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub owner: Address,
    pub asset_issuer: Address,
    /// Holder account code, as BoC hex.
    pub asset_handler_template: Cell,
    /// Manager code, as BoC hex.
    pub code: Cell,
    /// Native balance credited at deployment, in nanotons.
    #[serde(default)]
    pub initial_balance: u128,
}

impl DeploymentConfig {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployment config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid deployment config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configs the manager could never act on.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.owner.is_basechain(),
            "owner {} is not a basechain address",
            self.owner
        );
        anyhow::ensure!(
            self.asset_issuer.is_basechain(),
            "asset issuer {} is not a basechain address",
            self.asset_issuer
        );
        Ok(())
    }

    pub fn storage(&self) -> BalanceManagerStorage {
        BalanceManagerStorage::new(
            self.owner,
            self.asset_issuer,
            self.asset_handler_template.clone(),
        )
    }

    /// The manager this config deploys.
    pub fn deploy(&self) -> Result<BalanceManager> {
        BalanceManager::deploy(&self.storage(), self.code.clone())
            .context("manager storage does not fit a cell")
    }

    /// The account record of a fresh deployment.
    pub fn initial_record(&self) -> Result<ContractRecord> {
        let manager = self.deploy()?;
        Ok(ContractRecord::new(
            manager.address(),
            manager.code().clone(),
            manager.data().clone(),
            self.initial_balance,
        ))
    }
}
