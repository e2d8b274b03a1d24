//! Persisted record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cell::Cell;
use crate::message::{InboundMessage, OutboundMessage, StateInit};

/// A deployed contract account: its code, its current data cell and its
/// native balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub address: Address,
    pub code: Cell,
    pub data: Cell,
    /// Native balance in nanotons.
    pub balance: u128,
    /// Logical time of the last processed transaction (0 before the first).
    pub last_lt: u64,
    pub deployed_at: DateTime<Utc>,
}

impl ContractRecord {
    /// Creates a record for a freshly deployed contract.
    pub fn new(address: Address, code: Cell, data: Cell, balance: u128) -> Self {
        Self {
            address,
            code,
            data,
            balance,
            last_lt: 0,
            deployed_at: Utc::now(),
        }
    }

    /// State init of the current code and data. It hashes to `address`
    /// only until the first request that rewrites the data.
    pub fn state_init(&self) -> StateInit {
        StateInit::new(self.code.clone(), self.data.clone())
    }
}

/// The outcome of delivering one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Logical time, strictly increasing per database.
    pub lt: u64,
    pub account: Address,
    pub inbound: InboundMessage,
    /// Empty when the step was rejected or produced no sends.
    pub outbound: Vec<OutboundMessage>,
    /// 0 on success, otherwise the exit code that aborted the step.
    pub exit_code: u32,
    pub balance_after: u128,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether the step committed.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
