//! # Hosted Manager
//!
//! Runs the single persisted balance manager instance. Each delivered
//! message becomes exactly one transaction record, committed together with
//! the resulting account state.
//!
//! ## Value accounting
//!
//! The inbound value is credited before the contract runs, so a request can
//! spend it. A committed step then debits what its sends carry:
//!
//! - `CARRY_REMAINING_VALUE`: the message value plus the inbound value
//! - otherwise: the message value
//!
//! A rejected step bounces the inbound value back (unless the message was
//! itself a bounce) and leaves the data cell untouched.

use chrono::Utc;
use tracing::{debug, info};

use custody_contracts::{BalanceManager, ExitCode};
use custody_protocol::storage::DbResult;
use custody_protocol::{ContractDb, ContractRecord, InboundMessage, SendMode, TransactionRecord};

/// The manager together with its account record.
#[derive(Debug, Clone)]
pub struct HostedManager {
    manager: BalanceManager,
    record: ContractRecord,
}

impl HostedManager {
    /// Loads the account for `initial` from the database, deploying it from
    /// `initial` when it has never been persisted.
    pub fn load_or_deploy(db: &ContractDb, initial: ContractRecord) -> DbResult<Self> {
        let record = match db.get_contract(&initial.address)? {
            Some(existing) => {
                info!(
                    address = %existing.address,
                    last_lt = existing.last_lt,
                    "loaded persisted manager"
                );
                existing
            }
            None => {
                db.put_contract(&initial)?;
                info!(address = %initial.address, balance = initial.balance, "manager deployed");
                initial
            }
        };
        Ok(Self::from_record(record))
    }

    pub fn from_record(record: ContractRecord) -> Self {
        let manager =
            BalanceManager::from_state(record.address, record.code.clone(), record.data.clone());
        Self { manager, record }
    }

    pub fn manager(&self) -> &BalanceManager {
        &self.manager
    }

    pub fn record(&self) -> &ContractRecord {
        &self.record
    }

    /// Delivers one message and persists the outcome.
    ///
    /// Contract rejections are recorded, not returned as errors; only
    /// storage failures are.
    pub fn deliver(&mut self, db: &ContractDb, msg: InboundMessage) -> DbResult<TransactionRecord> {
        let lt = db.next_lt()?;
        let credited = self.record.balance.saturating_add(msg.value);

        let mut manager = self.manager.clone();
        let (outbound, exit_code, balance_after) = match manager.handle_internal(&msg, credited) {
            Ok(outbound) => {
                let spent = outbound.iter().fold(0u128, |acc, out| {
                    let value = if out.mode.contains(SendMode::CARRY_REMAINING_VALUE) {
                        out.value.saturating_add(msg.value)
                    } else {
                        out.value
                    };
                    acc.saturating_add(value)
                });
                (outbound, 0, credited.saturating_sub(spent))
            }
            Err(code) => {
                let balance = if msg.bounced {
                    credited
                } else {
                    self.record.balance
                };
                (Vec::new(), code.code(), balance)
            }
        };

        let mut record = self.record.clone();
        record.data = manager.data().clone();
        record.balance = balance_after;
        record.last_lt = lt;

        let tx = TransactionRecord {
            lt,
            account: record.address,
            inbound: msg,
            outbound,
            exit_code,
            balance_after,
            timestamp: Utc::now(),
        };
        db.commit(&record, &tx)?;

        debug!(
            lt,
            exit_code,
            outbound = tx.outbound.len(),
            balance = balance_after,
            "message delivered"
        );
        self.manager = manager;
        self.record = record;
        Ok(tx)
    }
}

/// Readable name of a recorded exit code.
pub fn describe_exit_code(code: u32) -> String {
    if code == 0 {
        return "success".to_string();
    }
    match ExitCode::from_code(code) {
        Some(exit) => exit.to_string(),
        None => format!("exit code {}", code),
    }
}
