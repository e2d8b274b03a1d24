//! # ContractDb: Persistent Storage Engine
//!
//! The persistence layer for hosted contracts, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                       | Value                        |
//! |----------------|---------------------------|------------------------------|
//! | `contracts`    | raw address (UTF-8)       | `bincode(ContractRecord)`    |
//! | `transactions` | `lt` (8B BE)              | `bincode(TransactionRecord)` |
//! | `metadata`     | key (UTF-8)               | value (bytes)                |
//!
//! Logical times are stored big-endian so that sled's lexicographic
//! ordering matches numeric ordering.
//!
//! ## Atomicity
//!
//! Committing a processed message writes the updated contract, the
//! transaction record, and the latest logical time in one sled transaction
//! spanning all three trees.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

use super::record::{ContractRecord, TransactionRecord};
use crate::address::Address;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Well-known key in the `metadata` tree for the latest logical time.
const META_LATEST_LT: &[u8] = b"latest_lt";

fn encode<T: serde::Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// ContractDb
// ---------------------------------------------------------------------------

/// Persistent storage for contract accounts and their transaction log.
///
/// sled trees are safe to share across threads; clone the handle or wrap
/// it in an `Arc`.
#[derive(Debug, Clone)]
pub struct ContractDb {
    db: Db,
    /// Contract accounts keyed by raw address.
    contracts: Tree,
    /// Transaction records keyed by logical time.
    transactions: Tree,
    metadata: Tree,
}

impl ContractDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "contract database opened");
        Self::from_db(db)
    }

    /// Create an in-memory database that is discarded on drop.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let contracts = db.open_tree("contracts")?;
        let transactions = db.open_tree("transactions")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            contracts,
            transactions,
            metadata,
        })
    }

    // -- Contract operations ------------------------------------------------

    /// Persist a contract record, replacing any previous one at the address.
    pub fn put_contract(&self, record: &ContractRecord) -> DbResult<()> {
        let bytes = encode(record)?;
        self.contracts
            .insert(record.address.to_raw().as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieve the contract deployed at `address`.
    pub fn get_contract(&self, address: &Address) -> DbResult<Option<ContractRecord>> {
        match self.contracts.get(address.to_raw().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`get_contract`](Self::get_contract) but a missing contract is
    /// an error.
    pub fn require_contract(&self, address: &Address) -> DbResult<ContractRecord> {
        self.get_contract(address)?
            .ok_or_else(|| DbError::NotFound(address.to_raw()))
    }

    // -- Transaction operations ---------------------------------------------

    /// The logical time the next transaction should use.
    pub fn next_lt(&self) -> DbResult<u64> {
        Ok(self.latest_lt()?.map_or(1, |lt| lt + 1))
    }

    /// Atomically store a transaction together with the contract state it
    /// produced.
    pub fn commit(&self, contract: &ContractRecord, tx: &TransactionRecord) -> DbResult<()> {
        let contract_key = contract.address.to_raw().into_bytes();
        let contract_bytes = encode(contract)?;
        let lt_key = tx.lt.to_be_bytes();
        let tx_bytes = encode(tx)?;

        let result: Result<(), TransactionError<()>> =
            (&self.contracts, &self.transactions, &self.metadata).transaction(
                |(contracts, transactions, metadata)| {
                    contracts.insert(&contract_key[..], &contract_bytes[..])?;
                    transactions.insert(&lt_key[..], &tx_bytes[..])?;
                    metadata.insert(META_LATEST_LT, &lt_key[..])?;
                    Ok::<(), ConflictableTransactionError<()>>(())
                },
            );
        result.map_err(|e| match e {
            TransactionError::Storage(e) => DbError::Sled(e),
            TransactionError::Abort(()) => DbError::Serialization("commit aborted".to_string()),
        })?;

        self.db.flush()?;
        debug!(lt = tx.lt, account = %tx.account, exit_code = tx.exit_code, "transaction committed");
        Ok(())
    }

    /// Retrieve a transaction by logical time.
    pub fn get_transaction(&self, lt: u64) -> DbResult<Option<TransactionRecord>> {
        match self.transactions.get(lt.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The most recent transactions, newest first.
    pub fn recent_transactions(&self, limit: usize) -> DbResult<Vec<TransactionRecord>> {
        let mut out = Vec::with_capacity(limit);
        for entry in self.transactions.iter().rev().take(limit) {
            let (_key, value) = entry?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    // -- Metadata operations ------------------------------------------------

    /// The latest committed logical time, if any.
    pub fn latest_lt(&self) -> DbResult<Option<u64>> {
        match self.metadata.get(META_LATEST_LT)? {
            Some(bytes) => {
                let lt = u64::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| DbError::Serialization("invalid lt bytes".to_string()))?,
                );
                Ok(Some(lt))
            }
            None => Ok(None),
        }
    }

    // -- Utility operations -------------------------------------------------

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
