//! # Storage Module
//!
//! Persistence for contract accounts hosted by the relay node.
//!
//! ## Architecture
//!
//! ```text
//! record.rs: ContractRecord (code, data, balance) and TransactionRecord
//! db.rs:     sled persistence with one tree per record kind
//! ```
//!
//! Cells inside records are stored as BoC hex through their serde impls, so
//! a record read back from disk hashes to exactly what was written. Records
//! are encoded with bincode; JSON is for the HTTP API only.

pub mod db;
pub mod record;

pub use db::{ContractDb, DbError, DbResult};
pub use record::{ContractRecord, TransactionRecord};
