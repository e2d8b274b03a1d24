// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Protocol: Ledger Primitives
//!
//! The platform layer underneath the custody relay contracts. A contract on
//! this ledger never sees JSON or structs on the wire: it sees *cells*, small
//! bit-packed trees of at most 1023 bits and four references, hashed into a
//! content address. Everything a contract reads, stores, or sends is a cell.
//!
//! ## Architecture
//!
//! - **cell**: Cells, the bit-level builder and slice, representation
//!   hashing, and bag-of-cells (BoC) serialization for interchange.
//! - **address**: Internal addresses (`workchain:hash`) and their raw text form.
//! - **message**: State init, deterministic contract addressing, and the
//!   inbound/outbound internal message model.
//! - **crypto**: SHA-256 and CRC32-C, the only two hashes the ledger uses.
//! - **storage**: sled-backed persistence for hosted contracts and their
//!   transaction log.
//! - **config**: Protocol constants and coin formatting helpers.
//!
//! ## Design Philosophy
//!
//! 1. Wire layouts are exact. If a bit is out of place, addresses stop
//!    resolving and funds go nowhere.
//! 2. Everything is deterministic: same inputs, same cells, same hashes.
//! 3. Errors are typed. A truncated payload and an oversized value are
//!    different failures and are reported as such.

pub mod address;
pub mod cell;
pub mod config;
pub mod crypto;
pub mod message;
pub mod storage;

pub use address::{Address, AddressError};
pub use cell::{Cell, CellBuilder, CellError, CellSlice};
pub use message::{contract_address, InboundMessage, OutboundMessage, SendMode, StateInit};
pub use storage::{ContractDb, ContractRecord, TransactionRecord};
