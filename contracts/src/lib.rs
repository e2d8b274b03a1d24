// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Contracts
//!
//! Contract logic for the custody relay:
//!
//! - **Balance Manager**: an owner-gated dispatcher that asks its holder
//!   accounts to move tokens, sends native currency, and lets the owner
//!   hand over authority or switch the delegate asset.
//! - **Jetton wire formats**: the transfer, internal transfer, notification,
//!   excess and mint bodies exchanged with holder accounts, plus holder
//!   address derivation.
//!
//! ## Design Principles
//!
//! 1. A processing step either commits or aborts; an abort leaves storage
//!    untouched and emits nothing.
//! 2. The manager never tracks token balances. Holder accounts own that
//!    state and enforce it.
//! 3. Every request and payload type is serializable (serde) for the API
//!    and persistent transaction records.

pub mod balance_manager;
pub mod error;
pub mod jetton;
pub mod ops;

pub use balance_manager::{BalanceManager, BalanceManagerStorage, ACK_FEE, JETTON_TRANSFER_FEE};
pub use error::ExitCode;
pub use jetton::derive_holder_address;
pub use ops::InboundRequest;
