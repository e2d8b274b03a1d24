//! # Jetton Wire Formats
//!
//! The manager never holds tokens itself. Its balance of an asset lives in a
//! *holder account* (jetton wallet) owned by the manager, deployed by the
//! asset issuer (jetton minter) from a shared code template. This module
//! covers the collaborator side of that arrangement:
//!
//! - deterministic holder address derivation,
//! - the message bodies exchanged between holder accounts and their owners.
//!
//! Holder account data, as laid out by the issuer at deployment:
//!
//! ```text
//! balance:Coins owner_address:MsgAddressInt jetton_master_address:MsgAddressInt
//! jetton_wallet_code:^Cell
//! ```

use custody_protocol::config::BASECHAIN;
use custody_protocol::{
    contract_address, Address, Cell, CellBuilder, CellError, CellSlice, StateInit,
};
use serde::{Deserialize, Serialize};

/// Opcodes of the jetton standard that the manager produces or observes.
pub mod op {
    /// Owner asks its holder account to send tokens.
    pub const TRANSFER: u32 = 0x0f8a_7ea5;
    /// Holder account to holder account.
    pub const INTERNAL_TRANSFER: u32 = 0x178d_4519;
    /// Receiving holder account notifies its owner.
    pub const TRANSFER_NOTIFICATION: u32 = 0x7362_d09c;
    /// Leftover value returned to the response destination.
    pub const EXCESSES: u32 = 0xd532_76db;
    /// Issuer admin mints to a holder.
    pub const MINT: u32 = 0x1674_b0a0;
}

// ---------------------------------------------------------------------------
// Address derivation
// ---------------------------------------------------------------------------

/// Initial data of a holder account: zero balance, owner, issuer, template.
pub fn holder_data(owner: &Address, issuer: &Address, template: &Cell) -> Result<Cell, CellError> {
    let mut b = CellBuilder::new();
    b.store_coins(0)?
        .store_address(owner)?
        .store_address(issuer)?
        .store_ref(template.clone())?;
    b.build()
}

/// The state init an issuer deploys for `owner`'s holder account.
pub fn holder_state_init(
    owner: &Address,
    issuer: &Address,
    template: &Cell,
) -> Result<StateInit, CellError> {
    Ok(StateInit::new(
        template.clone(),
        holder_data(owner, issuer, template)?,
    ))
}

/// Derives the basechain address of `owner`'s holder account for the asset
/// issued by `issuer` with code `template`.
///
/// Pure: the account need not exist yet. Issuers deploy it on the first
/// incoming transfer.
pub fn derive_holder_address(
    owner: &Address,
    issuer: &Address,
    template: &Cell,
) -> Result<Address, CellError> {
    contract_address(BASECHAIN, &holder_state_init(owner, issuer, template)?)
}

// ---------------------------------------------------------------------------
// Message bodies
// ---------------------------------------------------------------------------

/// `transfer#0f8a7ea5`, sent by an owner to its own holder account.
///
/// ```text
/// transfer#0f8a7ea5 query_id:uint64 amount:Coins destination:MsgAddress
///   response_destination:MsgAddress custom_payload:(Maybe ^Cell)
///   forward_ton_amount:Coins forward_payload:(Either Cell ^Cell)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JettonTransfer {
    pub query_id: u64,
    pub amount: u128,
    /// Owner (not holder account) that should receive the tokens.
    pub destination: Address,
    /// Where leftover value goes once the transfer settles.
    pub response_destination: Option<Address>,
    pub custom_payload: Option<Cell>,
    /// Value forwarded to `destination` with the transfer notification.
    pub forward_ton_amount: u128,
    /// Stored inline when absent, by reference otherwise.
    pub forward_payload: Option<Cell>,
}

impl JettonTransfer {
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::TRANSFER as u64, 32)?
            .store_uint(self.query_id, 64)?
            .store_coins(self.amount)?
            .store_address(&self.destination)?
            .store_maybe_address(self.response_destination.as_ref())?
            .store_maybe_ref(self.custom_payload.clone())?
            .store_coins(self.forward_ton_amount)?;
        store_forward_payload(&mut b, self.forward_payload.as_ref())?;
        b.build()
    }

    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        expect_op(s.load_uint(32)?, op::TRANSFER)?;
        Ok(Self {
            query_id: s.load_uint(64)?,
            amount: s.load_coins()?,
            destination: s.load_address()?,
            response_destination: s.load_maybe_address()?,
            custom_payload: s.load_maybe_ref()?,
            forward_ton_amount: s.load_coins()?,
            forward_payload: load_forward_payload(&mut s)?,
        })
    }
}

/// `internal_transfer#178d4519`, holder account to holder account.
///
/// ```text
/// internal_transfer#178d4519 query_id:uint64 amount:Coins from:MsgAddress
///   response_address:MsgAddress forward_ton_amount:Coins
///   forward_payload:(Either Cell ^Cell)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransfer {
    pub query_id: u64,
    pub amount: u128,
    /// Owner of the sending holder account.
    pub from: Address,
    pub response_address: Option<Address>,
    pub forward_ton_amount: u128,
    pub forward_payload: Option<Cell>,
}

impl InternalTransfer {
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::INTERNAL_TRANSFER as u64, 32)?
            .store_uint(self.query_id, 64)?
            .store_coins(self.amount)?
            .store_address(&self.from)?
            .store_maybe_address(self.response_address.as_ref())?
            .store_coins(self.forward_ton_amount)?;
        store_forward_payload(&mut b, self.forward_payload.as_ref())?;
        b.build()
    }

    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        expect_op(s.load_uint(32)?, op::INTERNAL_TRANSFER)?;
        Ok(Self {
            query_id: s.load_uint(64)?,
            amount: s.load_coins()?,
            from: s.load_address()?,
            response_address: s.load_maybe_address()?,
            forward_ton_amount: s.load_coins()?,
            forward_payload: load_forward_payload(&mut s)?,
        })
    }
}

/// `transfer_notification#7362d09c`, sent to the receiving owner.
///
/// ```text
/// transfer_notification#7362d09c query_id:uint64 amount:Coins
///   sender:MsgAddress forward_payload:(Either Cell ^Cell)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNotification {
    pub query_id: u64,
    pub amount: u128,
    /// Owner who initiated the transfer.
    pub sender: Address,
    pub forward_payload: Option<Cell>,
}

impl TransferNotification {
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::TRANSFER_NOTIFICATION as u64, 32)?
            .store_uint(self.query_id, 64)?
            .store_coins(self.amount)?
            .store_address(&self.sender)?;
        store_forward_payload(&mut b, self.forward_payload.as_ref())?;
        b.build()
    }

    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        expect_op(s.load_uint(32)?, op::TRANSFER_NOTIFICATION)?;
        Ok(Self {
            query_id: s.load_uint(64)?,
            amount: s.load_coins()?,
            sender: s.load_address()?,
            forward_payload: load_forward_payload(&mut s)?,
        })
    }
}

/// `excesses#d53276db query_id:uint64`
pub fn excesses_body(query_id: u64) -> Result<Cell, CellError> {
    let mut b = CellBuilder::new();
    b.store_uint(op::EXCESSES as u64, 32)?
        .store_uint(query_id, 64)?;
    b.build()
}

/// `mint#1674b0a0`, as accepted by the reference issuer.
///
/// ```text
/// mint#1674b0a0 query_id:uint64 to_address:MsgAddressInt jetton_amount:Coins
///   forward_ton_amount:Coins total_ton_amount:Coins
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub query_id: u64,
    /// Owner whose holder account is credited.
    pub to: Address,
    pub amount: u128,
    pub forward_ton_amount: u128,
    pub total_ton_amount: u128,
}

impl Mint {
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::MINT as u64, 32)?
            .store_uint(self.query_id, 64)?
            .store_address(&self.to)?
            .store_coins(self.amount)?
            .store_coins(self.forward_ton_amount)?
            .store_coins(self.total_ton_amount)?;
        b.build()
    }

    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        expect_op(s.load_uint(32)?, op::MINT)?;
        Ok(Self {
            query_id: s.load_uint(64)?,
            to: s.load_address()?,
            amount: s.load_coins()?,
            forward_ton_amount: s.load_coins()?,
            total_ton_amount: s.load_coins()?,
        })
    }
}

fn expect_op(found: u64, expected: u32) -> Result<(), CellError> {
    if found != expected as u64 {
        return Err(CellError::ValueOutOfRange {
            value: format!("{:#010x}", found),
            bits: 32,
        });
    }
    Ok(())
}

fn store_forward_payload(b: &mut CellBuilder, payload: Option<&Cell>) -> Result<(), CellError> {
    match payload {
        Some(cell) => {
            b.store_bit(true)?.store_ref(cell.clone())?;
        }
        None => {
            b.store_bit(false)?;
        }
    }
    Ok(())
}

fn load_forward_payload(s: &mut CellSlice<'_>) -> Result<Option<Cell>, CellError> {
    if s.load_bit()? {
        return Ok(Some(s.load_ref()?));
    }
    // Inline payloads are kept only when they carry something.
    if s.remaining_bits() == 0 && s.remaining_refs() == 0 {
        return Ok(None);
    }
    let mut inline = CellBuilder::new();
    inline.store_slice(s)?;
    Ok(Some(inline.build()?))
}
