//! # Messages and Contract Addressing
//!
//! Contracts talk to each other only through one-way internal messages. This
//! module models both directions as the dispatcher sees them:
//!
//! - [`InboundMessage`]: the delivery context of one processing step (who
//!   sent it, how much value came with it, whether it bounced, the body).
//! - [`OutboundMessage`]: a send requested by a processing step, returned by
//!   value and never awaited.
//!
//! It also defines [`StateInit`] and [`contract_address`], which tie a
//! contract's address to the hash of its code and initial data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::address::Address;
use crate::cell::{Cell, CellBuilder, CellError, CellSlice};

// ---------------------------------------------------------------------------
// StateInit
// ---------------------------------------------------------------------------

/// Code and initial data of a contract.
///
/// ```text
/// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
///   code:(Maybe ^Cell) data:(Maybe ^Cell) library:(HashmapE 256 SimpleLib)
/// ```
///
/// `split_depth`, `special` and `library` are always absent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInit {
    pub code: Option<Cell>,
    pub data: Option<Cell>,
}

impl StateInit {
    /// A state init with both code and data present.
    pub fn new(code: Cell, data: Cell) -> Self {
        Self {
            code: Some(code),
            data: Some(data),
        }
    }

    /// Serializes the state init as a standalone cell.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bit(false)? // split_depth
            .store_bit(false)? // special
            .store_maybe_ref(self.code.clone())?
            .store_maybe_ref(self.data.clone())?
            .store_bit(false)?; // library
        b.build()
    }

    /// The address a contract with this state init lives at.
    pub fn address(&self, workchain: i8) -> Result<Address, CellError> {
        contract_address(workchain, self)
    }
}

/// Computes `(workchain, hash(StateInit))`.
pub fn contract_address(workchain: i8, init: &StateInit) -> Result<Address, CellError> {
    let cell = init.to_cell()?;
    Ok(Address::new(workchain, *cell.hash()))
}

// ---------------------------------------------------------------------------
// SendMode
// ---------------------------------------------------------------------------

/// Flags controlling how an outbound message's value and fees are handled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendMode(u8);

impl SendMode {
    /// Send exactly `value`, fees deducted from it.
    pub const ORDINARY: Self = Self(0);
    /// Pay forwarding fees from the contract balance instead of `value`.
    pub const PAY_FEES_SEPARATELY: Self = Self(1);
    /// Skip the message instead of failing the step if it cannot be sent.
    pub const IGNORE_ERRORS: Self = Self(2);
    /// Add whatever is left of the inbound value to `value`.
    pub const CARRY_REMAINING_VALUE: Self = Self(64);
    /// Send the whole remaining contract balance.
    pub const CARRY_ALL_BALANCE: Self = Self(128);

    /// Builds a mode from raw flag bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw flag bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SendMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendMode({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One delivery to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The account that sent the message.
    pub sender: Address,
    /// Attached native value, in nanotons.
    pub value: u128,
    /// Set when this is a bounce of a message the contract sent earlier.
    #[serde(default)]
    pub bounced: bool,
    /// Message payload.
    pub body: Cell,
}

impl InboundMessage {
    /// A regular (non-bounced) message.
    pub fn new(sender: Address, value: u128, body: Cell) -> Self {
        Self {
            sender,
            value,
            bounced: false,
            body,
        }
    }

    /// Marks the message as a bounce.
    pub fn bounced(mut self) -> Self {
        self.bounced = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A message emitted by a processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub destination: Address,
    /// Base value in nanotons; see [`SendMode`] for what gets added on top.
    pub value: u128,
    pub mode: SendMode,
    pub bounce: bool,
    pub state_init: Option<StateInit>,
    pub body: Cell,
}

impl OutboundMessage {
    /// The first 32 bits of the body, if present.
    pub fn op(&self) -> Option<u32> {
        self.body.parse().load_uint(32).ok().map(|v| v as u32)
    }

    /// The 64 bits following the opcode, if present.
    pub fn query_id(&self) -> Option<u64> {
        let mut s = self.body.parse();
        s.skip_bits(32).ok()?;
        s.load_uint(64).ok()
    }

    /// Serializes the message as an internal message cell.
    ///
    /// ```text
    /// int_msg_info$0 ihr_disabled:Bool bounce:Bool bounced:Bool
    ///   src:MsgAddress dest:MsgAddressInt value:CurrencyCollection
    ///   ihr_fee:Coins fwd_fee:Coins created_lt:uint64 created_at:uint32
    /// init:(Maybe (Either StateInit ^StateInit)) body:(Either X ^X)
    /// ```
    ///
    /// Source, fees and timestamps are left for the ledger to fill in. State
    /// init and body always go by reference.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address_none()?
            .store_address(&self.destination)?
            .store_coins(self.value)?
            .store_bit(false)? // extra currencies
            .store_coins(0)? // ihr_fee
            .store_coins(0)? // fwd_fee
            .store_uint(0, 64)?
            .store_uint(0, 32)?;

        match &self.state_init {
            Some(init) => {
                b.store_bit(true)?.store_bit(true)?.store_ref(init.to_cell()?)?;
            }
            None => {
                b.store_bit(false)?;
            }
        }

        b.store_bit(true)?.store_ref(self.body.clone())?;
        b.build()
    }

    /// Parses a cell produced by [`to_cell`](Self::to_cell).
    ///
    /// The mode is not part of the wire form and comes back as
    /// [`SendMode::ORDINARY`].
    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        if s.load_bit()? {
            return Err(CellError::InvalidAddress("not an internal message".into()));
        }
        s.load_bit()?; // ihr_disabled
        let bounce = s.load_bit()?;
        s.load_bit()?; // bounced
        s.load_maybe_address()?;
        let destination = s.load_address()?;
        let value = s.load_coins()?;
        s.load_maybe_ref()?; // extra currencies
        s.load_coins()?;
        s.load_coins()?;
        s.skip_bits(64 + 32)?;

        let state_init = if s.load_bit()? {
            if s.load_bit()? {
                let init = s.load_ref()?;
                let mut is = init.parse();
                let state_init = read_state_init(&mut is)?;
                is.end_parse()?;
                Some(state_init)
            } else {
                Some(read_state_init(&mut s)?)
            }
        } else {
            None
        };

        let body = if s.load_bit()? {
            let body = s.load_ref()?;
            s.end_parse()?;
            body
        } else {
            let mut inline = CellBuilder::new();
            inline.store_slice(&s)?;
            inline.build()?
        };

        Ok(Self {
            destination,
            value,
            mode: SendMode::ORDINARY,
            bounce,
            state_init,
            body,
        })
    }
}

fn read_state_init(s: &mut CellSlice<'_>) -> Result<StateInit, CellError> {
    s.skip_bits(2)?; // split_depth, special
    let code = s.load_maybe_ref()?;
    let data = s.load_maybe_ref()?;
    s.skip_bits(1)?; // library
    Ok(StateInit { code, data })
}
