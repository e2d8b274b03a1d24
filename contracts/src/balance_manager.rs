//! # Balance Manager Contract
//!
//! Custodies jetton and native balances for a single owner. The manager's
//! tokens sit in holder accounts it owns; the manager only ever *asks* those
//! accounts to move funds, it never tracks balances itself.
//!
//! ## Processing a message
//!
//! 1. **Bounced**: ignored.
//! 2. **Empty body**: accepted as a top-up.
//! 3. **Authorization**: the sender must equal the stored owner (101).
//! 4. **Decode** the request (9 on truncation, 65535 on an unknown opcode).
//! 5. **Workchain**: every address argument must be on the basechain (100).
//! 6. **Attached value** must cover the sends the operation makes (102).
//! 7. **Native balance** must cover a native withdrawal (37).
//! 8. **Compose** the outbound messages.
//! 9. **Commit** the updated storage.
//!
//! Any failure aborts the whole step: storage is untouched and no message
//! is emitted.
//!
//! ## Storage
//!
//! ```text
//! owner:MsgAddressInt asset_issuer:MsgAddressInt asset_handler_template:^Cell
//! ```

use custody_protocol::config::BASECHAIN;
use custody_protocol::{
    contract_address, Address, Cell, CellBuilder, CellError, InboundMessage, OutboundMessage,
    SendMode, StateInit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExitCode;
use crate::jetton::{derive_holder_address, JettonTransfer};
use crate::ops::{excess_body, InboundRequest};

/// Attached value required to send a jetton transfer, on top of whatever
/// is forwarded to the destination.
pub const JETTON_TRANSFER_FEE: u128 = 40_000_000;

/// Attached value required for a native withdrawal or an acknowledgement.
pub const ACK_FEE: u128 = 10_000_000;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// The manager's persistent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceManagerStorage {
    /// The only account allowed to make requests.
    pub owner: Address,
    /// Issuer of the delegate asset.
    pub asset_issuer: Address,
    /// Code of the delegate asset's holder accounts.
    pub asset_handler_template: Cell,
}

impl BalanceManagerStorage {
    pub fn new(owner: Address, asset_issuer: Address, asset_handler_template: Cell) -> Self {
        Self {
            owner,
            asset_issuer,
            asset_handler_template,
        }
    }

    /// Serializes the storage as the contract's data cell.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_address(&self.owner)?
            .store_address(&self.asset_issuer)?
            .store_ref(self.asset_handler_template.clone())?;
        b.build()
    }

    /// Loads storage from a data cell.
    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.parse();
        Ok(Self {
            owner: s.load_address()?,
            asset_issuer: s.load_address()?,
            asset_handler_template: s.load_ref()?,
        })
    }
}

// ---------------------------------------------------------------------------
// BalanceManager
// ---------------------------------------------------------------------------

/// A deployed balance manager: its address, code and current data cell.
///
/// The address is fixed at deployment; later storage changes do not move
/// the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceManager {
    address: Address,
    code: Cell,
    data: Cell,
}

impl BalanceManager {
    /// Deploys a manager with the given configuration on the basechain.
    ///
    /// The address is a pure function of `code` and `storage`.
    pub fn deploy(storage: &BalanceManagerStorage, code: Cell) -> Result<Self, CellError> {
        let data = storage.to_cell()?;
        let address = contract_address(BASECHAIN, &StateInit::new(code.clone(), data.clone()))?;
        debug!(%address, owner = %storage.owner, "balance manager deployed");
        Ok(Self {
            address,
            code,
            data,
        })
    }

    /// Restores a manager from persisted state.
    pub fn from_state(address: Address, code: Cell, data: Cell) -> Self {
        Self {
            address,
            code,
            data,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn code(&self) -> &Cell {
        &self.code
    }

    /// The current data cell.
    pub fn data(&self) -> &Cell {
        &self.data
    }

    /// `get_storage_data`: the stored configuration, verbatim. Read-only.
    pub fn get_storage_data(&self) -> Result<BalanceManagerStorage, ExitCode> {
        Ok(BalanceManagerStorage::from_cell(&self.data)?)
    }

    /// The manager's holder account for the stored delegate asset.
    pub fn holder_address(&self) -> Result<Address, ExitCode> {
        let storage = self.get_storage_data()?;
        Ok(derive_holder_address(
            &self.address,
            &storage.asset_issuer,
            &storage.asset_handler_template,
        )?)
    }

    /// Processes one inbound internal message.
    ///
    /// `balance` is the account's native balance with the inbound value
    /// already credited. On success the storage is committed and the
    /// requested sends are returned; on failure nothing changes.
    pub fn handle_internal(
        &mut self,
        msg: &InboundMessage,
        balance: u128,
    ) -> Result<Vec<OutboundMessage>, ExitCode> {
        if msg.bounced {
            debug!(sender = %msg.sender, "ignoring bounced message");
            return Ok(Vec::new());
        }
        if msg.body.is_empty() {
            debug!(sender = %msg.sender, value = msg.value, "top-up accepted");
            return Ok(Vec::new());
        }

        let mut storage = self.get_storage_data()?;
        let result = self.process(&mut storage, msg, balance);
        match result {
            Ok(outbound) => {
                self.data = storage.to_cell()?;
                debug!(
                    sender = %msg.sender,
                    outbound = outbound.len(),
                    "request processed"
                );
                Ok(outbound)
            }
            Err(code) => {
                warn!(sender = %msg.sender, exit_code = code.code(), "request rejected: {}", code);
                Err(code)
            }
        }
    }

    fn process(
        &self,
        storage: &mut BalanceManagerStorage,
        msg: &InboundMessage,
        balance: u128,
    ) -> Result<Vec<OutboundMessage>, ExitCode> {
        if msg.sender != storage.owner {
            return Err(ExitCode::UnauthorizedOwnerRequest);
        }

        let request = InboundRequest::from_cell(&msg.body)?;
        debug!(op = request.name(), query_id = request.query_id(), "request decoded");

        if request
            .address_arguments()
            .iter()
            .any(|addr| addr.workchain() != BASECHAIN)
        {
            return Err(ExitCode::WrongWorkchain);
        }

        let outbound = match request {
            InboundRequest::WithdrawDelegatedAsset {
                query_id,
                amount,
                destination,
            } => vec![self.withdraw_asset(
                msg,
                &storage.asset_issuer,
                &storage.asset_handler_template,
                query_id,
                amount,
                destination,
                0,
            )?],
            InboundRequest::WithdrawDelegatedAssetWithFee {
                query_id,
                amount,
                destination,
                forward_ton_amount,
            } => vec![self.withdraw_asset(
                msg,
                &storage.asset_issuer,
                &storage.asset_handler_template,
                query_id,
                amount,
                destination,
                forward_ton_amount,
            )?],
            InboundRequest::WithdrawNamedAsset {
                query_id,
                amount,
                destination,
                issuer,
                template,
            } => vec![self.withdraw_asset(
                msg,
                &issuer,
                &template,
                query_id,
                amount,
                destination,
                0,
            )?],
            InboundRequest::WithdrawNamedAssetWithFee {
                query_id,
                amount,
                destination,
                issuer,
                forward_ton_amount,
                template,
            } => vec![self.withdraw_asset(
                msg,
                &issuer,
                &template,
                query_id,
                amount,
                destination,
                forward_ton_amount,
            )?],
            InboundRequest::WithdrawNativeCurrency {
                query_id,
                amount,
                destination,
            } => {
                require_value(msg, ACK_FEE)?;
                if amount > balance {
                    return Err(ExitCode::NotEnoughBalance);
                }
                vec![OutboundMessage {
                    destination,
                    value: amount,
                    mode: SendMode::PAY_FEES_SEPARATELY,
                    bounce: false,
                    state_init: None,
                    body: excess_body(query_id)?,
                }]
            }
            InboundRequest::ChangeOwner {
                query_id,
                new_owner,
            } => {
                require_value(msg, ACK_FEE)?;
                storage.owner = new_owner;
                vec![acknowledge(msg, query_id)?]
            }
            InboundRequest::ChangeDelegateAsset {
                query_id,
                issuer,
                template,
            } => {
                require_value(msg, ACK_FEE)?;
                storage.asset_issuer = issuer;
                storage.asset_handler_template = template;
                vec![acknowledge(msg, query_id)?]
            }
        };

        Ok(outbound)
    }

    /// Asks the manager's holder account for `(issuer, template)` to send
    /// `amount` to `destination`, returning leftovers to the caller.
    #[allow(clippy::too_many_arguments)]
    fn withdraw_asset(
        &self,
        msg: &InboundMessage,
        issuer: &Address,
        template: &Cell,
        query_id: u64,
        amount: u128,
        destination: Address,
        forward_ton_amount: u128,
    ) -> Result<OutboundMessage, ExitCode> {
        require_value(msg, JETTON_TRANSFER_FEE.saturating_add(forward_ton_amount))?;

        let holder = derive_holder_address(&self.address, issuer, template)?;
        let body = JettonTransfer {
            query_id,
            amount,
            destination,
            response_destination: Some(msg.sender),
            custom_payload: None,
            forward_ton_amount,
            forward_payload: None,
        }
        .to_cell()?;

        Ok(OutboundMessage {
            destination: holder,
            value: 0,
            mode: SendMode::CARRY_REMAINING_VALUE,
            bounce: true,
            state_init: None,
            body,
        })
    }
}

fn require_value(msg: &InboundMessage, required: u128) -> Result<(), ExitCode> {
    if msg.value < required {
        return Err(ExitCode::NotEnoughTon);
    }
    Ok(())
}

/// `excess` back to the caller, carrying whatever is left of the inbound value.
fn acknowledge(msg: &InboundMessage, query_id: u64) -> Result<OutboundMessage, ExitCode> {
    Ok(OutboundMessage {
        destination: msg.sender,
        value: 0,
        mode: SendMode::CARRY_REMAINING_VALUE,
        bounce: false,
        state_init: None,
        body: excess_body(query_id)?,
    })
}
