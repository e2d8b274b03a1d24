//! # Manager Requests
//!
//! Every request body starts with `op:uint32 query_id:uint64`. The opcode
//! set is closed; [`InboundRequest`] has exactly one variant per opcode and
//! is decoded once, at the boundary, before dispatch.
//!
//! | Opcode | Body after `op query_id` |
//! |---|---|
//! | `withdraw#b5de5f9e` | `amount:Coins destination:MsgAddressInt` |
//! | `withdraw_with_fwd_fee#48082420` | `amount:Coins destination:MsgAddressInt forward_ton_amount:Coins` |
//! | `withdraw_ton#37726bdb` | `amount:Coins destination:MsgAddressInt` |
//! | `withdraw_jetton#11c09682` | `amount:Coins destination:MsgAddressInt jetton_master:MsgAddressInt ^jetton_wallet_code` |
//! | `withdraw_jetton_with_fwd_fee#49a47fdc` | `amount:Coins destination:MsgAddressInt jetton_master:MsgAddressInt forward_ton_amount:Coins ^jetton_wallet_code` |
//! | `change_owner#93b05b31` | `new_owner:MsgAddressInt` |
//! | `change_jetton#be845442` | `new_jetton_master:MsgAddressInt ^new_jetton_wallet_code` |

use custody_protocol::{Address, Cell, CellBuilder, CellError};
use serde::{Deserialize, Serialize};

use crate::error::ExitCode;

/// Manager opcodes.
pub mod op {
    pub const WITHDRAW: u32 = 0xb5de_5f9e;
    pub const WITHDRAW_WITH_FWD_FEE: u32 = 0x4808_2420;
    pub const WITHDRAW_TON: u32 = 0x3772_6bdb;
    pub const WITHDRAW_JETTON: u32 = 0x11c0_9682;
    pub const WITHDRAW_JETTON_WITH_FWD_FEE: u32 = 0x49a4_7fdc;
    pub const CHANGE_OWNER: u32 = 0x93b0_5b31;
    pub const CHANGE_JETTON: u32 = 0xbe84_5442;
    /// Acknowledgement; never accepted inbound.
    pub const EXCESS: u32 = 0x8ac8_cfd1;
}

/// A decoded manager request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundRequest {
    /// Send tokens of the stored delegate asset.
    WithdrawDelegatedAsset {
        query_id: u64,
        amount: u128,
        destination: Address,
    },
    /// Same, forwarding `forward_ton_amount` to the destination with the
    /// transfer notification.
    WithdrawDelegatedAssetWithFee {
        query_id: u64,
        amount: u128,
        destination: Address,
        forward_ton_amount: u128,
    },
    /// Send native currency from the manager's own balance.
    WithdrawNativeCurrency {
        query_id: u64,
        amount: u128,
        destination: Address,
    },
    /// Send tokens of an asset other than the stored delegate.
    WithdrawNamedAsset {
        query_id: u64,
        amount: u128,
        destination: Address,
        issuer: Address,
        template: Cell,
    },
    WithdrawNamedAssetWithFee {
        query_id: u64,
        amount: u128,
        destination: Address,
        issuer: Address,
        forward_ton_amount: u128,
        template: Cell,
    },
    ChangeOwner {
        query_id: u64,
        new_owner: Address,
    },
    /// Replace the stored delegate asset.
    ChangeDelegateAsset {
        query_id: u64,
        issuer: Address,
        template: Cell,
    },
}

impl InboundRequest {
    /// The opcode this request is encoded under.
    pub fn op(&self) -> u32 {
        match self {
            InboundRequest::WithdrawDelegatedAsset { .. } => op::WITHDRAW,
            InboundRequest::WithdrawDelegatedAssetWithFee { .. } => op::WITHDRAW_WITH_FWD_FEE,
            InboundRequest::WithdrawNativeCurrency { .. } => op::WITHDRAW_TON,
            InboundRequest::WithdrawNamedAsset { .. } => op::WITHDRAW_JETTON,
            InboundRequest::WithdrawNamedAssetWithFee { .. } => op::WITHDRAW_JETTON_WITH_FWD_FEE,
            InboundRequest::ChangeOwner { .. } => op::CHANGE_OWNER,
            InboundRequest::ChangeDelegateAsset { .. } => op::CHANGE_JETTON,
        }
    }

    /// Correlation id echoed in every outbound body.
    pub fn query_id(&self) -> u64 {
        match self {
            InboundRequest::WithdrawDelegatedAsset { query_id, .. }
            | InboundRequest::WithdrawDelegatedAssetWithFee { query_id, .. }
            | InboundRequest::WithdrawNativeCurrency { query_id, .. }
            | InboundRequest::WithdrawNamedAsset { query_id, .. }
            | InboundRequest::WithdrawNamedAssetWithFee { query_id, .. }
            | InboundRequest::ChangeOwner { query_id, .. }
            | InboundRequest::ChangeDelegateAsset { query_id, .. } => *query_id,
        }
    }

    /// Short name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            InboundRequest::WithdrawDelegatedAsset { .. } => "withdraw",
            InboundRequest::WithdrawDelegatedAssetWithFee { .. } => "withdraw_with_fwd_fee",
            InboundRequest::WithdrawNativeCurrency { .. } => "withdraw_ton",
            InboundRequest::WithdrawNamedAsset { .. } => "withdraw_jetton",
            InboundRequest::WithdrawNamedAssetWithFee { .. } => "withdraw_jetton_with_fwd_fee",
            InboundRequest::ChangeOwner { .. } => "change_owner",
            InboundRequest::ChangeDelegateAsset { .. } => "change_jetton",
        }
    }

    /// Every address argument that must live on the basechain.
    pub fn address_arguments(&self) -> Vec<&Address> {
        match self {
            InboundRequest::WithdrawDelegatedAsset { destination, .. }
            | InboundRequest::WithdrawDelegatedAssetWithFee { destination, .. }
            | InboundRequest::WithdrawNativeCurrency { destination, .. } => vec![destination],
            InboundRequest::WithdrawNamedAsset {
                destination, issuer, ..
            }
            | InboundRequest::WithdrawNamedAssetWithFee {
                destination, issuer, ..
            } => vec![destination, issuer],
            InboundRequest::ChangeOwner { new_owner, .. } => vec![new_owner],
            InboundRequest::ChangeDelegateAsset { issuer, .. } => vec![issuer],
        }
    }

    /// Encodes the request body.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(self.op() as u64, 32)?
            .store_uint(self.query_id(), 64)?;

        match self {
            InboundRequest::WithdrawDelegatedAsset {
                amount,
                destination,
                ..
            }
            | InboundRequest::WithdrawNativeCurrency {
                amount,
                destination,
                ..
            } => {
                b.store_coins(*amount)?.store_address(destination)?;
            }
            InboundRequest::WithdrawDelegatedAssetWithFee {
                amount,
                destination,
                forward_ton_amount,
                ..
            } => {
                b.store_coins(*amount)?
                    .store_address(destination)?
                    .store_coins(*forward_ton_amount)?;
            }
            InboundRequest::WithdrawNamedAsset {
                amount,
                destination,
                issuer,
                template,
                ..
            } => {
                b.store_coins(*amount)?
                    .store_address(destination)?
                    .store_address(issuer)?
                    .store_ref(template.clone())?;
            }
            InboundRequest::WithdrawNamedAssetWithFee {
                amount,
                destination,
                issuer,
                forward_ton_amount,
                template,
                ..
            } => {
                b.store_coins(*amount)?
                    .store_address(destination)?
                    .store_address(issuer)?
                    .store_coins(*forward_ton_amount)?
                    .store_ref(template.clone())?;
            }
            InboundRequest::ChangeOwner { new_owner, .. } => {
                b.store_address(new_owner)?;
            }
            InboundRequest::ChangeDelegateAsset {
                issuer, template, ..
            } => {
                b.store_address(issuer)?.store_ref(template.clone())?;
            }
        }

        b.build()
    }

    /// Decodes a request body.
    ///
    /// Unknown opcodes fail with [`ExitCode::UnknownOp`]; truncated bodies
    /// and non-standard addresses with [`ExitCode::CellUnderflow`]. Bits
    /// past the last field are ignored.
    pub fn from_cell(body: &Cell) -> Result<Self, ExitCode> {
        let mut s = body.parse();
        let op = s.load_uint(32)? as u32;
        let query_id = s.load_uint(64)?;

        let request = match op {
            op::WITHDRAW => InboundRequest::WithdrawDelegatedAsset {
                query_id,
                amount: s.load_coins()?,
                destination: s.load_address()?,
            },
            op::WITHDRAW_WITH_FWD_FEE => InboundRequest::WithdrawDelegatedAssetWithFee {
                query_id,
                amount: s.load_coins()?,
                destination: s.load_address()?,
                forward_ton_amount: s.load_coins()?,
            },
            op::WITHDRAW_TON => InboundRequest::WithdrawNativeCurrency {
                query_id,
                amount: s.load_coins()?,
                destination: s.load_address()?,
            },
            op::WITHDRAW_JETTON => InboundRequest::WithdrawNamedAsset {
                query_id,
                amount: s.load_coins()?,
                destination: s.load_address()?,
                issuer: s.load_address()?,
                template: s.load_ref()?,
            },
            op::WITHDRAW_JETTON_WITH_FWD_FEE => InboundRequest::WithdrawNamedAssetWithFee {
                query_id,
                amount: s.load_coins()?,
                destination: s.load_address()?,
                issuer: s.load_address()?,
                forward_ton_amount: s.load_coins()?,
                template: s.load_ref()?,
            },
            op::CHANGE_OWNER => InboundRequest::ChangeOwner {
                query_id,
                new_owner: s.load_address()?,
            },
            op::CHANGE_JETTON => InboundRequest::ChangeDelegateAsset {
                query_id,
                issuer: s.load_address()?,
                template: s.load_ref()?,
            },
            _ => return Err(ExitCode::UnknownOp),
        };

        Ok(request)
    }
}

/// `excess#8ac8cfd1 query_id:uint64`, the manager's acknowledgement body.
pub fn excess_body(query_id: u64) -> Result<Cell, CellError> {
    let mut b = CellBuilder::new();
    b.store_uint(op::EXCESS as u64, 32)?
        .store_uint(query_id, 64)?;
    b.build()
}
