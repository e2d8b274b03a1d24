//! In-memory ledger used by the integration tests.
//!
//! Routes messages between plain wallets, one balance manager, one issuer
//! and the holder accounts the issuer deploys. Holder accounts follow the
//! standard jetton wallet behaviour closely enough to observe the manager's
//! effects: balances move, notifications and excesses are delivered, and
//! failed transfers bounce.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use custody_contracts::jetton::{
    self, derive_holder_address, InternalTransfer, JettonTransfer, Mint, TransferNotification,
};
use custody_contracts::{BalanceManager, BalanceManagerStorage, ExitCode};
use custody_protocol::{Address, Cell, CellError, InboundMessage, OutboundMessage, SendMode};

pub const TON: u128 = 1_000_000_000;

/// A message in flight.
#[derive(Debug, Clone)]
struct Envelope {
    from: Address,
    to: Address,
    value: u128,
    bounce: bool,
    bounced: bool,
    body: Cell,
}

/// One delivered message and how the receiver handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub op: Option<u32>,
    pub bounced: bool,
    /// `None` on success.
    pub exit_code: Option<u32>,
}

impl Delivery {
    pub fn success(&self) -> bool {
        self.exit_code.is_none()
    }
}

/// Everything that happened as a consequence of one external send.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub deliveries: Vec<Delivery>,
}

impl Trace {
    /// The first delivery from `from` to `to`, if any.
    pub fn find(&self, from: Address, to: Address) -> Option<&Delivery> {
        self.deliveries.iter().find(|d| d.from == from && d.to == to)
    }

    pub fn to(&self, to: Address) -> Vec<&Delivery> {
        self.deliveries.iter().filter(|d| d.to == to).collect()
    }

    pub fn with_op(&self, op: u32) -> Vec<&Delivery> {
        self.deliveries.iter().filter(|d| d.op == Some(op)).collect()
    }
}

#[derive(Debug, Clone)]
struct Holder {
    owner: Address,
    jettons: u128,
}

pub struct Ledger {
    pub manager: BalanceManager,
    pub issuer: Address,
    pub issuer_admin: Address,
    pub template: Cell,
    native: HashMap<Address, u128>,
    holders: HashMap<Address, Holder>,
    /// Every message ever delivered, oldest first.
    pub history: Vec<Delivery>,
}

impl Ledger {
    /// A ledger with a manager owned by `owner` whose delegate asset is
    /// issued by a fresh issuer.
    pub fn new(owner: Address) -> Self {
        let issuer = wallet(0xA0);
        let template = Cell::library([0x8f; 32]);
        let storage = BalanceManagerStorage::new(owner, issuer, template.clone());
        let manager = BalanceManager::deploy(&storage, Cell::library([0xbb; 32]))
            .expect("manager storage fits");
        Self {
            manager,
            issuer,
            issuer_admin: wallet(0xA1),
            template,
            native: HashMap::new(),
            holders: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn manager_address(&self) -> Address {
        self.manager.address()
    }

    pub fn native_balance(&self, account: Address) -> u128 {
        self.native.get(&account).copied().unwrap_or(0)
    }

    pub fn set_native_balance(&mut self, account: Address, amount: u128) {
        self.native.insert(account, amount);
    }

    /// Holder account of `owner` for the ledger's issuer.
    pub fn holder_of(&self, owner: Address) -> Address {
        derive_holder_address(&owner, &self.issuer, &self.template).expect("holder data fits")
    }

    /// Jetton balance of `owner`'s holder account, zero if never deployed.
    pub fn jetton_balance(&self, owner: Address) -> u128 {
        self.holders
            .get(&self.holder_of(owner))
            .map(|h| h.jettons)
            .unwrap_or(0)
    }

    /// Mints `amount` to `to` through the issuer.
    pub fn mint(&mut self, to: Address, amount: u128) -> Trace {
        let body = Mint {
            query_id: 0,
            to,
            amount,
            forward_ton_amount: 0,
            total_ton_amount: TON / 20,
        }
        .to_cell()
        .expect("mint body fits");
        let (admin, issuer) = (self.issuer_admin, self.issuer);
        self.send(admin, issuer, TON / 10, body)
    }

    /// Sends a bounceable message from an external wallet and runs the
    /// ledger until no messages remain in flight.
    pub fn send(&mut self, from: Address, to: Address, value: u128, body: Cell) -> Trace {
        let mut queue = VecDeque::from([Envelope {
            from,
            to,
            value,
            bounce: true,
            bounced: false,
            body,
        }]);
        let mut trace = Trace::default();

        while let Some(env) = queue.pop_front() {
            *self.native.entry(env.to).or_default() += env.value;

            let result = if env.to == self.manager.address() {
                self.deliver_to_manager(&env)
            } else if env.to == self.issuer {
                self.deliver_to_issuer(&env)
            } else if self.holders.contains_key(&env.to) {
                self.deliver_to_holder(&env)
            } else {
                Ok(Vec::new())
            };

            let exit_code = match result {
                Ok(outbound) => {
                    for out in outbound {
                        queue.push_back(out);
                    }
                    None
                }
                Err(code) => {
                    if env.bounce && !env.bounced {
                        self.debit(env.to, env.value);
                        queue.push_back(Envelope {
                            from: env.to,
                            to: env.from,
                            value: env.value,
                            bounce: false,
                            bounced: true,
                            body: env.body.clone(),
                        });
                    }
                    Some(code)
                }
            };

            let delivery = Delivery {
                from: env.from,
                to: env.to,
                value: env.value,
                op: op_of(&env.body),
                bounced: env.bounced,
                exit_code,
            };
            trace.deliveries.push(delivery.clone());
            self.history.push(delivery);
        }

        trace
    }

    fn debit(&mut self, account: Address, amount: u128) {
        let balance = self.native.entry(account).or_default();
        *balance = balance.saturating_sub(amount);
    }

    fn deliver_to_manager(&mut self, env: &Envelope) -> Result<Vec<Envelope>, u32> {
        let msg = InboundMessage {
            sender: env.from,
            value: env.value,
            bounced: env.bounced,
            body: env.body.clone(),
        };
        let address = self.manager.address();
        let balance = self.native_balance(address);
        let outbound = self
            .manager
            .handle_internal(&msg, balance)
            .map_err(ExitCode::code)?;

        let mut sends = Vec::new();
        for out in outbound {
            let value = settle(&out, env.value);
            self.debit(address, value);
            sends.push(outgoing(address, &out, value));
        }
        Ok(sends)
    }

    fn deliver_to_issuer(&mut self, env: &Envelope) -> Result<Vec<Envelope>, u32> {
        if env.bounced {
            return Ok(Vec::new());
        }
        if env.from != self.issuer_admin {
            return Err(73);
        }
        let mint = Mint::from_cell(&env.body).map_err(|e| ExitCode::from(e).code())?;
        let holder = self.holder_of(mint.to);
        self.holders.entry(holder).or_insert(Holder {
            owner: mint.to,
            jettons: 0,
        });

        let body = InternalTransfer {
            query_id: mint.query_id,
            amount: mint.amount,
            from: self.issuer,
            response_address: Some(self.issuer_admin),
            forward_ton_amount: mint.forward_ton_amount,
            forward_payload: None,
        }
        .to_cell()
        .map_err(|e| ExitCode::from(e).code())?;
        self.debit(self.issuer, mint.total_ton_amount);
        Ok(vec![Envelope {
            from: self.issuer,
            to: holder,
            value: mint.total_ton_amount,
            bounce: true,
            bounced: false,
            body,
        }])
    }

    fn deliver_to_holder(&mut self, env: &Envelope) -> Result<Vec<Envelope>, u32> {
        let cell_err = |e: CellError| ExitCode::from(e).code();
        match op_of(&env.body) {
            Some(jetton::op::TRANSFER) if !env.bounced => {
                let transfer = JettonTransfer::from_cell(&env.body).map_err(cell_err)?;
                let holder = self.holders.get_mut(&env.to).ok_or(709u32)?;
                if env.from != holder.owner {
                    return Err(705);
                }
                if transfer.amount > holder.jettons {
                    return Err(706);
                }
                holder.jettons -= transfer.amount;
                let sender_owner = holder.owner;

                let target =
                    derive_holder_address(&transfer.destination, &self.issuer, &self.template)
                        .map_err(cell_err)?;
                // Deployed on arrival of the internal transfer.
                self.holders.entry(target).or_insert(Holder {
                    owner: transfer.destination,
                    jettons: 0,
                });
                let body = InternalTransfer {
                    query_id: transfer.query_id,
                    amount: transfer.amount,
                    from: sender_owner,
                    response_address: transfer.response_destination,
                    forward_ton_amount: transfer.forward_ton_amount,
                    forward_payload: transfer.forward_payload,
                }
                .to_cell()
                .map_err(cell_err)?;
                self.debit(env.to, env.value);
                Ok(vec![Envelope {
                    from: env.to,
                    to: target,
                    value: env.value,
                    bounce: true,
                    bounced: false,
                    body,
                }])
            }
            Some(jetton::op::INTERNAL_TRANSFER) if !env.bounced => {
                let transfer = InternalTransfer::from_cell(&env.body).map_err(cell_err)?;
                let holder = self.holders.get_mut(&env.to).ok_or(709u32)?;
                holder.jettons += transfer.amount;
                let owner = holder.owner;

                let mut sends = Vec::new();
                let mut remaining = env.value;
                if transfer.forward_ton_amount > 0 {
                    let body = TransferNotification {
                        query_id: transfer.query_id,
                        amount: transfer.amount,
                        sender: transfer.from,
                        forward_payload: transfer.forward_payload.clone(),
                    }
                    .to_cell()
                    .map_err(cell_err)?;
                    remaining = remaining.saturating_sub(transfer.forward_ton_amount);
                    sends.push(Envelope {
                        from: env.to,
                        to: owner,
                        value: transfer.forward_ton_amount,
                        bounce: false,
                        bounced: false,
                        body,
                    });
                }
                if let Some(response) = transfer.response_address {
                    let body = jetton::excesses_body(transfer.query_id).map_err(cell_err)?;
                    sends.push(Envelope {
                        from: env.to,
                        to: response,
                        value: remaining,
                        bounce: false,
                        bounced: false,
                        body,
                    });
                }
                let spent: u128 = sends.iter().map(|s| s.value).sum();
                self.debit(env.to, spent);
                Ok(sends)
            }
            Some(jetton::op::INTERNAL_TRANSFER) => {
                // A failed internal transfer returns the tokens to the sender.
                if let Ok(transfer) = InternalTransfer::from_cell(&env.body) {
                    if let Some(holder) = self.holders.get_mut(&env.to) {
                        holder.jettons += transfer.amount;
                    }
                }
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Value actually attached to an outbound send.
fn settle(out: &OutboundMessage, inbound_value: u128) -> u128 {
    if out.mode.contains(SendMode::CARRY_REMAINING_VALUE) {
        out.value + inbound_value
    } else {
        out.value
    }
}

fn outgoing(from: Address, out: &OutboundMessage, value: u128) -> Envelope {
    Envelope {
        from,
        to: out.destination,
        value,
        bounce: out.bounce,
        bounced: false,
        body: out.body.clone(),
    }
}

fn op_of(body: &Cell) -> Option<u32> {
    let mut s = body.parse();
    s.load_uint(32).ok().map(|op| op as u32)
}

/// A basechain wallet address with a recognizable hash.
pub fn wallet(tag: u8) -> Address {
    Address::new(0, [tag; 32])
}
