//! Integration tests for the ledger primitives.
//!
//! These cross module boundaries: cells built with the builder travel
//! through BoC interchange, become message payloads, derive contract
//! addresses, and are persisted and reloaded through the contract database.

use custody_protocol::cell::boc::{self, BocOptions};
use custody_protocol::{
    contract_address, Address, Cell, CellBuilder, ContractDb, ContractRecord, InboundMessage,
    OutboundMessage, SendMode, StateInit, TransactionRecord,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn payload(op: u32, query_id: u64, to: &Address) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(op as u64, 32)
        .and_then(|b| b.store_uint(query_id, 64))
        .and_then(|b| b.store_coins(1_000))
        .and_then(|b| b.store_address(to))
        .unwrap();
    b.build().unwrap()
}

fn storage_cell(owner: &Address, issuer: &Address, template: &Cell) -> Cell {
    let mut b = CellBuilder::new();
    b.store_address(owner)
        .and_then(|b| b.store_address(issuer))
        .and_then(|b| b.store_ref(template.clone()))
        .unwrap();
    b.build().unwrap()
}

// ---------------------------------------------------------------------------
// Interchange
// ---------------------------------------------------------------------------

#[test]
fn known_library_boc_decodes_and_hashes_stably() {
    let hex = "b5ee9c72010101010023000842028f452d7a4dfd74066b682365177259ed05734435be76b5fd4bd5d8af2b7c3d68";
    let cell = boc::from_hex(hex).unwrap();
    assert!(cell.is_exotic());
    assert_eq!(cell.bit_len(), 264);
    assert_eq!(boc::to_hex(&cell), hex);

    // Hash survives a second trip through a checksummed, indexed encoding.
    let bytes = boc::serialize(
        &[cell.clone()],
        BocOptions {
            with_index: true,
            with_crc: true,
        },
    );
    let back = boc::deserialize(&bytes).unwrap();
    assert_eq!(back[0].hash(), cell.hash());
}

#[test]
fn message_cell_survives_boc_interchange() {
    let dest = Address::new(0, [0x42; 32]);
    let msg = OutboundMessage {
        destination: dest,
        value: 50_000_000,
        mode: SendMode::PAY_FEES_SEPARATELY,
        bounce: true,
        state_init: None,
        body: payload(0x0f8a_7ea5, 7, &dest),
    };

    let hex = boc::to_hex(&msg.to_cell().unwrap());
    let parsed = OutboundMessage::from_cell(&boc::from_hex(&hex).unwrap()).unwrap();

    assert_eq!(parsed.destination, dest);
    assert_eq!(parsed.value, 50_000_000);
    assert!(parsed.bounce);
    assert_eq!(parsed.op(), Some(0x0f8a_7ea5));
    assert_eq!(parsed.query_id(), Some(7));
    assert_eq!(parsed.body, msg.body);
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

#[test]
fn contract_address_tracks_data_but_not_later_state() {
    let owner = Address::new(0, [1; 32]);
    let issuer = Address::new(0, [2; 32]);
    let template = Cell::library([3; 32]);
    let code = Cell::library([4; 32]);

    let data = storage_cell(&owner, &issuer, &template);
    let init = StateInit::new(code.clone(), data.clone());
    let address = contract_address(0, &init).unwrap();
    assert_eq!(address.hash(), init.to_cell().unwrap().hash());
    assert_eq!(address, init.address(0).unwrap());

    let other = storage_cell(&Address::new(0, [9; 32]), &issuer, &template);
    assert_ne!(
        contract_address(0, &StateInit::new(code.clone(), other.clone())).unwrap(),
        address
    );

    // A record keeps its deployment address even after its data moves on.
    let mut record = ContractRecord::new(address, code, data, 0);
    record.data = other;
    assert_eq!(record.address, address);
    assert_ne!(record.state_init().address(0).unwrap(), address);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn committed_transactions_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let owner = Address::new(0, [1; 32]);
    let data = storage_cell(&owner, &Address::new(0, [2; 32]), &Cell::library([3; 32]));
    let address = contract_address(0, &StateInit::new(Cell::library([4; 32]), data.clone())).unwrap();

    {
        let db = ContractDb::open(dir.path()).unwrap();
        let mut record = ContractRecord::new(address, Cell::library([4; 32]), data, 1_000);
        db.put_contract(&record).unwrap();

        for i in 0..3u64 {
            let lt = db.next_lt().unwrap();
            record.balance += 10;
            record.last_lt = lt;
            let tx = TransactionRecord {
                lt,
                account: address,
                inbound: InboundMessage::new(owner, 10, payload(0x3772_6bdb, i, &owner)),
                outbound: vec![],
                exit_code: 0,
                balance_after: record.balance,
                timestamp: chrono::Utc::now(),
            };
            db.commit(&record, &tx).unwrap();
        }
    }

    let db = ContractDb::open(dir.path()).unwrap();
    assert_eq!(db.latest_lt().unwrap(), Some(3));
    let record = db.require_contract(&address).unwrap();
    assert_eq!(record.balance, 1_030);
    assert_eq!(record.last_lt, 3);

    let recent = db.recent_transactions(2).unwrap();
    assert_eq!(recent.iter().map(|t| t.lt).collect::<Vec<_>>(), vec![3, 2]);
    assert_eq!(
        recent[0].inbound.body,
        payload(0x3772_6bdb, 2, &owner)
    );
}
