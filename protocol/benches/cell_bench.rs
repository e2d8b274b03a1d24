// Cell benchmarks for the custody protocol.
//
// Covers representation hashing of growing trees, contract address
// derivation, and BoC serialization in both directions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use custody_protocol::cell::boc;
use custody_protocol::{contract_address, Address, Cell, CellBuilder, StateInit};

fn chain(depth: usize) -> Cell {
    let mut cell = Cell::empty();
    for i in 0..depth {
        let mut b = CellBuilder::new();
        b.store_uint(i as u64, 32)
            .and_then(|b| b.store_ref(cell))
            .expect("bench layout fits");
        cell = b.build().expect("bench layout fits");
    }
    cell
}

fn bench_build_and_hash(c: &mut Criterion) {
    let owner = Address::new(0, [0x11; 32]);
    let issuer = Address::new(0, [0x22; 32]);
    let template = Cell::library([0x33; 32]);

    c.bench_function("cell/build_storage", |b| {
        b.iter(|| {
            let mut builder = CellBuilder::new();
            builder
                .store_address(black_box(&owner))
                .and_then(|b| b.store_address(black_box(&issuer)))
                .and_then(|b| b.store_ref(template.clone()))
                .expect("storage layout fits");
            builder.build().expect("storage layout fits")
        });
    });
}

fn bench_contract_address(c: &mut Criterion) {
    let init = StateInit::new(Cell::library([0x44; 32]), chain(4));

    c.bench_function("cell/contract_address", |b| {
        b.iter(|| contract_address(0, black_box(&init)));
    });
}

fn bench_boc(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell/boc");

    for depth in [1usize, 16, 256] {
        let cell = chain(depth);
        let bytes = boc::to_boc(&cell);
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("serialize", depth), &cell, |b, cell| {
            b.iter(|| boc::to_boc(cell));
        });
        group.bench_with_input(BenchmarkId::new("deserialize", depth), &bytes, |b, bytes| {
            b.iter(|| boc::from_boc(bytes));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_and_hash, bench_contract_address, bench_boc);
criterion_main!(benches);
