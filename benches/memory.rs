// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Transactional memory micro-benchmarks
//!
//! Test subjects:
//! - uncontended single-cell increments
//! - snapshot reads while no committer is active
//! - a small read-modify-write over multiple cells

use criterion::{criterion_group, criterion_main, Criterion};
use seqstm::{Stm, TVar, Transaction};

pub fn bnc_increment_usize(c: &mut Criterion) {
    c.bench_function("increment_usize", |b| {
        let stm = Stm::default();
        let var = TVar::new(0usize);

        b.iter(|| {
            let observed = var.clone();
            stm.read_write(move |tx: &mut Transaction<usize>| tx.apply(&observed, |value| value + 1))
                .expect("transaction failed");
        })
    });
}

pub fn bnc_snapshot_usize(c: &mut Criterion) {
    c.bench_function("snapshot_usize", |b| {
        let var = TVar::new(8usize);

        b.iter(|| var.snapshot())
    });
}

pub fn bnc_multi_cell_commit(c: &mut Criterion) {
    c.bench_function("multi_cell_commit", |b| {
        let stm = Stm::default();
        let cells: Vec<TVar<usize>> = (0..8).map(TVar::new).collect();

        b.iter(|| {
            let observed = cells.clone();
            stm.read_write(move |tx: &mut Transaction<usize>| {
                for cell in observed.iter() {
                    tx.apply(cell, |value| value + 1)?;
                }
                Ok(())
            })
            .expect("transaction failed");
        })
    });
}

criterion_group!(benches, bnc_increment_usize, bnc_snapshot_usize, bnc_multi_cell_commit);

criterion_main!(benches);
