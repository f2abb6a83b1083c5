// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Conflict and retry counters, scoped per element type. The counters are
//! a debugging aid, never a correctness input; they are bumped with relaxed
//! atomics and only ever decrease through [`reset`].

use lazy_static::lazy_static;
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

/// The counter pair recorded for one element type.
#[derive(Debug, Default)]
pub struct TxStats {
    conflicts: AtomicU64,
    retries: AtomicU64,
}

impl TxStats {
    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.conflicts.store(0, Ordering::SeqCst);
        self.retries.store(0, Ordering::SeqCst);
    }
}

lazy_static! {
    // The registry lock only guards the lookup; the engine resolves the
    // counter handle once per transaction and bumps it lock-free.
    static ref REGISTRY: RwLock<HashMap<TypeId, Arc<TxStats>>> = RwLock::new(HashMap::new());
}

/// Returns the counter handle for element type `T`, registering it on
/// first use.
pub(crate) fn for_type<T: 'static>() -> Arc<TxStats> {
    let key = TypeId::of::<T>();

    {
        let registry = REGISTRY.read().expect("stats registry poisoned");
        if let Some(stats) = registry.get(&key) {
            return stats.clone();
        }
    }

    let mut registry = REGISTRY.write().expect("stats registry poisoned");
    registry.entry(key).or_default().clone()
}

/// Number of commit conflicts recorded for cells of type `T`.
pub fn conflicts<T: 'static>() -> u64 {
    for_type::<T>().conflicts()
}

/// Number of attempt retries recorded for cells of type `T`.
pub fn retries<T: 'static>() -> u64 {
    for_type::<T>().retries()
}

/// Resets both counters for type `T` to zero.
pub fn reset<T: 'static>() {
    for_type::<T>().reset();
}
