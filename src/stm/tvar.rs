// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use crate::stm::version::{is_reserved, VersionedLock};
use arc_swap::ArcSwap;
use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Process-wide sequence for cell ids. The ids impose the total order in
/// which commits reserve their write sets.
static TVAR_IDS: AtomicU64 = AtomicU64::new(0);

/// Spin rounds grow exponentially up to this exponent, afterwards the
/// waiting thread yields to the scheduler.
const MAX_SPIN_EXP: u32 = 7;

fn spin_politely(spins: &mut u32) {
    if *spins <= MAX_SPIN_EXP {
        for _ in 0..(1u32 << *spins) {
            std::hint::spin_loop();
        }
        *spins += 1;
    } else {
        std::thread::yield_now();
    }
}

/// A transactional variable: a shared memory cell guarded by a
/// [`VersionedLock`].
///
/// Cloning a [`TVar`] shares the cell, it does not copy the value. All
/// transactions that touch the cell observe the same version word; the
/// cell itself never fails, a rejected reservation is a signal handled by
/// the commit protocol.
#[derive(Debug)]
pub struct TVar<T>
where
    T: Clone + Debug,
{
    inner: Arc<TVarInner<T>>,
}

#[derive(Debug)]
struct TVarInner<T>
where
    T: Clone + Debug,
{
    value: ArcSwap<T>,
    lock: VersionedLock,
    id: u64,
}

impl<T> TVar<T>
where
    T: Clone + Debug,
{
    /// Creates a new cell holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(TVarInner {
                value: ArcSwap::from_pointee(value),
                lock: VersionedLock::new(0),
                id: TVAR_IDS.fetch_add(1, Ordering::Relaxed),
            }),
        }
    }

    /// Returns a consistent `(value, version)` pair.
    ///
    /// The version is re-read after the value; the pair is returned only if
    /// both reads observed the same even version, otherwise a concurrent
    /// committer was active and the read is retried after a polite spin.
    /// The loop is bounded by the number of concurrent commits hitting this
    /// cell and never takes a mutex.
    pub fn snapshot(&self) -> (T, u64) {
        let mut spins = 0;
        loop {
            let before = self.inner.lock.version();
            if is_reserved(before) {
                spin_politely(&mut spins);
                continue;
            }

            let value = self.inner.value.load_full();

            let after = self.inner.lock.version();
            if before == after {
                return ((*value).clone(), before);
            }

            spin_politely(&mut spins);
        }
    }

    /// Returns the current version of the cell.
    pub fn version(&self) -> u64 {
        self.inner.lock.version()
    }

    /// The process-unique id of the cell.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Reads the current committed value without a transaction.
    pub fn read_direct(&self) -> T {
        self.snapshot().0
    }

    /// Writes a value without a transaction, following the same reserve and
    /// publish protocol as a commit. The version is never left odd.
    ///
    /// A direct write is safe with respect to the cell invariants but
    /// bypasses transactional serializability: it can force an in-flight
    /// transaction that observed this cell to abort and retry.
    pub fn write_direct(&self, value: T) {
        let mut spins = 0;
        loop {
            let current = self.inner.lock.version();
            if !is_reserved(current) && self.inner.lock.try_reserve(current) {
                self.publish(value);
                return;
            }
            spin_politely(&mut spins);
        }
    }

    pub(crate) fn try_reserve(&self, expected: u64) -> bool {
        self.inner.lock.try_reserve(expected)
    }

    /// Installs `value` and releases the reservation held by the caller.
    /// The value store is ordered before the version increment, so any
    /// reader observing the new even version also observes the new value.
    pub(crate) fn publish(&self, value: T) {
        self.inner.value.store(Arc::new(value));
        self.inner.lock.release();
    }

    /// Releases a reservation held by the caller without changing the value.
    pub(crate) fn abort_release(&self) {
        self.inner.lock.release();
    }
}

impl<T> Clone for TVar<T>
where
    T: Clone + Debug,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Hash for TVar<T>
where
    T: Clone + Debug,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Cell identity is the address of the shared allocation, never the
        // stored value. Two distinct cells holding equal values must not
        // collide in a transaction's bookkeeping.
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl<T> PartialEq for TVar<T>
where
    T: Clone + Debug,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for TVar<T> where T: Clone + Debug {}
