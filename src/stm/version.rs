// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The versioned lock is a word sized spin primitive whose parity encodes
//! the reservation state: an even value means the guarded cell is free, an
//! odd value means exactly one committer has reserved it. The remaining
//! bits carry a monotonic version counter, so a reserve and the matching
//! release advance the version by two and leave it even again.

use std::sync::atomic::{AtomicU64, Ordering};

/// Returns `true` if `version` denotes a reserved cell.
pub const fn is_reserved(version: u64) -> bool {
    version & 1 == 1
}

/// A versioned lock word. Reservation is gated by a compare-and-swap on the
/// current even version, release is a single increment.
#[derive(Debug, Default)]
pub struct VersionedLock {
    atomic: AtomicU64,
}

impl VersionedLock {
    /// Creates a new [`VersionedLock`] with the desired version.
    pub fn new(version: u64) -> Self {
        Self {
            atomic: AtomicU64::new(version),
        }
    }

    /// Returns the stored version.
    pub fn version(&self) -> u64 {
        self.atomic.load(Ordering::Acquire)
    }

    /// Tries to reserve the lock at the given `expected` version.
    ///
    /// Succeeds only if `expected` is even and the stored version still
    /// equals it, in which case the caller becomes the sole reserver and
    /// the version becomes odd.
    pub fn try_reserve(&self, expected: u64) -> bool {
        if is_reserved(expected) {
            return false;
        }

        self.atomic
            .compare_exchange(expected, expected + 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases a reservation held by the caller and increments the version,
    /// odd to even. Used by both the publish and the abort path.
    pub fn release(&self) {
        self.atomic.fetch_add(1, Ordering::Release);
    }
}
