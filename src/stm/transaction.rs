// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use crate::stm::{error::TxError, stats::TxStats, tvar::TVar, version::is_reserved};
use log::*;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// Selects whether a transaction may buffer writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    ReadWrite,
    ReadOnly,
}

/// The outcome of one commit try. Conflicts are handled by the engine's
/// retry loop and never surface to the caller.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CommitOutcome {
    Committed,
    Conflict,
}

/// The per-attempt transactional context.
///
/// All bookkeeping is keyed by cell identity. The snapshot version of a
/// cell is captured on its first observation, read or write, and never
/// refreshed within the attempt: the attempt either commits against its
/// original view of the world or aborts.
pub struct Transaction<T>
where
    T: Clone + Debug,
{
    /// Transaction id, assigned by the engine
    pub id: usize,

    mode: TxMode,

    /// Values observed this attempt, including the transaction's own
    /// buffered writes
    reads: HashMap<TVar<T>, T>,

    /// Buffered pending writes, applied only on a successful commit
    writes: HashMap<TVar<T>, T>,

    /// First version seen per observed cell, frozen for this attempt
    snapshots: HashMap<TVar<T>, u64>,

    stats: Arc<TxStats>,
}

impl<T> Transaction<T>
where
    T: Clone + Debug,
{
    pub(crate) fn new(mode: TxMode, id: usize, stats: Arc<TxStats>) -> Self {
        Self {
            id,
            mode,
            reads: HashMap::new(),
            writes: HashMap::new(),
            snapshots: HashMap::new(),
            stats,
        }
    }

    /// Loads the value of `tvar` as observed by this transaction.
    ///
    /// A value buffered by an earlier [`write`](Self::write) wins over the
    /// committed state of the cell; an earlier read is served from the
    /// cache. Only the first observation of a cell takes a snapshot.
    pub fn read(&mut self, tvar: &TVar<T>) -> Result<T, TxError> {
        if let Some(value) = self.writes.get(tvar) {
            return Ok(value.clone());
        }
        if let Some(value) = self.reads.get(tvar) {
            return Ok(value.clone());
        }

        let (value, version) = tvar.snapshot();
        self.snapshots.entry(tvar.clone()).or_insert(version);
        self.reads.insert(tvar.clone(), value.clone());

        Ok(value)
    }

    /// Buffers `value` as the pending write for `tvar`.
    ///
    /// Subsequent reads of the cell within this transaction return the
    /// buffered value. Nothing is published before commit.
    pub fn write(&mut self, tvar: &TVar<T>, value: T) -> Result<(), TxError> {
        if self.mode == TxMode::ReadOnly {
            return Err(TxError::ReadOnlyViolation);
        }

        if !self.snapshots.contains_key(tvar) {
            // only the version is needed; the observed value is dead, the
            // buffered write wins for this transaction's reads
            let (_, version) = tvar.snapshot();
            self.snapshots.insert(tvar.clone(), version);
        }

        self.reads.insert(tvar.clone(), value.clone());
        self.writes.insert(tvar.clone(), value);

        Ok(())
    }

    /// Reads `tvar`, applies `func` and buffers the result.
    pub fn apply<F>(&mut self, tvar: &TVar<T>, func: F) -> Result<(), TxError>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.read(tvar)?;
        self.write(tvar, func(value))
    }

    /// Tries to commit the attempt: reserve the write set in id order,
    /// revalidate the read set, publish.
    pub(crate) fn commit(&self) -> CommitOutcome {
        if self.mode == TxMode::ReadOnly || self.writes.is_empty() {
            // nothing to publish; the snapshot versions must still hold
            for (tvar, &version) in &self.snapshots {
                if tvar.version() != version {
                    info!("TX({}): READ VALIDATION FAILED", self.id);
                    self.stats.record_conflict();
                    return CommitOutcome::Conflict;
                }
            }
            return CommitOutcome::Committed;
        }

        // every buffered write must carry a snapshot to validate against
        if self.writes.keys().any(|tvar| !self.snapshots.contains_key(tvar)) {
            self.stats.record_conflict();
            return CommitOutcome::Conflict;
        }

        // Reservations are taken in ascending cell id order. Two committers
        // with overlapping write sets meet on the first contested cell and
        // one of them aborts promptly instead of circular-waiting.
        let mut write_set: Vec<(TVar<T>, T)> =
            self.writes.iter().map(|(tvar, value)| (tvar.clone(), value.clone())).collect();
        write_set.sort_by_key(|(tvar, _)| tvar.id());

        let mut reserved: Vec<TVar<T>> = Vec::with_capacity(write_set.len());
        for (tvar, _) in &write_set {
            let expected = self.snapshots[tvar];
            if !tvar.try_reserve(expected) {
                info!("TX({}): RESERVING WRITE SET FAILED", self.id);
                release_reservations(&reserved);
                self.stats.record_conflict();
                return CommitOutcome::Conflict;
            }
            reserved.push(tvar.clone());
        }

        // the cells that were only read must be unchanged and free
        for (tvar, &version) in &self.snapshots {
            if self.writes.contains_key(tvar) {
                continue;
            }
            let current = tvar.version();
            if current != version || is_reserved(current) {
                info!("TX({}): VALIDATING READ SET FAILED", self.id);
                release_reservations(&reserved);
                self.stats.record_conflict();
                return CommitOutcome::Conflict;
            }
        }

        // publish in acquisition order
        for (tvar, value) in write_set {
            tvar.publish(value);
        }

        CommitOutcome::Committed
    }
}

/// Releases reservations in reverse acquisition order without publishing.
fn release_reservations<T>(reserved: &[TVar<T>])
where
    T: Clone + Debug,
{
    for tvar in reserved.iter().rev() {
        tvar.abort_release();
    }
}
