// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Optimistic Software Transactional Memory
//!
//! Shared memory cells ([`TVar`]) are read and written inside atomic
//! transactions with serializable isolation and without runtime mutexes.
//! A transaction body is a closure over a transactional context; the
//! engine runs it optimistically, detects conflicts against concurrent
//! commits at commit time and retries under a configurable backoff policy.
//!
//! Because the body is re-run from scratch on every retry it must be
//! idempotent with respect to its own external side effects. Writes to
//! cells are buffered in the context and only published on commit.
//!
//! ```
//! use seqstm::{atomically, TVar};
//!
//! let cell = TVar::new(0usize);
//!
//! let var = cell.clone();
//! atomically(move |tx| {
//!     let value = tx.read(&var)?;
//!     tx.write(&var, value + 10)
//! })
//! .expect("transaction failed");
//!
//! assert_eq!(cell.read_direct(), 10);
//! ```

pub mod stm;

pub use crate::stm::stats;
pub use crate::stm::{
    backoff::Strategy,
    ctrl::CancellationToken,
    error::TxError,
    stm::{Stm, TxConfig, TxResult},
    transaction::{Transaction, TxMode},
    tvar::TVar,
};

use std::fmt::Debug;

/// Runs `body` as a read-write transaction on an engine with default
/// configuration and returns the body's result.
pub fn atomically<T, F, U>(body: F) -> Result<U, TxError>
where
    F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
    T: Clone + Send + Sync + Debug + 'static,
{
    Stm::default().read_write(body).map(|tx_result| tx_result.res)
}

/// Runs `body` as a read-only transaction on an engine with default
/// configuration. Any write inside the body fails with
/// [`TxError::ReadOnlyViolation`].
pub fn atomically_read_only<T, F, U>(body: F) -> Result<U, TxError>
where
    F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
    T: Clone + Send + Sync + Debug + 'static,
{
    Stm::default().read_only(body).map(|tx_result| tx_result.res)
}
