// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Software Transactional Memory (STM)
//!
//! This module implements an optimistic STM over versioned cells. Every
//! [`TVar`] pairs its value with a seqlock-style version word whose parity
//! encodes reservation (even = free, odd = reserved by one committer). A
//! transaction runs speculatively against per-cell snapshots and commits in
//! three phases: reserve the write set in ascending cell id order,
//! revalidate the read set against the frozen snapshot versions, publish.
//! The ordered reservation is the sole deadlock defence; a failed phase
//! releases everything and the engine retries under the configured backoff
//! policy until success, cancellation or attempt exhaustion.

pub mod backoff;
pub mod ctrl;
pub mod error;
pub mod stats;
#[allow(clippy::module_inception)]
pub mod stm;
pub mod transaction;
pub mod tvar;
pub mod version;

pub use backoff::Strategy;
pub use ctrl::CancellationToken;
pub use error::TxError;
pub use stm::{Stm, TxConfig, TxResult};
pub use transaction::{Transaction, TxMode};
pub use tvar::TVar;
pub use version::VersionedLock;
