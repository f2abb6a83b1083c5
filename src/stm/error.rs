// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as DeriveError;

#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum TxError {
    #[error("write issued inside a read-only transaction")]
    ReadOnlyViolation,

    #[error("transaction exhausted its budget of {0} commit attempts")]
    Timeout(usize),

    #[error("transaction was cancelled")]
    Cancelled,

    #[error("transaction failed: {0}")]
    Failed(String),
}
