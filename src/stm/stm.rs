// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use crate::stm::{
    backoff::{self, Strategy},
    ctrl::{self, CancellationToken},
    error::TxError,
    stats,
    transaction::{CommitOutcome, Transaction, TxMode},
};
use log::*;
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Tuning knobs of the retry loop.
#[derive(Clone, Debug)]
pub struct TxConfig {
    /// Upper bound on commit attempts before the transaction fails with
    /// [`TxError::Timeout`]. Clamped to at least 1.
    pub max_attempts: usize,

    /// Base of the backoff computation.
    pub base_delay: Duration,

    /// Cap on any single backoff interval.
    pub max_delay: Duration,

    /// Backoff curve between attempts.
    pub strategy: Strategy,

    /// Default mode used by [`Stm::atomic`].
    pub mode: TxMode,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            strategy: Strategy::ExponentialWithJitter,
            mode: TxMode::ReadWrite,
        }
    }
}

/// The result of a successfully committed transaction.
#[derive(Debug)]
pub struct TxResult<U> {
    /// Id of the transaction that succeeded
    pub tx_id: usize,

    /// Return value of the transaction body
    pub res: U,
}

/// The transaction engine: builds a fresh context per attempt, runs the
/// body, tries to commit and retries under the configured backoff policy.
///
/// The body is re-run from scratch on every retry, so it must be
/// idempotent with respect to its own external side effects; writes to
/// cells are rolled back for free because they live in the context's
/// buffer until commit.
#[derive(Clone, Default)]
pub struct Stm {
    config: TxConfig,
    cancellation: CancellationToken,
    transaction_ids: Arc<AtomicUsize>,
}

impl Stm {
    pub fn new(config: TxConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Creates an engine whose retry loop observes `cancellation` between
    /// attempts and inside the backoff sleep.
    pub fn with_cancellation(config: TxConfig, cancellation: CancellationToken) -> Self {
        Self {
            config,
            cancellation,
            transaction_ids: Arc::default(),
        }
    }

    pub fn config(&self) -> &TxConfig {
        &self.config
    }

    fn next_tx_id(&self) -> usize {
        self.transaction_ids.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Runs `body` in the mode selected by the configuration.
    pub fn atomic<T, F, U>(&self, body: F) -> Result<TxResult<U>, TxError>
    where
        F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
        T: Clone + Send + Sync + Debug + 'static,
    {
        self.run_with_mode(self.config.mode, body)
    }

    /// Runs `body` as a read-write transaction.
    pub fn read_write<T, F, U>(&self, body: F) -> Result<TxResult<U>, TxError>
    where
        F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
        T: Clone + Send + Sync + Debug + 'static,
    {
        self.run_with_mode(TxMode::ReadWrite, body)
    }

    /// Runs `body` as a read-only transaction. Any write inside the body
    /// fails with [`TxError::ReadOnlyViolation`].
    pub fn read_only<T, F, U>(&self, body: F) -> Result<TxResult<U>, TxError>
    where
        F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
        T: Clone + Send + Sync + Debug + 'static,
    {
        self.run_with_mode(TxMode::ReadOnly, body)
    }

    fn run_with_mode<T, F, U>(&self, mode: TxMode, body: F) -> Result<TxResult<U>, TxError>
    where
        F: Fn(&mut Transaction<T>) -> Result<U, TxError>,
        T: Clone + Send + Sync + Debug + 'static,
    {
        let tx_id = self.next_tx_id();
        let tx_stats = stats::for_type::<T>();
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        while attempt < max_attempts {
            if self.cancellation.is_cancelled() {
                info!("TX({}): CANCELLED BEFORE ATTEMPT {}", tx_id, attempt);
                return Err(TxError::Cancelled);
            }

            let mut tx = Transaction::new(mode, tx_id, tx_stats.clone());

            info!("TX({}): START ATTEMPT {}", tx_id, attempt);
            // body errors are the caller's, they propagate unchanged and
            // the buffered writes of this attempt are discarded
            let res = body(&mut tx)?;

            match tx.commit() {
                CommitOutcome::Committed => {
                    info!("TX({}): COMMITTED ON ATTEMPT {}", tx_id, attempt);
                    return Ok(TxResult { tx_id, res });
                }
                CommitOutcome::Conflict => {
                    info!("TX({}): CONFLICT ON ATTEMPT {}", tx_id, attempt);
                }
            }

            attempt += 1;
            tx_stats.record_retry();

            if attempt < max_attempts {
                let wait = backoff::delay(
                    self.config.strategy,
                    attempt as u32,
                    self.config.base_delay,
                    self.config.max_delay,
                );
                if !ctrl::sleep_with(&self.cancellation, wait) {
                    info!("TX({}): CANCELLED DURING BACKOFF", tx_id);
                    return Err(TxError::Cancelled);
                }
            }
        }

        info!("TX({}): TIMEOUT AFTER {} ATTEMPTS", tx_id, max_attempts);
        Err(TxError::Timeout(max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::{Stm, TxConfig};
    use crate::stm::{
        backoff::Strategy,
        ctrl::CancellationToken,
        error::TxError,
        transaction::Transaction,
        tvar::TVar,
    };
    use std::time::Duration;

    fn fast_config(max_attempts: usize) -> TxConfig {
        TxConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            strategy: Strategy::Constant,
            ..TxConfig::default()
        }
    }

    #[test]
    fn test_timeout_under_forced_conflict() {
        let stm = Stm::new(fast_config(2));
        let var = TVar::new(0usize);

        let observed = var.clone();
        let result = stm.read_write(move |tx: &mut Transaction<usize>| {
            let value = tx.read(&observed)?;
            // the cell moves on after the snapshot, every commit conflicts
            observed.write_direct(value + 100);
            tx.write(&observed, value + 1)
        });

        assert_eq!(result.unwrap_err(), TxError::Timeout(2));
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let stm = Stm::with_cancellation(fast_config(8), token);

        let var = TVar::new(0usize);
        let observed = var.clone();
        let result = stm.read_write(move |tx: &mut Transaction<usize>| tx.read(&observed));

        assert_eq!(result.unwrap_err(), TxError::Cancelled);
        assert_eq!(var.read_direct(), 0);
    }

    #[test]
    fn test_body_error_is_not_retried() {
        let stm = Stm::new(fast_config(8));
        let var = TVar::new(0usize);

        let observed = var.clone();
        let result: Result<_, TxError> = stm.read_write(move |tx: &mut Transaction<usize>| -> Result<(), TxError> {
            tx.write(&observed, 1)?;
            Err(TxError::Failed("boom".into()))
        });

        assert_eq!(result.unwrap_err(), TxError::Failed("boom".into()));
        // the buffered write of the failed attempt was never published
        assert_eq!(var.read_direct(), 0);
        assert_eq!(var.version(), 0);
    }

    #[test]
    fn test_transaction_ids_are_monotonic() {
        let stm = Stm::default();
        let var = TVar::new(0usize);

        let first = {
            let observed = var.clone();
            stm.read_write(move |tx: &mut Transaction<usize>| tx.read(&observed))
                .expect("transaction failed")
        };
        let second = {
            let observed = var.clone();
            stm.read_write(move |tx: &mut Transaction<usize>| tx.read(&observed))
                .expect("transaction failed")
        };

        assert!(second.tx_id > first.tx_id);
    }
}
