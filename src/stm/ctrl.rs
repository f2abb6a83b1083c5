// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// A cloneable cancellation signal shared between the caller and the retry
/// loop. Cancelling is a one-way transition.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Observed by the engine between attempts and
    /// inside the backoff sleep.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Sleeps for `duration` in millisecond slices, waking early when `token`
/// is cancelled. Returns `false` if the sleep was cut short.
pub(crate) fn sleep_with(token: &CancellationToken, duration: Duration) -> bool {
    let slice = Duration::from_millis(1);
    let mut remaining = duration;

    while !remaining.is_zero() {
        if token.is_cancelled() {
            return false;
        }
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining -= step;
    }

    !token.is_cancelled()
}
