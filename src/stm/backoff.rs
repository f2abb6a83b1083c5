// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Inter-attempt delay computation. The policy is a pure function from
//! `(strategy, attempt, base, max)` to a delay; the jittered variant draws
//! from the thread-local random source so contended retries do not fight
//! over a shared generator.

use rand::{thread_rng, Rng};
use std::time::Duration;

/// Exponential growth is cut off at this shift to keep the computation in
/// range even for large attempt counts.
const MAX_SHIFT: u32 = 30;

/// Determines how the delay between two commit attempts grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Every retry waits for the base delay.
    Constant,

    /// The delay grows linearly with the attempt count, capped at the
    /// maximum delay.
    Linear,

    /// The delay doubles with every attempt, capped at the maximum delay.
    Exponential,

    /// A uniformly random delay between zero and the exponential value for
    /// the attempt. This is the default, it spreads colliding retries apart.
    ExponentialWithJitter,
}

/// Computes the delay before the next attempt.
///
/// All inputs are clamped to sane lower bounds: `base` and `max` to one
/// millisecond each. The computation is carried out in wide integers, so
/// even an `attempt` of 62 cannot overflow.
pub fn delay(strategy: Strategy, attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = clamp_ms(base);
    let max_ms = clamp_ms(max);

    let ms = match strategy {
        Strategy::Constant => base_ms,
        Strategy::Linear => base_ms.saturating_mul(u64::from(attempt) + 1).min(max_ms),
        Strategy::Exponential => exponential(base_ms, attempt, max_ms),
        Strategy::ExponentialWithJitter => {
            let cap = exponential(base_ms, attempt, max_ms);
            thread_rng().gen_range(0..=cap)
        }
    };

    Duration::from_millis(ms)
}

fn exponential(base_ms: u64, attempt: u32, max_ms: u64) -> u64 {
    let widened = u128::from(base_ms) << attempt.min(MAX_SHIFT);
    widened.min(u128::from(max_ms)) as u64
}

fn clamp_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::{delay, Strategy};
    use std::time::Duration;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_millis(2000);

    #[test]
    fn test_constant() {
        for attempt in [0, 1, 17] {
            assert_eq!(delay(Strategy::Constant, attempt, BASE, MAX), BASE);
        }
    }

    #[test]
    fn test_linear_caps_at_max() {
        assert_eq!(delay(Strategy::Linear, 0, BASE, MAX), Duration::from_millis(100));
        assert_eq!(delay(Strategy::Linear, 2, BASE, MAX), Duration::from_millis(300));
        assert_eq!(delay(Strategy::Linear, 19, BASE, MAX), MAX);
        assert_eq!(delay(Strategy::Linear, 10_000, BASE, MAX), MAX);
    }

    #[test]
    fn test_exponential_caps_at_max() {
        assert_eq!(delay(Strategy::Exponential, 0, BASE, MAX), Duration::from_millis(100));
        assert_eq!(delay(Strategy::Exponential, 1, BASE, MAX), Duration::from_millis(200));
        assert_eq!(delay(Strategy::Exponential, 4, BASE, MAX), Duration::from_millis(1600));
        assert_eq!(delay(Strategy::Exponential, 5, BASE, MAX), MAX);
    }

    #[test]
    fn test_exponential_does_not_overflow() {
        let max = Duration::from_millis(u64::MAX / 2);
        assert_eq!(delay(Strategy::Exponential, 62, BASE, max), Duration::from_millis(100u64 << 30));
        assert_eq!(delay(Strategy::Exponential, u32::MAX, BASE, MAX), MAX);
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        for attempt in 0..16 {
            let jittered = delay(Strategy::ExponentialWithJitter, attempt, BASE, MAX);
            let cap = delay(Strategy::Exponential, attempt, BASE, MAX);
            assert!(jittered <= cap);
        }
    }

    #[test]
    fn test_inputs_are_clamped() {
        let zero = Duration::from_millis(0);
        assert_eq!(delay(Strategy::Constant, 0, zero, zero), Duration::from_millis(1));
        assert_eq!(delay(Strategy::Linear, 0, zero, zero), Duration::from_millis(1));
        assert_eq!(delay(Strategy::Exponential, 3, zero, zero), Duration::from_millis(1));
    }

    #[test]
    fn test_one_millisecond_cap_is_never_exceeded() {
        let one = Duration::from_millis(1);
        for attempt in 0..64 {
            assert!(delay(Strategy::Constant, attempt, one, one) <= one);
            assert!(delay(Strategy::ExponentialWithJitter, attempt, one, one) <= one);
        }
    }
}
