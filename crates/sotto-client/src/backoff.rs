//! Reconnect delay schedule.

use std::time::Duration;

/// Fibonacci delay sequence in seconds, capped at the last entry.
const FIB_DELAYS_SECS: [u64; 8] = [1, 1, 2, 3, 5, 8, 13, 21];

/// Delay to wait after the given failed attempt (0-based).
pub fn delay(attempt: usize) -> Duration {
    let index = attempt.min(FIB_DELAYS_SECS.len() - 1);
    Duration::from_secs(FIB_DELAYS_SECS[index])
}
