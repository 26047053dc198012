//! Backoff helpers for per-account contention retries.

use std::time::Duration;

use rand::Rng;

/// Jittered sleep before retrying an account that hit write contention:
/// `base_delay + n * base_delay` for a random `n` in `0..=jitter_steps`.
///
/// With the defaults (1s base, 9 steps) this spreads retries over 1–10
/// seconds so parallel workers contending on the same hot rows do not
/// retry in lockstep. Tests pass a zero base delay.
pub fn contention_backoff(base_delay: Duration, jitter_steps: u32) -> Duration {
    let n = rand::thread_rng().gen_range(0..=jitter_steps);
    base_delay + base_delay * n
}
