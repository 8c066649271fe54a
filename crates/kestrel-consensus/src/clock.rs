//! Election and heartbeat timing.
//!
//! Raft safety does not depend on any particular timeout value, only that
//! election timeouts are randomized so split votes are rare (spec §4.2
//! defaults: `heartbeat_timeout = 1s`, `election_timeout = 1s`, both
//! jittered).

use std::time::Duration;

use rand::Rng;

/// Election timeouts are drawn uniformly from `[base, base * 2)` so
/// simultaneous candidacies across a cluster are unlikely to repeat
/// round after round.
pub fn jittered_election_timeout(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(1.0..2.0);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Heartbeats are sent on a fixed cadence; only elections are jittered.
pub fn heartbeat_interval(base: Duration) -> Duration {
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_timeout_stays_within_one_to_two_times_base() {
        let base = Duration::from_millis(100);
        for _ in 0..100 {
            let t = jittered_election_timeout(base);
            assert!(t >= base);
            assert!(t < base * 2);
        }
    }
}
