//! Bounded condition-polling for reboot wait loops
//!
//! The bootstrap state machine repeatedly asks "is the host offline yet?" /
//! "is it back online?" until a deadline. Every wait here is bounded; no
//! unbounded blocking is permitted anywhere in the core.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Configuration for a bounded poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Give up once this much time has elapsed
    pub deadline: Duration,
    /// Base pause between probes
    pub interval: Duration,
    /// Apply +-20% random jitter to the interval. Prevents thundering herd
    /// when a fleet orchestrator polls many rebooting targets at once.
    pub jitter: bool,
}

impl PollConfig {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            deadline,
            interval,
            jitter: true,
        }
    }
}

/// Poll an async condition until it returns true or the deadline elapses.
///
/// Returns `true` if the condition was observed before the deadline. The
/// condition is always probed at least once. The loop suspends on plain
/// `sleep` awaits, so a caller's own timeout/cancellation can interrupt it.
pub async fn poll_until<F, Fut>(config: PollConfig, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();

    loop {
        if condition().await {
            return true;
        }

        if started.elapsed() >= config.deadline {
            return false;
        }

        let pause = if config.jitter {
            jittered(config.interval)
        } else {
            config.interval
        };
        // Never sleep past the deadline
        let remaining = config.deadline.saturating_sub(started.elapsed());
        sleep(pause.min(remaining)).await;
    }
}

/// Apply +-20% random jitter to an interval
fn jittered(interval: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(0.8..=1.2);
    Duration::from_millis((interval.as_millis() as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_until_immediate_success() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_millis(100), Duration::from_millis(10));
        let ok = poll_until(config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { true }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_until_eventual_success() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_secs(2), Duration::from_millis(5));
        let ok = poll_until(config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n >= 3 }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_deadline_elapses() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_millis(30), Duration::from_millis(10));
        let ok = poll_until(config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;

        assert!(!ok);
        // Probed at least twice: once up front, once near the deadline
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let j = jittered(base);
            assert!(j >= Duration::from_millis(800));
            assert!(j <= Duration::from_millis(1200));
        }
    }
}
