// SPDX-License-Identifier: GPL-3.0-only

//! Reconnect backoff schedule

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSettings {
    /// Total time a reconnect may take before the call fails
    pub window: Duration,
    /// Largest single wait between dial attempts
    pub ceiling: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            ceiling: Duration::from_secs(8),
        }
    }
}

/// Wait before dial attempt `attempt + 1`
///
/// `2^attempt` seconds, clamped to the ceiling and to what is left of the
/// window. Zero means the window is spent.
pub fn wait_time(attempt: u32, elapsed: Duration, settings: &ReconnectSettings) -> Duration {
    let exponential = Duration::from_secs(2u64.saturating_pow(attempt));
    exponential
        .min(settings.ceiling)
        .min(settings.window.saturating_sub(elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(window: u64, ceiling: u64) -> ReconnectSettings {
        ReconnectSettings {
            window: Duration::from_secs(window),
            ceiling: Duration::from_secs(ceiling),
        }
    }

    #[test]
    fn doubles_until_ceiling() {
        let s = settings(60, 8);
        let waits: Vec<u64> = (0..6)
            .map(|n| wait_time(n, Duration::ZERO, &s).as_secs())
            .collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn clamped_to_remaining_window() {
        let s = settings(10, 8);
        assert_eq!(wait_time(3, Duration::from_secs(7), &s), Duration::from_secs(3));
        assert_eq!(wait_time(3, Duration::from_secs(12), &s), Duration::ZERO);
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let s = settings(30, 8);
        assert_eq!(wait_time(200, Duration::ZERO, &s), Duration::from_secs(8));
    }

    #[test]
    fn cumulative_wait_never_exceeds_window() {
        for (window, ceiling) in [(30, 8), (3, 1), (7, 100), (1, 1)] {
            let s = settings(window, ceiling);
            let mut elapsed = Duration::ZERO;
            let mut attempt = 0;
            loop {
                let wait = wait_time(attempt, elapsed, &s);
                if wait.is_zero() {
                    break;
                }
                assert!(wait <= s.ceiling);
                elapsed += wait;
                attempt += 1;
            }
            assert!(elapsed <= s.window);
            assert_eq!(elapsed, s.window);
        }
    }
}
