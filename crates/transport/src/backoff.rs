//! Reconnection backoff schedule
//!
//! Geometric growth from a base delay up to a ceiling, with a small
//! symmetric jitter so a fleet of clients dropped by the same outage does
//! not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

use voice_intake_config::constants::reconnect;
use voice_intake_config::ReconnectConfig;

/// Deterministic part of the schedule plus the jitter band
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    growth: f64,
    jitter_fraction: f64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            cap: Duration::from_millis(config.max_delay_ms),
            growth: reconnect::GROWTH_FACTOR,
            jitter_fraction: reconnect::JITTER_FRACTION,
            max_attempts: config.max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt number `attempt` (zero-based), or `None` once
    /// the attempt budget is spent
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let raw = self.base.as_secs_f64() * self.growth.powi(attempt as i32);
        let capped = raw.min(self.cap.as_secs_f64());

        // jitter in [-fraction/2, +fraction/2] of the delay
        let jitter = capped * self.jitter_fraction * (rng.gen::<f64>() - 0.5);
        Some(Duration::from_secs_f64((capped + jitter).max(0.0)))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(&ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn mid_rng() -> StepRng {
        // Always yields 0.5, i.e. zero jitter
        StepRng::new(u64::MAX / 2 + 1, 0)
    }

    #[test]
    fn test_geometric_growth() {
        let policy = ReconnectPolicy::default();
        let mut rng = mid_rng();

        let d0 = policy.delay_for(0, &mut rng).unwrap();
        let d1 = policy.delay_for(1, &mut rng).unwrap();
        let d2 = policy.delay_for(2, &mut rng).unwrap();

        assert!((d0.as_millis() as i64 - 3_500).abs() <= 1);
        assert!((d1.as_millis() as i64 - 5_250).abs() <= 1);
        assert!((d2.as_millis() as i64 - 7_875).abs() <= 1);
    }

    #[test]
    fn test_delay_capped() {
        let policy = ReconnectPolicy::default();
        let mut rng = mid_rng();

        // 3.5s * 1.5^20 is far past the 30s ceiling
        let d = policy.delay_for(20, &mut rng).unwrap();
        assert!((d.as_millis() as i64 - 30_000).abs() <= 1);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = ReconnectPolicy::default();
        let mut rng = rand::thread_rng();

        for attempt in 0..10 {
            let d = policy.delay_for(attempt, &mut rng).unwrap().as_secs_f64();
            let nominal = (3.5 * 1.5f64.powi(attempt as i32)).min(30.0);
            assert!(d >= nominal * 0.9 - 1e-9, "attempt {attempt}: {d} < {}", nominal * 0.9);
            assert!(d <= nominal * 1.1 + 1e-9, "attempt {attempt}: {d} > {}", nominal * 1.1);
        }
    }

    #[test]
    fn test_attempt_budget_exhausts() {
        let policy = ReconnectPolicy::default();
        let mut rng = mid_rng();

        assert!(policy.delay_for(99, &mut rng).is_some());
        assert!(policy.delay_for(100, &mut rng).is_none());
        assert!(policy.delay_for(500, &mut rng).is_none());
    }
}
