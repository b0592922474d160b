//! Adaptive batch sizing for one import run.
//!
//! [`BatchRunState`] owns the size decision between batches: multiplicative
//! increase on healthy fast batches, multiplicative decrease on failures or
//! slow round trips, always clamped to the configured band. One instance per
//! run; the state is never shared across concurrent runs.

use std::time::Duration;

use spedition_core::config::BatchConfig;

/// Per-run batch size state.
///
/// Construct one per import run and feed it every batch outcome via
/// [`observe`](Self::observe); read the size for the next batch with
/// [`current_size`](Self::current_size).
#[derive(Debug)]
pub struct BatchRunState {
    config: BatchConfig,
    current: usize,
}

impl BatchRunState {
    /// Start a run at `config.initial_size`.
    ///
    /// Expects a validated config (see [`BatchConfig::validate`]).
    pub fn new(config: BatchConfig) -> Self {
        Self {
            current: config.initial_size,
            config,
        }
    }

    /// Size the next batch should have.
    pub fn current_size(&self) -> usize {
        self.current
    }

    /// Feed one batch outcome into the sizing loop.
    ///
    /// - success rate above `success_threshold` AND duration under
    ///   `fast_batch_ms`: grow by `growth_factor`.
    /// - success rate below `failure_threshold` OR duration over
    ///   `slow_batch_ms`: shrink by `shrink_factor`.
    /// - anything in between leaves the size unchanged.
    ///
    /// The result never leaves `[min_size, max_size]`.
    pub fn observe(&mut self, success_rate: f64, duration: Duration) {
        let ms = duration.as_millis() as u64;

        let next = if success_rate > self.config.success_threshold && ms < self.config.fast_batch_ms
        {
            (self.current as f64 * self.config.growth_factor) as usize
        } else if success_rate < self.config.failure_threshold || ms > self.config.slow_batch_ms {
            (self.current as f64 * self.config.shrink_factor) as usize
        } else {
            self.current
        };

        self.current = next.clamp(self.config.min_size, self.config.max_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BatchRunState {
        BatchRunState::new(BatchConfig::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_grows_on_fast_clean_batch() {
        let mut s = state();
        s.observe(1.0, ms(500));
        assert_eq!(s.current_size(), 150);
    }

    #[test]
    fn test_growth_capped_at_max() {
        let mut s = state();
        // 100 → 150 → 225 → 337 → 505 clamps to 500, then stays put.
        for _ in 0..6 {
            s.observe(1.0, ms(200));
        }
        assert_eq!(s.current_size(), 500);
    }

    #[test]
    fn test_shrinks_on_failures() {
        let mut s = state();
        s.observe(0.4, ms(200));
        assert_eq!(s.current_size(), 75);
    }

    #[test]
    fn test_shrinks_on_slow_batch_despite_clean_rows() {
        let mut s = state();
        s.observe(1.0, ms(6_000));
        assert_eq!(s.current_size(), 75);
    }

    #[test]
    fn test_holds_steady_between_thresholds() {
        let mut s = state();
        s.observe(0.8, ms(2_000));
        assert_eq!(s.current_size(), 100);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let mut s = state();
        // Exactly at the success threshold: no growth.
        s.observe(0.95, ms(500));
        assert_eq!(s.current_size(), 100);
        // Exactly at the fast bound: no growth.
        s.observe(1.0, ms(1_000));
        assert_eq!(s.current_size(), 100);
        // Exactly at the failure threshold: no shrink.
        s.observe(0.5, ms(200));
        assert_eq!(s.current_size(), 100);
        // Exactly at the slow bound: no shrink.
        s.observe(1.0, ms(5_000));
        assert_eq!(s.current_size(), 100);
    }

    #[test]
    fn test_shrink_floored_at_min() {
        let mut s = state();
        // 100 → 75 → 56 → 42 → 31 → 23 → 17 → 12 → 10, then pinned.
        for _ in 0..12 {
            s.observe(0.0, ms(200));
        }
        assert_eq!(s.current_size(), 10);
    }

    #[test]
    fn test_size_never_leaves_band() {
        let mut s = state();
        let outcomes = [
            (1.0, 100),
            (0.0, 9_000),
            (1.0, 50),
            (1.0, 50),
            (1.0, 50),
            (1.0, 50),
            (1.0, 50),
            (0.2, 7_000),
            (0.97, 999),
            (0.0, 10),
        ];
        for (rate, millis) in outcomes {
            s.observe(rate, ms(millis));
            assert!(
                (10..=500).contains(&s.current_size()),
                "size {} left the band",
                s.current_size()
            );
        }
    }
}
