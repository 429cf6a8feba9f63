use std::time::Duration;

use dew_settings::ReconnectSettings;
use rand::Rng;

/// Exponential reconnect backoff with jitter.
///
/// Delay for attempt `n` is `base * 2^n`, capped at `max`, then scaled by a
/// random factor in `1 ± jitter`.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter_factor: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.jitter_factor,
        )
    }

    /// Delay before the next attempt. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp_delay = self.base.as_millis() as f64 * 2.0_f64.powi(self.attempt.min(30) as i32);
        let capped = exp_delay.min(self.max.as_millis() as f64);
        self.attempt = self.attempt.saturating_add(1);

        let final_ms = if self.jitter_factor > 0.0 {
            let factor = rand::thread_rng().gen_range(1.0 - self.jitter_factor..=1.0 + self.jitter_factor);
            capped * factor
        } else {
            capped
        };
        Duration::from_millis(final_ms.max(1.0) as u64)
    }

    /// Start over from the base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
