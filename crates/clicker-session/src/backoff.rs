use std::time::Duration;

/// Pacing for relay reconnect attempts.
///
/// Each consecutive failure doubles the wait, up to a ceiling. A successful
/// connect resets the sequence to the floor.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    floor: Duration,
    ceiling: Duration,
    factor: f64,
    current: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 2.0)
    }
}

impl ReconnectBackoff {
    pub fn new(floor: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            floor,
            ceiling,
            factor,
            current: floor,
        }
    }

    /// Delay to wait before the next attempt. Advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.ceiling);
        delay
    }

    /// Return to the floor delay.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}
