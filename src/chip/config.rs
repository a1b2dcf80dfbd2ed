use std::time::Duration;

use thiserror::Error;

/// The instruction rate used when nothing else is configured.
pub const DEFAULT_CYCLES_PER_SECOND: u32 = 500;

/// The rate at which the delay and sound timers count down.
pub const DEFAULT_TIMERS_PER_SECOND: u32 = 60;

/// Configuration of a [`Machine`](crate::chip::machine::Machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How many instruction cycles the instruction driver runs per second.
    pub cycles_per_second: u32,

    /// How many timer ticks the timer driver runs per second.
    pub timers_per_second: u32,

    /// Whether an unknown opcode halts the chip instead of being skipped.
    pub strict_opcodes: bool,
}

/// Error type for invalid configurations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroRate(&'static str),
}

impl Config {
    pub fn with_cycles_per_second(mut self, cycles_per_second: u32) -> Self {
        self.cycles_per_second = cycles_per_second;
        self
    }

    pub fn with_timers_per_second(mut self, timers_per_second: u32) -> Self {
        self.timers_per_second = timers_per_second;
        self
    }

    pub fn with_strict_opcodes(mut self, strict_opcodes: bool) -> Self {
        self.strict_opcodes = strict_opcodes;
        self
    }

    /// Checks that both rates are usable as driver frequencies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycles_per_second == 0 {
            return Err(ConfigError::ZeroRate("cycles_per_second"));
        }
        if self.timers_per_second == 0 {
            return Err(ConfigError::ZeroRate("timers_per_second"));
        }
        Ok(())
    }

    /// The time between two instruction cycles.
    ///
    /// # Panics
    /// In case `cycles_per_second` is zero. Call [`Config::validate`] first.
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(1) / self.cycles_per_second
    }

    /// The time between two timer ticks.
    ///
    /// # Panics
    /// In case `timers_per_second` is zero. Call [`Config::validate`] first.
    pub fn timer_period(&self) -> Duration {
        Duration::from_secs(1) / self.timers_per_second
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_second: DEFAULT_CYCLES_PER_SECOND,
            timers_per_second: DEFAULT_TIMERS_PER_SECOND,
            strict_opcodes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let config = Config::default();
        assert_eq!(config.cycles_per_second, 500);
        assert_eq!(config.timers_per_second, 60);
        assert!(!config.strict_opcodes);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_periods() {
        let config = Config::default().with_cycles_per_second(1000);
        assert_eq!(config.cycle_period(), Duration::from_millis(1));
        assert_eq!(config.timer_period(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn test_rejects_zero_rates() {
        assert_eq!(
            Config::default().with_cycles_per_second(0).validate(),
            Err(ConfigError::ZeroRate("cycles_per_second"))
        );
        assert_eq!(
            Config::default().with_timers_per_second(0).validate(),
            Err(ConfigError::ZeroRate("timers_per_second"))
        );
    }
}
