//! Engine configuration.

use std::time::Duration;

/// Configuration for the discovery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between worker ticks.
    pub tick_interval: Duration,
    /// How long each BLE scan runs.
    pub scan_duration: Duration,
    /// Auto-shutoff debounce multiplier.
    ///
    /// The engine powers base stations off once the cumulative count of
    /// "device observed On" events exceeds `shutoff_multiplier` times the
    /// number of tracked devices. Raising this delays auto-shutoff by more
    /// monitoring ticks.
    pub shutoff_multiplier: u32,
    /// Whether `request_power_off` is honored.
    ///
    /// When false the only path to powering devices off is the automatic
    /// shutoff threshold.
    pub manual_power_off: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            scan_duration: Duration::from_secs(10),
            shutoff_multiplier: 1,
            manual_power_off: false,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with a longer shutoff debounce, for setups where
    /// transient read failures are common.
    pub fn conservative_shutoff() -> Self {
        Self {
            shutoff_multiplier: 3,
            ..Self::default()
        }
    }

    /// Enable the manual power-off command.
    pub fn with_manual_power_off(mut self) -> Self {
        self.manual_power_off = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.scan_duration, Duration::from_secs(10));
        assert_eq!(config.shutoff_multiplier, 1);
        assert!(!config.manual_power_off);
    }

    #[test]
    fn test_conservative_shutoff() {
        let config = EngineConfig::conservative_shutoff();
        assert_eq!(config.shutoff_multiplier, 3);
    }

    #[test]
    fn test_with_manual_power_off() {
        assert!(EngineConfig::new().with_manual_power_off().manual_power_off);
    }
}
