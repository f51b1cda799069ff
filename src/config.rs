//! Eviction configuration.
//!
//! A map either sweeps itself in the background ([`EvictionMode::Active`])
//! or relies purely on expiry checks during access ([`EvictionMode::Lazy`]).

use crate::error::ConfigError;
use std::time::Duration;
use tracing::warn;

/// Default time between two sweep cycles.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default fraction of the table one sweep cycle inspects.
pub const DEFAULT_DELETE_SCALE: f64 = 0.5;

/// Configuration for the background sweeper.
///
/// # Example
///
/// ```
/// use agemap::SweepConfig;
/// use std::time::Duration;
///
/// let config = SweepConfig::default()
///     .with_interval(Duration::from_millis(250))
///     .with_delete_scale(0.25);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    /// Time between sweep cycles (default: 1s)
    pub interval: Duration,

    /// Fraction of the table inspected per cycle, in `(0, 1]` (default: 0.5)
    pub delete_scale: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            delete_scale: DEFAULT_DELETE_SCALE,
        }
    }
}

impl SweepConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time between sweep cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the fraction of the table inspected per cycle.
    ///
    /// A cycle stops once it has looked at this share of the entries; every
    /// expired entry it looks at is deleted. `1.0` inspects everything.
    pub fn with_delete_scale(mut self, delete_scale: f64) -> Self {
        self.delete_scale = delete_scale;
        self
    }

    /// Checks the configuration without changing it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.delete_scale > 0.0 && self.delete_scale <= 1.0) {
            return Err(ConfigError::InvalidDeleteScale(self.delete_scale));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Replaces invalid settings with their defaults, logging each fallback.
    pub fn normalized(mut self) -> Self {
        if !(self.delete_scale > 0.0 && self.delete_scale <= 1.0) {
            warn!(
                error = %ConfigError::InvalidDeleteScale(self.delete_scale),
                fallback = DEFAULT_DELETE_SCALE,
                "Using default delete scale"
            );
            self.delete_scale = DEFAULT_DELETE_SCALE;
        }
        if self.interval.is_zero() {
            warn!(
                error = %ConfigError::ZeroInterval,
                fallback_ms = DEFAULT_SWEEP_INTERVAL.as_millis(),
                "Using default sweep interval"
            );
            self.interval = DEFAULT_SWEEP_INTERVAL;
        }
        self
    }
}

/// How a map reclaims expired entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvictionMode {
    /// Lazy eviction plus a periodic background sweep
    Active(SweepConfig),

    /// Expired entries are only removed when an access finds them
    Lazy,
}

impl Default for EvictionMode {
    fn default() -> Self {
        EvictionMode::Active(SweepConfig::default())
    }
}
