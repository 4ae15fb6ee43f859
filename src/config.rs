//! Listener configuration.
//!
//! Everything that was a process-wide constant in older joystick listeners (throttle
//! polarity, throttle-on-slider, logging silence) is per-instance configuration here.
//! Configs load from TOML; every field is optional and falls back to [`Default`].
//!
//! ```toml
//! poll_interval_ms = 20
//! normalize = true
//! throttle_reversed = false
//! throttle_source = "slider"
//! axis_threshold = 16
//!
//! [axis_range]
//! min = 0
//! max = 65535
//!
//! [silent]
//! axis = false
//! ```

use crate::error::ConfigError;
use crate::logger::SilentMode;
use crate::normalize::{AxisRange, Normalizer, ThrottleSource};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime configuration of a `JoystickListener`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Sleep between poll cycles.
    pub poll_interval_ms: u64,
    /// Sleep between re-acquisition attempts after the device was lost.
    pub reacquire_interval_ms: u64,
    /// Emit normalized floats instead of raw integers.
    pub normalize: bool,
    /// Throttle forward reads as a low raw value on most sticks; this flips it.
    pub throttle_reversed: bool,
    pub throttle_source: ThrottleSource,
    /// Axis moves of at most this many raw units do not count as a change.
    pub axis_threshold: u32,
    /// Raw domain shared by all axes.
    pub axis_range: AxisRange,
    pub silent: SilentMode,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            reacquire_interval_ms: 50,
            normalize: false,
            throttle_reversed: true,
            throttle_source: ThrottleSource::Z,
            axis_threshold: 0,
            axis_range: AxisRange::UNSIGNED_16,
            silent: SilentMode::SILENT,
        }
    }
}

impl ListenerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ListenerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.reacquire_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reacquire_interval_ms must be > 0".into(),
            ));
        }
        if self.axis_range.is_degenerate() {
            return Err(ConfigError::Invalid(format!(
                "axis_range min ({}) must be below max ({})",
                self.axis_range.min, self.axis_range.max
            )));
        }
        Ok(())
    }

    /// Sleep between cycles. At least 1 ms, even for configs that skipped `validate`.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[inline]
    pub fn reacquire_interval(&self) -> Duration {
        Duration::from_millis(self.reacquire_interval_ms.max(1))
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer {
            range: self.axis_range,
            throttle_reversed: self.throttle_reversed,
            throttle_source: self.throttle_source,
        }
    }
}
