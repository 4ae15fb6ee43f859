//! Error types.
//!
//! Only `init()`, `start()` and configuration loading return errors to the caller.
//! Everything that goes wrong on the polling thread is absorbed there and logged.

use thiserror::Error;

/// Failures reported by a [`HardwareBackend`](crate::device::HardwareBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("device not found")]
    NotFound,

    #[error("failed to acquire device: {0}")]
    Acquisition(String),

    /// One poll failed; the next one may succeed.
    #[error("poll failed: {0}")]
    Transient(String),

    /// Access was revoked (unplugged, focus lost, ...). The device must be re-acquired.
    #[error("device lost: {0}")]
    DeviceLost(String),

    #[cfg(feature = "hid")]
    #[error("hidapi: {0}")]
    Hid(#[from] hidapi::HidError),
}

impl BackendError {
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, BackendError::DeviceLost(_))
    }
}

/// Errors returned by the listener's control API.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("joystick initialization failed: {0}")]
    Acquisition(#[source] BackendError),

    #[error("listener is not initialized")]
    NotInitialized,

    #[error("listener is running")]
    AlreadyRunning,

    /// `start()` was called from the polling thread of a run that is still winding down.
    #[error("previous polling thread has not exited yet")]
    Stopping,

    #[error("failed to spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors from loading a [`ListenerConfig`](crate::config::ListenerConfig) or a report layout.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
