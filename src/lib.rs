//! Background joystick polling with edge-triggered button events, held-button
//! notifications and change-gated axis/POV events.
//!
//! The entry point is [`JoystickListener`], generic over a [`HardwareBackend`]. Backends
//! live in [`backends`]: a scriptable virtual device for tests, a HID report reader, and
//! the Windows multimedia joystick API.

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod backends;
pub mod calibration;
pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod listener;
pub mod logger;
pub mod normalize;
pub mod pov;
pub mod sample;

pub use config::ListenerConfig;
pub use device::{DeviceInfo, HardwareBackend, SampleShape};
pub use error::{BackendError, ConfigError, ListenerError};
pub use event::*;
pub use eventbus::HandlerId;
pub use listener::{JoystickListener, ListenerState, StopHandle};
pub use logger::{EventSink, JsonSink, LineSink, LogRecord, SilentMode, TracingSink};
pub use normalize::{AxisRange, ThrottleSource};
pub use pov::PovDirection;
pub use sample::{ButtonSet, RawDeviceSample};

/// Lock a mutex, recovering the data if a handler panicked while it was held.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
