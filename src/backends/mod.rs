//! Hardware backends for [`JoystickListener`](crate::listener::JoystickListener).
//!
//! Implementations of [`HardwareBackend`](crate::device::HardwareBackend):
//!
//! - [`virtual_input`]: scriptable in-memory device (always available; used by tests).
//! - [`hid`]: raw HID reports decoded with a declarative layout (feature **`hid`**).
//! - [`windows`]: the WinMM multimedia joystick API (Windows only).

pub mod virtual_input;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;
