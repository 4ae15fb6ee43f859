#![cfg(target_os = "windows")]

//! Windows backends.
//!
//! - **WinMM**: the legacy multimedia joystick API (`joyGetPosEx`). Always available on
//!   Windows, reports X/Y/Z, 32 buttons and one POV hat, and needs no device-specific
//!   layout.

pub mod winmm;

pub use winmm::WinMmBackend;
