//! Hardware backend abstraction.
//!
//! A [`HardwareBackend`] knows how to gain access to one physical (or simulated) device
//! and how to read a [`RawDeviceSample`] from it. The listener is generic over this trait,
//! so the diff/dispatch logic exists once regardless of which OS API produced the sample.
//!
//! Backends are driven from two threads: the control thread (`init`, `calibrate`) and the
//! polling thread. The listener serializes those calls behind a mutex, so implementations
//! only need to be `Send`.

use crate::error::BackendError;
use crate::sample::{RawDeviceSample, MAX_BUTTONS};
use std::fmt;

/// Which parts of a [`RawDeviceSample`] a device actually reports.
///
/// X, Y, Z and the POV are always tracked. `rz` and `slider` are opt-in because the simple
/// polled APIs leave them at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleShape {
    pub rz: bool,
    pub slider: bool,
    /// Number of button slots the device reports (`<= 128`).
    pub buttons: u8,
}

impl SampleShape {
    /// X/Y/Z + POV, 32 buttons (WinMM-style devices).
    pub const THREE_AXIS: SampleShape = SampleShape {
        rz: false,
        slider: false,
        buttons: 32,
    };

    /// X/Y/Z/RZ + slider + POV, 128 buttons.
    pub const FULL: SampleShape = SampleShape {
        rz: true,
        slider: true,
        buttons: MAX_BUTTONS as u8,
    };

    #[inline]
    pub fn button_count(self) -> usize {
        (self.buttons as usize).min(MAX_BUTTONS)
    }
}

impl Default for SampleShape {
    fn default() -> Self {
        SampleShape::FULL
    }
}

/// Best-effort description of the acquired device, for logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// OS path; opaque and not stable across reconnects.
    pub path: Option<String>,
}

impl DeviceInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let (Some(vid), Some(pid)) = (self.vendor_id, self.product_id) {
            write!(f, " [{vid:04x}:{pid:04x}]")?;
        }
        Ok(())
    }
}

/// Capability to acquire and poll one device.
pub trait HardwareBackend: Send + 'static {
    /// Live access token returned by [`acquire`](Self::acquire).
    type Handle: Send + 'static;

    fn info(&self) -> DeviceInfo;

    fn shape(&self) -> SampleShape;

    /// Open / negotiate access to the device.
    ///
    /// Called by `init()` and again by the polling thread after
    /// [`BackendError::DeviceLost`].
    fn acquire(&mut self) -> Result<Self::Handle, BackendError>;

    /// Read the current device state.
    ///
    /// Return [`BackendError::Transient`] for a one-off failure (the cycle is skipped) and
    /// [`BackendError::DeviceLost`] when access was revoked (the listener re-acquires).
    fn poll(&mut self, handle: &mut Self::Handle) -> Result<RawDeviceSample, BackendError>;
}

/// A backend plus its current handle, if acquired.
pub(crate) struct DeviceSlot<B: HardwareBackend> {
    backend: B,
    handle: Option<B::Handle>,
}

impl<B: HardwareBackend> DeviceSlot<B> {
    pub(crate) fn new(backend: B) -> Self {
        Self {
            backend,
            handle: None,
        }
    }

    /// Acquire a fresh handle, replacing any previous one.
    pub(crate) fn acquire(&mut self) -> Result<(), BackendError> {
        self.handle = None;
        let handle = self.backend.acquire()?;
        self.handle = Some(handle);
        Ok(())
    }

    pub(crate) fn poll(&mut self) -> Result<RawDeviceSample, BackendError> {
        match self.handle.as_mut() {
            Some(handle) => self.backend.poll(handle),
            None => Err(BackendError::DeviceLost("device not acquired".into())),
        }
    }

    /// Drop the handle so the next poll forces re-acquisition.
    pub(crate) fn release(&mut self) {
        self.handle = None;
    }

    pub(crate) fn info(&self) -> DeviceInfo {
        self.backend.info()
    }

    pub(crate) fn shape(&self) -> SampleShape {
        self.backend.shape()
    }
}
