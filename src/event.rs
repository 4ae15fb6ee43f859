//! Events delivered to handlers.
//!
//! The listener turns consecutive [`RawDeviceSample`](crate::sample::RawDeviceSample)s into
//! three kinds of events:
//!
//! - [`ButtonEvent`]: **edge-triggered**. Fires once when a button changes state.
//! - [`HeldEvent`]: **level-triggered**. Fires every poll cycle for every pressed button,
//!   including the cycle in which it was pressed.
//! - [`AxisEvent`]: fires only when a tracked axis or the POV changed, and always carries
//!   the whole axis tuple.
//!
//! ## Value conventions
//! - **Button ids** are 1-indexed (`1..=128`).
//! - **Axes** are either raw backend integers or normalized floats, depending on the
//!   listener's `normalize` flag at the time of the poll (see [`AxisValues`]).
//! - **POV** is hundredths of a degree, with every "released" encoding folded to `0xFFFF`.

use crate::pov::PovDirection;
use serde::Serialize;

/// A button changed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ButtonEvent {
    /// 1-indexed button id.
    pub button_id: u8,
    pub pressed: bool,
}

/// A button is currently pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct HeldEvent {
    /// 1-indexed button id.
    pub button_id: u8,
}

/// Axis tuple carried by an [`AxisEvent`].
///
/// `rz` is `None` for devices without a rudder/twist axis. `z` is the throttle,
/// already adjusted for the listener's polarity setting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AxisValues {
    /// Backend-native integers.
    Raw {
        x: i32,
        y: i32,
        z: i32,
        rz: Option<i32>,
    },
    /// X/Y/RZ in `[-1, 1]`, Z in `[0, 1]`.
    Normalized {
        x: f64,
        y: f64,
        z: f64,
        rz: Option<f64>,
    },
}

impl AxisValues {
    #[inline]
    pub fn is_normalized(&self) -> bool {
        matches!(self, AxisValues::Normalized { .. })
    }

    pub fn x(&self) -> f64 {
        match *self {
            AxisValues::Raw { x, .. } => x as f64,
            AxisValues::Normalized { x, .. } => x,
        }
    }

    pub fn y(&self) -> f64 {
        match *self {
            AxisValues::Raw { y, .. } => y as f64,
            AxisValues::Normalized { y, .. } => y,
        }
    }

    pub fn z(&self) -> f64 {
        match *self {
            AxisValues::Raw { z, .. } => z as f64,
            AxisValues::Normalized { z, .. } => z,
        }
    }

    pub fn rz(&self) -> Option<f64> {
        match *self {
            AxisValues::Raw { rz, .. } => rz.map(|v| v as f64),
            AxisValues::Normalized { rz, .. } => rz,
        }
    }
}

/// Axes or POV moved since the previous poll.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AxisEvent {
    pub axes: AxisValues,
    /// Raw POV in hundredths of a degree (`0xFFFF` when centered).
    pub pov: u32,
    pub direction: PovDirection,
}
