//! Raw device samples.
//!
//! A [`RawDeviceSample`] is one poll's worth of device state, exactly as the backend
//! reported it: integer axes, the POV angle and a 128-slot button bitmap. Samples are
//! `Copy` and never mutated after capture; the next poll simply supersedes them.
//!
//! ## Value conventions
//! - **Axes:** backend-native integers. WinMM and the HID backend both report `0..=65535`.
//! - **POV:** hundredths of a degree (`0..=35999`), or [`POV_CENTERED`] when the hat is
//!   released. Some backends report the signed form `-1`, which arrives here as `u32::MAX`.
//! - **Buttons:** 0-indexed bit slots. Events expose them 1-indexed.

use serde::{Deserialize, Serialize};

/// Number of button slots tracked per device.
pub const MAX_BUTTONS: usize = 128;

/// "No direction" POV encoding used by WinMM (`JOY_POVCENTERED`).
pub const POV_CENTERED: u32 = 0xFFFF;

/// Fixed-size button bitmap. Bit `i` is button `i + 1` in public events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonSet(u128);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    #[inline]
    pub const fn from_bits(bits: u128) -> Self {
        ButtonSet(bits)
    }

    #[inline]
    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Build a set from 0-indexed button slots. Indices `>= 128` are ignored.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        indices
            .into_iter()
            .fold(ButtonSet::EMPTY, |set, idx| set.with(idx, true))
    }

    #[inline]
    pub fn is_pressed(self, index: usize) -> bool {
        index < MAX_BUTTONS && self.0 & (1u128 << index) != 0
    }

    /// Return a copy with slot `index` set to `pressed`.
    #[must_use]
    pub fn with(self, index: usize, pressed: bool) -> Self {
        if index >= MAX_BUTTONS {
            return self;
        }
        let mask = 1u128 << index;
        if pressed {
            ButtonSet(self.0 | mask)
        } else {
            ButtonSet(self.0 & !mask)
        }
    }

    /// Slots whose state differs between `self` and `other`.
    #[inline]
    pub fn changed(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 ^ other.0)
    }

    /// Keep only the lowest `count` slots.
    #[inline]
    pub fn masked(self, count: usize) -> ButtonSet {
        if count >= MAX_BUTTONS {
            self
        } else {
            ButtonSet(self.0 & ((1u128 << count) - 1))
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate set slots in ascending order (0-indexed).
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let idx = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(idx)
        })
    }
}

/// One poll of a device.
///
/// Devices with fewer axes leave the unused fields at `0`; which fields are meaningful is
/// described by the backend's [`SampleShape`](crate::device::SampleShape).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeviceSample {
    pub x: i32,
    pub y: i32,
    /// Z axis. On most sticks this is the throttle.
    pub z: i32,
    /// Rudder / twist.
    pub rz: i32,
    /// First slider. Some throttles report here instead of on Z.
    pub slider: i32,
    /// Hundredths of a degree, or a centered sentinel.
    pub pov: u32,
    pub buttons: ButtonSet,
}

impl Default for RawDeviceSample {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            rz: 0,
            slider: 0,
            pov: POV_CENTERED,
            buttons: ButtonSet::EMPTY,
        }
    }
}

impl RawDeviceSample {
    #[must_use]
    pub fn with_axes(mut self, x: i32, y: i32, z: i32) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    #[must_use]
    pub fn with_rz(mut self, rz: i32) -> Self {
        self.rz = rz;
        self
    }

    #[must_use]
    pub fn with_slider(mut self, slider: i32) -> Self {
        self.slider = slider;
        self
    }

    #[must_use]
    pub fn with_pov(mut self, pov: u32) -> Self {
        self.pov = pov;
        self
    }

    /// Set a 0-indexed button slot.
    #[must_use]
    pub fn with_button(mut self, index: usize, pressed: bool) -> Self {
        self.buttons = self.buttons.with(index, pressed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_yields_ascending_slots() {
        let set = ButtonSet::from_indices([127, 9, 2, 64]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 9, 64, 127]);
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let set = ButtonSet::EMPTY.with(128, true).with(500, true);
        assert!(set.is_empty());
        assert!(!set.is_pressed(128));
    }

    #[test]
    fn changed_reports_symmetric_difference() {
        let a = ButtonSet::from_indices([0, 4]);
        let b = ButtonSet::from_indices([4, 7]);
        assert_eq!(a.changed(b).iter().collect::<Vec<_>>(), vec![0, 7]);
    }

    #[test]
    fn masked_keeps_low_slots() {
        let set = ButtonSet::from_indices([1, 31, 32, 100]);
        assert_eq!(set.masked(32).iter().collect::<Vec<_>>(), vec![1, 31]);
        assert_eq!(set.masked(MAX_BUTTONS), set);
    }

    #[test]
    fn default_sample_has_centered_pov() {
        let s = RawDeviceSample::default();
        assert_eq!(s.pov, POV_CENTERED);
        assert!(s.buttons.is_empty());
    }
}
