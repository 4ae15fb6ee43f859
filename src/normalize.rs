//! Axis normalization.
//!
//! Pure functions from backend-native integers to floats:
//! - stick axes (X, Y, RZ) map into `[-1.0, 1.0]`
//! - the throttle maps into `[0.0, 1.0]`, optionally reversed
//!
//! Inputs outside the configured [`AxisRange`] are clamped. A degenerate range
//! (`min == max`) yields `0.0` rather than dividing by zero.

use crate::device::SampleShape;
use crate::event::AxisValues;
use crate::sample::RawDeviceSample;
use serde::{Deserialize, Serialize};

/// Inclusive raw domain of an axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    /// `0..=65535`, the WinMM / widened HID domain.
    pub const UNSIGNED_16: AxisRange = AxisRange { min: 0, max: 65_535 };
    /// `-32768..=32767`, common for signed HID axes.
    pub const SIGNED_16: AxisRange = AxisRange {
        min: -32_768,
        max: 32_767,
    };

    #[inline]
    pub fn is_degenerate(self) -> bool {
        self.max <= self.min
    }

    /// Position of `raw` inside the range as `0.0..=1.0`.
    pub fn unit(self, raw: i32) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        let lo = self.min as f64;
        let hi = self.max as f64;
        ((raw as f64 - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Mirror `raw` across the range (`min ↔ max`), saturating to `i32`.
    pub fn reverse(self, raw: i32) -> i32 {
        let mirrored = self.min as i64 + self.max as i64 - raw as i64;
        mirrored.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        AxisRange::UNSIGNED_16
    }
}

/// Which raw field carries the throttle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleSource {
    #[default]
    Z,
    Slider,
}

impl ThrottleSource {
    #[inline]
    pub fn read(self, sample: &RawDeviceSample) -> i32 {
        match self {
            ThrottleSource::Z => sample.z,
            ThrottleSource::Slider => sample.slider,
        }
    }
}

/// Map a stick axis into `[-1.0, 1.0]`.
#[inline]
pub fn normalize_bipolar(raw: i32, range: AxisRange) -> f64 {
    if range.is_degenerate() {
        return 0.0;
    }
    (range.unit(raw) * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Map a throttle into `[0.0, 1.0]`. With `reversed`, raw max maps to `0.0`.
#[inline]
pub fn normalize_throttle(raw: i32, range: AxisRange, reversed: bool) -> f64 {
    if range.is_degenerate() {
        return 0.0;
    }
    let t = range.unit(raw);
    if reversed {
        1.0 - t
    } else {
        t
    }
}

/// Per-listener axis transform.
///
/// Built from the listener configuration on every cycle, so changes to the
/// normalization flag or throttle polarity apply from the next poll on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalizer {
    pub range: AxisRange,
    pub throttle_reversed: bool,
    pub throttle_source: ThrottleSource,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            range: AxisRange::default(),
            throttle_reversed: true,
            throttle_source: ThrottleSource::Z,
        }
    }
}

impl Normalizer {
    /// Raw passthrough. Only the throttle polarity is applied.
    pub fn raw(&self, sample: &RawDeviceSample, shape: SampleShape) -> AxisValues {
        let throttle = self.throttle_source.read(sample);
        AxisValues::Raw {
            x: sample.x,
            y: sample.y,
            z: if self.throttle_reversed {
                self.range.reverse(throttle)
            } else {
                throttle
            },
            rz: shape.rz.then_some(sample.rz),
        }
    }

    pub fn normalized(&self, sample: &RawDeviceSample, shape: SampleShape) -> AxisValues {
        let throttle = self.throttle_source.read(sample);
        AxisValues::Normalized {
            x: normalize_bipolar(sample.x, self.range),
            y: normalize_bipolar(sample.y, self.range),
            z: normalize_throttle(throttle, self.range, self.throttle_reversed),
            rz: shape
                .rz
                .then(|| normalize_bipolar(sample.rz, self.range)),
        }
    }

    #[inline]
    pub fn apply(&self, sample: &RawDeviceSample, shape: SampleShape, normalize: bool) -> AxisValues {
        if normalize {
            self.normalized(sample, shape)
        } else {
            self.raw(sample, shape)
        }
    }
}
