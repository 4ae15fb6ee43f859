//! Previous-sample buffer and calibration baseline.
//!
//! Button edges are derived against the "previous" sample held here, which the polling
//! thread replaces after every cycle. Axis changes are measured against the last sample
//! an axis event was emitted for, so movement below the threshold still accumulates.
//! Calibration seeds both with a baseline taken at a quiescent stick position so the
//! first diff after calibration only reports real movement.
//!
//! Calibration does **not** offset later axis values. The baseline only seeds change
//! detection.

use crate::lock;
use crate::sample::RawDeviceSample;
use std::sync::Mutex;
use std::time::Instant;

/// A captured calibration sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Baseline {
    pub sample: RawDeviceSample,
    pub captured_at: Instant,
}

/// Shared "previous sample" slot.
///
/// Written by the polling thread every cycle and by `calibrate()` / `reset()` from the
/// control thread. A calibration that races an in-flight poll may be overwritten one cycle
/// later; that is acceptable.
#[derive(Debug, Default)]
pub struct SampleHistory {
    previous: Mutex<RawDeviceSample>,
    reported: Mutex<RawDeviceSample>,
    baseline: Mutex<Option<Baseline>>,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sample the next diff compares against.
    pub fn previous(&self) -> RawDeviceSample {
        *lock(&self.previous)
    }

    /// Store the sample just processed by the polling loop.
    pub fn advance(&self, current: RawDeviceSample) {
        *lock(&self.previous) = current;
    }

    /// The sample axis movement is measured against.
    pub fn reported(&self) -> RawDeviceSample {
        *lock(&self.reported)
    }

    /// Record the sample an axis event was just emitted for.
    pub fn mark_reported(&self, current: RawDeviceSample) {
        *lock(&self.reported) = current;
    }

    /// Seed "previous" and "reported" with a calibration baseline.
    pub fn calibrate(&self, sample: RawDeviceSample) -> Baseline {
        let baseline = Baseline {
            sample,
            captured_at: Instant::now(),
        };
        *lock(&self.previous) = sample;
        *lock(&self.reported) = sample;
        *lock(&self.baseline) = Some(baseline);
        baseline
    }

    /// Last calibration baseline, if any.
    pub fn baseline(&self) -> Option<Baseline> {
        *lock(&self.baseline)
    }

    /// Forget history and baseline; "previous" becomes the default sample.
    pub fn reset(&self) {
        *lock(&self.previous) = RawDeviceSample::default();
        *lock(&self.reported) = RawDeviceSample::default();
        *lock(&self.baseline) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_seeds_previous_and_records_baseline() {
        let h = SampleHistory::new();
        let s = RawDeviceSample::default().with_axes(1, 2, 3);
        h.calibrate(s);
        assert_eq!(h.previous(), s);
        assert_eq!(h.reported(), s);
        assert_eq!(h.baseline().map(|b| b.sample), Some(s));
    }

    #[test]
    fn advance_does_not_touch_baseline() {
        let h = SampleHistory::new();
        let base = RawDeviceSample::default().with_axes(1, 1, 1);
        h.calibrate(base);
        let next = base.with_axes(9, 9, 9);
        h.advance(next);
        assert_eq!(h.previous(), next);
        assert_eq!(h.baseline().map(|b| b.sample), Some(base));
    }

    #[test]
    fn reported_lags_previous_until_marked() {
        let h = SampleHistory::new();
        let start = RawDeviceSample::default().with_axes(100, 100, 100);
        h.calibrate(start);
        let step = start.with_axes(150, 100, 100);
        h.advance(step);
        assert_eq!(h.reported(), start);
        h.mark_reported(step);
        assert_eq!(h.reported(), step);
    }

    #[test]
    fn reset_restores_default() {
        let h = SampleHistory::new();
        h.calibrate(RawDeviceSample::default().with_button(3, true));
        h.reset();
        assert_eq!(h.previous(), RawDeviceSample::default());
        assert_eq!(h.reported(), RawDeviceSample::default());
        assert!(h.baseline().is_none());
    }
}
