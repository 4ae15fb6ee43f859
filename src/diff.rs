//! State diff engine.
//!
//! Compares the previous and current [`RawDeviceSample`] and derives what happened in
//! between. Buttons are scanned every cycle; axes are change-gated.
//!
//! Scans are only performed when requested (see [`ScanRequest`]): a listener with no
//! button handler never walks the button bitmap.

use crate::device::SampleShape;
use crate::event::{ButtonEvent, HeldEvent};
use crate::pov::canonical_pov;
use crate::sample::{ButtonSet, RawDeviceSample};

/// Which parts of the diff the caller needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanRequest {
    pub buttons: bool,
    pub held: bool,
    pub axes: bool,
}

impl ScanRequest {
    pub const ALL: ScanRequest = ScanRequest {
        buttons: true,
        held: true,
        axes: true,
    };

    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.buttons || self.held || self.axes)
    }
}

/// Result of comparing two samples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleDiff {
    /// Ascending by button id.
    pub transitions: Vec<ButtonEvent>,
    /// Ascending by button id.
    pub held: Vec<HeldEvent>,
    pub axes_changed: bool,
}

/// One event per button whose state differs, ascending.
pub fn button_transitions(previous: ButtonSet, current: ButtonSet) -> Vec<ButtonEvent> {
    previous
        .changed(current)
        .iter()
        .map(|idx| ButtonEvent {
            button_id: (idx + 1) as u8,
            pressed: current.is_pressed(idx),
        })
        .collect()
}

/// One event per pressed button, ascending.
pub fn held_buttons(current: ButtonSet) -> Vec<HeldEvent> {
    current
        .iter()
        .map(|idx| HeldEvent {
            button_id: (idx + 1) as u8,
        })
        .collect()
}

#[inline]
fn moved(a: i32, b: i32, threshold: u32) -> bool {
    (a as i64 - b as i64).unsigned_abs() > threshold as u64
}

/// `true` if a tracked axis moved by more than `threshold` raw units, or the POV changed.
///
/// The POV is compared exactly, after folding both centered encodings together.
pub fn axes_changed(
    previous: &RawDeviceSample,
    current: &RawDeviceSample,
    shape: SampleShape,
    threshold: u32,
) -> bool {
    moved(previous.x, current.x, threshold)
        || moved(previous.y, current.y, threshold)
        || moved(previous.z, current.z, threshold)
        || (shape.rz && moved(previous.rz, current.rz, threshold))
        || (shape.slider && moved(previous.slider, current.slider, threshold))
        || canonical_pov(previous.pov) != canonical_pov(current.pov)
}

/// Compare `current` against history, computing only the requested scans.
///
/// Buttons are diffed against `previous` (the last polled sample). Axes are compared
/// against `reported` (the last sample an axis event was emitted for), so a slow drift
/// below `threshold` per poll is still reported once it adds up.
pub fn diff(
    previous: &RawDeviceSample,
    reported: &RawDeviceSample,
    current: &RawDeviceSample,
    shape: SampleShape,
    threshold: u32,
    scans: ScanRequest,
) -> SampleDiff {
    let count = shape.button_count();
    let prev_buttons = previous.buttons.masked(count);
    let curr_buttons = current.buttons.masked(count);

    SampleDiff {
        transitions: if scans.buttons {
            button_transitions(prev_buttons, curr_buttons)
        } else {
            Vec::new()
        },
        held: if scans.held {
            held_buttons(curr_buttons)
        } else {
            Vec::new()
        },
        axes_changed: scans.axes && axes_changed(reported, current, shape, threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDeviceSample {
        RawDeviceSample::default().with_axes(32_767, 32_767, 0)
    }

    #[test]
    fn single_bit_flip_yields_single_transition() {
        for k in 0..128usize {
            let prev = sample();
            let curr = sample().with_button(k, true);
            let down = button_transitions(prev.buttons, curr.buttons);
            assert_eq!(
                down,
                vec![ButtonEvent {
                    button_id: (k + 1) as u8,
                    pressed: true
                }]
            );
            let up = button_transitions(curr.buttons, prev.buttons);
            assert_eq!(
                up,
                vec![ButtonEvent {
                    button_id: (k + 1) as u8,
                    pressed: false
                }]
            );
        }
    }

    #[test]
    fn transitions_are_ascending() {
        let prev = ButtonSet::from_indices([3, 40]);
        let curr = ButtonSet::from_indices([0, 40, 99]);
        let ids: Vec<_> = button_transitions(prev, curr)
            .into_iter()
            .map(|e| (e.button_id, e.pressed))
            .collect();
        assert_eq!(ids, vec![(1, true), (4, false), (100, true)]);
    }

    #[test]
    fn held_scan_is_one_indexed_and_ascending() {
        let curr = ButtonSet::from_indices([9, 2]);
        assert_eq!(
            held_buttons(curr),
            vec![HeldEvent { button_id: 3 }, HeldEvent { button_id: 10 }]
        );
        // Level-triggered: the same set yields the same events again.
        assert_eq!(held_buttons(curr), held_buttons(curr));
    }

    #[test]
    fn just_pressed_button_is_both_transition_and_held() {
        let prev = sample();
        let curr = sample().with_button(4, true);
        let d = diff(&prev, &prev, &curr, SampleShape::FULL, 0, ScanRequest::ALL);
        assert_eq!(
            d.transitions,
            vec![ButtonEvent {
                button_id: 5,
                pressed: true
            }]
        );
        assert_eq!(d.held, vec![HeldEvent { button_id: 5 }]);
        assert!(!d.axes_changed);
    }

    #[test]
    fn axes_change_on_any_tracked_field() {
        let prev = sample();
        assert!(axes_changed(&prev, &prev.with_axes(1, 32_767, 0), SampleShape::FULL, 0));
        assert!(axes_changed(&prev, &prev.with_pov(9000), SampleShape::FULL, 0));
        assert!(axes_changed(&prev, &prev.with_rz(5), SampleShape::FULL, 0));
        assert!(axes_changed(&prev, &prev.with_slider(5), SampleShape::FULL, 0));
    }

    #[test]
    fn untracked_axes_are_ignored() {
        let prev = sample();
        let curr = prev.with_rz(1_000).with_slider(2_000);
        assert!(!axes_changed(&prev, &curr, SampleShape::THREE_AXIS, 0));
    }

    #[test]
    fn both_centered_encodings_compare_equal() {
        let prev = sample().with_pov(0xFFFF);
        let curr = sample().with_pov(u32::MAX);
        assert!(!axes_changed(&prev, &curr, SampleShape::FULL, 0));
    }

    #[test]
    fn threshold_silences_small_moves() {
        let prev = sample();
        let curr = prev.with_axes(32_767 + 8, 32_767, 0);
        assert!(!axes_changed(&prev, &curr, SampleShape::FULL, 8));
        assert!(axes_changed(&prev, &curr, SampleShape::FULL, 7));
    }

    #[test]
    fn axes_compare_against_last_reported_sample() {
        let reported = sample();
        let previous = reported.with_axes(32_767 + 6, 32_767, 0);
        let current = reported.with_axes(32_767 + 12, 32_767, 0);
        // 6 units since the last poll, 12 since the last axis event.
        let d = diff(&previous, &reported, &current, SampleShape::FULL, 8, ScanRequest::ALL);
        assert!(d.axes_changed);
        let d = diff(&previous, &previous, &current, SampleShape::FULL, 8, ScanRequest::ALL);
        assert!(!d.axes_changed);
    }

    #[test]
    fn unrequested_scans_are_skipped() {
        let prev = sample();
        let curr = sample().with_button(0, true).with_axes(0, 0, 0);
        let d = diff(&prev, &prev, &curr, SampleShape::FULL, 0, ScanRequest::default());
        assert_eq!(d, SampleDiff::default());

        let only_held = ScanRequest {
            held: true,
            ..ScanRequest::default()
        };
        let d = diff(&prev, &prev, &curr, SampleShape::FULL, 0, only_held);
        assert!(d.transitions.is_empty());
        assert_eq!(d.held.len(), 1);
        assert!(!d.axes_changed);
    }

    #[test]
    fn buttons_beyond_shape_are_masked() {
        let prev = sample();
        let curr = sample().with_button(40, true);
        let d = diff(&prev, &prev, &curr, SampleShape::THREE_AXIS, 0, ScanRequest::ALL);
        assert!(d.transitions.is_empty());
        assert!(d.held.is_empty());
    }
}
