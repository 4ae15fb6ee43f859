//! POV / hat switch direction mapping.
//!
//! Raw POV values are angles in hundredths of a degree, clockwise from North.
//! [`PovDirection::from_raw`] sorts them into eight half-open 45° sectors:
//!
//! | sector        | raw range          |
//! |---------------|--------------------|
//! | North         | `[0, 4500)`        |
//! | North-East    | `[4500, 9000)`     |
//! | East          | `[9000, 13500)`    |
//! | South-East    | `[13500, 18000)`   |
//! | South         | `[18000, 22500)`   |
//! | South-West    | `[22500, 27000)`   |
//! | West          | `[27000, 31500)`   |
//! | North-West    | `[31500, 36000)`   |
//!
//! The centered sentinels (`0xFFFF`, and `-1` seen as `u32::MAX`) are checked before any
//! sector, so `0` is always North and a released hat is always Center. Values above
//! `35999` that are not a sentinel map to [`PovDirection::Unknown`].

use crate::sample::POV_CENTERED;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest in-domain angle (hundredths of a degree).
pub const POV_MAX: u32 = 35_999;

/// Signed `-1` ("no POV") viewed as a DWORD.
pub const POV_CENTERED_SIGNED: u32 = u32::MAX;

const SECTOR_WIDTH: u32 = 4_500;

/// Compass sector of a hat switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PovDirection {
    Center,
    North,
    #[serde(rename = "North-East")]
    NorthEast,
    East,
    #[serde(rename = "South-East")]
    SouthEast,
    South,
    #[serde(rename = "South-West")]
    SouthWest,
    West,
    #[serde(rename = "North-West")]
    NorthWest,
    Unknown,
}

impl PovDirection {
    /// The eight directional sectors, clockwise from North.
    pub const DIRECTIONS: [PovDirection; 8] = [
        PovDirection::North,
        PovDirection::NorthEast,
        PovDirection::East,
        PovDirection::SouthEast,
        PovDirection::South,
        PovDirection::SouthWest,
        PovDirection::West,
        PovDirection::NorthWest,
    ];

    /// Map a raw POV angle. Total: every input yields a direction.
    pub fn from_raw(raw: u32) -> Self {
        if is_centered(raw) {
            return PovDirection::Center;
        }
        if raw > POV_MAX {
            return PovDirection::Unknown;
        }
        Self::DIRECTIONS[(raw / SECTOR_WIDTH) as usize]
    }

    /// Same as [`from_raw`](Self::from_raw) for backends that report the POV signed.
    #[inline]
    pub fn from_signed(raw: i32) -> Self {
        Self::from_raw(raw as u32)
    }

    /// Map an 8-way hat slot (`-1` neutral, `0..7` clockwise from Up).
    pub fn from_slot(slot: i16) -> Self {
        match slot {
            -1 => PovDirection::Center,
            0..=7 => Self::DIRECTIONS[slot as usize],
            _ => PovDirection::Unknown,
        }
    }

    /// Human-readable label (`"North-East"`, `"Center"`, ...).
    pub fn label(self) -> &'static str {
        match self {
            PovDirection::Center => "Center",
            PovDirection::North => "North",
            PovDirection::NorthEast => "North-East",
            PovDirection::East => "East",
            PovDirection::SouthEast => "South-East",
            PovDirection::South => "South",
            PovDirection::SouthWest => "South-West",
            PovDirection::West => "West",
            PovDirection::NorthWest => "North-West",
            PovDirection::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PovDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Map a raw POV angle to its compass sector.
#[inline]
pub fn map_pov(raw: u32) -> PovDirection {
    PovDirection::from_raw(raw)
}

/// `true` for either "no direction" encoding.
#[inline]
pub fn is_centered(raw: u32) -> bool {
    raw == POV_CENTERED || raw == POV_CENTERED_SIGNED
}

/// Fold the signed sentinel into [`POV_CENTERED`] so consumers see one encoding.
#[inline]
pub fn canonical_pov(raw: u32) -> u32 {
    if raw == POV_CENTERED_SIGNED {
        POV_CENTERED
    } else {
        raw
    }
}

/// Convert an 8-way hat slot into hundredths of a degree (`-1` → [`POV_CENTERED`]).
pub fn slot_to_hundredths(slot: i16) -> u32 {
    match slot {
        0..=7 => slot as u32 * SECTOR_WIDTH,
        _ => POV_CENTERED,
    }
}
