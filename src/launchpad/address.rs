//! Hardware address tables
//!
//! Maps grid coordinates and named buttons to the note/CC numbers each
//! Launchpad model uses on the wire, and back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid size in both directions
pub const GRID_SIZE: u8 = 8;

/// Top row buttons are CC 104..=111 on channel 0 on every model
pub const TOP_BUTTON_BASE_CC: u8 = 104;

/// Top row button names, left to right
pub const TOP_BUTTON_NAMES: [&str; 8] = [
    "Bank_Select_Up_Button",
    "Bank_Select_Down_Button",
    "Bank_Select_Left_Button",
    "Bank_Select_Right_Button",
    "Session_Button",
    "User1_Button",
    "User2_Button",
    "Mixer_Button",
];

/// Side column button names, top to bottom
pub const SIDE_BUTTON_NAMES: [&str; 8] = [
    "Vol_Button",
    "Pan_Button",
    "SndA_Button",
    "SndB_Button",
    "Stop_Button",
    "Trk_On_Button",
    "Solo_Button",
    "Arm_Button",
];

const CLASSIC_SIDE_NOTES: [u8; 8] = [8, 24, 40, 56, 72, 88, 104, 120];

const MK2_SIDE_NOTES: [u8; 8] = [89, 79, 69, 59, 49, 39, 29, 19];

const CLASSIC_DRUM_NOTES: [u8; 31] = [
    41, 42, 43, 44, 45, 46, 47, 57, 58, 59, 60, 61, 62, 63, 73, 74, 75, 76, 77, 78, 79, 89, 90,
    91, 92, 93, 94, 95, 105, 106, 107,
];

const MK2_DRUM_NOTES: [u8; 32] = [
    20, 30, 31, 90, 91, 92, 93, 94, 95, 96, 97, 98, 99, 100, 101, 102, 103, 112, 113, 114, 115,
    116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126,
];

/// Launchpad hardware model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DeviceVariant {
    /// Original Launchpad, Mini and S (red/green LEDs)
    #[serde(rename = "classic")]
    Classic,
    /// Launchpad MK2 (RGB LEDs, SysEx framed handshake)
    #[serde(rename = "mk2")]
    Mk2Rgb,
}

impl DeviceVariant {
    /// Port names the host should look for when none are configured
    pub fn suggested_ports(self) -> &'static [&'static str] {
        match self {
            DeviceVariant::Classic => &["Launchpad", "Launchpad Mini", "Launchpad S"],
            DeviceVariant::Mk2Rgb => &["Launchpad MK2"],
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceVariant::Classic => write!(f, "Launchpad"),
            DeviceVariant::Mk2Rgb => write!(f, "Launchpad MK2"),
        }
    }
}

/// A cell of the 8x8 clip grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridButton {
    pub row: u8,
    pub column: u8,
}

impl GridButton {
    pub fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }

    /// Control name, e.g. `3_Clip_0_Button`
    pub fn name(&self) -> String {
        format!("{}_Clip_{}_Button", self.column, self.row)
    }

    /// All 64 cells in row-major order
    pub fn all() -> impl Iterator<Item = GridButton> {
        (0..GRID_SIZE).flat_map(|row| (0..GRID_SIZE).map(move |column| GridButton { row, column }))
    }
}

/// Pure mapping between physical buttons and protocol identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMapper {
    variant: DeviceVariant,
}

impl AddressMapper {
    pub fn new(variant: DeviceVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    /// Note number of a grid cell
    ///
    /// The MK2 numbers its rows top to bottom starting at 81.
    pub fn note_for(&self, button: GridButton) -> u8 {
        debug_assert!(
            button.row < GRID_SIZE && button.column < GRID_SIZE,
            "grid coordinate out of range: {:?}",
            button
        );

        match self.variant {
            DeviceVariant::Mk2Rgb => (81 - 10 * button.row) + button.column,
            DeviceVariant::Classic => 16 * button.row + button.column,
        }
    }

    /// Grid cell addressed by a note number, if any
    pub fn button_for(&self, note: u8) -> Option<GridButton> {
        let (row, column) = match self.variant {
            DeviceVariant::Mk2Rgb => {
                let tens = note / 10;
                let ones = note % 10;
                if !(1..=GRID_SIZE).contains(&tens) || !(1..=GRID_SIZE).contains(&ones) {
                    return None;
                }
                (GRID_SIZE - tens, ones - 1)
            }
            DeviceVariant::Classic => (note / 16, note % 16),
        };

        (row < GRID_SIZE && column < GRID_SIZE).then_some(GridButton { row, column })
    }

    /// Top row CC numbers, left to right
    pub fn top_buttons(&self) -> [u8; 8] {
        std::array::from_fn(|index| TOP_BUTTON_BASE_CC + index as u8)
    }

    /// Side column note numbers, top to bottom
    pub fn side_buttons(&self) -> &'static [u8; 8] {
        match self.variant {
            DeviceVariant::Classic => &CLASSIC_SIDE_NOTES,
            DeviceVariant::Mk2Rgb => &MK2_SIDE_NOTES,
        }
    }

    /// Notes remapped to the instrument channel when the MIDI map is rebuilt
    pub fn drum_notes(&self) -> &'static [u8] {
        match self.variant {
            DeviceVariant::Classic => &CLASSIC_DRUM_NOTES,
            DeviceVariant::Mk2Rgb => &MK2_DRUM_NOTES,
        }
    }
}
