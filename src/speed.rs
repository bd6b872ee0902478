//! Decoder speed steps and the conversion between bus speed values and the
//! linear speed the operator controls.
//!
//! 14 and 128 step decoders use the bus value as-is. 28 step decoders
//! interleave the intermediate step bit into the value, so two fixed tables
//! translate between the bus encoding and a linear 0..=28 speed.

/// Decoder speed resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepMode {
    /// 14 speed steps.
    Steps14,
    /// 28 speed steps.
    #[default]
    Steps28,
    /// 128 speed steps (126 usable).
    Steps128,
}

impl StepMode {
    /// Map the step code reported by the command station.
    ///
    /// Code 1 (27 steps) is not supported and code 3 is a placeholder the
    /// bus sends before the real value is known; both return `None`.
    pub const fn from_bus_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Steps14),
            2 => Some(Self::Steps28),
            4 => Some(Self::Steps128),
            _ => None,
        }
    }

    /// Step code used in drive commands.
    pub const fn bus_code(self) -> u8 {
        match self {
            Self::Steps14 => 0,
            Self::Steps28 => 2,
            Self::Steps128 => 4,
        }
    }

    /// Highest linear speed for this mode.
    pub const fn max_speed(self) -> u8 {
        match self {
            Self::Steps14 => 14,
            Self::Steps28 => 28,
            Self::Steps128 => 126,
        }
    }
}

/// Direction of travel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Direction bit as reported by the bus (1 = forward).
    pub const fn from_bus_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

/// Bit 7 of the drive speed byte selects forward travel.
pub const DIRECTION_FORWARD_BIT: u8 = 0x80;

/// 28 step bus value → linear speed 0..=28.
pub const DECODE_28: [u8; 32] = [
    0, 0, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19, 21, 23, 25, 27, 0, 0, 2, 4, 6, 8, 10, 12, 14, 16, 18,
    20, 22, 24, 26, 28,
];

/// Linear speed 0..=28 → 28 step bus value.
pub const ENCODE_28: [u8; 29] = [
    16, 2, 18, 3, 19, 4, 20, 5, 21, 6, 22, 7, 23, 8, 24, 9, 25, 10, 26, 11, 27, 12, 28, 13, 29,
    14, 30, 15, 31,
];

/// Bus speed value → linear speed.
pub fn decode(mode: StepMode, raw: u8) -> u8 {
    match mode {
        StepMode::Steps14 | StepMode::Steps128 => raw,
        StepMode::Steps28 => DECODE_28[usize::from(raw & 0x1F)],
    }
}

/// Linear speed → bus speed value (direction bit not included).
pub fn encode(mode: StepMode, speed: u8) -> u8 {
    match mode {
        StepMode::Steps14 | StepMode::Steps128 => speed,
        StepMode::Steps28 => ENCODE_28[usize::from(speed.min(28))],
    }
}

/// Speed byte for a drive command: encoded speed plus the direction bit.
pub fn drive_byte(mode: StepMode, speed: u8, direction: Direction) -> u8 {
    let encoded = encode(mode, speed);
    match direction {
        Direction::Forward => encoded | DIRECTION_FORWARD_BIT,
        Direction::Backward => encoded,
    }
}
