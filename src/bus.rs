//! Semantic interface to the XpressNet bus.
//!
//! The wire protocol (framing, checksums, call bytes, retransmission) lives
//! behind the [`Bus`] trait. The state machine only submits
//! [`BusCommand`]s and consumes [`BusNotification`]s.

use heapless::Vec;

use crate::power::{PowerCommand, PowerStatus};
use crate::roster::{FunctionState, LocoName};
use crate::speed::{self, Direction, StepMode};

/// Step code reported while the command station does not yet know the
/// decoder; such loco info is discarded.
pub const STEP_CODE_PLACEHOLDER: u8 = 3;

/// Turnout output requested on the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnoutPosition {
    /// Output de-energised.
    #[default]
    Off,
    Forward,
    Turn,
}

impl TurnoutPosition {
    /// Output byte of the accessory command: bit 3 activates the output,
    /// bit 0 selects the forward coil.
    pub const fn output_bits(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::Forward => 0x09,
            Self::Turn => 0x08,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Accessory addresses are 1-based for the operator, 0-based on the wire.
pub const fn turnout_wire_address(address: u16) -> u16 {
    address.saturating_sub(1)
}

/// Commands submitted to the bus adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusCommand {
    /// Start the bus interface with our device address.
    Start { address: u8 },
    RequestLocoInfo { address: u16 },
    /// `speed` is already encoded for `steps`; bit 7 set means forward.
    Drive {
        address: u16,
        steps: StepMode,
        speed: u8,
    },
    SetFunction {
        address: u16,
        function: u8,
        state: FunctionState,
    },
    RequestPower,
    SetPower(PowerCommand),
    /// `address` is the operator's 1-based turnout number; the adapter maps
    /// it with [`turnout_wire_address`].
    SetTurnout {
        address: u16,
        position: TurnoutPosition,
    },
    ReadCv { cv: u16 },
    WriteCv { cv: u16, value: u8 },
    /// Programming on main. `cv` is 1-based; the adapter converts it.
    WriteCvPom { address: u16, cv: u16, value: u8 },
    /// Poll the result of the last programming track request.
    RequestCvResult,
    /// Enable or disable answering roster transmit requests.
    RosterTransmission(bool),
    TransmitRosterEntry { address: u16, index: u16, total: u16 },
}

/// Loco state as reported by the command station.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocoInfo {
    pub address: u16,
    /// 0 = 14, 1 = 27 (unsupported), 2 = 28, 3 = placeholder, 4 = 128.
    pub step_code: u8,
    /// Raw bus speed value, direction bit stripped.
    pub speed: u8,
    pub forward: bool,
    /// Bit n = function n.
    pub function_bits: u32,
    /// Another throttle controls this loco.
    pub occupied: bool,
}

impl LocoInfo {
    pub const fn is_placeholder(&self) -> bool {
        self.step_code == STEP_CODE_PLACEHOLDER
    }

    /// Step mode; unknown codes fall back to 28 steps.
    pub fn steps(&self) -> StepMode {
        StepMode::from_bus_code(self.step_code).unwrap_or_default()
    }

    /// Speed on the operator's linear scale. Unsupported modes read as 0.
    pub fn linear_speed(&self) -> u8 {
        match StepMode::from_bus_code(self.step_code) {
            Some(mode) => speed::decode(mode, self.speed),
            None => 0,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.forward {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// One packet of a roster sent by the command station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub address: u16,
    /// Zero-based position in the command station's list.
    pub index: u16,
    pub total: u16,
    pub name: LocoName,
}

impl RosterEntry {
    /// True for the final packet of a transfer.
    pub const fn is_last(&self) -> bool {
        self.index as u32 + 1 == self.total as u32
    }
}

/// Outcome of a programming request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvStatus {
    Ready,
    Busy,
    NotFound,
    ShortCircuit,
    TransferError,
    /// A value was read back; see [`CvResponse::value`].
    DataReady,
}

impl CvStatus {
    /// Map a service mode status byte. Unknown codes read as not found.
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Ready,
            0x01 => Self::Busy,
            0x02 => Self::NotFound,
            0x03 => Self::ShortCircuit,
            0xE1 => Self::TransferError,
            _ => Self::NotFound,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CvResponse {
    pub status: CvStatus,
    pub cv: u16,
    pub value: u8,
}

impl CvResponse {
    pub const fn status(status: CvStatus) -> Self {
        Self {
            status,
            cv: 0,
            value: 0,
        }
    }

    pub const fn data(cv: u16, value: u8) -> Self {
        Self {
            status: CvStatus::DataReady,
            cv,
            value,
        }
    }
}

/// Notifications produced by the bus adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusNotification {
    Power(PowerStatus),
    LocoInfo(LocoInfo),
    RosterEntry(RosterEntry),
    /// The command station asks for the next roster packet.
    RosterTransmitRequest,
    Cv(CvResponse),
}

/// Pack the four function group bytes of a loco info answer into a bitmap
/// (bit n = function n). The first group carries F1..F4 in bits 0..3 and
/// F0 in bit 4.
pub const fn function_bits(f0: u8, f1: u8, f2: u8, f3: u8) -> u32 {
    (((f0 & 0x0F) as u32) << 1)
        | (((f0 & 0x10) as u32) >> 4)
        | ((f1 as u32) << 5)
        | ((f2 as u32) << 13)
        | ((f3 as u32) << 21)
}

/// Sink for bus commands.
pub trait Bus {
    fn submit(&mut self, command: BusCommand);
}

/// Maximum number of commands a [`CommandLog`] retains.
pub const COMMAND_LOG_DEPTH: usize = 64;

/// [`Bus`] that records every submitted command. The oldest entries are
/// dropped once the log is full.
#[derive(Debug, Default)]
pub struct CommandLog {
    commands: Vec<BusCommand, COMMAND_LOG_DEPTH>,
}

impl CommandLog {
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[BusCommand] {
        &self.commands
    }

    pub fn last(&self) -> Option<&BusCommand> {
        self.commands.last()
    }

    pub fn contains(&self, command: &BusCommand) -> bool {
        self.commands.contains(command)
    }

    pub fn count(&self, command: &BusCommand) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Bus for CommandLog {
    fn submit(&mut self, command: BusCommand) {
        if self.commands.is_full() {
            self.commands.remove(0);
        }
        let _ = self.commands.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_bits_packing() {
        // F0 (light) lives in bit 4 of the first group.
        assert_eq!(function_bits(0x10, 0, 0, 0), 0b1);
        assert_eq!(function_bits(0x01, 0, 0, 0), 0b10);
        assert_eq!(function_bits(0x08, 0, 0, 0), 0b1_0000);
        assert_eq!(function_bits(0, 0x01, 0, 0), 1 << 5);
        assert_eq!(function_bits(0, 0, 0x01, 0), 1 << 13);
        assert_eq!(function_bits(0, 0, 0, 0x80), 1 << 28);
    }

    #[test]
    fn cv_status_codes() {
        assert_eq!(CvStatus::from_code(0x00), CvStatus::Ready);
        assert_eq!(CvStatus::from_code(0x01), CvStatus::Busy);
        assert_eq!(CvStatus::from_code(0x02), CvStatus::NotFound);
        assert_eq!(CvStatus::from_code(0x03), CvStatus::ShortCircuit);
        assert_eq!(CvStatus::from_code(0xE1), CvStatus::TransferError);
        assert_eq!(CvStatus::from_code(0x7F), CvStatus::NotFound);
    }

    #[test]
    fn loco_info_decoding() {
        let info = LocoInfo {
            address: 3,
            step_code: 2,
            speed: 18,
            forward: false,
            function_bits: 0,
            occupied: false,
        };
        assert_eq!(info.steps(), StepMode::Steps28);
        assert_eq!(info.linear_speed(), 2);
        assert_eq!(info.direction(), Direction::Backward);

        let unsupported = LocoInfo {
            step_code: 1,
            ..info
        };
        assert_eq!(unsupported.linear_speed(), 0);
        assert_eq!(unsupported.steps(), StepMode::Steps28);
        assert!(LocoInfo {
            step_code: STEP_CODE_PLACEHOLDER,
            ..info
        }
        .is_placeholder());
    }

    #[test]
    fn turnout_output_bits() {
        assert_eq!(TurnoutPosition::Forward.output_bits(), 0x09);
        assert_eq!(TurnoutPosition::Turn.output_bits(), 0x08);
        assert_eq!(TurnoutPosition::Off.output_bits(), 0x00);
        assert_eq!(turnout_wire_address(1), 0);
    }

    #[test]
    fn roster_entry_terminal_packet() {
        let entry = RosterEntry {
            address: 5,
            index: 2,
            total: 3,
            name: LocoName::new(),
        };
        assert!(entry.is_last());
    }

    #[test]
    fn command_log_drops_oldest() {
        let mut log = CommandLog::new();
        for address in 0..(COMMAND_LOG_DEPTH as u16 + 1) {
            log.submit(BusCommand::RequestLocoInfo { address });
        }
        assert_eq!(log.commands().len(), COMMAND_LOG_DEPTH);
        assert_eq!(
            log.commands()[0],
            BusCommand::RequestLocoInfo { address: 1 }
        );
    }
}
