//! Track power as reported by the command station.
//!
//! The command station is the only authority on power. The throttle keeps
//! the last reported [`PowerStatus`] and asks for changes with a
//! [`PowerCommand`]; it never flips the status locally.

/// Track power status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerStatus {
    /// Track voltage off.
    #[default]
    Off,
    /// Normal operation.
    On,
    /// Emergency stop: power on, all locos halted.
    Emergency,
    /// Another device is programming on the programming track.
    ProgrammingMode,
}

/// Power change requested from the command station.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerCommand {
    /// Resume normal operation.
    Normal,
    /// Switch track voltage off.
    TrackOff,
    /// Stop all locos, keep track voltage.
    EmergencyStop,
}

impl PowerCommand {
    /// Command sent by the power button while power is on.
    pub const fn power_button(emergency_stop_enabled: bool) -> Self {
        if emergency_stop_enabled {
            Self::EmergencyStop
        } else {
            Self::TrackOff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_button_honours_emergency_option() {
        assert_eq!(PowerCommand::power_button(false), PowerCommand::TrackOff);
        assert_eq!(PowerCommand::power_button(true), PowerCommand::EmergencyStop);
    }

    #[test]
    fn default_status_is_off() {
        assert_eq!(PowerStatus::default(), PowerStatus::Off);
    }
}
