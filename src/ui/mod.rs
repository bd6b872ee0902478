//! User interface - semantic screen updates, input helpers and drivers.
//!
//! The state machine never draws pixels. It calls the [`Display`] trait
//! with what the operator should see; [`model::ScreenModel`] keeps the
//! latest value of every element and the SSD1306 driver renders that model.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C (`embedded` feature)
//! - **Encoder**: rotary encoder with push switch, gesture classification
//! - **Buttons**: six function buttons and a power button with debouncing

pub mod input_logic;
pub mod model;

#[cfg(feature = "embedded")]
pub mod buttons;
#[cfg(feature = "embedded")]
pub mod display;
#[cfg(feature = "embedded")]
pub mod encoder;

use crate::bus::TurnoutPosition;
use crate::cv::CvView;
use crate::roster::{LocoName, LocomotiveRecord, FUNCTION_BUTTONS};
use crate::speed::{Direction, StepMode};

/// Screens (views) the UI can be in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Firmware name and version.
    #[default]
    Splash,
    /// Own bus address editor.
    BusAddress,
    /// Live loco control.
    Loco,
    Turnout,
    Menu,
    /// Loco address entry (add, change functions, delete).
    Address,
    Cv,
    /// Roster being sent to the command station.
    Transmit,
    Erase,
    CommandLine,
}

/// Status line colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    #[default]
    White,
    Green,
    Red,
    Yellow,
}

/// How an edited loco address is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Highlight {
    #[default]
    Normal,
    /// The address was refused (duplicate, last loco).
    Rejected,
    /// The change was stored.
    Stored,
}

/// Menu pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuPage {
    /// Roster editing and CV programming.
    Main,
    /// Device settings.
    Settings { emergency_stop: bool },
}

/// Everything shown on the live loco screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocoView {
    pub address: u16,
    pub name: LocoName,
    pub speed: u8,
    pub steps: StepMode,
    pub direction: Direction,
    pub function_bits: u32,
    pub functions: [u8; FUNCTION_BUTTONS],
    pub occupied: bool,
}

impl From<&LocomotiveRecord> for LocoView {
    fn from(record: &LocomotiveRecord) -> Self {
        Self {
            address: record.address,
            name: record.name.clone(),
            speed: record.speed,
            steps: record.steps,
            direction: record.direction,
            function_bits: record.function_bits,
            functions: record.functions,
            occupied: record.occupied,
        }
    }
}

impl LocoView {
    /// Light (F0) state.
    pub fn light(&self) -> bool {
        self.function_bits & 1 != 0
    }

    /// State of the function assigned to `button`.
    pub fn button_active(&self, button: usize) -> bool {
        self.functions
            .get(button)
            .is_some_and(|&f| self.function_bits & (1u32 << f) != 0)
    }
}

/// Semantic screen updates issued by the state machine.
pub trait Display {
    /// Blank the whole screen.
    fn clear(&mut self);
    fn show_splash(&mut self, version: &str);
    fn show_status(&mut self, text: &str, color: Color);
    /// Running indicator while waiting for the command station.
    fn show_connecting(&mut self, count: u8);
    fn show_bus_address(&mut self, address: u8);
    fn show_loco(&mut self, view: &LocoView);
    /// Loco being browsed while the knob is held.
    fn show_loco_preview(&mut self, address: u16, name: &str);
    /// 1-based position of the active loco and roster size.
    fn show_selection(&mut self, position: usize, count: usize);
    fn show_turnout(&mut self, address: u16, position: TurnoutPosition);
    fn show_menu(&mut self, page: MenuPage);
    fn show_address(&mut self, address: u16, highlight: Highlight);
    /// Function number currently being picked.
    fn show_function_editor(&mut self, function: u8);
    fn show_function_assignment(&mut self, button: usize, function: u8);
    fn show_transmit_progress(&mut self, sent: u16, total: u16);
    fn show_erase(&mut self);
    fn show_command_line(&mut self);
    fn show_cv(&mut self, view: &CvView);
}
