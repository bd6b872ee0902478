//! Handheld XpressNet throttle.
//!
//! The library holds everything that does not touch hardware: the
//! application state machine, the roster, the CV programming sub-machine,
//! speed-step conversion and the settings image. It builds and tests on the
//! host.
//!
//! Usage: `cargo test --lib`
//!
//! The embedded binary (main.rs, `embedded` feature) adds the Embassy tasks
//! for the encoder, buttons, display, flash and bus, and feeds their events
//! into [`app::App`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Domain
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod power;
pub mod roster;
pub mod speed;

// ═══════════════════════════════════════════════════════════════════════════
// Events, bus and persistence
// ═══════════════════════════════════════════════════════════════════════════

pub mod bus;
pub mod event;
pub mod storage;

// ═══════════════════════════════════════════════════════════════════════════
// User interface and application
// ═══════════════════════════════════════════════════════════════════════════

pub mod app;
pub mod cv;
pub mod ui;

pub use app::{App, State};
pub use error::{RosterError, StorageError};

/// Firmware version shown on the splash screen.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - input helpers
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use crate::config::{PUSH_LONG_MS, PUSH_NORMAL_MS, PUSH_SHORT_MS};
    use crate::event::Gesture;
    use crate::ui::input_logic::*;

    #[test]
    fn ui_input_logic_wrapping_boundaries() {
        assert_eq!(step_wrapping(5, 1, 1, 9), 6);
        assert_eq!(step_wrapping(9, 1, 1, 9), 1);
        assert_eq!(step_wrapping(1, -1, 1, 9), 9);
        assert_eq!(adjust_clamped(250, 10, 0, 255), 255);
        assert_eq!(adjust_clamped(3, -10, 1, 1024), 1);
    }

    #[test]
    fn ui_input_logic_bus_address_uses_direction_only() {
        assert_eq!(next_bus_address(1, 5), 2);
        assert_eq!(next_bus_address(31, 1), 1);
        assert_eq!(next_bus_address(1, -3), 31);
        assert_eq!(next_bus_address(7, 0), 7);
    }

    #[test]
    fn ui_input_logic_function_editor_wraps() {
        assert_eq!(next_function(0, -1), 28);
        assert_eq!(next_function(28, 1), 0);
        assert_eq!(next_function(4, 2), 5);
    }

    #[test]
    fn ui_input_logic_light_only_on_first_button() {
        assert!(assignable(0, 0));
        assert!(!assignable(3, 0));
        assert!(assignable(3, 12));
    }

    #[test]
    fn ui_input_logic_push_durations() {
        assert_eq!(classify_release(PUSH_SHORT_MS - 1, false, false), None);
        assert_eq!(
            classify_release(PUSH_SHORT_MS, false, false),
            Some(Gesture::PushedShort)
        );
        assert_eq!(
            classify_release(PUSH_NORMAL_MS - 1, false, false),
            Some(Gesture::PushedShort)
        );
        assert_eq!(
            classify_release(PUSH_NORMAL_MS, false, false),
            Some(Gesture::PushedNormal)
        );
    }

    #[test]
    fn ui_input_logic_turned_or_long_push_ends_in_release() {
        assert_eq!(classify_release(10, true, false), Some(Gesture::Released));
        assert_eq!(
            classify_release(PUSH_LONG_MS + 200, false, true),
            Some(Gesture::Released)
        );
    }

    #[test]
    fn ui_input_logic_long_press_reported_once() {
        assert!(!long_press_due(PUSH_LONG_MS - 1, false, false));
        assert!(long_press_due(PUSH_LONG_MS, false, false));
        assert!(!long_press_due(PUSH_LONG_MS, false, true));
        assert!(!long_press_due(PUSH_LONG_MS, true, false));
    }
}
