//! Pure input helpers shared by the state machine and the input tasks.

use crate::config::{BUS_ADDRESS_MAX, BUS_ADDRESS_MIN, PUSH_LONG_MS, PUSH_NORMAL_MS, PUSH_SHORT_MS};
use crate::event::Gesture;
use crate::roster::FUNCTION_MAX;

/// Step `value` by `delta` inside `min..=max`, wrapping past either end to
/// the opposite bound.
pub fn step_wrapping(value: i32, delta: i32, min: i32, max: i32) -> i32 {
    let next = value + delta;
    if next > max {
        min
    } else if next < min {
        max
    } else {
        next
    }
}

/// Step `value` by `delta`, clamped to `min..=max`.
pub fn adjust_clamped(value: i32, delta: i32, min: i32, max: i32) -> i32 {
    (value + delta).clamp(min, max)
}

/// Next own bus address for the address editor.
pub fn next_bus_address(address: u8, delta: i8) -> u8 {
    step_wrapping(
        i32::from(address),
        i32::from(delta.signum()),
        i32::from(BUS_ADDRESS_MIN),
        i32::from(BUS_ADDRESS_MAX),
    ) as u8
}

/// Next function number in the function editor.
pub fn next_function(function: u8, delta: i8) -> u8 {
    step_wrapping(
        i32::from(function),
        i32::from(delta.signum()),
        0,
        i32::from(FUNCTION_MAX),
    ) as u8
}

/// Only the first button may carry F0 (the light).
pub fn assignable(button: usize, function: u8) -> bool {
    button == 0 || function != 0
}

/// Classify the end of an encoder push held for `held_ms`.
///
/// A push that was turned or already reported as long ends in `Released`.
/// Presses shorter than [`PUSH_SHORT_MS`] are bounce and yield nothing.
pub fn classify_release(held_ms: u64, turned: bool, long_sent: bool) -> Option<Gesture> {
    if turned || long_sent {
        Some(Gesture::Released)
    } else if held_ms < PUSH_SHORT_MS {
        None
    } else if held_ms < PUSH_NORMAL_MS {
        Some(Gesture::PushedShort)
    } else {
        Some(Gesture::PushedNormal)
    }
}

/// A long press is reported once, while the knob is still held.
pub fn long_press_due(held_ms: u64, turned: bool, long_sent: bool) -> bool {
    !turned && !long_sent && held_ms >= PUSH_LONG_MS
}
