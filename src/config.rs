//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, protocol limits and hardware assignments live
//! here so they can be tuned in one place.

// Periodic ticks

/// Fast tick period (ms). Paces roster packets during a transmit.
pub const TICK_FAST_MS: u64 = 100;

/// Medium tick period (ms). Drives loco polling, turnout auto-off and
/// connection retries.
pub const TICK_MEDIUM_MS: u64 = 500;

/// Slow tick period (ms). Drives the splash delay and CV retries.
pub const TICK_SLOW_MS: u64 = 3000;

/// Slow ticks the splash screen stays up before the bus is started.
pub const INIT_SPLASH_TICKS: u8 = 2;

// XpressNet bus

/// Lowest valid device address on the bus.
pub const BUS_ADDRESS_MIN: u8 = 1;

/// Highest valid device address on the bus.
pub const BUS_ADDRESS_MAX: u8 = 31;

/// Stored bus address meaning "not configured yet".
pub const BUS_ADDRESS_UNCONFIGURED: u8 = 255;

/// Medium ticks during which loco polling pauses after the operator
/// released the encoder or sent a direction change.
pub const SKIP_AFTER_INPUT: u8 = 2;

/// Medium ticks during which loco polling pauses after a drive command.
pub const SKIP_AFTER_DRIVE: u8 = 5;

/// Medium ticks a turnout output stays energised before "off" is sent.
pub const TURNOUT_OFF_TICKS: u8 = 1;

/// Fast ticks between two roster packets sent to the command station.
pub const ROSTER_TX_INTERVAL_TICKS: u8 = 1;

// CV programming

/// Busy answers tolerated before a CV transaction is reported as timed out.
pub const CV_BUSY_RETRY_LIMIT: u8 = 10;

/// Slow ticks without any answer before the result is polled again.
pub const CV_RESPONSE_TIMEOUT_TICKS: u8 = 2;

/// Highest CV number that can be selected.
pub const CV_NUMBER_MAX: u16 = 1024;

// Input (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Encoder A      → P0.02
//   Encoder B      → P0.03
//   Encoder push   → P0.04
//   Button 0..5    → P0.11, P0.12, P0.24, P0.25, P1.08, P1.09
//   Power button   → P0.28
//   I²C SDA        → P0.26
//   I²C SCL        → P0.27

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// Encoder push shorter than this is ignored as bounce (ms).
pub const PUSH_SHORT_MS: u64 = 25;

/// Encoder push at least this long is a "normal" press (ms).
pub const PUSH_NORMAL_MS: u64 = 500;

/// Encoder push at least this long is a "long" press (ms).
pub const PUSH_LONG_MS: u64 = 1500;

/// Encoder poll period (ms).
pub const ENCODER_POLL_MS: u64 = 1;

// Persistent storage

/// Flash page index where the settings image starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for the settings image.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
