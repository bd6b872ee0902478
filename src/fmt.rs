//! Logging shims.
//!
//! With the `defmt` feature the macros forward to `defmt`; on the host they
//! only borrow their arguments so tests need no global logger.
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => { ::defmt::info!($s $(, $x)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( &$x, )*); }};
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => { ::defmt::debug!($s $(, $x)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( &$x, )*); }};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => { ::defmt::warn!($s $(, $x)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( &$x, )*); }};
}

#[cfg(feature = "defmt")]
macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => { ::defmt::error!($s $(, $x)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( &$x, )*); }};
}
