//! Error types for xnet-throttle.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use thiserror::Error;

/// Roster constraint violations. These are rejected locally and shown to
/// the operator; none of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RosterError {
    /// A locomotive with this address is already in the roster.
    #[error("address already present")]
    AlreadyExists,
    /// The roster must keep at least one locomotive.
    #[error("cannot delete the last locomotive")]
    LastRecordRejected,
    /// No locomotive with this address.
    #[error("address not found")]
    NotFound,
    /// The roster is at capacity.
    #[error("roster full")]
    Full,
    /// Address outside 1..=9999.
    #[error("invalid address")]
    InvalidAddress,
}

/// Settings image failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash read/write/erase failed.
    #[error("flash access failed")]
    Flash,
    /// Stored bytes do not form a valid image.
    #[error("corrupt settings image")]
    Corrupt,
    /// Buffer too small for the requested operation.
    #[error("buffer too small")]
    BufferTooSmall,
}
