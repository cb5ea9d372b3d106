//! Domain entities for Armas.
//!
//! Everything here is plain data plus validation.  None of these types know
//! how a device gets blocked or how a timer gets scheduled; they only describe
//! *which* device and *when*.

/// Device records produced by network discovery.
pub mod device;

/// Hardware address parsing and normalization.
pub mod mac;

/// Timer durations and schedule records.
pub mod schedule;
