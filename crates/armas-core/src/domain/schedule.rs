//! Timer durations and schedule records.
//!
//! A timed block is requested in whole minutes.  [`TimerMinutes`] is the only
//! way to express such a duration, and it can only be constructed from a
//! strictly positive value, so a zero or negative timer never reaches the
//! scheduler.  Fractions are truncated, but never below one minute.

use std::time::Duration;

use serde::Serialize;

use crate::domain::mac::MacAddress;
use crate::error::AccessError;

/// Upper bound on a single timer: one year.
pub const MAX_TIMER_MINUTES: u32 = 365 * 24 * 60;

/// A validated, strictly positive timer duration in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerMinutes(u32);

impl TimerMinutes {
    /// Validates a whole-minute duration.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidDuration`] for zero, negative, or values
    /// above [`MAX_TIMER_MINUTES`].
    pub fn new(minutes: i64) -> Result<Self, AccessError> {
        if minutes <= 0 || minutes > i64::from(MAX_TIMER_MINUTES) {
            return Err(AccessError::InvalidDuration(minutes.to_string()));
        }
        // In range 1..=MAX_TIMER_MINUTES, so the narrowing cannot truncate.
        Ok(Self(minutes as u32))
    }

    /// Validates a fractional duration, truncating to whole minutes.
    ///
    /// A positive value below one minute (e.g. `0.5`) becomes one minute.
    /// Non-finite and non-positive input is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidDuration`] carrying the input as given,
    /// for the cases above and for values above [`MAX_TIMER_MINUTES`].
    pub fn from_fractional(minutes: f64) -> Result<Self, AccessError> {
        let whole = minutes.trunc();
        if !minutes.is_finite() || minutes <= 0.0 || whole > f64::from(MAX_TIMER_MINUTES) {
            return Err(AccessError::InvalidDuration(minutes.to_string()));
        }
        // In range 0..=MAX_TIMER_MINUTES, so the cast is exact.
        Ok(Self((whole as u32).max(1)))
    }

    /// Returns the duration in minutes.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the duration as a [`Duration`].
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0) * 60)
    }
}

/// A pending timed block, as reported to callers.
///
/// `expires_at` is a Unix timestamp in seconds.  `remaining_seconds` is
/// computed at the moment the record is produced and never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRecord {
    /// The device that will be blocked.
    pub mac: MacAddress,
    /// The duration originally requested.
    pub minutes: u32,
    /// When the block fires, in seconds since the Unix epoch.
    pub expires_at: u64,
    /// Whole seconds left until the block fires.
    pub remaining_seconds: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
