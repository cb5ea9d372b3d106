//! The access-control error taxonomy.
//!
//! Every access-control operation either succeeds or returns exactly one
//! [`AccessError`].  Each variant carries a stable [`code`](AccessError::code)
//! so HTTP clients can branch on the kind of failure without parsing the
//! human-readable message.
//!
//! Two families exist:
//!
//! - **Validation errors** (`InvalidIdentifier`, `MissingIdentifier`,
//!   `InvalidDuration`) are detected before any mutation is attempted and are
//!   the caller's fault.
//! - **Operational errors** (`BlockFailed`, `UnblockFailed`,
//!   `UnblockRetriesExhausted`, `QueryFailed`) mean the packet filter could not
//!   do what was asked.  They are never retried automatically.
//!
//! A timer that does not exist is not an error; lookups return `None` and
//! cancellation returns `false`.

use thiserror::Error;

use crate::domain::mac::MacAddress;

/// Errors returned by access-control operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The hardware address is malformed.  Carries the normalized input.
    #[error("Invalid MAC address: {0}")]
    InvalidIdentifier(String),

    /// No hardware address was supplied at all.
    #[error("MAC address is required")]
    MissingIdentifier,

    /// The timer duration is zero, negative, non-numeric, or out of range.
    #[error("Minutes must be a positive number (got {0})")]
    InvalidDuration(String),

    /// Inserting the deny rule, or checking for an existing one, failed.
    #[error("failed to block {mac}: {reason}")]
    BlockFailed { mac: MacAddress, reason: String },

    /// Removing the deny rules, or checking for remaining ones, failed.
    #[error("failed to unblock {mac}: {reason}")]
    UnblockFailed { mac: MacAddress, reason: String },

    /// Deny rules for the device kept reappearing after every removal.
    #[error("{mac} is still blocked after {attempts} rule removals")]
    UnblockRetriesExhausted { mac: MacAddress, attempts: u32 },

    /// Listing the current deny rules failed.
    #[error("failed to query packet filter: {0}")]
    QueryFailed(String),
}

impl AccessError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "INVALID_MAC",
            Self::MissingIdentifier => "MISSING_MAC",
            Self::InvalidDuration(_) => "INVALID_MINUTES",
            Self::BlockFailed { .. } => "BLOCK_FAILED",
            Self::UnblockFailed { .. } => "UNBLOCK_FAILED",
            Self::UnblockRetriesExhausted { .. } => "UNBLOCK_RETRIES_EXHAUSTED",
            Self::QueryFailed(_) => "QUERY_FAILED",
        }
    }

    /// `true` when the caller supplied bad input; `false` for operational
    /// failures of the packet filter.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::MissingIdentifier | Self::InvalidDuration(_)
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
