//! # armas-core
//!
//! Shared domain types for the Armas network access-control service.
//!
//! This crate has no dependencies on the packet filter, the network, the file
//! system, or any async runtime.  It defines the vocabulary the server speaks:
//!
//! - **`domain::mac`** – The normalized hardware address ([`MacAddress`]) that
//!   keys every piece of block and timer state.  Parsing accepts hyphen- or
//!   colon-separated, mixed-case input and always yields the canonical
//!   `AA:BB:CC:DD:EE:FF` form.
//!
//! - **`domain::schedule`** – The validated timer duration ([`TimerMinutes`])
//!   and the [`ScheduleRecord`] describing a pending timed block.
//!
//! - **`domain::device`** – The [`Device`] record produced by network
//!   discovery.
//!
//! - **`error`** – The [`AccessError`] taxonomy shared by every access-control
//!   operation, with stable machine-readable codes.

pub mod domain;
pub mod error;

pub use domain::device::Device;
pub use domain::mac::MacAddress;
pub use domain::schedule::{ScheduleRecord, TimerMinutes, MAX_TIMER_MINUTES};
pub use error::AccessError;
