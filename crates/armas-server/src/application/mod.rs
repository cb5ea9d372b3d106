//! Application layer: the timed-access-control core.
//!
//! Use cases in this layer depend on traits (`PacketFilter`, `DeviceSource`,
//! `DeviceNameRepository`) rather than on `iptables`, `arp-scan` or the file
//! system, so every state transition can be exercised in unit tests with an
//! in-memory filter.
//!
//! # Sub-modules
//!
//! - **`policy_store`** – The authoritative block list.  Every read queries
//!   the packet filter; nothing is cached.
//!
//! - **`timer_registry`** – At most one pending scheduled block per device,
//!   firing an injected callback exactly once at expiry.
//!
//! - **`access_control`** – The single entry point that keeps the policy
//!   store and the timer registry consistent.  Manual block/unblock cancels
//!   pending timers; timer expiry performs the block.
//!
//! - **`keyed_lock`** – Per-device async locks so that operations on one
//!   device are serialized without blocking other devices.
//!
//! - **`device_inventory`** – Merges discovery results with operator-assigned
//!   names and annotates them with block state.

pub mod access_control;
pub mod device_inventory;
pub mod keyed_lock;
pub mod policy_store;
pub mod timer_registry;
