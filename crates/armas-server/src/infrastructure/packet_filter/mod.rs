//! Packet-filter adapters implementing [`PacketFilter`].
//!
//! # Sub-modules
//!
//! - **`iptables`** – Runs the host's `iptables` binary (optionally through
//!   `sudo`) and parses its rule listing.  This is what the server uses in
//!   production.
//!
//! - **`memory`** – Keeps the rule chain in a `Vec`.  Used by `--dry-run`
//!   and by tests, with switches to inject failures.
//!
//! [`PacketFilter`]: crate::application::policy_store::PacketFilter

pub mod iptables;
pub mod memory;

pub use iptables::IptablesFilter;
pub use memory::InMemoryFilter;
