//! Device discovery infrastructure.
//!
//! # Sub-modules
//!
//! - **`arp_scan`** – Probes the configured range with `arp-scan` and falls
//!   back to the kernel ARP table when that is not possible.
//!
//! - **`name_store`** – Persists operator-assigned device names as JSON.

pub mod arp_scan;
pub mod name_store;

pub use arp_scan::ArpScanSource;
pub use name_store::JsonDeviceNameStore;
