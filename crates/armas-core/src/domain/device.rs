//! Devices seen on the local network.

use serde::{Deserialize, Serialize};

use crate::domain::mac::MacAddress;

/// Placeholder used when a scan cannot tell us a name, vendor, or address.
pub const UNKNOWN: &str = "Unknown";

/// A device reported by network discovery.
///
/// Discovery is not authoritative for block state; the server annotates
/// devices with their blocked flag separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub mac: MacAddress,
    /// IPv4 address as reported by the scanner, or `"Unknown"`.
    pub ip: String,
    /// Operator-assigned name if one exists, otherwise the vendor string.
    pub name: String,
    pub vendor: String,
}

impl Device {
    /// A device known only by its address, e.g. from the kernel ARP table.
    pub fn unnamed(mac: MacAddress, ip: impl Into<String>) -> Self {
        Self {
            mac,
            ip: ip.into(),
            name: UNKNOWN.to_string(),
            vendor: UNKNOWN.to_string(),
        }
    }
}
