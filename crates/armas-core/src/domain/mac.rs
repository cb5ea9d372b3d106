//! Normalized hardware (MAC) addresses.
//!
//! A [`MacAddress`] is the sole key for all block and timer state.  The
//! canonical text form is six uppercase hex octets separated by colons:
//!
//! ```text
//! AA:BB:CC:DD:EE:FF
//! ```
//!
//! Callers hand us addresses in whatever shape the operator typed them, so
//! [`MacAddress::parse`] first uppercases the input and turns hyphens into
//! colons, then checks the strict 6-octet pattern.  Anything else is rejected
//! with [`AccessError::InvalidIdentifier`].
//!
//! # Example
//!
//! ```rust
//! use armas_core::MacAddress;
//!
//! let mac = MacAddress::parse("aa-bb-cc-dd-ee-ff").unwrap();
//! assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
//! assert!(MacAddress::parse("not-a-mac").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AccessError;

/// Length of the canonical text form: 6 octets × 2 hex digits + 5 separators.
const TEXT_LEN: usize = 17;

/// A 6-octet hardware address.
///
/// Ordering and hashing operate on the raw octets, so two addresses that
/// parsed from differently formatted input compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Builds an address from raw octets.
    pub const fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the raw octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Normalizes and validates operator input.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidIdentifier`] if the normalized input is
    /// not exactly six colon-separated hex octets.
    pub fn parse(raw: &str) -> Result<Self, AccessError> {
        let normalized = raw.to_ascii_uppercase().replace('-', ":");
        parse_colon_form(normalized.as_bytes())
            .ok_or_else(|| AccessError::InvalidIdentifier(normalized))
    }

    /// Finds the first colon-separated address embedded in a line of text.
    ///
    /// Used to pull identifiers out of tool output such as `iptables -L` or
    /// `arp-scan` listings.  Hex digits may be in either case.
    pub fn find_in(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() < TEXT_LEN {
            return None;
        }
        bytes.windows(TEXT_LEN).find_map(parse_colon_form)
    }
}

/// Parses exactly `HH:HH:HH:HH:HH:HH`, hex digits in either case.
fn parse_colon_form(bytes: &[u8]) -> Option<MacAddress> {
    if bytes.len() != TEXT_LEN {
        return None;
    }
    let mut octets = [0u8; 6];
    for (i, octet) in octets.iter_mut().enumerate() {
        let start = i * 3;
        if i > 0 && bytes[start - 1] != b':' {
            return None;
        }
        let hi = hex_value(bytes[start])?;
        let lo = hex_value(bytes[start + 1])?;
        *octet = (hi << 4) | lo;
    }
    Some(MacAddress(octets))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [o0, o1, o2, o3, o4, o5] = self.0;
        write!(f, "{o0:02X}:{o1:02X}:{o2:02X}:{o3:02X}:{o4:02X}:{o5:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
