//! DeviceInventory: what is on the network, and what the operator calls it.
//!
//! Discovery is only a source of `{mac, ip, vendor}` records.  It is never
//! authoritative for block state; the inventory annotates each device with
//! the `blocked` flag taken from the packet filter at request time.
//!
//! Operator-assigned names live in a [`DeviceNameRepository`] and override
//! whatever name the scan reported.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use armas_core::domain::device::UNKNOWN;
use armas_core::{Device, MacAddress};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Failures of device discovery or the name store.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize device names: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Something that can enumerate devices currently on the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// One record per sighting.  May contain the same address more than once.
    async fn scan(&self) -> Result<Vec<Device>, DiscoveryError>;
}

/// Persistent operator-assigned device names.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceNameRepository: Send + Sync {
    /// All known names.  A store that cannot be read yields an empty map.
    fn names(&self) -> HashMap<MacAddress, String>;

    /// Assigns `name` to `mac`, replacing any previous name.
    fn set_name(&self, mac: MacAddress, name: &str) -> Result<(), DiscoveryError>;
}

/// A device as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    pub blocked: bool,
    /// `false` for devices known only from the name store.
    pub online: bool,
}

pub struct DeviceInventory {
    source: Arc<dyn DeviceSource>,
    names: Arc<dyn DeviceNameRepository>,
}

impl DeviceInventory {
    pub fn new(source: Arc<dyn DeviceSource>, names: Arc<dyn DeviceNameRepository>) -> Self {
        Self { source, names }
    }

    /// Scans, keeps the first record per address, and applies custom names.
    pub async fn scan(&self) -> Result<Vec<Device>, DiscoveryError> {
        let sightings = self.source.scan().await?;
        let names = self.names.names();

        let mut seen = HashSet::new();
        let devices: Vec<Device> = sightings
            .into_iter()
            .filter(|d| seen.insert(d.mac))
            .map(|mut d| {
                if let Some(name) = names.get(&d.mac) {
                    d.name.clone_from(name);
                }
                d
            })
            .collect();

        debug!("scan found {} device(s)", devices.len());
        Ok(devices)
    }

    /// Every device currently online, annotated against `blocked`.
    pub async fn list(
        &self,
        blocked: &BTreeSet<MacAddress>,
    ) -> Result<Vec<DeviceView>, DiscoveryError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .map(|device| DeviceView {
                blocked: blocked.contains(&device.mac),
                device,
                online: true,
            })
            .collect())
    }

    /// Looks up one device.  Falls back to an offline record when the device
    /// is not on the network but has a custom name.
    pub async fn get(
        &self,
        mac: MacAddress,
        blocked: bool,
    ) -> Result<Option<DeviceView>, DiscoveryError> {
        if let Some(device) = self.scan().await?.into_iter().find(|d| d.mac == mac) {
            return Ok(Some(DeviceView {
                device,
                blocked,
                online: true,
            }));
        }

        Ok(self.names.names().remove(&mac).map(|name| DeviceView {
            device: Device {
                mac,
                ip: UNKNOWN.to_string(),
                name,
                vendor: UNKNOWN.to_string(),
            },
            blocked,
            online: false,
        }))
    }

    pub fn rename(&self, mac: MacAddress, name: &str) -> Result<(), DiscoveryError> {
        self.names.set_name(mac, name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn device(raw: &str, ip: &str, vendor: &str) -> Device {
        Device {
            mac: mac(raw),
            ip: ip.to_string(),
            name: vendor.to_string(),
            vendor: vendor.to_string(),
        }
    }

    fn source_returning(devices: Vec<Device>) -> MockDeviceSource {
        let mut source = MockDeviceSource::new();
        source.expect_scan().returning(move || Ok(devices.clone()));
        source
    }

    fn names_returning(names: Vec<(&str, &str)>) -> MockDeviceNameRepository {
        let map: HashMap<MacAddress, String> = names
            .into_iter()
            .map(|(m, n)| (mac(m), n.to_string()))
            .collect();
        let mut repo = MockDeviceNameRepository::new();
        repo.expect_names().returning(move || map.clone());
        repo
    }

    #[tokio::test]
    async fn test_scan_keeps_first_sighting_per_address() {
        // Arrange
        let source = source_returning(vec![
            device("AA:BB:CC:DD:EE:01", "192.168.100.10", "Acme"),
            device("AA:BB:CC:DD:EE:02", "192.168.100.11", "Globex"),
            device("AA:BB:CC:DD:EE:01", "192.168.100.99", "Acme"),
        ]);
        let inventory = DeviceInventory::new(Arc::new(source), Arc::new(names_returning(vec![])));

        // Act
        let devices = inventory.scan().await.unwrap();

        // Assert
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].ip, "192.168.100.10");
    }

    #[tokio::test]
    async fn test_custom_names_override_scanned_names() {
        let source = source_returning(vec![device("AA:BB:CC:DD:EE:01", "10.0.0.2", "Acme")]);
        let names = names_returning(vec![("AA:BB:CC:DD:EE:01", "Kid's tablet")]);
        let inventory = DeviceInventory::new(Arc::new(source), Arc::new(names));

        let devices = inventory.scan().await.unwrap();

        assert_eq!(devices[0].name, "Kid's tablet");
        assert_eq!(devices[0].vendor, "Acme");
    }

    #[tokio::test]
    async fn test_list_annotates_blocked_devices() {
        // Arrange
        let source = source_returning(vec![
            device("AA:BB:CC:DD:EE:01", "10.0.0.2", "Acme"),
            device("AA:BB:CC:DD:EE:02", "10.0.0.3", "Acme"),
        ]);
        let inventory = DeviceInventory::new(Arc::new(source), Arc::new(names_returning(vec![])));
        let blocked = BTreeSet::from([mac("AA:BB:CC:DD:EE:02")]);

        // Act
        let views = inventory.list(&blocked).await.unwrap();

        // Assert
        assert!(!views[0].blocked);
        assert!(views[1].blocked);
        assert!(views.iter().all(|v| v.online));
    }

    #[tokio::test]
    async fn test_get_falls_back_to_named_offline_device() {
        let inventory = DeviceInventory::new(
            Arc::new(source_returning(vec![])),
            Arc::new(names_returning(vec![("AA:BB:CC:DD:EE:01", "Laptop")])),
        );

        let view = inventory
            .get(mac("AA:BB:CC:DD:EE:01"), true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(view.device.name, "Laptop");
        assert_eq!(view.device.ip, UNKNOWN);
        assert!(!view.online);
        assert!(view.blocked);
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_none() {
        let inventory = DeviceInventory::new(
            Arc::new(source_returning(vec![])),
            Arc::new(names_returning(vec![])),
        );

        let view = inventory.get(mac("AA:BB:CC:DD:EE:01"), false).await.unwrap();

        assert!(view.is_none());
    }

    #[tokio::test]
    async fn test_scan_failure_propagates() {
        let mut source = MockDeviceSource::new();
        source.expect_scan().returning(|| {
            Err(DiscoveryError::Timeout {
                command: "arp-scan".into(),
                timeout: Duration::from_secs(30),
            })
        });
        let inventory = DeviceInventory::new(Arc::new(source), Arc::new(names_returning(vec![])));

        assert!(inventory.scan().await.is_err());
    }

    #[test]
    fn test_rename_delegates_to_repository() {
        let mut repo = MockDeviceNameRepository::new();
        repo.expect_set_name()
            .with(eq(mac("AA:BB:CC:DD:EE:01")), eq("Printer"))
            .times(1)
            .returning(|_, _| Ok(()));
        let inventory = DeviceInventory::new(Arc::new(source_returning(vec![])), Arc::new(repo));

        inventory.rename(mac("AA:BB:CC:DD:EE:01"), "Printer").unwrap();
    }

    #[test]
    fn test_device_view_serializes_flat() {
        let view = DeviceView {
            device: device("AA:BB:CC:DD:EE:01", "10.0.0.2", "Acme"),
            blocked: true,
            online: true,
        };

        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["mac"], "AA:BB:CC:DD:EE:01");
        assert_eq!(value["ip"], "10.0.0.2");
        assert_eq!(value["blocked"], true);
        assert_eq!(value["online"], true);
    }
}
