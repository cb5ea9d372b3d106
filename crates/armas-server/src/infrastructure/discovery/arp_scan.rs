//! `arp-scan` device source with a kernel ARP-table fallback.
//!
//! `arp-scan --interface <if> <range>` actively probes the range and prints one
//! tab-separated line per reply:
//!
//! ```text
//! 192.168.100.12	aa:bb:cc:dd:ee:01	Raspberry Pi Trading Ltd
//! 192.168.100.14	aa:bb:cc:dd:ee:02	(Unknown)
//! 192.168.100.14	aa:bb:cc:dd:ee:02	(Unknown) (DUP: 2)
//! ```
//!
//! When the tool is missing, fails, or finds nothing, the source reads
//! `/proc/net/arp` instead.  That table only knows about hosts the router has
//! talked to recently and carries no vendor information.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use armas_core::domain::device::UNKNOWN;
use armas_core::{Device, MacAddress};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::device_inventory::{DeviceSource, DiscoveryError};
use crate::infrastructure::storage::config::NetworkConfig;

const PROC_ARP: &str = "/proc/net/arp";

/// A [`DeviceSource`] backed by `arp-scan`.
#[derive(Debug, Clone)]
pub struct ArpScanSource {
    interface: String,
    range: String,
    use_sudo: bool,
    timeout: Duration,
    arp_table: PathBuf,
}

impl ArpScanSource {
    pub fn new(config: &NetworkConfig, use_sudo: bool) -> Self {
        Self {
            interface: config.interface.clone(),
            range: config.range.clone(),
            use_sudo,
            timeout: Duration::from_secs(config.scan_timeout_secs),
            arp_table: PathBuf::from(PROC_ARP),
        }
    }

    /// Reads the fallback neighbour table from `path` instead of `/proc/net/arp`.
    #[must_use]
    pub fn with_arp_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.arp_table = path.into();
        self
    }

    async fn run_arp_scan(&self) -> Result<Vec<Device>, DiscoveryError> {
        let mut argv = vec![
            "--interface".to_string(),
            self.interface.clone(),
            self.range.clone(),
        ];
        let program = if self.use_sudo {
            argv.insert(0, "arp-scan".to_string());
            "sudo".to_string()
        } else {
            "arp-scan".to_string()
        };
        let command = format!("{program} {}", argv.join(" "));
        debug!("running `{command}`");

        let mut cmd = Command::new(&program);
        cmd.args(&argv).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(DiscoveryError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
            Ok(Err(source)) => return Err(DiscoveryError::Spawn { program, source }),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(DiscoveryError::CommandFailed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_arp_scan(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn read_arp_table(&self) -> Result<Vec<Device>, DiscoveryError> {
        let content = tokio::fs::read_to_string(&self.arp_table)
            .await
            .map_err(|source| DiscoveryError::Io {
                path: self.arp_table.clone(),
                source,
            })?;
        Ok(parse_proc_arp(&content))
    }
}

#[async_trait]
impl DeviceSource for ArpScanSource {
    async fn scan(&self) -> Result<Vec<Device>, DiscoveryError> {
        let scan_error = match self.run_arp_scan().await {
            Ok(devices) if !devices.is_empty() => return Ok(devices),
            Ok(_) => {
                debug!("arp-scan found nothing; reading {}", self.arp_table.display());
                None
            }
            Err(e) => {
                warn!("arp-scan failed, falling back to the ARP table: {e}");
                Some(e)
            }
        };

        match self.read_arp_table().await {
            Ok(devices) => Ok(devices),
            Err(table_error) => Err(scan_error.unwrap_or(table_error)),
        }
    }
}

/// Parses `arp-scan` output.  Header, footer, and `DUP:` lines are skipped.
pub fn parse_arp_scan(output: &str) -> Vec<Device> {
    output
        .lines()
        .filter(|line| !line.contains("DUP:"))
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let ip: Ipv4Addr = fields.next()?.trim().parse().ok()?;
            let mac = MacAddress::find_in(fields.next()?)?;
            let vendor = match fields.next().map(str::trim) {
                None | Some("" | "(Unknown)") => UNKNOWN.to_string(),
                Some(v) => v.to_string(),
            };
            Some(Device {
                mac,
                ip: ip.to_string(),
                name: vendor.clone(),
                vendor,
            })
        })
        .collect()
}

/// Parses the kernel neighbour table.  Incomplete entries, which show an
/// all-zero hardware address, are skipped.
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.100.1    0x1         0x2         aa:bb:cc:dd:ee:01     *        eth0
/// ```
pub fn parse_proc_arp(content: &str) -> Vec<Device> {
    const INCOMPLETE: MacAddress = MacAddress::from_octets([0; 6]);

    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let ip: Ipv4Addr = cols.first()?.parse().ok()?;
            let mac = MacAddress::parse(cols.get(3)?).ok()?;
            (mac != INCOMPLETE).then(|| Device::unnamed(mac, ip.to_string()))
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
