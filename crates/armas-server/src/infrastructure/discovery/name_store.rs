//! JSON file of operator-assigned device names.
//!
//! ```json
//! {
//!   "AA:BB:CC:DD:EE:01": { "name": "Living room TV" }
//! }
//! ```
//!
//! A missing or unreadable file is treated as "no names yet"; the first
//! `set_name` creates it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use armas_core::MacAddress;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::device_inventory::{DeviceNameRepository, DiscoveryError};

#[derive(Debug, Serialize, Deserialize)]
struct NameEntry {
    name: String,
}

/// A [`DeviceNameRepository`] stored as pretty-printed JSON.
pub struct JsonDeviceNameStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonDeviceNameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, NameEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("cannot read {}: {e}", self.path.display());
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring corrupt {}: {e}", self.path.display());
            BTreeMap::new()
        })
    }
}

impl DeviceNameRepository for JsonDeviceNameStore {
    fn names(&self) -> HashMap<MacAddress, String> {
        self.load()
            .into_iter()
            .filter_map(|(key, entry)| Some((MacAddress::parse(&key).ok()?, entry.name)))
            .collect()
    }

    fn set_name(&self, mac: MacAddress, name: &str) -> Result<(), DiscoveryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = self.load();
        entries.insert(
            mac.to_string(),
            NameEntry {
                name: name.to_string(),
            },
        );

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DiscoveryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, content).map_err(|source| DiscoveryError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!("{mac} named {name:?}");
        Ok(())
    }
}
