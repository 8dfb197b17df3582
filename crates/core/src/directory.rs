//! Display names for technicians and labels for assets.
//!
//! The engine only holds references to these entities; the directory is a
//! read-only lookup refreshed alongside the event set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A technician as returned by the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl Technician {
    /// "First Last", trimmed when either part is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// A serviceable asset as returned by the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl Asset {
    /// Serial number when known, otherwise the raw id.
    pub fn label(&self) -> &str {
        self.serial_number.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    technicians: HashMap<String, Technician>,
    assets: HashMap<String, Asset>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_technician(&mut self, technician: Technician) {
        self.technicians.insert(technician.id.clone(), technician);
    }

    pub fn insert_asset(&mut self, asset: Asset) {
        self.assets.insert(asset.id.clone(), asset);
    }

    /// Merge entries from another directory; newer entries win.
    pub fn merge(&mut self, other: Directory) {
        self.technicians.extend(other.technicians);
        self.assets.extend(other.assets);
    }

    pub fn technician(&self, id: &str) -> Option<&Technician> {
        self.technicians.get(id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    /// Display name for a technician id, falling back to the id itself.
    pub fn technician_name(&self, id: &str) -> String {
        self.technicians
            .get(id)
            .map(Technician::display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string())
    }

    /// Label for an asset id, falling back to the id itself.
    pub fn asset_label(&self, id: &str) -> String {
        self.assets
            .get(id)
            .map(|a| a.label().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn technician_count(&self) -> usize {
        self.technicians.len()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        let mut dir = Directory::new();
        dir.insert_technician(Technician {
            id: "t1".into(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
        });
        dir.insert_asset(Asset {
            id: "ac-1".into(),
            serial_number: Some("SN-0042".into()),
            brand: Some("Carrier".into()),
            model: None,
        });
        dir
    }

    #[test]
    fn known_ids_resolve_to_names() {
        let dir = directory();
        assert_eq!(dir.technician_name("t1"), "Ana Reyes");
        assert_eq!(dir.asset_label("ac-1"), "SN-0042");
    }

    #[test]
    fn unknown_ids_fall_back_to_raw_id() {
        let dir = directory();
        assert_eq!(dir.technician_name("t9"), "t9");
        assert_eq!(dir.asset_label("ac-9"), "ac-9");
    }

    #[test]
    fn merge_overwrites_existing_entries() {
        let mut dir = directory();
        let mut update = Directory::new();
        update.insert_technician(Technician {
            id: "t1".into(),
            first_name: "Ana".into(),
            last_name: "Santos".into(),
        });
        dir.merge(update);
        assert_eq!(dir.technician_name("t1"), "Ana Santos");
        assert_eq!(dir.technician_count(), 1);
        assert_eq!(dir.asset_count(), 1);
    }
}
