// ── Device domain type ──
//
// One concrete record for every door the account exposes. The raw vendor
// fields are kept verbatim in `attributes`; the typed fields are derived
// from them on every merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xiaotu_api::models::{value_as_flag, value_as_string};

/// Manufacturer shown for every device.
pub const BRAND: &str = "XiaoTu";

/// What a device is, as far as control goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Lock,
    #[default]
    Unknown,
}

impl DeviceKind {
    fn from_type(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("lock") => Self::Lock,
            _ => Self::Unknown,
        }
    }
}

/// A lock command in progress, shown until the next authoritative refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionState {
    #[default]
    Idle,
    Locking,
    Unlocking,
}

/// A door known to the account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    /// Vendor id, in the casing it was first seen with.
    pub id: String,
    pub kind: DeviceKind,
    pub name: String,
    pub address: Option<String>,
    pub model: Option<String>,
    pub image_url: Option<String>,
    /// Last state reported by the backend. Locked until told otherwise.
    pub locked: bool,
    pub motion: MotionState,
    /// Every vendor field from the latest observation.
    pub attributes: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Create a device from its first observation.
    ///
    /// Returns `None` when the record carries no usable `id`.
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let id = record.get("id").and_then(value_as_string)?;
        let mut device = Self {
            name: id.clone(),
            id,
            kind: DeviceKind::Unknown,
            address: None,
            model: None,
            image_url: None,
            locked: true,
            motion: MotionState::Idle,
            attributes: Map::new(),
            updated_at: Utc::now(),
        };
        device.merge(record);
        Some(device)
    }

    /// Fold a (possibly partial) observation into this device.
    ///
    /// Fields absent from `partial` keep their previous values. The id
    /// keeps its original casing.
    pub fn merge(&mut self, partial: &Map<String, Value>) {
        for (key, value) in partial {
            if key == "id" {
                continue;
            }
            self.attributes.insert(key.clone(), value.clone());
        }
        self.attributes
            .insert("id".into(), Value::String(self.id.clone()));

        self.kind = DeviceKind::from_type(self.attributes.get("type"));
        if let Some(name) = self.text(&["name", "doorName"]) {
            self.name = name;
        }
        self.address = self.text(&["address", "doorAddress"]);
        self.model = self.text(&["model"]);
        self.image_url = self
            .attributes
            .get("imageItem")
            .and_then(|item| item.get("originalImage"))
            .and_then(Value::as_str)
            .map(String::from);
        if let Some(open) = partial.get("isOpen").and_then(value_as_flag) {
            self.locked = !open;
        }
        self.updated_at = Utc::now();
    }

    pub fn supports_lock_control(&self) -> bool {
        self.kind == DeviceKind::Lock
    }

    /// Displayed lock state: the pending command's target while one is in
    /// flight, otherwise the backend's.
    pub fn is_locked(&self) -> bool {
        match self.motion {
            MotionState::Locking => true,
            MotionState::Unlocking => false,
            MotionState::Idle => self.locked,
        }
    }

    /// The vendor's own type before it was re-tagged.
    pub fn vendor_type(&self) -> Option<&str> {
        self.attributes.get("_type").and_then(Value::as_str)
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.attributes.get(*k).and_then(value_as_string))
            .find(|s| !s.is_empty())
    }
}
