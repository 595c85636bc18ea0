// ── Device registry storage ──
//
// Insertion-ordered devices keyed by upper-cased id, with push-based change
// notification via `watch` channels. Every mutation rebuilds the snapshot
// subscribers receive.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;
use xiaotu_api::models::value_as_string;

use crate::error::CoreError;
use crate::model::{Device, MotionState};

/// Lookup key for a device id. Ids are unique case-insensitively.
pub(crate) fn device_key(id: &str) -> String {
    id.to_uppercase()
}

/// Reactive store of the account's devices.
pub struct DeviceStore {
    pub(crate) devices: RwLock<IndexMap<String, Device>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
    pub(crate) last_fetched: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_fetched, _) = watch::channel(None);
        Self {
            devices: RwLock::new(IndexMap::new()),
            snapshot,
            last_fetched,
        }
    }

    /// Insert a device, or merge into the existing one with the same id.
    ///
    /// Pure: no I/O. Matching ignores case; the stored id keeps the casing
    /// of the first observation.
    pub fn add_device(&self, data: &Map<String, Value>) -> Result<Device, CoreError> {
        let device = {
            let mut devices = self.write();
            upsert(&mut devices, data)
                .cloned()
                .ok_or_else(|| CoreError::ValidationFailed {
                    message: "device record has no id".into(),
                })?
        };
        self.publish();
        Ok(device)
    }

    /// Look up a device by id, ignoring case.
    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.read().get(&device_key(id)).cloned()
    }

    /// All devices in insertion order.
    pub fn devices(&self) -> Vec<Device> {
        self.read().values().cloned().collect()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// When the last successful full refresh landed.
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        *self.last_fetched.borrow()
    }

    /// Set the optimistic motion state of one device and publish it.
    pub fn set_motion(&self, id: &str, motion: MotionState) -> Result<Device, CoreError> {
        let device = {
            let mut devices = self.write();
            let device =
                devices
                    .get_mut(&device_key(id))
                    .ok_or_else(|| CoreError::DeviceNotFound {
                        identifier: id.to_owned(),
                    })?;
            device.motion = motion;
            device.clone()
        };
        debug!(device = %device.id, ?motion, "motion state set");
        self.publish();
        Ok(device)
    }

    /// Drop every optimistic motion state. Publishes only if one was set.
    pub fn clear_motion(&self) {
        let changed = {
            let mut devices = self.write();
            let mut changed = false;
            for device in devices.values_mut() {
                if device.motion != MotionState::Idle {
                    device.motion = MotionState::Idle;
                    changed = true;
                }
            }
            changed
        };
        if changed {
            self.publish();
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Device>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Device>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the snapshot and broadcast it to subscribers.
    pub(crate) fn publish(&self) {
        let values: Vec<Arc<Device>> = self.read().values().cloned().map(Arc::new).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

/// Merge `data` into the device with the same id, creating it if needed.
///
/// Returns `None` when `data` carries no usable id.
pub(crate) fn upsert<'a>(
    devices: &'a mut IndexMap<String, Device>,
    data: &Map<String, Value>,
) -> Option<&'a Device> {
    let id = data.get("id").and_then(value_as_string)?;
    match devices.entry(device_key(&id)) {
        Entry::Occupied(entry) => {
            let device = entry.into_mut();
            device.merge(data);
            Some(&*device)
        }
        Entry::Vacant(entry) => Device::from_record(data).map(|device| &*entry.insert(device)),
    }
}
