// ── Full refresh application logic ──
//
// Turns the raw `getDoor` listing into lock records and applies it to the
// store as one unit: upsert everything listed, prune what disappeared,
// publish once.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use xiaotu_api::DoorRecord;

use super::DeviceStore;
use super::device_store::{device_key, upsert};

/// Whether a listed record is a door the resident can operate.
///
/// Records are kept when they are plain doors, or when their status is
/// active (`"0"`), whatever their type.
pub(crate) fn is_listed_door(record: &DoorRecord) -> bool {
    record.door_type() == Some("door") || record.status().as_deref() == Some("0")
}

/// Re-tag a record as a lock, keeping the vendor type under `_type`.
pub(crate) fn tag_as_lock(mut record: DoorRecord) -> Map<String, Value> {
    let vendor_type = record.get("type").cloned().unwrap_or(Value::Null);
    record.insert("_type", vendor_type);
    record.insert("type", Value::String("lock".into()));
    record.into_attributes()
}

/// Filter and tag a raw listing.
pub(crate) fn lock_records(records: Vec<DoorRecord>) -> Vec<Map<String, Value>> {
    let total = records.len();
    let locks: Vec<_> = records
        .into_iter()
        .filter(is_listed_door)
        .map(tag_as_lock)
        .collect();
    debug!(total, kept = locks.len(), "filtered door listing");
    locks
}

impl DeviceStore {
    /// Apply a full listing.
    ///
    /// Listed devices are upserted in place, devices missing from the
    /// listing are removed, and subscribers see a single update.
    pub(crate) fn apply_refresh(&self, records: &[Map<String, Value>]) {
        {
            let mut devices = self.write();
            let mut seen = Vec::with_capacity(records.len());
            for record in records {
                match upsert(&mut devices, record) {
                    Some(device) => seen.push(device_key(&device.id)),
                    None => warn!("skipping door record without id"),
                }
            }

            let before = devices.len();
            devices.retain(|key, _| seen.contains(key));
            let pruned = before - devices.len();
            if pruned > 0 {
                debug!(pruned, "removed devices no longer listed");
            }
        }

        self.last_fetched.send_replace(Some(Utc::now()));
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn door(value: Value) -> DoorRecord {
        serde_json::from_value(value).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn inactive_non_doors_are_dropped() {
        assert!(!is_listed_door(&door(json!({"doorType": "gate", "status": "1"}))));
        assert!(!is_listed_door(&door(json!({"id": "X"}))));
    }

    #[test]
    fn doors_are_kept_regardless_of_status() {
        assert!(is_listed_door(&door(json!({"doorType": "door", "status": "1"}))));
        assert!(is_listed_door(&door(json!({"doorType": "gate", "status": 0}))));
    }

    #[test]
    fn tagging_moves_the_vendor_type() {
        let tagged = tag_as_lock(door(json!({"id": "D1", "type": "unit"})));
        assert_eq!(tagged.get("_type"), Some(&json!("unit")));
        assert_eq!(tagged.get("type"), Some(&json!("lock")));
    }

    #[test]
    fn refresh_upserts_and_prunes() {
        let store = DeviceStore::new();
        let first = lock_records(vec![
            door(json!({"id": "D1", "doorType": "door", "name": "North"})),
            door(json!({"id": "D2", "doorType": "door", "name": "South"})),
        ]);
        store.apply_refresh(&first);
        assert_eq!(store.len(), 2);
        assert!(store.last_fetched_at().is_some());

        let second = lock_records(vec![door(
            json!({"id": "d1", "doorType": "door", "name": "North Gate"}),
        )]);
        store.apply_refresh(&second);

        let devices = store.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "D1");
        assert_eq!(devices[0].name, "North Gate");
        assert!(devices[0].supports_lock_control());
    }
}
