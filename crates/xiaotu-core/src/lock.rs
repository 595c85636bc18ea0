// ── Lock control surface ──
//
// Commands publish an optimistic motion state first, then talk to the
// backend, wait for the door to settle and let a coordinator refresh
// write the authoritative state back.

use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::{Device, MotionState};

/// A controllable door lock.
#[derive(Clone)]
pub struct DoorLock {
    coordinator: Coordinator,
    device_id: String,
}

impl DoorLock {
    /// Attach to a known device that supports lock control.
    pub fn new(coordinator: Coordinator, device_id: &str) -> Result<Self, CoreError> {
        let device =
            coordinator
                .store()
                .get_device(device_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: device_id.to_owned(),
                })?;
        if !device.supports_lock_control() {
            return Err(CoreError::Unsupported {
                operation: "lock control".into(),
                device: device.id,
            });
        }
        Ok(Self::attach(coordinator, device.id))
    }

    pub(crate) fn attach(coordinator: Coordinator, device_id: String) -> Self {
        Self {
            coordinator,
            device_id,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device(&self) -> Option<Device> {
        self.coordinator.store().get_device(&self.device_id)
    }

    /// Displayed state, optimistic while a command is in flight.
    pub fn is_locked(&self) -> Option<bool> {
        self.device().map(|d| d.is_locked())
    }

    pub fn motion(&self) -> Option<MotionState> {
        self.device().map(|d| d.motion)
    }

    /// Available while the device is listed and the last refresh succeeded.
    pub fn is_available(&self) -> bool {
        self.coordinator.last_update_success() && self.device().is_some()
    }

    /// Release the latch.
    pub async fn unlock(&self) -> Result<(), CoreError> {
        let store = self.coordinator.store();
        store.set_motion(&self.device_id, MotionState::Unlocking)?;
        info!(device = %self.device_id, "unlocking");

        let client = self.coordinator.account().client();
        if let Err(e) = client.open_door(&self.device_id).await {
            warn!(device = %self.device_id, error = %e, "unlock failed");
            // Dropping the optimistic state restores the last reported one.
            let _ = store.set_motion(&self.device_id, MotionState::Idle);
            return Err(e.into());
        }

        self.settle().await;
        Ok(())
    }

    /// Show the door as locking until the next observation.
    ///
    /// The backend has no close command; doors relatch on their own.
    pub async fn lock(&self) -> Result<(), CoreError> {
        self.coordinator
            .store()
            .set_motion(&self.device_id, MotionState::Locking)?;
        info!(device = %self.device_id, "locking");

        self.settle().await;
        Ok(())
    }

    async fn settle(&self) {
        tokio::time::sleep(self.coordinator.config().settle_delay).await;
        let status = self.coordinator.refresh().await;
        debug!(device = %self.device_id, ?status, "reconciled after command");
    }
}
