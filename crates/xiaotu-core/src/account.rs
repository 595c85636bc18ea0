// ── Account: device registry over one XiaoTu login ──
//
// Fetches the doors visible to the resident, keeps them in a `DeviceStore`
// and caches the resident profile. Errors pass through as `CoreError`;
// classifying them is the coordinator's job.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;
use xiaotu_api::{UserInfo, XiaoTuClient};

use crate::config::AccountConfig;
use crate::error::CoreError;
use crate::model::Device;
use crate::store::{DeviceStore, lock_records};

/// Title prefix the host shows for an account.
pub const TITLE_PREFIX: &str = "XiaoTu Door";

pub struct Account {
    client: Arc<XiaoTuClient>,
    store: Arc<DeviceStore>,
    user: OnceCell<UserInfo>,
}

impl Account {
    pub fn new(client: Arc<XiaoTuClient>) -> Self {
        Self {
            client,
            store: Arc::new(DeviceStore::new()),
            user: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AccountConfig) -> Result<Self, CoreError> {
        Ok(Self::new(Arc::new(config.build_client()?)))
    }

    pub fn client(&self) -> &Arc<XiaoTuClient> {
        &self.client
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// The account's devices.
    ///
    /// Served from the registry when it is populated, unless `force_init`
    /// asks for a fresh listing. A failed fetch leaves the registry as it
    /// was.
    pub async fn get_devices(&self, force_init: bool) -> Result<Arc<Vec<Arc<Device>>>, CoreError> {
        if force_init || self.store.is_empty() {
            debug!(force_init, "fetching door listing");
            let records = self.client.list_doors().await?;
            self.store.apply_refresh(&lock_records(records));
        }
        Ok(self.store.snapshot())
    }

    /// Register or merge a device from a raw record. No I/O.
    pub fn add_device(&self, data: &Map<String, Value>) -> Result<Device, CoreError> {
        self.store.add_device(data)
    }

    /// Look up a device by id, ignoring case. No I/O.
    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.store.get_device(id)
    }

    /// The resident's profile, fetched once and cached.
    pub async fn get_user(&self) -> Result<UserInfo, CoreError> {
        let user = self
            .user
            .get_or_try_init(|| async { self.client.get_user_info().await })
            .await?;
        Ok(user.clone())
    }

    /// Display title for this account, e.g. `XiaoTu Door - Sunrise Gardens`.
    pub async fn title(&self) -> Result<String, CoreError> {
        let user = self.get_user().await?;
        Ok(account_title(&user))
    }
}

pub fn account_title(user: &UserInfo) -> String {
    match user.village_name.as_deref() {
        Some(village) if !village.is_empty() => format!("{TITLE_PREFIX} - {village}"),
        _ => TITLE_PREFIX.to_owned(),
    }
}
