// ── Polling coordinator ──
//
// Keeps one account's registry fresh. A background task refreshes it on a
// fixed interval; every outcome is classified into "needs re-auth" or
// "update failed, will retry" and published on a `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xiaotu_api::SessionSnapshot;

use crate::account::Account;
use crate::config::AccountConfig;
use crate::error::CoreError;
use crate::lock::DoorLock;
use crate::model::Device;
use crate::store::DeviceStore;

// ── UpdateStatus ─────────────────────────────────────────────────

/// Outcome of the latest refresh, observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No refresh has completed yet. Counts as failed.
    Pending,
    Ok,
    /// Soft failure. The next tick retries.
    Failed { reason: String },
    /// The backend rejected the credentials. Periodic refresh is suspended
    /// until the host re-authenticates.
    NeedsReauth { reason: String },
}

impl UpdateStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }

    fn into_result(self) -> Result<(), CoreError> {
        match self {
            Self::Ok => Ok(()),
            Self::Pending => Err(CoreError::UpdateFailed {
                message: "no refresh has completed".into(),
            }),
            Self::Failed { reason } => Err(CoreError::UpdateFailed { message: reason }),
            Self::NeedsReauth { reason } => Err(CoreError::AuthenticationFailed { message: reason }),
        }
    }
}

// ── Coordinator ──────────────────────────────────────────────────

/// Entry point for hosts.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns the account, the
/// refresh schedule and the status channel.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: AccountConfig,
    account: Account,
    status: watch::Sender<UpdateStatus>,
    /// Held for the duration of a refresh. At most one runs at a time.
    in_flight: Mutex<()>,
    /// Refreshes that ran to completion and published a status.
    completed: AtomicU64,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the client and account for `config`. Does not touch the
    /// network; call [`start()`](Self::start) for that.
    pub fn new(config: AccountConfig) -> Result<Self, CoreError> {
        let account = Account::from_config(&config)?;
        Ok(Self::with_account(config, account))
    }

    pub fn with_account(config: AccountConfig, account: Account) -> Self {
        let (status, _) = watch::channel(UpdateStatus::Pending);
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                account,
                status,
                in_flight: Mutex::new(()),
                completed: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &AccountConfig {
        &self.inner.config
    }

    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        self.inner.account.store()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first refresh, then schedule the periodic one.
    ///
    /// The first refresh's error is returned as-is so the host can tell a
    /// bad login from an unreachable backend.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.try_refresh().await?;

        let period = self.inner.config.refresh_interval;
        if !period.is_zero() {
            let coordinator = self.clone();
            let cancel = self.inner.cancel.clone();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(refresh_task(coordinator, period, cancel)));
        }

        info!(
            devices = self.store().len(),
            interval_secs = period.as_secs(),
            "coordinator started"
        );
        Ok(())
    }

    /// Stop the periodic refresh and wait for it to wind down.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator stopped");
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Refresh the registry and return the resulting status.
    pub async fn refresh(&self) -> UpdateStatus {
        // The outcome is published on the status channel either way.
        let _ = self.try_refresh().await;
        self.status()
    }

    /// Refresh the registry, returning the failure as an error.
    ///
    /// A call arriving while another refresh is running waits for it and
    /// reports its outcome instead of starting a second one. If that
    /// refresh is dropped before it finishes, the waiter runs its own.
    pub async fn try_refresh(&self) -> Result<(), CoreError> {
        let seen = self.inner.completed.load(Ordering::Acquire);
        let _guard = if let Ok(guard) = self.inner.in_flight.try_lock() {
            guard
        } else {
            debug!("refresh already in flight, waiting for it");
            let guard = self.inner.in_flight.lock().await;
            if self.inner.completed.load(Ordering::Acquire) != seen {
                return self.status().into_result();
            }
            debug!("joined refresh was abandoned, running one");
            guard
        };

        let outcome = self.inner.account.get_devices(true).await;
        self.inner.completed.fetch_add(1, Ordering::Release);
        match outcome {
            Ok(devices) => {
                self.store().clear_motion();
                debug!(devices = devices.len(), "refresh complete");
                self.inner.status.send_replace(UpdateStatus::Ok);
                Ok(())
            }
            Err(e) if e.is_reauth_required() => {
                warn!(error = %e, "re-authentication required");
                self.inner.status.send_replace(UpdateStatus::NeedsReauth {
                    reason: e.to_string(),
                });
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "update failed, will retry");
                self.inner.status.send_replace(UpdateStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ── State observation ────────────────────────────────────────

    pub fn status(&self) -> UpdateStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UpdateStatus> {
        self.inner.status.subscribe()
    }

    /// Whether the latest refresh succeeded. False until the first one does.
    pub fn last_update_success(&self) -> bool {
        self.inner.status.borrow().is_success()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.store().snapshot()
    }

    /// Session to persist for the next start, if one is cached.
    pub fn session_snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.account.client().session_snapshot()
    }

    // ── Lock control ─────────────────────────────────────────────

    /// Lock surfaces for every device that supports lock control.
    pub fn locks(&self) -> Vec<DoorLock> {
        self.store()
            .devices()
            .into_iter()
            .filter(Device::supports_lock_control)
            .map(|device| DoorLock::attach(self.clone(), device.id))
            .collect()
    }

    /// Drive `device_id` towards `locked`.
    pub async fn command(&self, device_id: &str, locked: bool) -> Result<(), CoreError> {
        let lock = DoorLock::new(self.clone(), device_id)?;
        if locked {
            lock.lock().await
        } else {
            lock.unlock().await
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically refresh the registry until cancelled.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if matches!(coordinator.status(), UpdateStatus::NeedsReauth { .. }) {
                    debug!("skipping refresh until re-authenticated");
                } else {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        _ = coordinator.refresh() => {}
                    }
                }
            }
        }
    }
}
