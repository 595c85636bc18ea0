// xiaotu-core: Device registry, polling and lock control on top of xiaotu-api.

pub mod account;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::{Account, account_title};
pub use config::AccountConfig;
pub use coordinator::{Coordinator, UpdateStatus};
pub use error::CoreError;
pub use lock::DoorLock;
pub use model::{BRAND, Device, DeviceKind, MotionState};
pub use store::DeviceStore;

pub use xiaotu_api::{DEFAULT_HOST, SessionSnapshot, UserInfo};
