// ── Reactive device registry ──

mod device_store;
mod refresh;

pub use device_store::DeviceStore;
pub(crate) use refresh::lock_records;
