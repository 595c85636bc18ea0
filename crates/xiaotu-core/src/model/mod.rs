// ── Domain model ──

mod device;

pub use device::{BRAND, Device, DeviceKind, MotionState};
