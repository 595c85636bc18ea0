// xiaotu-api: Async Rust client for the XiaoTu access-control web service

pub mod auth;
pub mod client;
mod doors;
pub mod error;
pub mod models;
pub mod response_log;
pub mod transport;
mod user;

pub use auth::{Credentials, SESSION_VALIDITY_SECS, Session, SessionSnapshot};
pub use client::{QuotaRetry, XiaoTuClient};
pub use error::{Error, ErrorKind};
pub use models::{DoorRecord, UserInfo};
pub use response_log::{AnonymizedResponse, ResponseBody, ResponseLog};
pub use transport::{DEFAULT_HOST, TransportConfig};
