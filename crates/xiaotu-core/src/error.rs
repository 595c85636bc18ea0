// ── Core error types ──
//
// Domain errors from xiaotu-core. Consumers never see HTTP status codes or
// envelope codes directly; the `From<xiaotu_api::Error>` impl folds the
// transport taxonomy into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach XiaoTu at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request to XiaoTu timed out")]
    Timeout,

    #[error("Rate limited by XiaoTu -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} on {device}")]
    Unsupported { operation: String, device: String },

    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Vendor envelope code, if the backend sent one.
        code: Option<i64>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the credentials or session need to be renewed by the user.
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<xiaotu_api::Error> for CoreError {
    fn from(err: xiaotu_api::Error) -> Self {
        match err {
            xiaotu_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            xiaotu_api::Error::Quota {
                retry_after_secs, ..
            } => CoreError::RateLimited { retry_after_secs },
            xiaotu_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status,
            },
            xiaotu_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.origin().ascii_serialization())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            xiaotu_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            xiaotu_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            xiaotu_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Unreadable response: {message}"),
                code: None,
                status: None,
            },
        }
    }
}
