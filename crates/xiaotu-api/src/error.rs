use thiserror::Error;

/// Coarse failure class the polling layer acts on.
///
/// Every [`Error`] maps onto exactly one kind; callers that only care about
/// "re-login vs. retry later" should branch on this instead of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Session rejected or expired. A fresh login (or new credentials) is needed.
    Auth,
    /// Rate limited by the backend.
    Quota,
    /// The backend answered, but reported a logical failure.
    Api,
    /// The request never produced a usable response.
    Transport,
}

/// Top-level error type for the `xiaotu-api` crate.
///
/// Vendor envelopes, HTTP status lines and network failures are all folded
/// into these variants before they leave the client. `xiaotu-core` maps
/// them into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed, or the backend rejected the session token.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Rate limiting ───────────────────────────────────────────────
    /// Quota exceeded (HTTP 429, or 403 mentioning a quota).
    #[error("Quota exceeded -- retry after {retry_after_secs}s: {message}")]
    Quota {
        message: String,
        retry_after_secs: u64,
    },

    // ── Vendor API ──────────────────────────────────────────────────
    /// Non-success envelope code or HTTP error status.
    #[error("XiaoTu API error: {message}")]
    Api {
        message: String,
        /// Envelope `code`, when the body carried one.
        code: Option<i64>,
        /// HTTP status, when the failure came from the status line.
        status: Option<u16>,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Proxy, TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Classify this error into the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::Quota { .. } => ErrorKind::Quota,
            Self::Api { .. } | Self::Deserialization { .. } => ErrorKind::Api,
            Self::Transport(_) | Self::InvalidUrl(_) | Self::Tls(_) => ErrorKind::Transport,
        }
    }

    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}
