// ── Runtime account configuration ──
//
// Describes *how* to reach one XiaoTu account. Carries credentials and
// tuning, never touches disk. The host builds an `AccountConfig` and
// hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use xiaotu_api::{
    Credentials, QuotaRetry, SESSION_VALIDITY_SECS, SessionSnapshot, TransportConfig, XiaoTuClient,
};

use crate::error::CoreError;

/// Poll period: half the session validity window.
pub const DEFAULT_REFRESH_INTERVAL: Duration =
    Duration::from_secs(SESSION_VALIDITY_SECS.unsigned_abs() / 2);

/// Wait between a lock command and the reconciling refresh.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a single account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Vendor base URL, e.g. `https://wap.anjucloud.com`.
    pub host: Url,
    /// WeChat openid of the resident.
    pub openid: String,
    pub client_id: SecretString,
    /// Session persisted from a previous run. Skips one login if still valid.
    pub session: Option<SessionSnapshot>,
    /// Capture anonymized responses for diagnostics.
    pub log_responses: bool,
    pub proxy: Option<Url>,
    /// Extra CA certificate (PEM), typically for an intercepting proxy.
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
    pub refresh_interval: Duration,
    pub settle_delay: Duration,
    pub quota_retry: QuotaRetry,
}

impl AccountConfig {
    pub fn new(host: Url, openid: impl Into<String>, client_id: SecretString) -> Self {
        Self {
            host,
            openid: openid.into(),
            client_id,
            session: None,
            log_responses: false,
            proxy: None,
            ca_cert: None,
            timeout: DEFAULT_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            quota_retry: QuotaRetry::default(),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            proxy: self.proxy.clone(),
            ca_cert: self.ca_cert.clone(),
        }
    }

    /// Build the vendor client this configuration describes.
    pub fn build_client(&self) -> Result<XiaoTuClient, CoreError> {
        let credentials = Credentials::new(self.openid.clone(), self.client_id.clone());
        let mut client = XiaoTuClient::new(self.host.clone(), credentials, &self.transport())?
            .with_quota_retry(self.quota_retry);
        if let Some(ref snapshot) = self.session {
            client = client.with_session(snapshot.clone());
        }
        client.response_log().set_enabled(self.log_responses);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_is_half_the_session_window() {
        assert_eq!(DEFAULT_REFRESH_INTERVAL, Duration::from_secs(3 * 60 * 60));
    }
}
