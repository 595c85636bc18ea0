// Shared transport configuration for building reqwest::Client instances.
//
// The vendor backend only answers requests that look like they come from
// its WeChat mini-program, so the fixed header set is installed here as
// client defaults. Per-request headers of the same name win.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use url::Url;

use crate::error::Error;

/// Default vendor host.
pub const DEFAULT_HOST: &str = "https://wap.anjucloud.com";

/// Page the mini-program serves requests from.
pub const MINI_PROGRAM_REFERER: &str =
    "https://servicewechat.com/wxcc9f1fa2912a152f/64/page-frame.html";

/// User agent of the WeChat desktop mini-program runtime.
pub const MINI_PROGRAM_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36 \
    MicroMessenger/6.8.0(0x16080000) NetType/WIFI MiniProgramEnv/Mac MacWechat/WMPF \
    MacWechat/3.8.7(0x13080710) XWEB/1191";

/// XHR marker header the mini-program runtime attaches.
pub const XHR_HEADER: &str = "xweb_xhr";

/// Transport settings for the vendor HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Outbound proxy for both `http://` and `https://` traffic.
    pub proxy: Option<Url>,
    /// Extra CA certificate (PEM), typically the proxy's.
    pub ca_cert: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            proxy: None,
            ca_cert: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` carrying the vendor header set.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(vendor_headers());

        if let Some(ref proxy) = self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| Error::Tls(format!("invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(ref path) = self.ca_cert {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// The fixed header set sent with every request.
pub fn vendor_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(MINI_PROGRAM_REFERER));
    headers.insert(USER_AGENT, HeaderValue::from_static(MINI_PROGRAM_USER_AGENT));
    headers.insert(
        HeaderName::from_static(XHR_HEADER),
        HeaderValue::from_static("1"),
    );
    headers
}
