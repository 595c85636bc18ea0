// XiaoTu HTTP client
//
// Wraps `reqwest::Client` with URL construction, envelope unwrapping and
// error classification. Endpoint groups (auth, doors, user) are inherent
// methods in their own files; this module only deals with moving a request
// over the wire and turning the answer into a value or a typed error.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{Credentials, Session, SessionSnapshot, SessionStore};
use crate::error::Error;
use crate::models::Envelope;
use crate::response_log::ResponseLog;
use crate::transport::TransportConfig;

/// Assumed `retry-after` when a quota response names no number.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Backoff policy for quota responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRetry {
    /// Retries after the first attempt. The error propagates once spent.
    pub max_retries: u32,
    /// Length of one "second" of backoff. Tests shrink this.
    pub unit: Duration,
}

impl Default for QuotaRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl QuotaRetry {
    /// Sleep before the next attempt: twice the advertised wait.
    pub fn delay_for(&self, retry_after_secs: u64) -> Duration {
        let units = u32::try_from(retry_after_secs.saturating_mul(2)).unwrap_or(u32::MAX);
        self.unit.saturating_mul(units)
    }
}

/// One outbound call, before it touches the wire.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    path: &'static str,
    query: Vec<(&'static str, String)>,
    headers: Vec<(&'static str, String)>,
    form: Option<Vec<(&'static str, String)>>,
    /// Token the request authenticates with, if any.
    session_token: Option<String>,
}

impl ApiRequest {
    fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            form: None,
            session_token: None,
        }
    }

    pub(crate) fn get(path: &'static str) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn post(path: &'static str) -> Self {
        Self::new(Method::POST, path)
    }

    pub(crate) fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub(crate) fn form(mut self, fields: Vec<(&'static str, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    /// Mark the request as sent under `session`. A rejection then only
    /// invalidates that session, not one obtained since.
    pub(crate) fn bound_to(mut self, session: &Session) -> Self {
        self.session_token = Some(session.token().expose_secret().to_owned());
        self
    }
}

/// Async client for the XiaoTu web service.
///
/// Owns the session cache and the diagnostic response log. Every method
/// returns the unwrapped `result` payload; the envelope never reaches the
/// caller.
pub struct XiaoTuClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    sessions: SessionStore,
    response_log: Arc<ResponseLog>,
    quota_retry: QuotaRetry,
}

impl XiaoTuClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            sessions: SessionStore::new(None),
            response_log: Arc::new(ResponseLog::default()),
            quota_retry: QuotaRetry::default(),
        }
    }

    /// Seed the cache with a session persisted by the host.
    pub fn with_session(mut self, snapshot: SessionSnapshot) -> Self {
        self.sessions = SessionStore::new(Some(snapshot.into()));
        self
    }

    /// Share a response log with the caller.
    pub fn with_response_log(mut self, log: Arc<ResponseLog>) -> Self {
        self.response_log = log;
        self
    }

    pub fn with_quota_retry(mut self, retry: QuotaRetry) -> Self {
        self.quota_retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn response_log(&self) -> &Arc<ResponseLog> {
        &self.response_log
    }

    pub(crate) fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The cached session in persistable form, valid or not.
    pub fn session_snapshot(&self) -> Option<SessionSnapshot> {
        self.sessions.current().map(|s| s.snapshot())
    }

    /// Forget the cached session. The next call logs in again.
    pub fn clear_session(&self) {
        debug!("clearing cached session");
        self.sessions.clear();
    }

    // ── Request pipeline ─────────────────────────────────────────────

    /// Send a request, backing off on quota responses, and decode `result`.
    pub(crate) async fn request<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, Error> {
        let mut retries = 0;
        let result = loop {
            match self.send_once(&req).await {
                Err(Error::Quota {
                    retry_after_secs, ..
                }) if retries < self.quota_retry.max_retries => {
                    retries += 1;
                    let delay = self.quota_retry.delay_for(retry_after_secs);
                    warn!(
                        path = req.path,
                        retries,
                        ?delay,
                        "quota exceeded, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        match result {
            Ok(value) => serde_json::from_value(value).map_err(|e| Error::Deserialization {
                message: format!("unexpected result for {}: {e}", req.path),
                body: String::new(),
            }),
            Err(e) => {
                if e.is_auth_expired() {
                    match req.session_token {
                        Some(ref token) if !self.sessions.clear_if(token) => {
                            debug!(path = req.path, "stale token rejected, keeping newer session");
                        }
                        Some(_) => {}
                        None => self.sessions.clear(),
                    }
                }
                Err(e)
            }
        }
    }

    async fn send_once(&self, req: &ApiRequest) -> Result<Value, Error> {
        let url = self.endpoint(req.path)?;
        debug!("{} {}", req.method, req.path);

        let mut builder = self.http.request(req.method.clone(), url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }
        if let Some(ref form) = req.form {
            builder = builder.form(form);
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(%status, bytes = body.len(), "response received");

        self.response_log.record(req.path, &body);
        parse_response(status, &body)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }
}

/// Classify a raw response and extract the envelope's `result`.
pub(crate) fn parse_response(status: StatusCode, body: &str) -> Result<Value, Error> {
    let forbidden = status == StatusCode::FORBIDDEN;
    if status == StatusCode::TOO_MANY_REQUESTS
        || (forbidden && body.to_ascii_lowercase().contains("quota"))
    {
        return Err(Error::Quota {
            message: preview(body),
            retry_after_secs: first_digit_run(body).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        });
    }

    if status == StatusCode::UNAUTHORIZED || forbidden {
        return Err(Error::Authentication {
            message: format!("session rejected (HTTP {status})"),
        });
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Api {
            message: format!("HTTP {status}: {}", preview(body)),
            code: None,
            status: Some(status.as_u16()),
        });
    }

    let envelope: Envelope = serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })?;

    let code = match envelope.code {
        None | Some(Value::Null) => None,
        Some(ref raw) => Some(envelope.code().ok_or_else(|| Error::Api {
            message: format!("unrecognized response code {raw}"),
            code: None,
            status: None,
        })?),
    };

    match code {
        None | Some(0 | 200) => Ok(envelope.result),
        Some(code @ (301 | 401)) => Err(Error::Authentication {
            message: envelope
                .description()
                .unwrap_or_else(|| format!("session rejected (code {code})")),
        }),
        Some(code) => Err(Error::Api {
            message: envelope
                .description()
                .unwrap_or_else(|| format!("request failed (code {code})")),
            code: Some(code),
            status: None,
        }),
    }
}

/// First run of ASCII digits anywhere in `body`.
pub(crate) fn first_digit_run(body: &str) -> Option<u64> {
    let start = body.find(|c: char| c.is_ascii_digit())?;
    let digits: String = body[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
