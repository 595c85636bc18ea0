// Session management
//
// The backend hands out an opaque token from `loginByOpenId`. It carries no
// expiry of its own, so the client treats it as valid for a fixed window
// after issue and logs in again once the window has passed or the backend
// rejects it. Concurrent callers share a single login per invalidation.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ApiRequest, XiaoTuClient};
use crate::error::Error;
use crate::models::LoginResult;

/// How long an issued token is trusted, in seconds.
pub const SESSION_VALIDITY_SECS: i64 = 6 * 60 * 60;

pub(crate) const LOGIN_PATH: &str = "/userClient/clientV2/loginByOpenId";

/// Account credentials. Immutable for the life of a client.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// WeChat openid identifying the resident.
    pub openid: String,
    /// Opaque client identifier issued to the mini-program install.
    pub client_id: SecretString,
}

impl Credentials {
    pub fn new(openid: impl Into<String>, client_id: SecretString) -> Self {
        Self {
            openid: openid.into(),
            client_id,
        }
    }
}

/// An issued session token.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SecretString, issued_at: DateTime<Utc>) -> Self {
        Self { token, issued_at }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Whether the token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.expose_secret().is_empty()
            && self.issued_at + TimeDelta::seconds(SESSION_VALIDITY_SECS) > now
    }

    /// Persistable form of this session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            token_id: self.token.expose_secret().to_owned(),
            fetched_at: self.issued_at,
        }
    }
}

/// A session as stored by the host between restarts.
///
/// Safe to persist and reload verbatim; seeding a client with a still-valid
/// snapshot skips one login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub token_id: String,
    pub fetched_at: DateTime<Utc>,
}

impl From<SessionSnapshot> for Session {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self::new(SecretString::from(snapshot.token_id), snapshot.fetched_at)
    }
}

/// Cached session plus the guard serializing logins.
///
/// Reads never wait on the guard; only a caller that finds no valid session
/// takes it.
#[derive(Debug, Default)]
pub(crate) struct SessionStore {
    current: RwLock<Option<Session>>,
    refresh: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub(crate) fn new(seed: Option<Session>) -> Self {
        Self {
            current: RwLock::new(seed),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn valid_at(&self, now: DateTime<Utc>) -> Option<Session> {
        self.current().filter(|s| s.is_valid_at(now))
    }

    fn replace(&self, session: Session) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Drop the cached session only if it still carries `token`.
    ///
    /// Returns whether it did.
    pub(crate) fn clear_if(&self, token: &str) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let matches = current
            .as_ref()
            .is_some_and(|s| s.token().expose_secret() == token);
        if matches {
            *current = None;
        }
        matches
    }

    pub(crate) fn clear(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl XiaoTuClient {
    /// A valid session, logging in first if the cached one is missing or stale.
    ///
    /// Callers arriving while a login is in flight wait for it and reuse
    /// its token instead of starting their own.
    pub async fn session(&self) -> Result<Session, Error> {
        if let Some(session) = self.sessions().valid_at(Utc::now()) {
            return Ok(session);
        }

        let _guard = self.sessions().refresh.lock().await;
        if let Some(session) = self.sessions().valid_at(Utc::now()) {
            debug!("session refreshed by a concurrent caller");
            return Ok(session);
        }

        self.login().await
    }

    /// Log in unconditionally and cache the new session.
    ///
    /// `POST /userClient/clientV2/loginByOpenId`. The last known token (or an
    /// empty string) is sent along as `tokenId`.
    pub async fn login(&self) -> Result<Session, Error> {
        let previous = self
            .sessions()
            .current()
            .map(|s| s.token().expose_secret().to_owned())
            .unwrap_or_default();

        let mut form = self.session_form(&previous);
        form.push(("openid", self.credentials().openid.clone()));

        debug!(openid = %self.credentials().openid, "logging in");
        let result: LoginResult = self
            .request(ApiRequest::post(LOGIN_PATH).form(form))
            .await?;

        let token = result.token().ok_or_else(|| Error::Authentication {
            message: "login response carried no token".into(),
        })?;

        let session = Session::new(SecretString::from(token.to_owned()), Utc::now());
        self.sessions().replace(session.clone());
        info!("login successful");
        Ok(session)
    }

    /// The fields the backend expects alongside any session-bound form post.
    pub(crate) fn session_form(&self, token_id: &str) -> Vec<(&'static str, String)> {
        vec![
            (
                "clientId",
                self.credentials().client_id.expose_secret().to_owned(),
            ),
            ("tokenId", token_id.to_owned()),
            ("version", "2".into()),
            ("net", "-1".into()),
            ("os", "4".into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_issued(secs_ago: i64, now: DateTime<Utc>) -> Session {
        Session::new(
            SecretString::from("T1".to_owned()),
            now - TimeDelta::seconds(secs_ago),
        )
    }

    #[test]
    fn session_valid_inside_window() {
        let now = Utc::now();
        assert!(session_issued(0, now).is_valid_at(now));
        assert!(session_issued(SESSION_VALIDITY_SECS - 1, now).is_valid_at(now));
    }

    #[test]
    fn session_expires_at_window_edge() {
        let now = Utc::now();
        assert!(!session_issued(SESSION_VALIDITY_SECS, now).is_valid_at(now));
        assert!(!session_issued(SESSION_VALIDITY_SECS + 60, now).is_valid_at(now));
    }

    #[test]
    fn empty_token_is_never_valid() {
        let now = Utc::now();
        let session = Session::new(SecretString::from(String::new()), now);
        assert!(!session.is_valid_at(now));
    }

    #[test]
    fn snapshot_survives_reload() {
        let now = Utc::now();
        let snapshot = session_issued(10, now).snapshot();
        let restored = Session::from(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert!(restored.is_valid_at(now));
    }

    #[test]
    fn store_clear_drops_session() {
        let store = SessionStore::new(Some(session_issued(0, Utc::now())));
        assert!(store.current().is_some());
        store.clear();
        assert!(store.current().is_none());
    }

    #[test]
    fn store_clear_if_keeps_a_newer_session() {
        let store = SessionStore::new(Some(session_issued(0, Utc::now())));
        assert!(!store.clear_if("T0"));
        assert!(store.current().is_some());
        assert!(store.clear_if("T1"));
        assert!(store.current().is_none());
    }
}
