// Bounded log of recent raw responses, anonymized, for diagnostics.
//
// Disabled by default. Turning it on or off drops whatever was buffered.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

/// Number of responses retained.
pub const RESPONSE_LOG_CAPACITY: usize = 10;

/// Replacement text for sensitive values.
pub const REDACTED: &str = "**REDACTED**";

const SENSITIVE_KEYS: &[&str] = &["tokenId", "access_token", "clientId", "openid", "mobile"];

/// Body of a captured response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// A captured response, labeled after the request path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnonymizedResponse {
    /// e.g. `xiaotuwap_door_getDoor.json`
    pub label: String,
    pub body: ResponseBody,
}

#[derive(Debug, Default)]
pub struct ResponseLog {
    enabled: AtomicBool,
    entries: Mutex<VecDeque<AnonymizedResponse>>,
}

impl ResponseLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(VecDeque::with_capacity(RESPONSE_LOG_CAPACITY)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Toggle capture. Any buffered entries are discarded.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        self.clear();
    }

    /// Record a raw response body for `path`, if capture is on.
    pub fn record(&self, path: &str, body: &str) {
        if !self.is_enabled() {
            return;
        }
        let entry = match serde_json::from_str::<Value>(body) {
            Ok(mut json) => {
                redact(&mut json);
                AnonymizedResponse {
                    label: label_for(path, "json"),
                    body: ResponseBody::Json(json),
                }
            }
            Err(_) => AnonymizedResponse {
                label: label_for(path, "txt"),
                body: ResponseBody::Text(body.to_owned()),
            },
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == RESPONSE_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest-first copy of the buffered responses.
    pub fn entries(&self) -> Vec<AnonymizedResponse> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// `/wap/door/getDoor` becomes `xiaotuwap_door_getDoor.<extension>`.
fn label_for(path: &str, extension: &str) -> String {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    format!("xiaotu{}.{extension}", segments.join("_"))
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if SENSITIVE_KEYS.contains(&key.as_str()) {
                    *inner = Value::String(REDACTED.into());
                } else {
                    redact(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
