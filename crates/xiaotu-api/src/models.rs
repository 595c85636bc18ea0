// Wire types for the XiaoTu web service.
//
// Door records are kept as open JSON objects: the backend adds fields
// freely and downstream consumers expose them verbatim as attributes.
// Only the handful of fields the client itself inspects get accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lenient envelope wrapping every response.
///
/// `code` arrives as a number, a numeric string, or not at all.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Value,
}

impl Envelope {
    /// Numeric view of `code`. `None` when absent or not numeric.
    pub fn code(&self) -> Option<i64> {
        match self.code.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Human-readable failure text.
    pub fn description(&self) -> Option<String> {
        self.desc
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.message.clone().filter(|m| !m.is_empty()))
    }
}

/// `result` of the login call.
///
/// Older backends answer with `access_token` instead of `tokenId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default, rename = "access_token")]
    pub access_token: Option<String>,
}

impl LoginResult {
    /// The issued token, preferring `tokenId`.
    pub fn token(&self) -> Option<&str> {
        self.token_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.access_token.as_deref().filter(|t| !t.is_empty()))
    }
}

/// A door record as returned by `getDoor`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoorRecord(pub Map<String, Value>);

impl DoorRecord {
    /// The record id. Numeric ids are rendered as decimal strings.
    pub fn id(&self) -> Option<String> {
        value_as_string(self.0.get("id")?)
    }

    /// Vendor door type (`"door"` for the common case).
    pub fn door_type(&self) -> Option<&str> {
        self.0.get("doorType").and_then(Value::as_str)
    }

    /// Door status, normalized to a string (`"0"` means active).
    pub fn status(&self) -> Option<String> {
        value_as_string(self.0.get("status")?)
    }

    /// Whether the backend reports the door as currently open.
    pub fn is_open(&self) -> Option<bool> {
        value_as_flag(self.0.get("isOpen")?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DoorRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Resident profile returned by `getUserInfoV2`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Decoded phone number. The wire value is base64.
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub village_id: Option<String>,
    #[serde(default)]
    pub village_name: Option<String>,
    #[serde(default)]
    pub village_mobile: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub house_id: Option<String>,
}

/// Read a scalar the backend sends either as a string or a number.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a boolean sent as `true`, `1` or `"1"` (and their negatives).
pub fn value_as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_string))
}
