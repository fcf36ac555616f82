//! Records exchanged with the storage collaborator.
//!
//! The storage layer is a blind byte store: it persists [`EncryptedEnvelope`]s
//! verbatim and never interprets their fields. A variable value is either a
//! legacy plain string or an envelope; [`is_envelope`] is the only place that
//! tells the two apart.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON name of the ciphertext field.
pub const FIELD_CIPHERTEXT: &str = "ciphertext";
/// JSON name of the nonce field.
pub const FIELD_IV: &str = "iv";
/// JSON name of the detached GCM tag field.
pub const FIELD_AUTH_TAG: &str = "authTag";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One encrypted value: `{ciphertext, iv, authTag}`, all standard base64.
///
/// Construction does not validate the fields; see `envcrypt::envelope::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub iv: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
}

/// Structural type guard: `true` iff `value` is an object whose `ciphertext`,
/// `iv` and `authTag` fields are all non-empty strings.
pub fn is_envelope(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    [FIELD_CIPHERTEXT, FIELD_IV, FIELD_AUTH_TAG]
        .iter()
        .all(|f| matches!(map.get(*f), Some(Value::String(s)) if !s.is_empty()))
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Value of an environment variable as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    /// Legacy, unencrypted value.
    Plain(String),
    Encrypted(EncryptedEnvelope),
}

impl VariableValue {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, VariableValue::Encrypted(_))
    }

    /// Classify an untyped JSON value.
    ///
    /// Returns `None` when the value is neither a string nor an envelope.
    pub fn from_json(value: Value) -> Option<Self> {
        if is_envelope(&value) {
            return serde_json::from_value(value).ok().map(VariableValue::Encrypted);
        }
        match value {
            Value::String(s) => Some(VariableValue::Plain(s)),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for VariableValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        VariableValue::from_json(raw).ok_or_else(|| {
            serde::de::Error::custom("expected a plain string or an encrypted envelope")
        })
    }
}

impl From<EncryptedEnvelope> for VariableValue {
    fn from(e: EncryptedEnvelope) -> Self {
        VariableValue::Encrypted(e)
    }
}

/// A single key/value/description entry of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    pub key: String,
    pub value: VariableValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Returns `true` if `key` matches `^[A-Z_][A-Z0-9_]*$`.
pub fn is_valid_variable_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Project record as returned by the storage collaborator.
///
/// `user_salt` is written once when the project is created and must be treated
/// as immutable afterwards: every encrypted variable depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub variables: Vec<EnvVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_salt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guard_accepts_full_envelope() {
        assert!(is_envelope(&json!({"ciphertext": "YQ==", "iv": "aXY=", "authTag": "dGFn"})));
    }

    #[test]
    fn guard_rejects_partial_or_empty() {
        assert!(!is_envelope(&json!({"ciphertext": "YQ==", "iv": "aXY="})));
        assert!(!is_envelope(&json!({"ciphertext": "", "iv": "aXY=", "authTag": "dGFn"})));
        assert!(!is_envelope(&json!({"ciphertext": 1, "iv": "aXY=", "authTag": "dGFn"})));
        assert!(!is_envelope(&json!("plain")));
        assert!(!is_envelope(&Value::Null));
    }

    #[test]
    fn variable_value_discriminates_by_shape() {
        let plain: VariableValue = serde_json::from_value(json!("hunter2")).unwrap();
        assert_eq!(plain, VariableValue::Plain("hunter2".into()));

        let enc: VariableValue =
            serde_json::from_value(json!({"ciphertext": "YQ==", "iv": "aXY=", "authTag": "dGFn"}))
                .unwrap();
        assert!(enc.is_encrypted());
    }

    #[test]
    fn variable_value_rejects_other_shapes() {
        assert!(serde_json::from_value::<VariableValue>(json!(42)).is_err());
        assert!(serde_json::from_value::<VariableValue>(json!({"ciphertext": "YQ=="})).is_err());
    }

    #[test]
    fn envelope_serialises_auth_tag_camel_case() {
        let e = EncryptedEnvelope {
            ciphertext: "YQ==".into(),
            iv: "aXY=".into(),
            auth_tag: "dGFn".into(),
        };
        let v = serde_json::to_value(VariableValue::from(e)).unwrap();
        assert_eq!(v["authTag"], "dGFn");
        assert!(is_envelope(&v));
    }

    #[test]
    fn project_record_reads_storage_shape() {
        let p: ProjectRecord = serde_json::from_value(json!({
            "_id": "66aa",
            "name": "api",
            "userId": "u1",
            "userSalt": "c2FsdA==",
            "variables": [
                {"key": "DB_URL", "value": "postgres://"},
                {"key": "TOKEN", "value": {"ciphertext": "YQ==", "iv": "aXY=", "authTag": "dGFn"},
                 "description": "api token"}
            ]
        }))
        .unwrap();
        assert_eq!(p.id.as_deref(), Some("66aa"));
        assert_eq!(p.user_salt.as_deref(), Some("c2FsdA=="));
        assert!(!p.variables[0].value.is_encrypted());
        assert!(p.variables[1].value.is_encrypted());
    }

    #[test]
    fn variable_key_rule() {
        assert!(is_valid_variable_key("DATABASE_URL"));
        assert!(is_valid_variable_key("_PRIVATE2"));
        assert!(!is_valid_variable_key("2FAST"));
        assert!(!is_valid_variable_key("lower"));
        assert!(!is_valid_variable_key(""));
    }
}
