//! Structural validation of [`EncryptedEnvelope`]s.
//!
//! Validation is a local check that runs before any key derivation or cipher
//! call. A malformed envelope can never decrypt, so it is rejected up front.

pub use common::protocol::is_envelope;

use common::protocol::{FIELD_AUTH_TAG, FIELD_CIPHERTEXT, FIELD_IV};
use common::{EncryptedEnvelope, ValidationError};
use serde_json::Value;

use crate::crypto::{NONCE_LEN, TAG_LEN};
use crate::encoding;

/// Decoded envelope fields, ready for the cipher.
#[derive(Debug)]
pub struct DecodedEnvelope {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; NONCE_LEN],
    pub auth_tag: [u8; TAG_LEN],
}

/// Check that every field is present and base64, the iv decodes to
/// [`NONCE_LEN`] bytes and the tag to [`TAG_LEN`] bytes.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, checking `ciphertext`, `iv`,
/// then `authTag`.
pub fn validate(envelope: &EncryptedEnvelope) -> Result<DecodedEnvelope, ValidationError> {
    let ciphertext = decode_field(&envelope.ciphertext, FIELD_CIPHERTEXT)?;
    let iv = decode_field(&envelope.iv, FIELD_IV)?;
    let auth_tag = decode_field(&envelope.auth_tag, FIELD_AUTH_TAG)?;

    let iv: [u8; NONCE_LEN] = iv
        .try_into()
        .map_err(|v: Vec<u8>| ValidationError::InvalidIvLength(v.len()))?;
    let auth_tag: [u8; TAG_LEN] = auth_tag
        .try_into()
        .map_err(|v: Vec<u8>| ValidationError::InvalidTagLength(v.len()))?;

    Ok(DecodedEnvelope {
        ciphertext,
        iv,
        auth_tag,
    })
}

/// Parse an untyped JSON value into an envelope, reporting which field is
/// missing rather than a generic deserialisation failure.
pub fn from_value(value: &Value) -> Result<EncryptedEnvelope, ValidationError> {
    let Value::Object(map) = value else {
        return Err(ValidationError::NotAnObject);
    };
    let field = |name: &'static str| match map.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::MissingField(name)),
    };
    Ok(EncryptedEnvelope {
        ciphertext: field(FIELD_CIPHERTEXT)?,
        iv: field(FIELD_IV)?,
        auth_tag: field(FIELD_AUTH_TAG)?,
    })
}

fn decode_field(value: &str, name: &'static str) -> Result<Vec<u8>, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField(name));
    }
    encoding::decode(value).map_err(|_| ValidationError::InvalidBase64(name))
}
