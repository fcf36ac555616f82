//! Encrypting and decrypting whole projects through an [`EncryptionSession`].
//!
//! Values are classified by shape only: an envelope is decrypted, a plain
//! string is legacy data and passes through untouched.

use common::{CryptoError, EnvVariable, ProjectRecord, VariableValue};
use tracing::debug;

use crate::crypto::Salt;
use crate::session::EncryptionSession;

/// A variable with its value in the clear, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainVariable {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// Returns `true` if any variable holds an encrypted envelope.
pub fn has_encrypted_variables(variables: &[EnvVariable]) -> bool {
    variables.iter().any(|v| v.value.is_encrypted())
}

/// Encrypt a plain value; envelopes and empty strings are returned as-is.
pub async fn encrypt_if_needed(
    session: &EncryptionSession,
    value: VariableValue,
) -> Result<VariableValue, CryptoError> {
    match value {
        VariableValue::Plain(s) if !s.is_empty() => {
            Ok(VariableValue::Encrypted(session.encrypt(&s).await?))
        }
        other => Ok(other),
    }
}

/// Decrypt an envelope; plain values are returned as-is.
pub async fn decrypt_if_needed(
    session: &EncryptionSession,
    value: &VariableValue,
) -> Result<String, CryptoError> {
    match value {
        VariableValue::Plain(s) => Ok(s.clone()),
        VariableValue::Encrypted(e) => session.decrypt(e).await,
    }
}

/// Activate the project's key, issuing a salt first if the record has none.
///
/// An existing salt is never replaced. Returns the salt in use; when it was
/// newly generated the caller must persist the updated record.
pub async fn bind_project(
    session: &EncryptionSession,
    record: &mut ProjectRecord,
) -> Result<Salt, CryptoError> {
    let salt = match record.user_salt.as_deref() {
        Some(existing) => Salt::parse(existing)?,
        None => {
            let salt = Salt::generate();
            debug!(salt = %salt.fingerprint(), "issued salt for new project");
            record.user_salt = Some(salt.as_str().to_owned());
            salt
        }
    };
    session.initialize_for_project(&record.user_id, salt.as_str()).await?;
    Ok(salt)
}

/// Encrypt every plain variable of `record` in place.
///
/// Returns the number of values that were encrypted.
pub async fn seal_project(
    session: &EncryptionSession,
    record: &mut ProjectRecord,
) -> Result<usize, CryptoError> {
    let mut sealed = 0;
    for var in record.variables.iter_mut() {
        let VariableValue::Plain(plain) = &var.value else {
            continue;
        };
        if plain.is_empty() {
            continue;
        }
        let envelope = session.encrypt(plain).await?;
        var.value = VariableValue::Encrypted(envelope);
        sealed += 1;
    }
    Ok(sealed)
}

/// Decrypt every variable of `record`.
///
/// Fails on the first value that cannot be decrypted; no partial result is
/// returned.
pub async fn open_project(
    session: &EncryptionSession,
    record: &ProjectRecord,
) -> Result<Vec<PlainVariable>, CryptoError> {
    let mut out = Vec::with_capacity(record.variables.len());
    for var in &record.variables {
        out.push(PlainVariable {
            key: var.key.clone(),
            value: decrypt_if_needed(session, &var.value).await?,
            description: var.description.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn session() -> EncryptionSession {
        EncryptionSession::new(SecretString::from("app-secret".to_owned()))
    }

    fn record(vars: &[(&str, &str)]) -> ProjectRecord {
        ProjectRecord {
            id: None,
            name: "api".into(),
            description: None,
            user_id: "u1".into(),
            variables: vars
                .iter()
                .map(|(k, v)| EnvVariable {
                    key: (*k).into(),
                    value: VariableValue::Plain((*v).into()),
                    description: None,
                })
                .collect(),
            user_salt: None,
        }
    }

    #[tokio::test]
    async fn bind_issues_salt_once() {
        let s = session();
        let mut r = record(&[]);
        let salt = bind_project(&s, &mut r).await.unwrap();
        assert_eq!(r.user_salt.as_deref(), Some(salt.as_str()));
        let again = bind_project(&s, &mut r).await.unwrap();
        assert_eq!(again, salt);
    }

    #[tokio::test]
    async fn seal_then_open_round_trip() {
        let s = session();
        let mut r = record(&[("DB_URL", "postgres://db"), ("EMPTY", ""), ("TOKEN", "abc")]);
        bind_project(&s, &mut r).await.unwrap();

        assert_eq!(seal_project(&s, &mut r).await.unwrap(), 2);
        assert!(has_encrypted_variables(&r.variables));
        assert_eq!(r.variables[1].value, VariableValue::Plain(String::new()));

        // Already sealed values are left alone.
        assert_eq!(seal_project(&s, &mut r).await.unwrap(), 0);

        let opened = open_project(&s, &r).await.unwrap();
        let values: Vec<_> = opened.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, ["postgres://db", "", "abc"]);
    }

    #[tokio::test]
    async fn envelopes_and_empty_values_pass_through_encrypt() {
        let s = session();
        s.initialize_for_user("u1", None).await.unwrap();
        let env = VariableValue::Encrypted(s.encrypt("x").await.unwrap());
        assert_eq!(encrypt_if_needed(&s, env.clone()).await.unwrap(), env);

        let empty = VariableValue::Plain(String::new());
        assert_eq!(encrypt_if_needed(&s, empty.clone()).await.unwrap(), empty);

        let sealed = encrypt_if_needed(&s, VariableValue::Plain("v".into())).await.unwrap();
        assert!(sealed.is_encrypted());
    }

    #[tokio::test]
    async fn plain_values_pass_through_decrypt() {
        let s = session();
        let v = VariableValue::Plain("legacy".into());
        assert_eq!(decrypt_if_needed(&s, &v).await.unwrap(), "legacy");
    }

    #[tokio::test]
    async fn open_fails_without_session() {
        let s = session();
        let mut r = record(&[("A", "1")]);
        bind_project(&s, &mut r).await.unwrap();
        seal_project(&s, &mut r).await.unwrap();
        s.teardown().await;
        assert_eq!(open_project(&s, &r).await.unwrap_err(), CryptoError::NotReady);
    }

    #[test]
    fn detects_encrypted_variables() {
        assert!(!has_encrypted_variables(&record(&[("A", "1")]).variables));
    }
}
