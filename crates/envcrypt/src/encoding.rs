//! Standard (padded) base64 helpers shared by every component.

use base64::{engine::general_purpose::STANDARD, DecodeError, Engine as _};
use sha2::{Digest, Sha256};

/// Encode raw bytes as standard padded base64.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
///
/// # Errors
///
/// Returns the underlying [`DecodeError`] for any non-canonical input.
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(s)
}

/// Returns `true` if `s` is canonical standard base64.
pub fn is_valid(s: &str) -> bool {
    decode(s).is_ok()
}

/// Short, non-reversible identifier for a salt, safe to put in log fields.
pub fn fingerprint(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = [0u8, 1, 2, 254, 255];
        assert_eq!(decode(&encode(bytes)).unwrap(), bytes);
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid("!!!"));
        assert!(!is_valid("abc"));
        assert!(is_valid("YWJj"));
    }

    #[test]
    fn fingerprint_is_stable_and_hides_input() {
        let a = fingerprint("c2FsdA==");
        assert_eq!(a, fingerprint("c2FsdA=="));
        assert_eq!(a.len(), 12);
        assert!(!a.contains("c2Fsd"));
        assert_ne!(a, fingerprint("b3RoZXI="));
    }
}
