//! Request signing.
//!
//! Every request body is authenticated with an HMAC-SHA256 signature sent
//! alongside the access key. The signature covers the exact bytes of the
//! serialized body; callers must sign the same buffer they transmit.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use holdfast_core::{ProviderError, ProviderResult};

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign_payload(payload: &[u8], secret: &str) -> ProviderResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProviderError::api(format!("failed to initialize signer: {e}"), None))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2.
        let signature =
            sign_payload(b"what do ya want for nothing?", "Jefe").expect("signing should succeed");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let signature = sign_payload(b"{\"command\":\"holdings\"}", "secret")
            .expect("signing should succeed");
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_signature_depends_on_payload_and_secret() {
        let base = sign_payload(b"payload", "secret").expect("signing should succeed");
        let other_payload = sign_payload(b"payload2", "secret").expect("signing should succeed");
        let other_secret = sign_payload(b"payload", "secret2").expect("signing should succeed");

        assert_ne!(base, other_payload);
        assert_ne!(base, other_secret);
    }

    #[test]
    fn test_empty_secret_still_signs() {
        // Credential presence is enforced upstream of signing.
        let signature = sign_payload(b"payload", "").expect("signing should succeed");
        assert_eq!(signature.len(), 64);
    }
}
