//! Request signature authentication.
//!
//! Implements v0 HMAC-SHA256 signature verification for inbound webhook
//! requests: a clock-skew guard, a version-prefix check, and a
//! constant-time comparison of the recomputed digest against the signature
//! header. Verification is pure; failures carry enough detail for
//! operators but never include the signing secret.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Signature version prefix. Only `v0` is supported.
pub const SIGNATURE_VERSION: &str = "v0";

/// Header carrying the `v0=`-prefixed signature.
pub const HEADER_SIGNATURE: &str = "x-slack-signature";

/// Header carrying the unix-seconds request timestamp.
pub const HEADER_TIMESTAMP: &str = "x-slack-request-timestamp";

/// Default maximum allowed clock skew (5 minutes).
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing required authentication headers")]
    MissingHeaders,

    #[error("request timestamp is not a valid unix time")]
    InvalidTimestamp,

    #[error("request timestamp is too old or too new")]
    StaleTimestamp,

    #[error("missing or unsupported signature version")]
    UnsupportedVersion,

    #[error("signature (v0) failed validation")]
    SignatureMismatch,
}

/// Computes the `v0=`-prefixed signature for a timestamp and raw body.
pub fn sign(timestamp: i64, body: &[u8], signing_secret: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!(),
    };
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("{SIGNATURE_VERSION}={}", hex::encode(digest))
}

/// Verifies a signature against the raw request body at a given instant.
///
/// The instant is explicit so the skew guard is testable; callers serving
/// live traffic use [`verify_now`].
pub fn verify(
    signature: &str,
    timestamp: i64,
    body: &[u8],
    signing_secret: &str,
    max_clock_skew: i64,
    now: i64,
) -> Result<(), AuthError> {
    if (now - timestamp).abs() > max_clock_skew {
        return Err(AuthError::StaleTimestamp);
    }

    if !signature.starts_with(&format!("{SIGNATURE_VERSION}=")) {
        return Err(AuthError::UnsupportedVersion);
    }

    let expected = sign(timestamp, body, signing_secret);
    if !timing_safe_eq(&expected, signature) {
        return Err(AuthError::SignatureMismatch);
    }

    Ok(())
}

/// [`verify`] against the system clock.
pub fn verify_now(
    signature: &str,
    timestamp: i64,
    body: &[u8],
    signing_secret: &str,
    max_clock_skew: i64,
) -> Result<(), AuthError> {
    verify(signature, timestamp, body, signing_secret, max_clock_skew, unix_now())
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}

/// Timing-safe string equality.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut out = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        out |= x ^ y;
    }
    out == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_sign_verify_round_trip() {
        let body = br#"{"type":"url_verification","challenge":"abc"}"#;
        let signature = sign(NOW, body, SECRET);
        assert!(signature.starts_with("v0="));
        assert!(verify(&signature, NOW, body, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_rejects_any_bit_flip() {
        let body = b"command=%2Ftest&text=hello";
        let signature = sign(NOW, body, SECRET);

        // Flip one bit per hex character; every mutation must fail.
        for i in 3..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[i] ^= 0x01;
            let mutated = String::from_utf8(bytes).unwrap();
            assert_eq!(
                verify(&mutated, NOW, body, SECRET, 300, NOW),
                Err(AuthError::SignatureMismatch),
                "mutation at index {i} was accepted"
            );
        }
    }

    #[test]
    fn test_verify_rejects_stale_timestamps() {
        let body = b"{}";
        for delta in [301, -301, 3600, -3600] {
            let timestamp = NOW + delta;
            let signature = sign(timestamp, body, SECRET);
            assert_eq!(
                verify(&signature, timestamp, body, SECRET, 300, NOW),
                Err(AuthError::StaleTimestamp),
            );
        }
        // Boundary: exactly max skew is still valid.
        let signature = sign(NOW + 300, body, SECRET);
        assert!(verify(&signature, NOW + 300, body, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_rejects_unsupported_version() {
        let body = b"{}";
        let signature = sign(NOW, body, SECRET).replace("v0=", "v1=");
        assert_eq!(
            verify(&signature, NOW, body, SECRET, 300, NOW),
            Err(AuthError::UnsupportedVersion),
        );
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let body = b"{}";
        let signature = sign(NOW, body, "other-secret");
        assert_eq!(
            verify(&signature, NOW, body, SECRET, 300, NOW),
            Err(AuthError::SignatureMismatch),
        );
    }

    #[test]
    fn test_timing_safe_eq() {
        assert!(timing_safe_eq("abc", "abc"));
        assert!(!timing_safe_eq("abc", "abd"));
        assert!(!timing_safe_eq("abc", "abcd"));
    }
}
