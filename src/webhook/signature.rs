//! HMAC signature verification for inbound webhook deliveries.
//!
//! Signatures are computed over the exact raw request bytes, before any parsing or
//! re-serialization, and rendered as lowercase hex. Verification decodes the header
//! value and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex HMAC-SHA256 digest of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded signature header against the raw request bytes.
///
/// Returns `false` for malformed hex as well as for digest mismatches. The underlying
/// comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Ok(expected) = hex::decode(header.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let secret = "s3cret";
        let body = b"<VehicleDamageEstimateAddInvoiceRq/>";
        let sig = compute_signature(secret, body);
        assert!(verify_signature(secret, body, &sig));
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = compute_signature("key", b"payload");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sig.to_lowercase());
    }

    #[test]
    fn rejects_wrong_signature() {
        assert!(!verify_signature("s3cret", b"<A/>", "deadbeef"));
    }

    #[test]
    fn rejects_non_hex_header() {
        let body = b"<A/>";
        assert!(!verify_signature("s3cret", body, "not-hex-at-all"));
        assert!(!verify_signature("s3cret", body, ""));
    }

    #[test]
    fn digest_covers_exact_bytes() {
        let secret = "s3cret";
        let sig = compute_signature(secret, b"<A/>");
        // A semantically identical but byte-different body must not verify.
        assert!(!verify_signature(secret, b"<A />", &sig));
        assert!(verify_signature(secret, b"<A/>", &sig));
    }
}
