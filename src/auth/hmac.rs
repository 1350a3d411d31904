//! HMAC-SHA256 signing and constant-time verification.
//!
//! Shopify signs every webhook delivery with `HMAC-SHA256(secret, raw_body)`
//! and sends the digest base64-encoded in `X-Shopify-Hmac-Sha256`.
//!
//! # Security
//!
//! Verification decodes the header and compares raw digests with
//! [`subtle::ConstantTimeEq`]. Digest lengths are checked before comparing,
//! and the comparison time does not depend on where the first differing byte
//! is.
//!
//! # Example
//!
//! ```rust
//! use giveaway_app::auth::hmac::{compute_signature_base64, verify_signature_base64};
//!
//! let body = br#"{"shop":"my-store.myshopify.com"}"#;
//! let signature = compute_signature_base64(body, "secret");
//! assert_eq!(signature.len(), 44);
//! assert!(verify_signature_base64(body, &signature, "secret"));
//! assert!(!verify_signature_base64(body, &signature, "other"));
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const DIGEST_LEN: usize = 32;

fn digest(message: &[u8], secret: &str) -> [u8; DIGEST_LEN] {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return [0; DIGEST_LEN];
    };
    mac.update(message);
    let mut out = [0; DIGEST_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Computes `HMAC-SHA256(secret, message)`, base64-encoded.
///
/// The message is taken as raw bytes so the exact request body is signed
/// without any UTF-8 interpretation.
#[must_use]
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    BASE64.encode(digest(message, secret))
}

/// Verifies a base64 signature header against the raw message.
///
/// Fails closed: an empty secret, an empty or malformed header and a digest
/// of the wrong length all return `false`. Never panics.
#[must_use]
pub fn verify_signature_base64(message: &[u8], signature_header: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let signature_header = signature_header.trim();
    if signature_header.is_empty() {
        return false;
    }
    let Ok(provided) = BASE64.decode(signature_header) else {
        return false;
    };
    if provided.len() != DIGEST_LEN {
        return false;
    }

    let expected = digest(message, secret);
    constant_time_compare(&expected, &provided)
}

/// Compares two byte strings in constant time.
///
/// Inputs of different length compare unequal.
#[must_use]
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
