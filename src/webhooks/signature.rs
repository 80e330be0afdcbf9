//! HMAC-SHA256 body signatures.
//!
//! GitHub signs deliveries with the shared webhook secret and sends the result
//! in `X-Hub-Signature-256` as `sha256=<hex>`. Peacock verifies that header
//! before parsing anything, and signs its own outbound notification webhooks
//! with the same scheme.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header GitHub puts the delivery signature in.
pub const GITHUB_SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Parses a `sha256=<hex>` header value into raw bytes.
///
/// Returns `None` for a missing prefix, another algorithm, or bad hex.
///
/// ```
/// use peacock::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats raw signature bytes as `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Checks a `sha256=<hex>` header against the payload in constant time.
///
/// ```
/// use peacock::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let body = br#"{"action":"opened"}"#;
/// let header = format_signature_header(&compute_signature(body, b"hook-secret"));
///
/// assert!(verify_signature(body, &header, b"hook-secret"));
/// assert!(!verify_signature(body, &header, b"other-secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
