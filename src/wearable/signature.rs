//! Verification of the `terra-signature` header.
//!
//! The header looks like `t=1723808700,v1=5f8d...`; `v1` is the hex HMAC-SHA256
//! of `"<t>.<raw body>"` keyed with the webhook signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn verify(secret: &str, header: &str, body: &[u8]) -> bool {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };

    signatures.into_iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    })
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"type":"healthcheck"}"#;
        let header = sign("whsec", "1723808700", body);
        assert!(verify("whsec", &header, body));
    }

    #[test]
    fn rejects_tampered_body_or_wrong_secret() {
        let body = br#"{"type":"daily"}"#;
        let header = sign("whsec", "1723808700", body);
        assert!(!verify("whsec", &header, br#"{"type":"sleep"}"#));
        assert!(!verify("other", &header, body));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(!verify("whsec", "", b"{}"));
        assert!(!verify("whsec", "v1=abcd", b"{}"));
        assert!(!verify("whsec", "t=1,v1=not-hex", b"{}"));
    }
}
