use common::error::AlertError;
use common::models::signal::{SECRET_FIELDS, first_non_empty};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// What the caller presented besides the body itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct Credentials<'a> {
    /// `X-Webhook-Secret` header.
    pub header_secret: Option<&'a str>,
    /// `X-Signature` header: hex HMAC-SHA256 of the raw body.
    pub signature: Option<&'a str>,
}

/// Accepts the shared secret from the header or the payload, or a valid
/// body signature. An empty configured secret rejects everything.
pub fn authorize(
    secret: &str,
    payload: &Value,
    credentials: Credentials<'_>,
    body: &[u8],
) -> Result<(), AlertError> {
    if secret.is_empty() {
        return Err(AlertError::Unauthorized);
    }

    if let Some(signature) = credentials.signature {
        if verify_signature(secret, body, signature) {
            return Ok(());
        }
    }

    let payload_secret = payload
        .as_object()
        .and_then(|obj| first_non_empty(obj, SECRET_FIELDS));

    let presented = [credentials.header_secret.map(str::to_string), payload_secret];
    if presented
        .iter()
        .flatten()
        .any(|candidate| secrets_match(secret, candidate))
    {
        return Ok(());
    }

    Err(AlertError::Unauthorized)
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim().trim_start_matches("sha256=")) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn secrets_match(expected: &str, given: &str) -> bool {
    let (a, b) = (expected.as_bytes(), given.trim().as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
