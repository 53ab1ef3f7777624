//! Signature verification for lifecycle webhooks
//!
//! The sidecar signs each payload with HMAC-SHA256 over the raw body using
//! the shared `WEBHOOK_SECRET`, sent as `X-Hub-Signature-256: sha256=<hex>`.
//! The signature must be computed on the raw bytes, not the parsed JSON.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Checks `signature_header` against `payload`, comparing in constant time
pub fn verify_signature(signature_header: &str, payload: &[u8], secret: &str) -> bool {
    let Some(signature_hex) = signature_header.strip_prefix("sha256=") else {
        logfire::warn!("webhook signature header without 'sha256=' prefix");
        return false;
    };

    let received = match hex::decode(signature_hex) {
        Ok(signature) => signature,
        Err(e) => {
            logfire::warn!("webhook signature is not valid hex: {error}", error = e.to_string());
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            logfire::error!("failed to create HMAC instance: {error}", error = e.to_string());
            return false;
        }
    };
    mac.update(payload);
    let computed = mac.finalize().into_bytes();

    let is_valid: bool = computed.ct_eq(&received[..]).into();
    if !is_valid {
        logfire::warn!("webhook signature mismatch");
    }

    is_valid
}

/// Header value for `payload`, the counterpart of [verify_signature]
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
