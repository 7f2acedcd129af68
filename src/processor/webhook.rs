//! Webhook payload authentication and parsing.
//!
//! The processor signs each delivery with `Stripe-Signature:
//! t=<unix_ts>,v1=<hex hmac-sha256>` where the signed input is
//! `"{t}.{raw payload}"`. Verification rejects stale timestamps and compares
//! signatures in constant time.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::processor::types::PaymentIntent;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Verified webhook event with the embedded intent snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: PaymentIntent,
}

impl WebhookEvent {
    pub fn is_recognized(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            EVENT_PAYMENT_SUCCEEDED | EVENT_PAYMENT_FAILED
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a signature header against the raw payload and signing secret.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    verify_signature_at(payload, signature_header, secret, tolerance_secs, now)
}

pub(crate) fn verify_signature_at(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
    now_secs: u64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<u64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<u64>().ok();
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let age = now_secs.abs_diff(timestamp);
    if age > tolerance_secs {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = compute_signature(payload, secret, timestamp);
    if candidates
        .iter()
        .any(|candidate| secure_eq(expected.as_bytes(), candidate.trim().as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute the hex signature for a payload at a given timestamp.
///
/// The scheme is symmetric, so this also serves to produce valid headers
/// against a test secret.
pub fn compute_signature(payload: &[u8], secret: &str, timestamp: u64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Render a complete signature header for a payload.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: u64) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(payload, secret, timestamp)
    )
}

/// Parse a verified payload into an event.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Constant-time byte comparison.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn payload() -> Vec<u8> {
        serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_123",
                    "status": "succeeded",
                    "amount": 1000,
                    "currency": "usd",
                    "metadata": {}
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = payload();
        let header = signature_header(&payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature_at(&payload, &header, SECRET, 300, 1_700_000_010),
            Ok(())
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = payload();
        let header = signature_header(&payload, SECRET, 1_700_000_000);
        let mut tampered = payload.clone();
        tampered[0] ^= 1;
        assert_eq!(
            verify_signature_at(&tampered, &header, SECRET, 300, 1_700_000_010),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = payload();
        let header = signature_header(&payload, "whsec_other", 1_700_000_000);
        assert_eq!(
            verify_signature_at(&payload, &header, SECRET, 300, 1_700_000_010),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = payload();
        let header = signature_header(&payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature_at(&payload, &header, SECRET, 300, 1_700_000_500),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn header_without_timestamp_or_signature_is_malformed() {
        let payload = payload();
        assert_eq!(
            verify_signature_at(&payload, "v1=abc", SECRET, 300, 0),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature_at(&payload, "t=100", SECRET, 300, 100),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn any_matching_v1_candidate_passes() {
        let payload = payload();
        let valid = compute_signature(&payload, SECRET, 1_700_000_000);
        let header = format!("t=1700000000,v1=deadbeef,v1={}", valid);
        assert_eq!(
            verify_signature_at(&payload, &header, SECRET, 300, 1_700_000_000),
            Ok(())
        );
    }

    #[test]
    fn event_parses_with_embedded_intent() {
        let event = parse_event(&payload()).expect("parse should succeed");
        assert_eq!(event.event_type, EVENT_PAYMENT_SUCCEEDED);
        assert!(event.is_recognized());
        assert_eq!(event.data.object.id, "pi_123");
    }

    #[test]
    fn unrelated_event_type_is_not_recognized() {
        let raw = serde_json::json!({
            "type": "payment_intent.created",
            "data": {"object": {"id": "pi_123", "status": "requires_payment_method", "amount": 1000, "currency": "usd"}}
        })
        .to_string();
        let event = parse_event(raw.as_bytes()).expect("parse should succeed");
        assert!(!event.is_recognized());
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }
}
