use payflow_backend::processor::webhook::{
    parse_event, signature_header, verify_signature, SignatureError, EVENT_PAYMENT_FAILED,
    EVENT_PAYMENT_SUCCEEDED,
};
use std::time::{SystemTime, UNIX_EPOCH};

const SECRET: &str = "whsec_integration_test";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

fn succeeded_payload() -> Vec<u8> {
    serde_json::json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": "pi_123",
                "status": "succeeded",
                "amount": 1000,
                "currency": "usd",
                "metadata": {"simulate_webhook_failure": "false"}
            }
        }
    })
    .to_string()
    .into_bytes()
}

#[test]
fn signed_payload_round_trips_through_verification() {
    let payload = succeeded_payload();
    let header = signature_header(&payload, SECRET, now_secs());
    assert_eq!(verify_signature(&payload, &header, SECRET, 300), Ok(()));
}

#[test]
fn verification_rejects_a_forged_signature() {
    let payload = succeeded_payload();
    let header = format!("t={},v1={}", now_secs(), "0".repeat(64));
    assert_eq!(
        verify_signature(&payload, &header, SECRET, 300),
        Err(SignatureError::Mismatch)
    );
}

#[test]
fn verification_rejects_a_replayed_old_delivery() {
    let payload = succeeded_payload();
    let header = signature_header(&payload, SECRET, now_secs() - 3600);
    assert_eq!(
        verify_signature(&payload, &header, SECRET, 300),
        Err(SignatureError::StaleTimestamp)
    );
}

#[test]
fn event_parsing_extracts_the_embedded_intent() {
    let event = parse_event(&succeeded_payload()).expect("parse should succeed");
    assert_eq!(event.event_type, EVENT_PAYMENT_SUCCEEDED);
    assert!(event.is_recognized());

    let intent = &event.data.object;
    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.status, "succeeded");
    assert!(!intent.simulate_webhook_failure());
}

#[test]
fn only_the_two_payment_event_types_are_recognized() {
    for (event_type, recognized) in [
        (EVENT_PAYMENT_SUCCEEDED, true),
        (EVENT_PAYMENT_FAILED, true),
        ("payment_intent.created", false),
        ("payment_intent.processing", false),
        ("charge.succeeded", false),
    ] {
        let raw = serde_json::json!({
            "type": event_type,
            "data": {
                "object": {
                    "id": "pi_123",
                    "status": "processing",
                    "amount": 1000,
                    "currency": "usd"
                }
            }
        })
        .to_string();
        let event = parse_event(raw.as_bytes()).expect("parse should succeed");
        assert_eq!(event.is_recognized(), recognized, "event: {}", event_type);
    }
}

#[test]
fn simulation_flag_is_read_from_intent_metadata() {
    let raw = serde_json::json!({
        "type": "payment_intent.payment_failed",
        "data": {
            "object": {
                "id": "pi_123",
                "status": "requires_payment_method",
                "amount": 1000,
                "currency": "usd",
                "metadata": {"simulate_webhook_failure": "true"}
            }
        }
    })
    .to_string();
    let event = parse_event(raw.as_bytes()).expect("parse should succeed");
    assert!(event.data.object.simulate_webhook_failure());
}
