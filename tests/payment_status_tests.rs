use payflow_backend::database::payment_repository::PaymentStatus;
use payflow_backend::processor::error::{ProcessorError, ProcessorErrorKind};
use payflow_backend::services::payment_service::{classify_intent_status, PaymentServiceError};

#[test]
fn only_the_literal_succeeded_status_classifies_as_succeeded() {
    assert_eq!(classify_intent_status("succeeded"), PaymentStatus::Succeeded);

    for raw in [
        "requires_payment_method",
        "requires_confirmation",
        "requires_action",
        "canceled",
        "payment_failed",
        "Succeeded",
        "",
    ] {
        assert_eq!(
            classify_intent_status(raw),
            PaymentStatus::Failed,
            "raw status: {:?}",
            raw
        );
    }
}

// The processor's "processing" state is not terminal on its side, but the
// local model still classifies it as failed. If the sweep interval is shorter
// than the processor's typical intermediate-state duration, a payment can be
// marked failed that would have succeeded moments later. This pins the
// current behavior so any change to it is deliberate.
#[test]
fn intermediate_states_classify_as_failed() {
    assert_eq!(classify_intent_status("processing"), PaymentStatus::Failed);
    assert_eq!(
        classify_intent_status("requires_action"),
        PaymentStatus::Failed
    );
}

#[test]
fn status_strings_round_trip() {
    for status in [
        PaymentStatus::Created,
        PaymentStatus::Succeeded,
        PaymentStatus::Failed,
    ] {
        assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(PaymentStatus::parse("processing"), None);
}

#[test]
fn service_errors_render_useful_messages() {
    let not_found = PaymentServiceError::NotFound {
        payment_id: "pi_123".to_string(),
    };
    assert_eq!(not_found.to_string(), "payment not found: pi_123");

    let declined = PaymentServiceError::Processor(
        ProcessorError::new(ProcessorErrorKind::CardDeclined, "Your card was declined.")
            .with_decline_code("insufficient_funds"),
    );
    assert!(declined.to_string().contains("Your card was declined."));

    let validation = PaymentServiceError::Validation {
        message: "amount should be at least 50 minor units".to_string(),
        field: Some("amount".to_string()),
    };
    assert!(validation.to_string().starts_with("validation error"));
}

#[test]
fn processor_error_kinds_drive_retry_policy() {
    assert!(ProcessorError::new(ProcessorErrorKind::RateLimited, "slow down").is_retryable());
    assert!(ProcessorError::network("connect timeout").is_retryable());
    assert!(!ProcessorError::new(ProcessorErrorKind::InvalidRequest, "bad currency").is_retryable());
    assert!(!ProcessorError::new(ProcessorErrorKind::CardDeclined, "declined").is_retryable());
}
