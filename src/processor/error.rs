use thiserror::Error;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Failure category reported by the payment processor.
///
/// Classification logic downstream consumes only this tag (and the decline
/// code), never the transport-level shape of the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorErrorKind {
    CardDeclined,
    InvalidRequest,
    RateLimited,
    Unknown,
}

impl ProcessorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorErrorKind::CardDeclined => "card_declined",
            ProcessorErrorKind::InvalidRequest => "invalid_request",
            ProcessorErrorKind::RateLimited => "rate_limited",
            ProcessorErrorKind::Unknown => "unknown",
        }
    }
}

/// Error returned by any processor operation (create, retrieve, confirm).
///
/// Network failures and timeouts surface here too, tagged `Unknown`, so
/// callers never need a separate transport-error path.
#[derive(Debug, Clone, Error)]
#[error("processor error ({}): {message}", kind.as_str())]
pub struct ProcessorError {
    pub kind: ProcessorErrorKind,
    pub message: String,
    pub decline_code: Option<String>,
}

impl ProcessorError {
    pub fn new(kind: ProcessorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            decline_code: None,
        }
    }

    pub fn with_decline_code(mut self, code: impl Into<String>) -> Self {
        self.decline_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Unknown, message)
    }

    /// Map the processor's error `type` discriminator to a kind tag.
    pub fn from_api_type(error_type: &str, message: impl Into<String>) -> Self {
        let kind = match error_type {
            "card_error" => ProcessorErrorKind::CardDeclined,
            "invalid_request_error" => ProcessorErrorKind::InvalidRequest,
            "rate_limit_error" => ProcessorErrorKind::RateLimited,
            _ => ProcessorErrorKind::Unknown,
        };
        Self::new(kind, message)
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ProcessorErrorKind::CardDeclined => false,
            ProcessorErrorKind::InvalidRequest => false,
            ProcessorErrorKind::RateLimited => true,
            ProcessorErrorKind::Unknown => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_types_map_to_kinds() {
        assert_eq!(
            ProcessorError::from_api_type("card_error", "declined").kind,
            ProcessorErrorKind::CardDeclined
        );
        assert_eq!(
            ProcessorError::from_api_type("invalid_request_error", "bad currency").kind,
            ProcessorErrorKind::InvalidRequest
        );
        assert_eq!(
            ProcessorError::from_api_type("rate_limit_error", "slow down").kind,
            ProcessorErrorKind::RateLimited
        );
        assert_eq!(
            ProcessorError::from_api_type("api_error", "boom").kind,
            ProcessorErrorKind::Unknown
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(ProcessorError::new(ProcessorErrorKind::RateLimited, "limited").is_retryable());
        assert!(ProcessorError::network("timeout").is_retryable());
        assert!(!ProcessorError::new(ProcessorErrorKind::CardDeclined, "declined").is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = ProcessorError::new(ProcessorErrorKind::CardDeclined, "Your card was declined.")
            .with_decline_code("insufficient_funds");
        assert_eq!(
            err.to_string(),
            "processor error (card_declined): Your card was declined."
        );
        assert_eq!(err.decline_code.as_deref(), Some("insufficient_funds"));
    }
}
