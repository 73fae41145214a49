//! # Errors
//!
//! Structured errors that know their HTTP status and the message a client
//! is allowed to see.
//!
//! - can be carried through `anyhow::Error`
//! - transport-agnostic (the HTTP crate decides how to serialize)
//! - the `source` chain stays server-side; [`RelayError::sanitize_for_client`]
//!   drops it
//!
//! With feature `serde` you also get [`RelayError::to_envelope`], the
//! `{ "success": false, "error": "..." }` body every relay endpoint answers
//! with on failure.

use std::fmt;

use anyhow::Error as AnyError;

/// Error classes and their status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,   // 400
    GeneralError, // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::GeneralError => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::GeneralError => "GeneralError",
        }
    }
}

/// A structured relay error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct RelayError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<AnyError>,
}

impl RelayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Convert into `anyhow::Error`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Turn any error into a `RelayError`:
    /// - if it is already a `RelayError` (anywhere in the chain), keep its kind and message
    /// - otherwise it becomes a `GeneralError` whose client message is the
    ///   generic "Internal server error"; the original is kept as `source`
    pub fn normalize(err: AnyError) -> RelayError {
        if let Some(relay) = err.chain().find_map(|e| e.downcast_ref::<RelayError>()) {
            return RelayError::new(relay.kind, relay.message.clone()).with_source(err);
        }
        RelayError::internal().with_source(err)
    }

    /// A copy suitable for returning to clients: same kind and message,
    /// no `source`.
    pub fn sanitize_for_client(&self) -> RelayError {
        RelayError {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }

    /// The only 500 message a client ever sees.
    pub fn internal() -> Self {
        Self::general_error("Internal server error")
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "serde")]
impl RelayError {
    /// Failure envelope: `{ "success": false, "error": <message> }`.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_hides_foreign_errors() {
        let err = anyhow::anyhow!("connection refused: 10.0.0.3:5432");
        let relay = RelayError::normalize(err);

        assert_eq!(relay.kind, ErrorKind::GeneralError);
        assert_eq!(relay.message, "Internal server error");
        assert!(relay.source.is_some());

        let safe = relay.sanitize_for_client();
        assert!(safe.source.is_none());
        assert!(!safe.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn normalize_keeps_relay_errors_through_context() {
        let err = RelayError::bad_request("Unknown action: bogus")
            .into_anyhow()
            .context("dispatching");
        let relay = RelayError::normalize(err);

        assert_eq!(relay.code(), 400);
        assert_eq!(relay.message, "Unknown action: bogus");
    }

    #[test]
    fn only_two_classes_reach_clients() {
        let bad = RelayError::bad_request("Missing required fields: tenant_id, worker_id, action");
        assert_eq!((bad.code(), bad.name()), (400, "BadRequest"));

        let internal = RelayError::internal();
        assert_eq!((internal.code(), internal.name()), (500, "GeneralError"));
        assert_eq!(internal.to_string(), "GeneralError (500): Internal server error");
    }
}
