use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_core::errors::{ErrorKind, RelayError};
use tracing::error;

#[derive(Debug)]
pub struct RelayAxumError(pub anyhow::Error);

impl From<anyhow::Error> for RelayAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<RelayError> for RelayAxumError {
    fn from(e: RelayError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for RelayAxumError {
    fn into_response(self) -> Response {
        // Anything that is not already a RelayError becomes a generic 500.
        let err = RelayError::normalize(self.0);

        if err.kind == ErrorKind::GeneralError {
            match &err.source {
                Some(source) => error!(error = %err, cause = ?source, "request failed"),
                None => error!(error = %err, "request failed"),
            }
        }

        let safe = err.sanitize_for_client();
        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_envelope())).into_response()
    }
}
