//! Request and response bodies of the process-jobs endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Inbound body. Every field is optional at the wire level; the router
/// decides which ones an action requires. A text field holding anything but
/// a JSON string reads as absent, so it fails validation like a missing one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessJobsRequest {
    #[serde(default, deserialize_with = "text_field")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub worker_id: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub job_family: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub job_id: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub status: Option<String>,
    #[serde(default)]
    pub output_data: Option<Value>,
    #[serde(default)]
    pub error_data: Option<Value>,
}

impl ProcessJobsRequest {
    /// Read the fields out of an already parsed body. Anything other than an
    /// object carries no fields.
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Object(_) => serde_json::from_value(body).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

fn text_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Uniform response body: `{ success, data?, error? }`.
///
/// `data: Some(Value::Null)` serializes as `"data": null`; `None` omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn data(success: bool, data: Value) -> Self {
        Self {
            success,
            data: Some(data),
            error: None,
        }
    }

    /// 200 when `success`, 400 otherwise.
    pub fn status(&self) -> StatusCode {
        if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Treat `""` like an absent field.
pub(crate) fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}
