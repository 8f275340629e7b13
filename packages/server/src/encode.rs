//! Response encoding: success messages and failures as JSON.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use runledger_api::Failure;
use serde::Serialize;

use crate::error::status_for;

/// Content type for successful responses when the request carried none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const FAILURE_CONTENT_TYPE: &str = "application/json";

/// Encode a successful output as a 200 response.
///
/// The request's `Content-Type` is echoed back when present. If the message
/// cannot be serialised the response is a `BAD_REQUEST` failure instead.
pub fn encode_message<M: Serialize>(
    message: &M,
    request_content_type: Option<&HeaderValue>,
) -> Response {
    let body = match serde_json::to_vec(message) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialise response");
            return encode_failure(&Failure::bad_request(format!(
                "failed to serialise response: {e}"
            )));
        }
    };
    let content_type = request_content_type
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Encode a failure as `{"error_code": ..., "message": ...}` with the status
/// mapped from its code.
pub fn encode_failure(failure: &Failure) -> Response {
    let status = status_for(failure.code());
    // Two plain fields; serialisation cannot fail.
    let body = serde_json::to_vec(failure).unwrap_or_default();
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(FAILURE_CONTENT_TYPE),
        )],
        body,
    )
        .into_response()
}

/// Encode whichever side of a handler outcome is present.
pub fn encode_outcome<O: Serialize>(
    outcome: Result<O, Failure>,
    request_content_type: Option<&HeaderValue>,
) -> Response {
    match outcome {
        Ok(output) => encode_message(&output, request_content_type),
        Err(failure) => encode_failure(&failure),
    }
}
