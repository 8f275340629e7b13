//! HTTP status mapping for [`Failure`] values.
//!
//! Every [`ErrorCode`] has exactly one status. Handlers return
//! `Result<_, Failure>`; [`ApiError`] is the axum-facing wrapper that turns a
//! failure into `status + JSON body`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use runledger_api::{ErrorCode, Failure};

use crate::encode::encode_failure;
use crate::storage::StoreError;

/// The HTTP status for a failure code. Total over [`ErrorCode`].
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadRequest
        | ErrorCode::InvalidParameterValue
        | ErrorCode::MalformedRequest
        | ErrorCode::InvalidState => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::NotFound | ErrorCode::EndpointNotFound => StatusCode::NOT_FOUND,
        ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorCode::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// A [`Failure`] that can be returned directly from an axum handler.
#[derive(Debug)]
pub struct ApiError(pub Failure);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        encode_failure(&self.0)
    }
}

impl From<Failure> for ApiError {
    fn from(f: Failure) -> Self {
        ApiError(f)
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Failure::not_found(msg),
            StoreError::Conflict(msg) => Failure::new(ErrorCode::AlreadyExists, msg),
            StoreError::Internal(msg) => Failure::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_status() {
        for code in ErrorCode::ALL {
            let status = status_for(code);
            assert!(
                status.is_client_error() || status.is_server_error(),
                "{code} -> {status}"
            );
        }
    }

    #[test]
    fn representative_statuses() {
        assert_eq!(status_for(ErrorCode::InvalidParameterValue), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::EndpointNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorCode::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorCode::NotImplemented), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            status_for(ErrorCode::TemporarilyUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_errors_map_to_codes() {
        let f: Failure = StoreError::Conflict("taken".into()).into();
        assert_eq!(f.code(), ErrorCode::AlreadyExists);
        let f: Failure = StoreError::NotFound("gone".into()).into();
        assert_eq!(f.code(), ErrorCode::NotFound);
        let f: Failure = StoreError::Internal("disk".into()).into();
        assert_eq!(f.code(), ErrorCode::InternalError);
        assert_eq!(f.message(), "disk");
    }

    #[test]
    fn api_error_response_uses_mapped_status() {
        let resp = ApiError(Failure::new(ErrorCode::AlreadyExists, "dup")).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
