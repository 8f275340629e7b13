//! Assembles the Axum [`Router`] from a [`RouteTable`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodFilter, MethodRouter},
    Router,
};
use runledger_api::{ErrorCode, Failure};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    config::ServerConfig,
    dispatch::{Endpoint, RawRequest},
    encode::encode_failure,
    error::ApiError,
    routes::{RouteTable, Source},
};

/// Build the complete application router.
///
/// Every route in `table` is mounted as-is (paths already carry the API
/// prefix). `GET /health` answers `OK`; anything else that matches no route
/// gets an `ENDPOINT_NOT_FOUND` failure body.
pub fn build_router(table: RouteTable, config: &ServerConfig) -> Router {
    let limit = config.max_body_bytes;

    // Group by path so GET and POST on the same path share one MethodRouter.
    let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();
    for route in table {
        let filter = match MethodFilter::try_from(route.method.clone()) {
            Ok(filter) => filter,
            Err(_) => {
                tracing::warn!(method = %route.method, path = %route.path, "unsupported method; route skipped");
                continue;
            }
        };
        let endpoint = route.endpoint;
        let source = route.source;
        let handler = move |request: Request| serve(endpoint, source, limit, request);

        let method_router = paths.remove(&route.path).unwrap_or_else(MethodRouter::new);
        paths.insert(route.path, method_router.on(filter, handler));
    }

    let mut router = Router::new().route("/health", get(health));
    for (path, method_router) in paths {
        router = router.route(&path, method_router.fallback(endpoint_not_found));
    }
    let router = router
        .fallback(endpoint_not_found)
        .layer(TraceLayer::new_for_http());

    // A timed-out request gets a bare 408 from the transport, not a failure body.
    if config.request_timeout_secs > 0 {
        router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
    } else {
        router
    }
}

/// Collect the raw request and hand it to the endpoint.
async fn serve(
    endpoint: Arc<dyn Endpoint>,
    source: Source,
    limit: usize,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match source {
        Source::Query => Bytes::new(),
        Source::Body => match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return encode_failure(&Failure::bad_request(format!(
                    "failed to read request body: {e}"
                )))
            }
        },
    };
    let raw = RawRequest {
        source,
        query: parts.uri.query().unwrap_or_default().to_string(),
        body,
        content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
    };
    endpoint.handle(raw).await
}

async fn health() -> &'static str {
    "OK"
}

async fn endpoint_not_found(request: Request) -> impl IntoResponse {
    ApiError(Failure::new(
        ErrorCode::EndpointNotFound,
        format!(
            "No endpoint for {} {}",
            request.method(),
            request.uri().path()
        ),
    ))
}
