//! Operation dispatch: one decoded input in, one outcome out.
//!
//! An [`Operation`] pairs a name with an async business handler. Wrapped as
//! an [`Endpoint`] it becomes the unit the route table stores: decode the raw
//! request, run the handler, encode whatever comes back.
//!
//! Dropping the future returned by [`Operation::dispatch`] (or
//! [`Endpoint::handle`]) drops the handler's future with it. That is how a
//! client disconnect or a transport deadline cancels in-flight work; nothing
//! is written for a dropped request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderValue;
use axum::response::Response;
use runledger_api::{Failure, Message};
use serde::Serialize;

use crate::decode::{decode_body, decode_query};
use crate::encode::encode_outcome;
use crate::error::status_for;
use crate::routes::Source;

/// Boxed future returned by a business handler.
pub type HandlerFuture<O> = Pin<Box<dyn Future<Output = Result<O, Failure>> + Send>>;

type Handler<I, O> = dyn Fn(I) -> HandlerFuture<O> + Send + Sync;

/// A named operation with typed input `I` and output `O`.
pub struct Operation<I, O> {
    name: &'static str,
    handler: Arc<Handler<I, O>>,
}

impl<I, O> Clone for Operation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<I, O> Operation<I, O>
where
    I: Message,
    O: Serialize + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, handler: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, Failure>> + Send + 'static,
    {
        Self {
            name,
            handler: Arc::new(move |input: I| Box::pin(handler(input)) as HandlerFuture<O>),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the handler on `input` and return its outcome unchanged.
    ///
    /// No retries and no re-classification of failures.
    pub async fn dispatch(&self, input: I) -> Result<O, Failure> {
        let started = Instant::now();
        let outcome = (self.handler)(input).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(_) => tracing::debug!(operation = self.name, elapsed_ms, "dispatched"),
            Err(f) if status_for(f.code()).is_server_error() => {
                tracing::warn!(operation = self.name, elapsed_ms, error = %f, "operation failed")
            }
            Err(f) => tracing::debug!(operation = self.name, elapsed_ms, error = %f, "rejected"),
        }
        outcome
    }

    /// Erase the message types so the operation can sit in a route table.
    pub fn into_endpoint(self) -> Arc<dyn Endpoint> {
        Arc::new(self)
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// The transport-level view of a request, before decoding.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Where the input message is read from.
    pub source: Source,
    /// Raw query string without the leading `?`.
    pub query: String,
    pub body: Bytes,
    /// The request's `Content-Type`, echoed on success.
    pub content_type: Option<HeaderValue>,
}

impl RawRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            source: Source::Query,
            query: query.into(),
            body: Bytes::new(),
            content_type: None,
        }
    }

    pub fn body(body: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Body,
            query: String::new(),
            body: body.into(),
            content_type: None,
        }
    }
}

/// A type-erased operation: raw request in, HTTP response out.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: RawRequest) -> Response;
}

#[async_trait]
impl<I, O> Endpoint for Operation<I, O>
where
    I: Message,
    O: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, request: RawRequest) -> Response {
        let decoded = match request.source {
            Source::Query => decode_query::<I>(&request.query),
            Source::Body => decode_body::<I>(&request.body),
        };
        let outcome = match decoded {
            Ok(input) => self.dispatch(input).await,
            Err(failure) => {
                tracing::debug!(operation = self.name, error = %failure, "request decoding failed");
                Err(failure)
            }
        };
        encode_outcome(outcome, request.content_type.as_ref())
    }
}
