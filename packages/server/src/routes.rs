//! The route table: which endpoint serves which method and path.
//!
//! Built once at startup and handed to [`crate::router::build_router`];
//! never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::dispatch::Endpoint;

/// Where a route reads its input message from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// URL query parameters.
    Query,
    /// JSON request body.
    Body,
}

impl Source {
    /// GET and HEAD carry no body; every other method decodes one.
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Source::Query
        } else {
            Source::Body
        }
    }
}

/// One `(method, path)` binding.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub source: Source,
    pub endpoint: Arc<dyn Endpoint>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("source", &self.source)
            .field("endpoint", &self.endpoint.name())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `endpoint` to `method path`. Rebinding an existing pair replaces
    /// the earlier endpoint.
    pub fn bind(mut self, method: Method, path: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Self {
        let path = path.into();
        let route = Route {
            source: Source::for_method(&method),
            method,
            path,
            endpoint,
        };
        match self
            .routes
            .iter_mut()
            .find(|r| r.method == route.method && r.path == route.path)
        {
            Some(existing) => {
                tracing::warn!(
                    method = %route.method,
                    path = %route.path,
                    replaced = existing.endpoint.name(),
                    "route bound twice"
                );
                *existing = route;
            }
            None => self.routes.push(route),
        }
        self
    }

    pub fn get(self, path: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Self {
        self.bind(Method::GET, path, endpoint)
    }

    pub fn post(self, path: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Self {
        self.bind(Method::POST, path, endpoint)
    }

}

#[cfg(test)]
impl RouteTable {
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| &r.method == method && r.path == path)
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}

impl IntoIterator for RouteTable {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Operation;
    use runledger_api::{EmptyResponse, GetExperiment, SearchExperiments};

    fn endpoint(name: &'static str) -> Arc<dyn Endpoint> {
        Operation::new(name, |_: SearchExperiments| async { Ok(EmptyResponse {}) }).into_endpoint()
    }

    #[test]
    fn source_follows_method() {
        assert_eq!(Source::for_method(&Method::GET), Source::Query);
        assert_eq!(Source::for_method(&Method::HEAD), Source::Query);
        assert_eq!(Source::for_method(&Method::POST), Source::Body);
        assert_eq!(Source::for_method(&Method::PATCH), Source::Body);
        assert_eq!(Source::for_method(&Method::DELETE), Source::Body);
    }

    #[test]
    fn same_path_two_methods() {
        let table = RouteTable::new()
            .get("/search", endpoint("SearchExperiments"))
            .post("/search", endpoint("SearchExperiments"));
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.lookup(&Method::GET, "/search").unwrap().source,
            Source::Query
        );
        assert_eq!(
            table.lookup(&Method::POST, "/search").unwrap().source,
            Source::Body
        );
        assert!(table.lookup(&Method::PUT, "/search").is_none());
    }

    #[test]
    fn rebinding_replaces() {
        let get = Operation::new("GetExperiment", |_: GetExperiment| async {
            Ok(EmptyResponse {})
        })
        .into_endpoint();
        let table = RouteTable::new()
            .get("/x", endpoint("SearchExperiments"))
            .get("/x", get);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup(&Method::GET, "/x").unwrap().endpoint.name(),
            "GetExperiment"
        );
    }
}
