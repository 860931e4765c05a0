//! Path/method routing.
//!
//! Routes are evaluated in registration order; the first route whose
//! pattern matches the path and whose method restriction (if any) matches
//! the request method wins. A path that matches some route but no method
//! yields 405 with the `Allow` header populated; no path match yields 404.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error};

use crate::http::request::{Method, Request};
use crate::http::response::Response;

/// Future returned by a handler.
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Response>> + Send + 'a>>;

/// A request handler capability.
///
/// Handlers never write to the connection; they return a structured
/// response (or an error, which the router converts to a 500).
pub trait Handler: Send + Sync {
    fn handle<'a>(&'a self, req: &'a Request) -> HandlerFuture<'a>;
}

/// Route pattern kinds, evaluated through one uniform matcher.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Path equals the pattern string exactly.
    Exact(String),
    /// Path starts with the pattern string (typically ending in `/`).
    Prefix(String),
    /// Segment-wise match; `:name` segments bind path parameters.
    Parameterized(Vec<String>),
    /// Path matches the compiled expression (anchors are the pattern's own).
    Regex(regex::Regex),
}

impl Pattern {
    pub fn exact(pattern: impl Into<String>) -> Self {
        Pattern::Exact(pattern.into())
    }

    pub fn prefix(pattern: impl Into<String>) -> Self {
        Pattern::Prefix(pattern.into())
    }

    /// Builds a parameterized pattern from a template such as
    /// `/echo/:message`.
    pub fn parameterized(template: &str) -> Self {
        Pattern::Parameterized(template.split('/').map(str::to_string).collect())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(regex::Regex::new(pattern)?))
    }

    /// Matches a request path against this pattern.
    ///
    /// Returns the bound path parameters on a match (empty for all kinds
    /// except `Parameterized`), or `None` when the path does not match.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            Pattern::Exact(p) => (p == path).then(HashMap::new),
            Pattern::Prefix(p) => path.starts_with(p.as_str()).then(HashMap::new),
            Pattern::Parameterized(segments) => {
                let path_segments: Vec<&str> = path.split('/').collect();
                if path_segments.len() != segments.len() {
                    return None;
                }
                let mut params = HashMap::new();
                for (pat, seg) in segments.iter().zip(path_segments) {
                    if let Some(name) = pat.strip_prefix(':') {
                        params.insert(name.to_string(), seg.to_string());
                    } else if pat != seg {
                        return None;
                    }
                }
                Some(params)
            }
            Pattern::Regex(re) => re.is_match(path).then(HashMap::new),
        }
    }
}

struct Route {
    pattern: Pattern,
    method: Option<Method>,
    handler: Arc<dyn Handler>,
}

/// Ordered route table. Built once at startup, then shared read-only
/// across all connection workers.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route. `method: None` accepts every method.
    pub fn route(&mut self, method: Option<Method>, pattern: Pattern, handler: Arc<dyn Handler>) {
        self.routes.push(Route {
            pattern,
            method,
            handler,
        });
    }

    /// Dispatches a request to the first matching route, in registration
    /// order. Stores bound path parameters on the request before invoking
    /// the handler.
    pub async fn dispatch(&self, req: &mut Request) -> Response {
        let mut allowed: Vec<&str> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&req.path) else {
                continue;
            };

            if let Some(method) = &route.method {
                if *method != req.method {
                    let token = method.as_str();
                    if !allowed.contains(&token) {
                        allowed.push(token);
                    }
                    continue;
                }
            }

            req.params = params;
            debug!(
                method = req.method.as_str(),
                path = %req.path,
                "Dispatching request"
            );
            return match route.handler.handle(req).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(
                        method = req.method.as_str(),
                        path = %req.path,
                        error = %e,
                        "Handler failed"
                    );
                    Response::internal_error()
                }
            };
        }

        if !allowed.is_empty() {
            allowed.sort_unstable();
            debug!(path = %req.path, "Method not allowed");
            return Response::method_not_allowed(&allowed.join(", "));
        }

        debug!(path = %req.path, "No route matched");
        Response::not_found()
    }
}
