use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::{Handler, HandlerFuture};

/// Reflects the request's `User-Agent` header value as the body.
/// An absent header yields an empty body.
pub struct UserAgentHandler;

impl Handler for UserAgentHandler {
    fn handle<'a>(&'a self, req: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let agent = req.header("user-agent").unwrap_or("");
            Ok(Response::ok(agent.as_bytes().to_vec()))
        })
    }
}
