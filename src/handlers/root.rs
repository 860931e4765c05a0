use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::{Handler, HandlerFuture};

/// Handler for the root ("/") path.
pub struct RootHandler;

impl Handler for RootHandler {
    fn handle<'a>(&'a self, _req: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async { Ok(Response::ok("Welcome to lantern")) })
    }
}
