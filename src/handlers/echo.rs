use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::{Handler, HandlerFuture};

/// Echoes the `:message` segment of `/echo/:message` back as the body.
///
/// # Example
///
/// `GET /echo/hello` responds `200 OK` with body `hello` and
/// `Content-Length: 5`.
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle<'a>(&'a self, req: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let message = req.param("message").unwrap_or("");
            Ok(Response::ok(message.as_bytes().to_vec()))
        })
    }
}
