//! Server assembly: route wiring and the accept loop.

pub mod listener;

use std::path::PathBuf;
use std::sync::Arc;

use crate::handlers::{EchoHandler, FileHandler, RootHandler, UserAgentHandler};
use crate::http::request::Method;
use crate::router::{Pattern, Router};

/// Builds the default route table.
///
/// Registration order is match order; the route table is immutable once
/// the accept loop starts.
pub fn build_router(files_root: impl Into<PathBuf>) -> Router {
    let mut router = Router::new();

    router.route(Some(Method::Get), Pattern::exact("/"), Arc::new(RootHandler));
    router.route(
        Some(Method::Get),
        Pattern::parameterized("/echo/:message"),
        Arc::new(EchoHandler),
    );
    router.route(
        Some(Method::Get),
        Pattern::exact("/user-agent"),
        Arc::new(UserAgentHandler),
    );

    let files = Arc::new(FileHandler::new("/files/", files_root));
    router.route(Some(Method::Get), Pattern::prefix("/files/"), files.clone());
    router.route(Some(Method::Post), Pattern::prefix("/files/"), files.clone());
    router.route(Some(Method::Delete), Pattern::prefix("/files/"), files);

    router
}
