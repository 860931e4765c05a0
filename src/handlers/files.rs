use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode, StreamBody};
use crate::http::writer::ChunkSink;
use crate::router::{Handler, HandlerFuture};

/// Files at or above this size are sent with chunked transfer encoding
/// instead of being buffered whole.
pub const STREAM_THRESHOLD: u64 = 256 * 1024;

const STREAM_CHUNK: usize = 8 * 1024;

/// Serves files under a fixed root directory.
///
/// Registered as a prefix route (e.g. `/files/`); the path suffix after
/// the prefix names the file. GET reads, POST writes, DELETE removes.
/// Concurrent writers to the same file are not coordinated; the last
/// writer wins.
pub struct FileHandler {
    prefix: String,
    root: PathBuf,
}

impl FileHandler {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
        }
    }

    /// Resolves the request path to a location under the root.
    ///
    /// Empty suffixes are rejected, as is any suffix containing a
    /// non-normal component: `..` would climb out of the root, and a
    /// leading `/` or drive prefix would make `join` discard the root
    /// entirely.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let suffix = path.strip_prefix(self.prefix.as_str())?;
        if suffix.is_empty() {
            return None;
        }
        let relative = Path::new(suffix);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            warn!(path = %path, "Rejecting path escaping the files root");
            return None;
        }
        Some(self.root.join(relative))
    }

    async fn get(&self, file_path: PathBuf) -> anyhow::Result<Response> {
        let meta = match fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Response::not_found());
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Ok(Response::not_found());
        }

        let content_type = mime::from_path(&file_path);

        if meta.len() >= STREAM_THRESHOLD {
            debug!(file = %file_path.display(), size = meta.len(), "Streaming file");
            let file = fs::File::open(&file_path).await?;
            return Ok(ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", content_type)
                .streamed(Box::new(FileStream { file }))
                .build());
        }

        let bytes = fs::read(&file_path).await?;
        Ok(ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", content_type)
            .body(bytes)
            .build())
    }

    async fn post(&self, file_path: PathBuf, body: &[u8]) -> anyhow::Result<Response> {
        fs::write(&file_path, body).await?;
        debug!(file = %file_path.display(), bytes = body.len(), "Wrote file");
        Ok(Response::created())
    }

    async fn delete(&self, file_path: PathBuf) -> anyhow::Result<Response> {
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(Response::no_content()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Handler for FileHandler {
    fn handle<'a>(&'a self, req: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let Some(file_path) = self.resolve(&req.path) else {
                return Ok(Response::not_found());
            };

            match req.method {
                Method::Get => self.get(file_path).await,
                Method::Post => self.post(file_path, &req.body).await,
                Method::Delete => self.delete(file_path).await,
                _ => Ok(Response::method_not_allowed("DELETE, GET, POST")),
            }
        })
    }
}

/// Streams a file through the chunk sink in fixed-size reads.
struct FileStream {
    file: fs::File,
}

impl StreamBody for FileStream {
    fn stream<'a>(
        self: Box<Self>,
        sink: &'a mut ChunkSink<'_>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut file = self.file;
            let mut buf = vec![0u8; STREAM_CHUNK];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                sink.write(&buf[..n]).await?;
            }
            Ok(())
        })
    }
}
