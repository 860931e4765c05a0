use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::http::response::{Body, Response};

pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Response header names are written as the handler set them, so lookups
/// on them have to ignore case.
fn has_header(resp: &Response, name: &str) -> bool {
    resp.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

fn remove_header(resp: &mut Response, name: &str) {
    resp.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
}

fn serialize_head(resp: &Response, buf: &mut BytesMut) {
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
}

/// Serializes a buffered response to wire bytes.
///
/// Sets `Content-Length` to the exact body length and defaults
/// `Content-Type` to `text/plain` when the handler left them unset.
/// Header order is not stable; consumers must not rely on it.
pub fn serialize_response(resp: &mut Response) -> BytesMut {
    if let Body::Fixed(body) = &resp.body {
        if !has_header(resp, "Content-Length") {
            let len = body.len().to_string();
            resp.headers.insert("Content-Length".to_string(), len);
        }
        if !has_header(resp, "Content-Type") {
            resp.headers
                .insert("Content-Type".to_string(), "text/plain".to_string());
        }
    }

    let mut buf = BytesMut::new();
    serialize_head(resp, &mut buf);
    if let Body::Fixed(body) = &resp.body {
        buf.extend_from_slice(body);
    }
    buf
}

/// Chunked-transfer encoder handed to streaming body producers.
///
/// Each write of `n` bytes emits `hex(n) CRLF <n bytes> CRLF`; a
/// zero-length write emits nothing. The terminal `0\r\n\r\n` chunk is
/// emitted exactly once by [`ChunkSink::finish`].
pub struct ChunkSink<'w> {
    writer: &'w mut (dyn AsyncWrite + Send + Unpin),
    closed: bool,
}

impl<'w> ChunkSink<'w> {
    pub fn new(writer: &'w mut (dyn AsyncWrite + Send + Unpin)) -> Self {
        Self {
            writer,
            closed: false,
        }
    }

    /// Writes one chunk. Zero-length writes are a no-op.
    pub async fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut frame = BytesMut::with_capacity(data.len() + 16);
        frame.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
        frame.extend_from_slice(data);
        frame.extend_from_slice(b"\r\n");
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    /// Emits the terminal chunk. Safe to call more than once.
    pub async fn finish(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.write_all(b"0\r\n\r\n").await?;
        Ok(())
    }
}

/// Writes a response to the peer.
///
/// Buffered bodies are serialized in one piece. Streamed bodies get
/// `Transfer-Encoding: chunked`: the head is flushed immediately, the
/// producer pushes chunks through a [`ChunkSink`], and the terminal chunk
/// is emitted whether the producer succeeded or failed. A producer error
/// then propagates as a send failure.
pub async fn send_response<W>(stream: &mut W, mut resp: Response) -> anyhow::Result<()>
where
    W: AsyncWrite + Send + Unpin,
{
    let body = std::mem::replace(&mut resp.body, Body::Fixed(Vec::new()));

    match body {
        Body::Fixed(bytes) => {
            resp.body = Body::Fixed(bytes);
            let buf = serialize_response(&mut resp);
            stream.write_all(&buf).await?;
            stream.flush().await?;
            debug!(
                status = resp.status.as_u16(),
                bytes = buf.len(),
                "Sent buffered response"
            );
        }
        Body::Streamed(producer) => {
            remove_header(&mut resp, "Content-Length");
            resp.headers
                .insert("Transfer-Encoding".to_string(), "chunked".to_string());

            let mut head = BytesMut::new();
            serialize_head(&resp, &mut head);
            stream.write_all(&head).await?;
            stream.flush().await?;

            let mut sink = ChunkSink::new(stream);
            let produced = producer.stream(&mut sink).await;
            sink.finish().await?;
            stream.flush().await?;
            produced?;
            debug!(status = resp.status.as_u16(), "Sent chunked response");
        }
    }

    Ok(())
}
