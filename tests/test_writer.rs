use std::future::Future;
use std::pin::Pin;

use lantern::http::response::{ResponseBuilder, StatusCode, StreamBody};
use lantern::http::writer::{ChunkSink, send_response, serialize_response};

/// Producer that pushes a fixed list of chunks, then optionally fails.
struct Chunks {
    chunks: Vec<Vec<u8>>,
    fail: bool,
}

impl StreamBody for Chunks {
    fn stream<'a>(
        self: Box<Self>,
        sink: &'a mut ChunkSink<'_>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for chunk in &self.chunks {
                sink.write(chunk).await?;
            }
            if self.fail {
                anyhow::bail!("producer failed mid-stream");
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_chunk_framing_for_zero_five_and_1024_byte_writes() {
    let mut out: Vec<u8> = Vec::new();
    let mut sink = ChunkSink::new(&mut out);

    sink.write(b"").await.unwrap();
    sink.write(b"hello").await.unwrap();
    let big = vec![0xAB_u8; 1024];
    sink.write(&big).await.unwrap();
    sink.finish().await.unwrap();

    let mut expected = Vec::new();
    // zero-length write emits nothing
    expected.extend_from_slice(b"5\r\nhello\r\n");
    expected.extend_from_slice(b"400\r\n");
    expected.extend_from_slice(&big);
    expected.extend_from_slice(b"\r\n");
    expected.extend_from_slice(b"0\r\n\r\n");

    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_terminal_chunk_is_emitted_exactly_once() {
    let mut out: Vec<u8> = Vec::new();
    let mut sink = ChunkSink::new(&mut out);

    sink.write(b"x").await.unwrap();
    sink.finish().await.unwrap();
    sink.finish().await.unwrap();

    assert_eq!(out, b"1\r\nx\r\n0\r\n\r\n".to_vec());
}

#[test]
fn test_serialize_sets_content_length_and_type_defaults() {
    let mut resp = ResponseBuilder::new(StatusCode::Ok)
        .body(b"hello".to_vec())
        .build();
    let wire = serialize_response(&mut resp);

    assert_eq!(resp.headers.get("Content-Length").unwrap(), "5");
    assert_eq!(resp.headers.get("Content-Type").unwrap(), "text/plain");
    assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(wire.ends_with(b"\r\n\r\nhello"));
}

#[test]
fn test_serialize_preserves_explicit_headers() {
    let mut resp = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .header("Content-Type", "application/json")
        .body(b"{}".to_vec())
        .build();
    serialize_response(&mut resp);

    assert_eq!(resp.headers.get("Content-Length").unwrap(), "999");
    assert_eq!(
        resp.headers.get("Content-Type").unwrap(),
        "application/json"
    );
}

#[test]
fn test_serialize_empty_body_has_zero_content_length() {
    let mut resp = ResponseBuilder::new(StatusCode::NoContent).build();
    let wire = serialize_response(&mut resp);

    assert_eq!(resp.headers.get("Content-Length").unwrap(), "0");
    assert!(wire.starts_with(b"HTTP/1.1 204 No Content\r\n"));
}

#[tokio::test]
async fn test_send_buffered_response_writes_everything() {
    let resp = ResponseBuilder::new(StatusCode::Ok)
        .body(b"payload".to_vec())
        .build();

    let mut out: Vec<u8> = Vec::new();
    send_response(&mut out, resp).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 7\r\n"));
    assert!(text.ends_with("\r\n\r\npayload"));
}

#[tokio::test]
async fn test_send_streamed_response_uses_chunked_encoding() {
    let producer = Chunks {
        chunks: vec![b"abc".to_vec(), b"defgh".to_vec()],
        fail: false,
    };
    let resp = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "application/octet-stream")
        .streamed(Box::new(producer))
        .build();

    let mut out: Vec<u8> = Vec::new();
    send_response(&mut out, resp).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    assert!(!text.contains("Content-Length"));
    assert!(text.ends_with("3\r\nabc\r\n5\r\ndefgh\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn test_streamed_response_strips_content_length_any_case() {
    let producer = Chunks {
        chunks: vec![b"abc".to_vec()],
        fail: false,
    };
    let resp = ResponseBuilder::new(StatusCode::Ok)
        .header("content-length", "3")
        .streamed(Box::new(producer))
        .build();

    let mut out: Vec<u8> = Vec::new();
    send_response(&mut out, resp).await.unwrap();

    let text = String::from_utf8(out).unwrap().to_ascii_lowercase();
    assert!(text.contains("transfer-encoding: chunked\r\n"));
    assert!(!text.contains("content-length"));
}

#[tokio::test]
async fn test_producer_error_propagates_after_terminal_chunk() {
    let producer = Chunks {
        chunks: vec![b"partial".to_vec()],
        fail: true,
    };
    let resp = ResponseBuilder::new(StatusCode::Ok)
        .streamed(Box::new(producer))
        .build();

    let mut out: Vec<u8> = Vec::new();
    let result = send_response(&mut out, resp).await;

    assert!(result.is_err());
    // The stream is still terminated so the peer is not left hanging.
    assert!(out.ends_with(b"0\r\n\r\n"));
}
