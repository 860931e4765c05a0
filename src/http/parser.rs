use std::collections::HashMap;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, warn};

use crate::http::request::{Method, Request};

/// Maximum accepted length of the request line, in bytes.
pub const MAX_REQUEST_LINE: usize = 4 * 1024;
/// Maximum accepted length of a single header line, in bytes.
pub const MAX_HEADER_LINE: usize = 8 * 1024;
/// Maximum accepted declared body size, in bytes.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Classified request parse failures.
///
/// `EndOfStream` is not a protocol violation: the peer hung up cleanly
/// between requests. `Io` is a transport failure; the connection layer
/// closes without answering. Everything else earns a 400.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("client closed connection before sending a request")]
    EndOfStream,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("request line exceeds {MAX_REQUEST_LINE} bytes")]
    RequestLineTooLong,
    #[error("header line exceeds {MAX_HEADER_LINE} bytes")]
    HeaderLineTooLong,
    #[error("invalid Content-Length header")]
    InvalidContentLength,
    #[error("declared body length exceeds {MAX_BODY_SIZE} bytes")]
    BodyTooLarge,
    #[error("connection closed before the declared body was received")]
    TruncatedBody,
    #[error("connection closed in the middle of a request")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of reading one LF-terminated line under a length bound.
enum Line {
    /// A complete line, CR/LF trimmed.
    Full(String),
    /// Data followed by end of stream instead of a newline.
    Partial(String),
    /// Zero bytes read: the stream was already closed.
    Eof,
    /// The line ran past the length bound.
    TooLong,
}

async fn read_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // +2 leaves room for the CRLF itself.
    let mut bounded = (&mut *reader).take(limit as u64 + 2);
    bounded.read_until(b'\n', &mut buf).await?;

    if buf.is_empty() {
        return Ok(Line::Eof);
    }
    let complete = buf.ends_with(b"\n");
    if !complete && buf.len() >= limit + 2 {
        return Ok(Line::TooLong);
    }

    // The bound is on raw bytes: lossy conversion widens invalid bytes
    // to U+FFFD, so measure before converting.
    let mut line = buf.as_slice();
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    if line.len() > limit {
        return Ok(Line::TooLong);
    }
    let s = String::from_utf8_lossy(line).into_owned();
    if complete {
        Ok(Line::Full(s))
    } else {
        Ok(Line::Partial(s))
    }
}

/// Reads and parses one HTTP/1.1 request from a buffered stream.
///
/// Reads the request line, the header block, and the body when a valid
/// `Content-Length` header is present. Header keys are lowercased; on
/// duplicates the last value wins. Any query string is stripped from the
/// path. Chunked request bodies are not supported.
pub async fn parse_request<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = match read_line(reader, MAX_REQUEST_LINE).await? {
        Line::Eof => return Err(ParseError::EndOfStream),
        Line::TooLong => return Err(ParseError::RequestLineTooLong),
        Line::Full(s) | Line::Partial(s) => s,
    };

    let mut tokens = request_line.split_whitespace();
    let (method, target, version) = match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => {
            warn!("Malformed request line: {:?}", request_line);
            return Err(ParseError::MalformedRequestLine);
        }
    };

    // Routing only ever sees the path; the query string is dropped here.
    let path = match target.split_once('?') {
        Some((p, _)) => p,
        None => target,
    };

    let mut headers = HashMap::new();
    loop {
        match read_line(reader, MAX_HEADER_LINE).await? {
            Line::Eof | Line::Partial(_) => return Err(ParseError::UnexpectedEof),
            Line::TooLong => return Err(ParseError::HeaderLineTooLong),
            Line::Full(line) => {
                if line.is_empty() {
                    break;
                }
                match line.split_once(':') {
                    Some((key, value)) => {
                        headers.insert(
                            key.trim().to_ascii_lowercase(),
                            value.trim().to_string(),
                        );
                    }
                    None => {
                        warn!("Skipping malformed header line: {:?}", line);
                    }
                }
            }
        }
    }

    let mut body = Vec::new();
    if let Some(raw) = headers.get("content-length") {
        let length: usize = raw
            .parse()
            .map_err(|_| ParseError::InvalidContentLength)?;
        if length > MAX_BODY_SIZE {
            warn!("Request body too large: {} bytes declared", length);
            return Err(ParseError::BodyTooLarge);
        }
        body = vec![0u8; length];
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ParseError::TruncatedBody
            } else {
                ParseError::Io(e)
            }
        })?;
    }

    let request = Request {
        method: Method::from_token(method),
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
        params: HashMap::new(),
    };

    debug!(
        method = request.method.as_str(),
        path = %request.path,
        "Parsed request"
    );
    Ok(request)
}
