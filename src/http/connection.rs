use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::http::parser::{ParseError, parse_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::send_response;
use crate::router::Router;

/// Deadlines applied to a single connection.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Bound on reading the first request of a connection.
    pub read: Duration,
    /// Bound on writing one response.
    pub write: Duration,
    /// Bound on waiting for the next request of a kept-alive connection.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            write: Duration::from_secs(5),
            idle: Duration::from_secs(30),
        }
    }
}

enum State {
    Reading,
    Dispatching(Request),
    Writing(Response, bool), // bool = keep_alive?
    KeepAlive,
    Closed,
}

/// Owns one accepted connection and drives parse → route → respond,
/// looping while the client asks for keep-alive.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    router: Arc<Router>,
    timeouts: Timeouts,
    served: u64,
    state: State,
}

impl Connection {
    pub fn new(stream: TcpStream, router: Arc<Router>, timeouts: Timeouts) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            router,
            timeouts,
            served: 0,
            state: State::Reading,
        }
    }

    /// Runs the connection to completion. The socket halves are released
    /// when the connection is dropped, on every exit path.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, State::Closed);
            self.state = match state {
                State::Reading => self.read_next().await,
                State::Dispatching(req) => self.dispatch(req).await,
                State::Writing(resp, keep_alive) => self.write(resp, keep_alive).await,
                State::KeepAlive => State::Reading,
                State::Closed => break,
            };
        }
        Ok(())
    }

    async fn read_next(&mut self) -> State {
        // The first request gets the read deadline; subsequent keep-alive
        // waits get the idle deadline.
        let deadline = if self.served == 0 {
            self.timeouts.read
        } else {
            self.timeouts.idle
        };

        match timeout(deadline, parse_request(&mut self.reader)).await {
            Err(_) => {
                debug!("Read deadline elapsed, closing connection");
                State::Closed
            }
            Ok(Err(ParseError::EndOfStream)) => {
                debug!("Client closed connection");
                State::Closed
            }
            Ok(Err(ParseError::Io(e))) => {
                debug!("Transport error while reading request: {}", e);
                State::Closed
            }
            Ok(Err(e)) => {
                warn!("Rejecting request: {}", e);
                let mut resp = Response::bad_request();
                resp.headers
                    .insert("Connection".to_string(), "close".to_string());
                // Best effort; the connection closes either way.
                if let Err(send_err) = send_response(&mut self.writer, resp).await {
                    warn!("Failed to send 400 response: {}", send_err);
                }
                State::Closed
            }
            Ok(Ok(req)) => State::Dispatching(req),
        }
    }

    async fn dispatch(&mut self, mut req: Request) -> State {
        let keep_alive = req.keep_alive();
        let mut resp = self.router.dispatch(&mut req).await;

        // Echo keep-alive; everything else, absent included, closes.
        let connection = if keep_alive { "keep-alive" } else { "close" };
        resp.headers
            .insert("Connection".to_string(), connection.to_string());

        State::Writing(resp, keep_alive)
    }

    async fn write(&mut self, resp: Response, keep_alive: bool) -> State {
        match timeout(self.timeouts.write, send_response(&mut self.writer, resp)).await {
            Ok(Ok(())) => {
                self.served += 1;
                if keep_alive {
                    State::KeepAlive
                } else {
                    State::Closed
                }
            }
            Ok(Err(e)) => {
                warn!("Failed to send response: {}", e);
                State::Closed
            }
            Err(_) => {
                warn!("Write deadline elapsed, closing connection");
                State::Closed
            }
        }
    }
}
