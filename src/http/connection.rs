use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::auth::SessionValidator;
use crate::http::parser::{parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::ProxyHandler;

/// How long an idle keep-alive connection may wait for its next request.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const READ_CHUNK: usize = 8192;

/// One browser connection, served until either side closes it.
pub struct Connection<V> {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    state: ConnectionState,
    handler: Arc<ProxyHandler<V>>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing {
        writer: ResponseWriter,
        keep_alive: bool,
    },
    Closed,
}

enum ReadOutcome {
    Request(Request),
    /// Unparseable input; answer and hang up
    Rejected(Response),
    Closed,
}

impl<V: SessionValidator> Connection<V> {
    pub fn new(stream: TcpStream, peer: SocketAddr, handler: Arc<ProxyHandler<V>>) -> Self {
        Self {
            stream,
            peer,
            buffer: Vec::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
            handler,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(request) => ConnectionState::Processing(request),
                    ReadOutcome::Rejected(response) => ConnectionState::Writing {
                        writer: ResponseWriter::new(&response, false),
                        keep_alive: false,
                    },
                    ReadOutcome::Closed => ConnectionState::Closed,
                },

                ConnectionState::Processing(request) => {
                    let keep_alive = request.keep_alive();
                    let response = self.handler.handle(request).await;
                    ConnectionState::Writing {
                        writer: ResponseWriter::new(&response, keep_alive),
                        keep_alive,
                    }
                }

                ConnectionState::Writing {
                    mut writer,
                    keep_alive,
                } => {
                    writer.write_to_stream(&mut self.stream).await?;
                    if keep_alive {
                        ConnectionState::Reading
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => return Ok(()),
            };
        }
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    // Anything past `consumed` is a pipelined request
                    self.buffer.drain(..consumed);
                    return Ok(ReadOutcome::Request(request));
                }
                Err(ParseError::Incomplete) => {}
                Err(err) => {
                    tracing::debug!(peer = %self.peer, error = %err, "Rejecting malformed request");
                    let response = if err.is_too_large() {
                        Response::payload_too_large()
                    } else {
                        Response::bad_request()
                    };
                    return Ok(ReadOutcome::Rejected(response));
                }
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read = match timeout(IDLE_TIMEOUT, self.stream.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => {
                    tracing::debug!(peer = %self.peer, "Idle connection timed out");
                    return Ok(ReadOutcome::Closed);
                }
            };
            if read == 0 {
                return Ok(ReadOutcome::Closed);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}
