//! Async transport to the in-browser automation agent.
//!
//! [`AgentClient`] sends [`Request`]s and receives [`Response`]s over a
//! bidirectional async stream using the framed protocol from
//! [`crate::protocol`]. It connects over TCP, or wraps any pre-connected
//! stream (used by tests with `tokio::io::duplex`).
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use logbench_core::agent_client::AgentClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr: SocketAddr = "127.0.0.1:9223".parse()?;
//! let mut client = AgentClient::new(addr);
//!
//! client.connect().await?;
//! client.heartbeat().await?;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use tracing::{debug, debug_span, trace, Instrument};

use crate::protocol::{
    decode_response, encode_request, read_frame_length, ProtocolError, Request, Response,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read bound for requests that do not wait on the page.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Any duplex byte stream the client can own.
pub trait AgentStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AgentStream for T {}

#[derive(Error, Debug)]
pub enum AgentClientError {
    #[error("not connected to agent")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The agent answered with [`Response::Error`].
    #[error("agent error: {0}")]
    AgentError(String),

    #[error("operation timed out")]
    Timeout,
}

/// Sequential request/response client for the automation agent.
///
/// A transport failure or read timeout drops the connection, since a late
/// answer would pair with the wrong request. Agent-level errors keep it.
pub struct AgentClient {
    stream: Option<Box<dyn AgentStream>>,
    addr: Option<SocketAddr>,
}

impl AgentClient {
    /// A disconnected client for `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            stream: None,
            addr: Some(addr),
        }
    }

    /// Wraps an already connected stream. Such a client cannot reconnect.
    pub fn from_stream(stream: impl AgentStream + 'static) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            addr: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), AgentClientError> {
        let Some(addr) = self.addr else {
            return Err(AgentClientError::ConnectionFailed(
                "client was built from a stream".into(),
            ));
        };
        debug!(%addr, "connecting to agent");

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Err(_) => return Err(AgentClientError::Timeout),
            Ok(Err(e)) => return Err(AgentClientError::ConnectionFailed(format!("{addr}: {e}"))),
            Ok(Ok(stream)) => stream,
        };
        // Keystroke-sized frames should not wait on Nagle.
        stream.set_nodelay(true)?;
        self.stream = Some(Box::new(stream));
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends `request` with the default [`READ_TIMEOUT`].
    pub async fn send(&mut self, request: &Request) -> Result<Response, AgentClientError> {
        self.send_with_timeout(request, READ_TIMEOUT).await
    }

    /// Sends `request` and waits up to `read_timeout` for its answer.
    pub async fn send_with_timeout(
        &mut self,
        request: &Request,
        read_timeout: Duration,
    ) -> Result<Response, AgentClientError> {
        let span = debug_span!("agent_send", opcode = request.opcode_name());
        async {
            let body = self.exchange(&encode_request(request), read_timeout).await?;
            match decode_response(&body)? {
                Response::Error { message } => Err(AgentClientError::AgentError(message)),
                response => Ok(response),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn heartbeat(&mut self) -> Result<(), AgentClientError> {
        self.send(&Request::Heartbeat).await.map(drop)
    }

    /// Writes one frame and reads one frame body back.
    async fn exchange(&mut self, frame: &[u8], read_timeout: Duration) -> Result<Vec<u8>, AgentClientError> {
        let stream = self.stream.as_mut().ok_or(AgentClientError::NotConnected)?;

        let outcome: Result<Vec<u8>, AgentClientError> = async {
            trace!(frame_bytes = frame.len(), "writing frame");
            stream.write_all(frame).await?;
            stream.flush().await?;

            match timeout(read_timeout, read_body(stream)).await {
                Ok(body) => Ok(body?),
                Err(_) => Err(AgentClientError::Timeout),
            }
        }
        .await;

        if outcome.is_err() {
            self.stream = None;
        }
        outcome
    }
}

async fn read_body(stream: &mut Box<dyn AgentStream>) -> std::io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let mut body = vec![0u8; read_frame_length(&header) as usize];
    trace!(body_bytes = body.len(), "reading frame");
    stream.read_exact(&mut body).await?;
    Ok(body)
}
