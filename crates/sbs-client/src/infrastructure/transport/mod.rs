//! Byte-stream session to a started device service.
//!
//! A [`TransportSession`] owns one connected stream (plain TCP, or TCP
//! upgraded to TLS when the service descriptor asks for encryption) and moves
//! two kinds of frames over it:
//!
//! - **value frames**: a structured [`Value`] encoded with the sbs-core codec,
//! - **raw frames**: an opaque byte payload (icon and wallpaper PNG data).
//!
//! Both use the same wire layout, a 4-byte big-endian length followed by the
//! body, so the framing helpers in [`sbs_core::protocol`] are shared.
//!
//! # Failure model (for beginners)
//!
//! Network code has two broad kinds of error:
//!
//! 1. The bytes arrived but make no sense (bad codec input, a frame larger
//!    than we are willing to buffer).  These are [`SbsError::StructuredData`].
//! 2. The bytes did not arrive: refused connect, TLS failure, EOF in the
//!    middle of a frame, or a timeout.  These are
//!    [`SbsError::ConnectionFailed`].
//!
//! The session never retries.  Once closed, every call returns
//! [`SbsError::ConnectionClosed`] without touching the stream.

pub mod tls;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use sbs_core::protocol::{frame_header, parse_frame_header, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
use sbs_core::value::{decode, encode};
use sbs_core::{SbsError, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::infrastructure::lockdown::ServiceDescriptor;

/// Default limit for establishing the TCP connection and the TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit for each individual read or write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── Stream abstraction ────────────────────────────────────────────────────────

/// Any bidirectional byte stream a session can run over.
///
/// Implemented automatically for `TcpStream`, TLS streams, `tokio::io::duplex`
/// halves and test mocks.
pub trait ServiceStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ServiceStream for T {}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Connection and I/O limits for a session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Limit for the TCP connect and, separately, the TLS handshake.
    pub connect_timeout: Duration,
    /// Limit for each read or write.  `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Largest frame body accepted from the device.
    pub max_frame_size: usize,
    /// TLS settings for encrypted services.  `None` uses
    /// [`tls::device_tls_config`] without a client identity.
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tls: None,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// An open (or closed) connection to one device service.
///
/// Dropping the session releases the socket; [`close`](Self::close) does the
/// same but shuts the write side down first.
pub struct TransportSession {
    stream: Option<Box<dyn ServiceStream>>,
    peer: String,
    io_timeout: Option<Duration>,
    max_frame_size: usize,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .field("io_timeout", &self.io_timeout)
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

impl TransportSession {
    /// Connects to the service described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::ConnectionFailed`] if the TCP connect or the TLS
    /// handshake fails or exceeds `config.connect_timeout`.
    pub async fn open(descriptor: ServiceDescriptor, config: &TransportConfig) -> Result<Self, SbsError> {
        let peer = format!("{}:{}", descriptor.host, descriptor.port);
        debug!(%peer, encrypted = descriptor.use_encryption, "connecting to service");

        let tcp = bounded(
            Some(config.connect_timeout),
            &format!("connect to {peer}"),
            TcpStream::connect((descriptor.host.as_str(), descriptor.port)),
        )
        .await?;
        // Requests are small and strictly request/response.
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(%peer, "could not disable Nagle: {e}");
        }

        let stream: Box<dyn ServiceStream> = if descriptor.use_encryption {
            let tls_config = match &config.tls {
                Some(tls_config) => Arc::clone(tls_config),
                None => Arc::new(tls::device_tls_config(None).map_err(|e| {
                    SbsError::connection_failed_msg(format!("TLS setup for {peer}: {e}"))
                })?),
            };
            let connector = TlsConnector::from(tls_config);
            let server_name = tls::server_name_for(&descriptor.host);
            let tls_stream = bounded(
                Some(config.connect_timeout),
                &format!("TLS handshake with {peer}"),
                connector.connect(server_name, tcp),
            )
            .await?;
            Box::new(tls_stream)
        } else {
            Box::new(tcp)
        };

        info!(%peer, encrypted = descriptor.use_encryption, "service session open");
        Ok(Self {
            stream: Some(stream),
            peer,
            io_timeout: config.io_timeout,
            max_frame_size: config.max_frame_size,
        })
    }

    /// Wraps an already-connected stream.
    pub fn from_stream<S>(stream: S, config: &TransportConfig) -> Self
    where
        S: ServiceStream + 'static,
    {
        Self {
            stream: Some(Box::new(stream)),
            peer: "<stream>".to_string(),
            io_timeout: config.io_timeout,
            max_frame_size: config.max_frame_size,
        }
    }

    /// `host:port` of the service, or `<stream>` for wrapped streams.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Encodes `value` and sends it as one frame.
    ///
    /// # Errors
    ///
    /// - [`SbsError::InvalidArgument`] if `value` cannot be encoded (nested
    ///   too deeply); nothing is written.
    /// - [`SbsError::ConnectionFailed`] on I/O error or timeout.
    pub async fn send_value(&mut self, value: &Value) -> Result<(), SbsError> {
        if self.is_closed() {
            return Err(SbsError::ConnectionClosed);
        }
        let body = encode(value).map_err(|e| SbsError::InvalidArgument(format!("value cannot be encoded: {e}")))?;
        self.write_frame(&body, "send value").await
    }

    /// Receives one frame and decodes it.
    ///
    /// # Errors
    ///
    /// - [`SbsError::StructuredData`] if the frame is too large or does not decode.
    /// - [`SbsError::ConnectionFailed`] on EOF, I/O error or timeout.
    pub async fn receive_value(&mut self) -> Result<Value, SbsError> {
        let max_len = self.max_frame_size;
        let body = self.read_frame(max_len, "receive value").await?;
        Ok(decode(&body)?)
    }

    /// Sends `bytes` as one raw frame.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), SbsError> {
        self.write_frame(bytes, "send raw payload").await
    }

    /// Receives one raw frame of at most `max_len` bytes.
    ///
    /// `max_len` is further capped by the configured frame limit.
    pub async fn receive_raw(&mut self, max_len: usize) -> Result<Vec<u8>, SbsError> {
        let max_len = max_len.min(self.max_frame_size);
        self.read_frame(max_len, "receive raw payload").await
    }

    /// Shuts the stream down.  Calling it again does nothing.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        match bounded(self.io_timeout, "shutdown", stream.shutdown()).await {
            Ok(()) => info!(peer = %self.peer, "service session closed"),
            Err(e) => debug!(peer = %self.peer, "session closed without clean shutdown: {e}"),
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    async fn write_frame(&mut self, body: &[u8], what: &str) -> Result<(), SbsError> {
        let header = frame_header(body.len())?;
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(SbsError::ConnectionClosed)?;

        // One buffer, one write: the header never goes out without its body.
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(body);

        bounded(io_timeout, what, stream.write_all(&frame)).await?;
        bounded(io_timeout, what, stream.flush()).await?;
        debug!(peer = %self.peer, bytes = body.len(), "{what}");
        Ok(())
    }

    async fn read_frame(&mut self, max_len: usize, what: &str) -> Result<Vec<u8>, SbsError> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(SbsError::ConnectionClosed)?;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        bounded(io_timeout, what, stream.read_exact(&mut header)).await?;

        let len = match parse_frame_header(header, max_len) {
            Ok(len) => len,
            Err(e) => {
                // The oversized body is still in the stream; no later frame
                // boundary can be trusted.
                warn!(peer = %self.peer, "{what}: {e}; closing session");
                self.close().await;
                return Err(e);
            }
        };

        let mut body = vec![0u8; len];
        bounded(io_timeout, what, stream.read_exact(&mut body)).await?;
        debug!(peer = %self.peer, bytes = len, "{what}");
        Ok(body)
    }
}

/// Runs `fut` under an optional time limit, mapping I/O errors and expiry to
/// [`SbsError::ConnectionFailed`].
async fn bounded<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T, SbsError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                return Err(SbsError::connection_failed(
                    format!("{what}: timed out after {limit:?}"),
                    io::Error::from(io::ErrorKind::TimedOut),
                ))
            }
        },
        None => fut.await,
    };
    result.map_err(|e| SbsError::connection_failed(what.to_string(), e))
}
