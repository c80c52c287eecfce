//! Error taxonomy for service clients and the status-code mapper.
//!
//! Device services report failures as small signed integers inside the
//! response dictionary.  Those numbers never reach callers directly: they are
//! turned into an [`SbsError`] at the boundary by [`error_for_status`], and
//! only an unrecognized number survives, inside
//! [`SbsError::UnknownProtocol`], for diagnostics.

use thiserror::Error;

use crate::value::CodecError;

/// Status codes carried in the `status` key of every response.
///
/// The numeric values are fixed by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum StatusCode {
    Success = 0,
    InvalidArg = -1,
    PlistError = -2,
    ConnFailed = -3,
    UnknownError = -256,
}

impl StatusCode {
    /// Returns the status for a raw wire number, or `None` if unrecognized.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(StatusCode::Success),
            -1 => Some(StatusCode::InvalidArg),
            -2 => Some(StatusCode::PlistError),
            -3 => Some(StatusCode::ConnFailed),
            -256 => Some(StatusCode::UnknownError),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        self as i64
    }

    /// Maps the status to the kind of error it represents.
    ///
    /// `Success` maps to `None`.
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            StatusCode::Success => None,
            StatusCode::InvalidArg => Some(ErrorKind::InvalidArgument),
            StatusCode::PlistError => Some(ErrorKind::StructuredDataError),
            StatusCode::ConnFailed => Some(ErrorKind::ConnectionFailed),
            StatusCode::UnknownError => Some(ErrorKind::UnknownProtocolError),
        }
    }
}

/// The closed set of failure kinds, for callers that match on the kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    StructuredDataError,
    ConnectionFailed,
    ConnectionClosed,
    ServiceUnavailable,
    UnknownProtocolError,
}

/// Error type returned by every service-client operation.
#[derive(Debug, Error)]
pub enum SbsError {
    /// An argument was rejected, locally or by the service.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A structured value could not be decoded, or a response had the wrong shape.
    #[error("structured data error: {0}")]
    StructuredData(String),

    /// The transport failed: connect, TLS handshake, read, write, or timeout.
    #[error("connection failed: {context}")]
    ConnectionFailed {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The session was already closed, explicitly or after an earlier failure.
    #[error("connection closed")]
    ConnectionClosed,

    /// The device refused to start the service, or does not know it.
    #[error("service {service} unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// The service reported `UNKNOWN_ERROR` or a status this client does not know.
    #[error("unknown protocol error (status {code})")]
    UnknownProtocol { code: i64 },
}

impl SbsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SbsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SbsError::StructuredData(_) => ErrorKind::StructuredDataError,
            SbsError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            SbsError::ConnectionClosed => ErrorKind::ConnectionClosed,
            SbsError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            SbsError::UnknownProtocol { .. } => ErrorKind::UnknownProtocolError,
        }
    }

    /// Builds a [`SbsError::ConnectionFailed`] wrapping an I/O error.
    pub fn connection_failed(context: impl Into<String>, source: std::io::Error) -> Self {
        SbsError::ConnectionFailed {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Builds a [`SbsError::ConnectionFailed`] with no underlying I/O error.
    pub fn connection_failed_msg(context: impl Into<String>) -> Self {
        SbsError::ConnectionFailed {
            context: context.into(),
            source: None,
        }
    }

    /// Returns `true` if this error leaves the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConnectionFailed)
    }
}

impl From<CodecError> for SbsError {
    fn from(err: CodecError) -> Self {
        SbsError::StructuredData(err.to_string())
    }
}

/// Maps a raw status number from a response to an error.
///
/// Returns `None` for `SUCCESS`.  `UNKNOWN_ERROR` and every unrecognized
/// number map to [`SbsError::UnknownProtocol`] carrying the raw code.
pub fn error_for_status(raw: i64) -> Option<SbsError> {
    let Some(status) = StatusCode::from_raw(raw) else {
        return Some(SbsError::UnknownProtocol { code: raw });
    };
    let err = match status.error_kind()? {
        ErrorKind::InvalidArgument => {
            SbsError::InvalidArgument(format!("service rejected request (status {raw})"))
        }
        ErrorKind::StructuredDataError => {
            SbsError::StructuredData(format!("service reported a data error (status {raw})"))
        }
        ErrorKind::ConnectionFailed => {
            SbsError::connection_failed_msg(format!("service reported connection failure (status {raw})"))
        }
        ErrorKind::ConnectionClosed
        | ErrorKind::ServiceUnavailable
        | ErrorKind::UnknownProtocolError => SbsError::UnknownProtocol { code: raw },
    };
    Some(err)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
