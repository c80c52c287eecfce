//! # sbs-core
//!
//! Shared library for the springboard services client containing the
//! structured-value codec, the frame format, the request/response message
//! types, and the error taxonomy.
//!
//! It has no dependencies on sockets, TLS, or an async runtime; the
//! `sbs-client` crate layers the transport on top of it.
//!
//! # Architecture overview
//!
//! A host computer talks to a device service over a byte stream.  Each
//! exchange is one request followed by one response:
//!
//! - **`value`** – the self-describing [`Value`] tree every message is made
//!   of, and the binary codec that turns it into bytes and back.
//!
//! - **`protocol`** – the 4-byte length framing shared by structured and raw
//!   frames, plus the springboard commands ([`Request`], [`Response`],
//!   [`InterfaceOrientation`], [`ImagePayload`]).
//!
//! - **`error`** – [`SbsError`], the single error type surfaced to callers,
//!   and the mapping from protocol status numbers to error kinds.

pub mod error;
pub mod protocol;
pub mod value;

pub use error::{error_for_status, ErrorKind, SbsError, StatusCode};
pub use protocol::messages::{
    Command, ImagePayload, InterfaceOrientation, Request, Response, SERVICE_NAME,
};
pub use value::{Date, Dictionary, Value};
