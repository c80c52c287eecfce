//! Length-prefixed framing shared by value frames and raw frames.
//!
//! Wire format:
//! ```text
//! [body_len:4][body:body_len]
//! ```
//! `body_len` is a big-endian `u32`.  A value frame carries an encoded
//! [`crate::value::Value`] document; a raw frame carries opaque bytes such as
//! PNG image data.  The framing is the same for both; the protocol decides
//! which one comes next.
//!
//! These helpers are pure.  Socket I/O lives in the client crate.

use crate::error::SbsError;

/// Size of the length header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default upper bound on a frame body (32 MiB).
///
/// Home-screen wallpapers are the largest payloads this protocol carries and
/// stay well below this.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Builds the length header for a body of `body_len` bytes.
///
/// # Errors
///
/// Returns [`SbsError::InvalidArgument`] if the body does not fit in the
/// `u32` length field.
pub fn frame_header(body_len: usize) -> Result<[u8; FRAME_HEADER_SIZE], SbsError> {
    let len = u32::try_from(body_len).map_err(|_| {
        SbsError::InvalidArgument(format!("frame body of {body_len} bytes is too large"))
    })?;
    Ok(len.to_be_bytes())
}

/// Prepends the length header to `body`, producing one contiguous frame.
///
/// # Errors
///
/// See [`frame_header`].
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, SbsError> {
    let header = frame_header(body.len())?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Parses a length header and checks it against `max_len`.
///
/// # Errors
///
/// Returns [`SbsError::StructuredData`] if the declared length exceeds
/// `max_len`.
pub fn parse_frame_header(header: [u8; FRAME_HEADER_SIZE], max_len: usize) -> Result<usize, SbsError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(SbsError::StructuredData(format!(
            "frame declares {len} bytes, limit is {max_len}"
        )));
    }
    Ok(len)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
