//! Icon layouts on disk.
//!
//! Layouts are stored as the serde JSON form of [`Value`], which tags every
//! node with its type (`{"Integer": 3}`, `{"Real": 2.0}`, ...).  That keeps
//! integers and reals distinct and dictionary keys in order, so a layout
//! written here and read back is identical to the one the device sent.

use std::path::{Path, PathBuf};

use sbs_core::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IconStateFileError {
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid icon state file: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes `state` to `path` as pretty-printed JSON.
pub fn save_icon_state(path: &Path, state: &Value) -> Result<(), IconStateFileError> {
    let text = to_json(state).map_err(|source| IconStateFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| IconStateFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a layout previously written by [`save_icon_state`].
pub fn load_icon_state(path: &Path) -> Result<Value, IconStateFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| IconStateFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| IconStateFileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON form of `state`, as printed to stdout by `sbsutil icon-state`.
pub fn to_json(state: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(state)
}
