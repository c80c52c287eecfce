//! Storage infrastructure: files `sbsutil` reads and writes.
//!
//! - **`config`** – the TOML configuration file (transport limits, TLS
//!   identity, statically known service endpoints).
//! - **`icon_state`** – icon layouts saved as JSON, so a layout fetched from
//!   one device can be edited by hand and pushed back.

pub mod config;
pub mod icon_state;
