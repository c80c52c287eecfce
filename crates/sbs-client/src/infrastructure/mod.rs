//! Infrastructure layer: everything that touches sockets or files.
//!
//! **Dependency rule**: this layer may depend on `sbs_core`, but MUST NOT
//! import the `application` layer.
//!
//! # Sub-modules
//!
//! - **`lockdown`** – the `ServiceProvider` seam that starts a named service
//!   on a device and reports where it listens, plus `negotiate`, which turns
//!   provider failures into `SbsError`s.  `StaticServiceProvider` serves
//!   endpoints from the config file.
//!
//! - **`transport`** – `TransportSession`: TCP connect, optional TLS upgrade,
//!   and length-prefixed value/raw frames with per-call timeouts.
//!
//! - **`storage`** – the TOML config file and JSON icon-layout files.

pub mod lockdown;
pub mod storage;
pub mod transport;
