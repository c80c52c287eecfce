//! sbs-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the `sbsutil` binary share the same module tree.
//!
//! # What does sbs-client do? (for beginners)
//!
//! A mobile device runs many small *services*, each reachable over its own
//! connection once the device's lockdown daemon has started it.  This crate
//! talks to one of them, the springboard (home screen) service:
//!
//! 1. Ask a [`ServiceProvider`] to start `com.apple.springboardservices` on a
//!    device; it answers with a host, a port and whether TLS is required.
//! 2. Open a [`TransportSession`] to that endpoint (TCP, optionally TLS).
//! 3. Exchange length-prefixed, codec-encoded request and response
//!    dictionaries through a [`SpringboardServiceClient`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), sbs_core::SbsError> {
//! use sbs_client::{DeviceHandle, SpringboardServiceClient, StaticServiceProvider, TransportConfig};
//!
//! let provider = StaticServiceProvider::default();
//! let device = DeviceHandle::new("00008030-001A2B3C4D5E6F70");
//! let mut client = SpringboardServiceClient::attach(&provider, &device, &TransportConfig::default()).await?;
//! let orientation = client.get_interface_orientation().await?;
//! println!("{orientation}");
//! client.close().await;
//! # Ok(())
//! # }
//! ```

/// Application layer: service clients.
pub mod application;

/// Infrastructure layer: lockdown handshake, transport, and files.
pub mod infrastructure;

pub use application::SpringboardServiceClient;
pub use infrastructure::lockdown::{negotiate, DeviceHandle, ServiceDescriptor, ServiceProvider, StaticServiceProvider};
pub use infrastructure::transport::{TransportConfig, TransportSession};
