//! Service handshake with the device's lockdown collaborator.
//!
//! Before a client can talk to a device service it asks lockdown to start
//! that service.  Lockdown answers with where to connect (host and port) and
//! whether the connection must be encrypted; it never opens the session
//! itself.
//!
//! ```text
//! negotiate(provider, device, "com.apple.springboardservices")
//!     │
//!     ▼
//! ServiceProvider::start_service ──► ServiceDescriptor { host, port, use_encryption }
//!     │                                    │
//!     ▼ (error)                            ▼
//! SbsError::ServiceUnavailable        TransportSession::open
//! SbsError::ConnectionFailed
//! ```
//!
//! The provider is a trait so callers can plug in a real lockdown client, the
//! config-driven [`StaticServiceProvider`], or a test double.

mod static_provider;

pub use static_provider::StaticServiceProvider;

use async_trait::async_trait;
use sbs_core::SbsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// ── Types ─────────────────────────────────────────────────────────────────────

/// Identifies one attached device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    udid: String,
}

impl DeviceHandle {
    pub fn new(udid: impl Into<String>) -> Self {
        Self { udid: udid.into() }
    }

    /// A handle with no UDID.  Providers answer it from entries that are not
    /// tied to a particular device.
    pub fn any() -> Self {
        Self { udid: String::new() }
    }

    pub fn udid(&self) -> &str {
        &self.udid
    }

    pub fn is_any(&self) -> bool {
        self.udid.is_empty()
    }
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_any() {
            f.write_str("<any device>")
        } else {
            f.write_str(&self.udid)
        }
    }
}

/// Where a started service listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub host: String,
    pub port: u16,
    pub use_encryption: bool,
}

/// Failures reported by a [`ServiceProvider`].
#[derive(Debug, Error)]
pub enum LockdownError {
    /// The device declined to start the service (locked, not paired, ...).
    #[error("service start refused: {0}")]
    Refused(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Lockdown itself could not be reached.
    #[error("lockdown unreachable: {0}")]
    Unreachable(#[source] std::io::Error),
}

// ── Provider seam ─────────────────────────────────────────────────────────────

/// Starts named services on a device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    async fn start_service(
        &self,
        device: &DeviceHandle,
        service_name: &str,
    ) -> Result<ServiceDescriptor, LockdownError>;
}

/// Asks `provider` to start `service_name` on `device`.
///
/// # Errors
///
/// - [`SbsError::InvalidArgument`] if `service_name` is empty; the provider
///   is not contacted.
/// - [`SbsError::ServiceUnavailable`] if the provider refuses or does not
///   know the service.
/// - [`SbsError::ConnectionFailed`] if the provider cannot be reached.
pub async fn negotiate(
    provider: &dyn ServiceProvider,
    device: &DeviceHandle,
    service_name: &str,
) -> Result<ServiceDescriptor, SbsError> {
    if service_name.is_empty() {
        return Err(SbsError::InvalidArgument("service name must not be empty".to_string()));
    }

    match provider.start_service(device, service_name).await {
        Ok(descriptor) => {
            debug!(
                %device,
                service = service_name,
                host = %descriptor.host,
                port = descriptor.port,
                encrypted = descriptor.use_encryption,
                "service started"
            );
            Ok(descriptor)
        }
        Err(LockdownError::Refused(reason)) | Err(LockdownError::UnknownService(reason)) => {
            warn!(%device, service = service_name, "service unavailable: {reason}");
            Err(SbsError::ServiceUnavailable {
                service: service_name.to_string(),
                reason,
            })
        }
        Err(LockdownError::Unreachable(source)) => Err(SbsError::connection_failed(
            format!("lockdown for device {device}"),
            source,
        )),
    }
}
