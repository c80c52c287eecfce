//! Service provider backed by a fixed endpoint list.
//!
//! Useful when the service has already been started out of band (a port
//! forward, a usbmux relay, a test fixture) and only its address is needed.

use async_trait::async_trait;
use tracing::debug;

use super::{DeviceHandle, LockdownError, ServiceDescriptor, ServiceProvider};
use crate::infrastructure::storage::config::ServiceEntry;

/// Answers `start_service` from configured [`ServiceEntry`] records.
///
/// An entry with a `device` only matches that UDID; an entry without one
/// matches every device.  Device-specific entries win over wildcard ones.
/// [`DeviceHandle::any`] only matches wildcard entries.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceProvider {
    entries: Vec<ServiceEntry>,
}

impl StaticServiceProvider {
    pub fn new(entries: Vec<ServiceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    fn lookup(&self, device: &DeviceHandle, service_name: &str) -> Option<&ServiceEntry> {
        let for_service = || self.entries.iter().filter(move |e| e.service == service_name);
        for_service()
            .find(|e| !device.is_any() && e.device.as_deref() == Some(device.udid()))
            .or_else(|| for_service().find(|e| e.device.is_none()))
    }
}

#[async_trait]
impl ServiceProvider for StaticServiceProvider {
    async fn start_service(
        &self,
        device: &DeviceHandle,
        service_name: &str,
    ) -> Result<ServiceDescriptor, LockdownError> {
        let entry = self
            .lookup(device, service_name)
            .ok_or_else(|| LockdownError::UnknownService(format!("{service_name} (device {device})")))?;
        debug!(%device, service = service_name, host = %entry.host, port = entry.port, "static service entry");
        Ok(ServiceDescriptor {
            host: entry.host.clone(),
            port: entry.port,
            use_encryption: entry.use_encryption,
        })
    }
}
