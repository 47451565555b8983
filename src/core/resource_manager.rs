use tracing::debug;

use crate::config::{GuestSettings, Settings};
use crate::core::errors::ConfigurationError;
use crate::core::vm::RequestedResources;
use crate::numa::{self, GuestTopology, HostTopology, NetworkBindings};

/// Turns operator input into a validated request and plans it.
#[derive(Debug, Clone, Default)]
pub struct ResourceManager {
    defaults: GuestSettings,
}

impl ResourceManager {
    pub fn new(defaults: GuestSettings) -> Self {
        Self { defaults }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.guest.clone())
    }

    /// Fills whatever the operator left out from the configured defaults.
    /// The huge-page flag is on if either side asks for it.
    pub fn resolve_request(
        &self,
        cpus: Option<u32>,
        ram_mb: Option<u64>,
        hugepages: bool,
    ) -> Result<RequestedResources, ConfigurationError> {
        let request = RequestedResources::new(
            cpus.unwrap_or(self.defaults.default_vcpus),
            ram_mb.unwrap_or(self.defaults.default_memory_mb),
        )
        .with_hugepages(hugepages || self.defaults.hugepages);

        request.validate()?;
        debug!(?request, "Resolved guest resource request");
        Ok(request)
    }

    pub fn plan(
        &self,
        host: &HostTopology,
        bindings: &NetworkBindings,
        request: &RequestedResources,
    ) -> Result<GuestTopology, ConfigurationError> {
        numa::plan(host, request, bindings)
    }
}
