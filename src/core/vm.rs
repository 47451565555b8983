use serde::{Deserialize, Serialize};

use super::errors::ConfigurationError;

// What the operator asked for. Read-only for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedResources {
    pub cpus: u32,
    pub ram_mb: u64,
    /// Huge-page capability flag. Carried through to the guest topology,
    /// never enforced.
    #[serde(default)]
    pub hugepages: bool,
}

impl RequestedResources {
    pub fn new(cpus: u32, ram_mb: u64) -> Self {
        Self {
            cpus,
            ram_mb,
            hugepages: false,
        }
    }

    pub fn with_hugepages(mut self, enabled: bool) -> Self {
        self.hugepages = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.cpus == 0 {
            return Err(ConfigurationError::ZeroCpus);
        }
        if self.ram_mb == 0 {
            return Err(ConfigurationError::ZeroMemory);
        }
        Ok(())
    }
}
