use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::errors::ConfigurationError;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Settings Error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {document} document: {source}")]
    Parse {
        document: DocumentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {document}: {source}")]
    Serialize {
        document: DocumentKind,
        #[source]
        source: serde_json::Error,
    },
}

/// The JSON documents crossing the planner boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    HostTopology,
    NetworkBindings,
    GuestTopology,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::HostTopology => write!(f, "host topology"),
            DocumentKind::NetworkBindings => write!(f, "network bindings"),
            DocumentKind::GuestTopology => write!(f, "guest topology"),
        }
    }
}

/// Resources the allocator can fall short on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Memory,
    Cpu,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Memory => write!(f, "Memory"),
            ResourceType::Cpu => write!(f, "CPU"),
        }
    }
}

// Result type alias for convenience
pub type PlannerResult<T> = Result<T, PlannerError>;

pub(crate) fn read_document(path: &std::path::Path) -> PlannerResult<String> {
    std::fs::read_to_string(path).map_err(|source| PlannerError::Io {
        path: path.to_path_buf(),
        source,
    })
}
