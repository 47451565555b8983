pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod numa;

// Re-exports
pub use crate::config::Settings;
pub use crate::core::{ConfigurationError, RequestedResources, ResourceManager};
pub use errors::{PlannerError, PlannerResult};
pub use numa::{
    allocate_multi_cell, allocate_single_cell, plan, repair_degenerate_cells, Degradation,
    GuestTopology, HostNumaNode, HostTopology, NetworkBinding, NetworkBindings, NicBuckets,
    NicIdentity, NumaAffinity, VirtualNumaCell,
};
