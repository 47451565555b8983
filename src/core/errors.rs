use thiserror::Error;

/// Fatal precondition violations. Placement infeasibility is never reported
/// here; it travels as `Degradation` data on the returned topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Requested vCPU count must be greater than zero")]
    ZeroCpus,

    #[error("Requested RAM must be greater than zero")]
    ZeroMemory,

    #[error("At least one network binding is required for multi-cell allocation")]
    NoNetworkBindings,

    #[error("Host topology exposes no CPUs")]
    EmptyHost,

    #[error("Host NUMA node {0} is listed more than once")]
    DuplicateNode(u32),

    #[error("Host CPU {cpu} is claimed by node {first} and node {second}")]
    SharedCpu { cpu: u32, first: u32, second: u32 },
}
