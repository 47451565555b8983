pub mod allocator;
pub mod guest;
pub mod host;
pub mod network;
pub mod split;

pub use allocator::{
    allocate_multi_cell, allocate_single_cell, plan, repair_degenerate_cells, MAX_CELLS,
};
pub use guest::{CpuPinning, Degradation, GuestTopology, VirtualNumaCell};
pub use host::{HostNumaNode, HostTopology};
pub use network::{CandidateNic, NetworkBinding, NetworkBindings, NicBuckets, NicIdentity, NumaAffinity};
