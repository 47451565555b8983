use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::network::NicIdentity;
use crate::errors::{DocumentKind, PlannerError, PlannerResult};

/// vCPU id -> host CPU ids it may run on.
pub type CpuPinning = BTreeMap<u32, BTreeSet<u32>>;

/// A recorded, non-fatal shortfall between the request and the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub cpu: bool,
    pub memory: bool,
    pub message: String,
}

impl Degradation {
    pub fn cpu(message: impl Into<String>) -> Self {
        Self {
            cpu: true,
            memory: false,
            message: message.into(),
        }
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self {
            cpu: false,
            memory: true,
            message: message.into(),
        }
    }

    pub fn both(message: impl Into<String>) -> Self {
        Self {
            cpu: true,
            memory: true,
            message: message.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.cpu || self.memory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNumaCell {
    pub cell_id: u32,
    pub memory_mb: u64,
    pub cpu_pinning: CpuPinning,
    pub nics: BTreeSet<NicIdentity>,
    /// Host NUMA nodes backing this cell.
    pub host_nodes: BTreeSet<u32>,
}

impl VirtualNumaCell {
    pub fn vcpu_count(&self) -> usize {
        self.cpu_pinning.len()
    }

    // A cell that received a memory share but no vCPUs.
    pub fn is_cpuless(&self) -> bool {
        self.cpu_pinning.is_empty()
    }

    pub fn host_cpus(&self) -> BTreeSet<u32> {
        self.cpu_pinning.values().flatten().copied().collect()
    }
}

/// The guest vNUMA plan handed to the metadata renderer. Frozen once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestTopology {
    pub cells: Vec<VirtualNumaCell>,
    pub consumed_host_numa_ids: BTreeSet<u32>,
    pub degradation: Degradation,
    pub hugepages: bool,
}

impl GuestTopology {
    pub(crate) fn with_degradation(mut self, degradation: Degradation) -> Self {
        self.degradation = degradation;
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation.is_degraded()
    }

    pub fn total_memory_mb(&self) -> u64 {
        self.cells.iter().map(|cell| cell.memory_mb).sum()
    }

    pub fn total_vcpus(&self) -> usize {
        self.cells.iter().map(VirtualNumaCell::vcpu_count).sum()
    }

    /// All (vCPU, host CPUs) pinning entries across cells, ordered by vCPU.
    pub fn pinning_entries(&self) -> Vec<(u32, &BTreeSet<u32>)> {
        let mut entries: Vec<_> = self
            .cells
            .iter()
            .flat_map(|cell| cell.cpu_pinning.iter().map(|(&vcpu, cpus)| (vcpu, cpus)))
            .collect();
        entries.sort_by_key(|&(vcpu, _)| vcpu);
        entries
    }

    pub fn to_json_pretty(&self) -> PlannerResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| PlannerError::Serialize {
            document: DocumentKind::GuestTopology,
            source,
        })
    }
}
