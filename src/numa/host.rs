use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::core::errors::ConfigurationError;
use crate::errors::{read_document, DocumentKind, PlannerError, PlannerResult};

/// One physical NUMA node as reported by the inventory collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNumaNode {
    pub id: u32,
    pub cpu_ids: BTreeSet<u32>,
    pub total_ram_mb: u64,
    pub free_ram_mb: u64,
}

impl HostNumaNode {
    pub fn new(
        id: u32,
        cpu_ids: impl IntoIterator<Item = u32>,
        total_ram_mb: u64,
        free_ram_mb: u64,
    ) -> Self {
        Self {
            id,
            cpu_ids: cpu_ids.into_iter().collect(),
            total_ram_mb,
            free_ram_mb,
        }
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_ids.len()
    }
}

/// Host NUMA layout. Node order is the enumeration order and decides ties,
/// so it is preserved exactly as supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HostNumaNode>", into = "Vec<HostNumaNode>")]
pub struct HostTopology {
    nodes: Vec<HostNumaNode>,
}

impl HostTopology {
    /// Builds a topology, rejecting duplicate node ids and CPUs claimed by
    /// more than one node.
    pub fn new(nodes: Vec<HostNumaNode>) -> Result<Self, ConfigurationError> {
        let mut seen_nodes = BTreeSet::new();
        let mut cpu_owner: BTreeMap<u32, u32> = BTreeMap::new();

        for node in &nodes {
            if !seen_nodes.insert(node.id) {
                return Err(ConfigurationError::DuplicateNode(node.id));
            }
            for &cpu in &node.cpu_ids {
                if let Some(&first) = cpu_owner.get(&cpu) {
                    return Err(ConfigurationError::SharedCpu {
                        cpu,
                        first,
                        second: node.id,
                    });
                }
                cpu_owner.insert(cpu, node.id);
            }
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[HostNumaNode] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> Option<&HostNumaNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.node(id).is_some()
    }

    pub fn total_cpus(&self) -> usize {
        self.nodes.iter().map(HostNumaNode::cpu_count).sum()
    }

    pub fn total_ram_mb(&self) -> u64 {
        self.nodes.iter().map(|node| node.total_ram_mb).sum()
    }

    pub fn from_json_str(raw: &str) -> PlannerResult<Self> {
        serde_json::from_str(raw).map_err(|source| PlannerError::Parse {
            document: DocumentKind::HostTopology,
            source,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let path = path.as_ref();
        let topology = Self::from_json_str(&read_document(path)?)?;
        debug!(
            path = %path.display(),
            nodes = topology.nodes.len(),
            cpus = topology.total_cpus(),
            "Loaded host topology"
        );
        Ok(topology)
    }
}

impl TryFrom<Vec<HostNumaNode>> for HostTopology {
    type Error = ConfigurationError;

    fn try_from(nodes: Vec<HostNumaNode>) -> Result<Self, Self::Error> {
        Self::new(nodes)
    }
}

impl From<HostTopology> for Vec<HostNumaNode> {
    fn from(topology: HostTopology) -> Self {
        topology.nodes
    }
}
