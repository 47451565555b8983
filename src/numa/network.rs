use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

use super::host::HostTopology;
use crate::errors::{read_document, DocumentKind, PlannerError, PlannerResult};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NicIdentity {
    pub name: String,
    /// Passed through for the metadata renderer, never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci_address: Option<String>,
}

impl NicIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pci_address: None,
        }
    }

    pub fn with_pci_address(mut self, address: impl Into<String>) -> Self {
        self.pci_address = Some(address.into());
        self
    }
}

/// Host NUMA node a NIC hangs off, as resolved from PCI locality upstream.
///
/// On the wire this is a plain integer; `null`, a missing field or the
/// sysfs sentinel `-1` all mean the locality is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum NumaAffinity {
    Node(u32),
    #[default]
    Unknown,
}

impl NumaAffinity {
    pub fn node(self) -> Option<u32> {
        match self {
            NumaAffinity::Node(id) => Some(id),
            NumaAffinity::Unknown => None,
        }
    }
}

impl From<Option<i64>> for NumaAffinity {
    fn from(raw: Option<i64>) -> Self {
        raw.and_then(|id| u32::try_from(id).ok())
            .map_or(NumaAffinity::Unknown, NumaAffinity::Node)
    }
}

impl From<NumaAffinity> for Option<i64> {
    fn from(affinity: NumaAffinity) -> Self {
        affinity.node().map(i64::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateNic {
    #[serde(flatten)]
    pub nic: NicIdentity,
    #[serde(default)]
    pub affinity: NumaAffinity,
}

impl CandidateNic {
    pub fn new(nic: NicIdentity, affinity: NumaAffinity) -> Self {
        Self { nic, affinity }
    }
}

/// Host NICs selected to back one requested virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBinding {
    pub network_name: String,
    #[serde(default)]
    pub candidate_nics: Vec<CandidateNic>,
}

impl NetworkBinding {
    pub fn new(network_name: impl Into<String>, candidate_nics: Vec<CandidateNic>) -> Self {
        Self {
            network_name: network_name.into(),
            candidate_nics,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkBindings {
    bindings: Vec<NetworkBinding>,
}

impl NetworkBindings {
    pub fn new(bindings: Vec<NetworkBinding>) -> Self {
        Self { bindings }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn from_json_str(raw: &str) -> PlannerResult<Self> {
        serde_json::from_str(raw).map_err(|source| PlannerError::Parse {
            document: DocumentKind::NetworkBindings,
            source,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let path = path.as_ref();
        let bindings = Self::from_json_str(&read_document(path)?)?;
        debug!(
            path = %path.display(),
            networks = bindings.len(),
            "Loaded network bindings"
        );
        Ok(bindings)
    }
}

impl FromIterator<NetworkBinding> for NetworkBindings {
    fn from_iter<I: IntoIterator<Item = NetworkBinding>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Candidate NICs grouped by the host NUMA node they are attached to.
///
/// NICs with unknown locality, or locality naming a node the host does not
/// have, land in no bucket and do not count toward `total_ports`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NicBuckets {
    buckets: BTreeMap<u32, Vec<NicIdentity>>,
    total_ports: usize,
}

impl NicBuckets {
    pub fn collect(bindings: &NetworkBindings, host: &HostTopology) -> Self {
        let mut buckets: BTreeMap<u32, Vec<NicIdentity>> = BTreeMap::new();
        let mut total_ports = 0;

        for binding in bindings.iter() {
            for candidate in &binding.candidate_nics {
                let Some(node) = candidate.affinity.node() else {
                    debug!(
                        network = %binding.network_name,
                        nic = %candidate.nic.name,
                        "NIC has no NUMA affinity, leaving it unbucketed"
                    );
                    continue;
                };
                if !host.contains(node) {
                    warn!(
                        network = %binding.network_name,
                        nic = %candidate.nic.name,
                        node,
                        "NIC claims affinity to a NUMA node the host does not have"
                    );
                    continue;
                }
                buckets.entry(node).or_default().push(candidate.nic.clone());
                total_ports += 1;
            }
        }

        Self {
            buckets,
            total_ports,
        }
    }

    pub fn total_ports(&self) -> usize {
        self.total_ports
    }

    pub fn is_empty(&self) -> bool {
        self.total_ports == 0
    }

    pub fn bucket(&self, node: u32) -> &[NicIdentity] {
        self.buckets.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[NicIdentity])> {
        self.buckets
            .iter()
            .map(|(&node, nics)| (node, nics.as_slice()))
    }

    /// Every bucketed NIC, deduplicated.
    pub fn all_nics(&self) -> BTreeSet<NicIdentity> {
        self.buckets.values().flatten().cloned().collect()
    }
}
