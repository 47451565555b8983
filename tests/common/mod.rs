#![allow(dead_code)]

use std::collections::BTreeSet;
use vnuma_planner::numa::CandidateNic;
use vnuma_planner::{
    GuestTopology, HostNumaNode, HostTopology, NetworkBinding, NetworkBindings, NicIdentity,
    NumaAffinity, RequestedResources,
};

/// `nodes` NUMA nodes with ids 0.., `cpus_per_node` contiguous CPU ids each.
pub fn uniform_host(nodes: u32, cpus_per_node: u32, ram_mb: u64) -> HostTopology {
    host_with_ram(&vec![ram_mb; nodes as usize], cpus_per_node)
}

pub fn host_with_ram(ram_per_node: &[u64], cpus_per_node: u32) -> HostTopology {
    let nodes = ram_per_node
        .iter()
        .enumerate()
        .map(|(id, &ram)| {
            let id = id as u32;
            let first = id * cpus_per_node;
            HostNumaNode::new(id, first..first + cpus_per_node, ram, ram)
        })
        .collect();
    HostTopology::new(nodes).expect("valid test host")
}

pub fn nic(name: &str, affinity: Option<u32>) -> CandidateNic {
    let affinity = affinity.map_or(NumaAffinity::Unknown, NumaAffinity::Node);
    CandidateNic::new(NicIdentity::new(name), affinity)
}

pub fn single_network(nics: Vec<CandidateNic>) -> NetworkBindings {
    NetworkBindings::new(vec![NetworkBinding::new("data", nics)])
}

/// One network per NIC, each NIC on the given node.
pub fn nics_on(nodes: &[u32]) -> NetworkBindings {
    nodes
        .iter()
        .enumerate()
        .map(|(index, &node)| {
            NetworkBinding::new(format!("net{index}"), vec![nic(&format!("eth{index}"), Some(node))])
        })
        .collect()
}

/// Checks the four topology invariants; panics with context on violation.
pub fn assert_invariants(topology: &GuestTopology, host: &HostTopology, request: &RequestedResources) {
    assert!(!topology.cells.is_empty(), "topology has no cells");

    let mut vcpus = Vec::new();
    for cell in &topology.cells {
        vcpus.extend(cell.cpu_pinning.keys().copied());
    }
    vcpus.sort_unstable();
    let expected: Vec<u32> = (0..request.cpus).collect();
    assert_eq!(vcpus, expected, "vCPU coverage broken: {topology:?}");

    assert_eq!(
        topology.total_memory_mb(),
        request.ram_mb,
        "memory not conserved: {topology:?}"
    );

    let allowed: BTreeSet<u32> = host
        .nodes()
        .iter()
        .filter(|node| topology.consumed_host_numa_ids.contains(&node.id))
        .flat_map(|node| node.cpu_ids.iter().copied())
        .collect();
    for cell in &topology.cells {
        for cpu in cell.host_cpus() {
            assert!(
                allowed.contains(&cpu),
                "host cpu {cpu} pinned outside consumed nodes {:?}",
                topology.consumed_host_numa_ids
            );
        }
    }

    for (index, cell) in topology.cells.iter().enumerate() {
        assert_eq!(cell.cell_id, index as u32, "cell ids not contiguous");
    }
}
