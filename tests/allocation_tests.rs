// Allocation suite: the golden scenarios plus every fallback tier.

mod common;

use common::*;
use std::collections::BTreeSet;
use vnuma_planner::{
    allocate_multi_cell, allocate_single_cell, plan, ConfigurationError, HostNumaNode,
    HostTopology, NetworkBindings, NicBuckets, RequestedResources,
};

fn scenario_b_host() -> HostTopology {
    host_with_ram(&[64_000, 64_000, 6_000, 6_000], 10)
}

#[test]
fn scenario_a_single_node_fits_in_one_cell() {
    let host = uniform_host(1, 10, 6000);
    let request = RequestedResources::new(6, 5);
    let bindings = nics_on(&[0]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert_eq!(topology.cells.len(), 1);
    let cell = &topology.cells[0];
    assert_eq!(cell.cell_id, 0);
    assert_eq!(cell.memory_mb, 5);
    for vcpu in 0..6 {
        assert_eq!(cell.cpu_pinning[&vcpu], BTreeSet::from([vcpu]));
    }
    assert!(!topology.is_degraded());
    assert_invariants(&topology, &host, &request);
}

#[test]
fn scenario_b_splits_across_nic_nodes() {
    let host = scenario_b_host();
    let request = RequestedResources::new(10, 6000);
    let bindings = nics_on(&[0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.is_degraded());
    assert_eq!(topology.cells.len(), 2);
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0, 1]));

    let first = &topology.cells[0];
    let second = &topology.cells[1];
    assert_eq!(first.memory_mb, 3000);
    assert_eq!(second.memory_mb, 3000);
    assert_eq!(first.cpu_pinning.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    assert_eq!(second.cpu_pinning.keys().copied().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
    assert_eq!(first.host_cpus(), (0..5).collect::<BTreeSet<u32>>());
    assert_eq!(second.host_cpus(), (10..15).collect::<BTreeSet<u32>>());
    assert_eq!(first.nics.iter().next().unwrap().name, "eth0");
    assert_eq!(second.nics.iter().next().unwrap().name, "eth1");

    let entries = topology.pinning_entries();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[4], (4, &BTreeSet::from([4])));
    assert_eq!(entries[5], (5, &BTreeSet::from([10])));

    assert_eq!(topology.total_memory_mb(), 6000);
    assert_eq!(topology.total_vcpus(), 10);
    assert_invariants(&topology, &host, &request);
}

#[test]
fn scenario_c_oversubscription_collapses_and_degrades() {
    let host = scenario_b_host();
    let request = RequestedResources::new(100, 6000);
    let bindings = nics_on(&[0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(topology.degradation.cpu);
    assert!(topology.degradation.memory);
    assert!(!topology.degradation.message.is_empty());
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.cells[0].memory_mb, 6000);
    // the whole 40-CPU pool, wrapping for vCPUs past it
    assert_eq!(topology.cells[0].cpu_pinning[&39], BTreeSet::from([39]));
    assert_eq!(topology.cells[0].cpu_pinning[&40], BTreeSet::from([0]));
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0, 1, 2, 3]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn no_affinity_matches_restricted_single_cell() {
    let host = scenario_b_host();
    let request = RequestedResources::new(4, 2048);
    let bindings = single_network(vec![nic("eth0", None), nic("eth1", None)]);

    let planned = plan(&host, &request, &bindings).unwrap();
    let buckets = NicBuckets::collect(&bindings, &host);
    let collapsed = allocate_single_cell(&host, &request, &buckets, true).unwrap();

    assert_eq!(planned, collapsed);
    assert!(!planned.is_degraded());
    assert_eq!(planned.consumed_host_numa_ids, BTreeSet::from([0]));
    assert_invariants(&planned, &host, &request);
}

#[test]
fn affinity_to_unknown_node_is_ignored() {
    let host = uniform_host(2, 4, 8192);
    let request = RequestedResources::new(2, 1024);
    let bindings = single_network(vec![nic("eth0", Some(7))]);

    let buckets = NicBuckets::collect(&bindings, &host);
    assert_eq!(buckets.total_ports(), 0);

    let topology = plan(&host, &request, &bindings).unwrap();
    assert!(!topology.is_degraded());
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0]));
}

#[test]
fn cpu_share_over_node_capacity_degrades_cpu_only() {
    let host = uniform_host(2, 4, 64_000);
    let request = RequestedResources::new(6, 4096);
    let bindings = nics_on(&[0]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(topology.degradation.cpu);
    assert!(!topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.cells[0].host_cpus(), (0..6).collect::<BTreeSet<u32>>());
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0, 1]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn cpu_and_memory_over_node_capacity_degrades_both() {
    let host = uniform_host(2, 4, 2048);
    let request = RequestedResources::new(6, 4096);
    let bindings = nics_on(&[0]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(topology.degradation.cpu);
    assert!(topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_invariants(&topology, &host, &request);
}

#[test]
fn memory_share_over_node_capacity_stays_on_first_node() {
    let host = host_with_ram(&[2048, 64_000], 4);
    let request = RequestedResources::new(4, 4096);
    let bindings = nics_on(&[0]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.degradation.cpu);
    assert!(topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.cells[0].memory_mb, 4096);
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn zero_cpu_share_falls_back_to_first_node() {
    // 75% / 25% of 2 vCPUs -> 1 and 0
    let host = uniform_host(2, 4, 64_000);
    let request = RequestedResources::new(2, 2048);
    let bindings = nics_on(&[0, 0, 0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(topology.degradation.cpu);
    assert!(!topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn vcpu_rounding_drift_falls_back_to_whole_host() {
    // 66% / 33% of 10 vCPUs -> 6 + 3 = 9
    let host = uniform_host(2, 8, 64_000);
    let request = RequestedResources::new(10, 4096);
    let bindings = nics_on(&[0, 0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(topology.degradation.cpu);
    assert!(!topology.degradation.memory);
    assert!(topology.degradation.message.contains("Cannot distribute"));
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0, 1]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn memory_rounding_drift_goes_to_largest_cell() {
    // 75% / 25% of 1001 MB -> 750 + 250
    let host = uniform_host(2, 4, 64_000);
    let request = RequestedResources::new(4, 1001);
    let bindings = nics_on(&[0, 0, 0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.is_degraded());
    assert_eq!(topology.cells.len(), 2);
    assert_eq!(topology.cells[0].memory_mb, 751);
    assert_eq!(topology.cells[1].memory_mb, 250);
    assert_eq!(topology.cells[0].vcpu_count(), 3);
    assert_eq!(topology.cells[1].vcpu_count(), 1);
    assert_invariants(&topology, &host, &request);
}

#[test]
fn unreconcilable_memory_drift_degrades_memory() {
    let host = host_with_ram(&[750, 64_000], 4);
    let request = RequestedResources::new(4, 1001);
    let bindings = nics_on(&[0, 0, 0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.degradation.cpu);
    assert!(topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_eq!(topology.cells[0].memory_mb, 1001);
    assert_invariants(&topology, &host, &request);
}

#[test]
fn short_free_ram_is_advisory_only() {
    let nodes = vec![
        HostNumaNode::new(0, 0..4, 8192, 512),
        HostNumaNode::new(1, 4..8, 8192, 512),
    ];
    let host = HostTopology::new(nodes).unwrap();
    let request = RequestedResources::new(4, 4096);
    let bindings = nics_on(&[0, 1]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.is_degraded());
    assert_eq!(topology.cells.len(), 2);
}

#[test]
fn more_than_three_cells_are_collapsed() {
    let host = uniform_host(4, 4, 64_000);
    let request = RequestedResources::new(8, 4000);
    let bindings = nics_on(&[0, 1, 2, 3]);

    let multi = allocate_multi_cell(&host, &request, &bindings).unwrap();
    assert_eq!(multi.cells.len(), 4);
    assert!(!multi.is_degraded());

    let topology = plan(&host, &request, &bindings).unwrap();
    assert!(topology.degradation.cpu);
    assert!(topology.degradation.memory);
    assert_eq!(topology.cells.len(), 1);
    assert_invariants(&topology, &host, &request);
}

#[test]
fn restricted_collapse_spills_past_a_small_first_node() {
    let host = uniform_host(2, 8, 64_000);
    let request = RequestedResources::new(12, 2048);
    let bindings = single_network(vec![nic("eth0", None)]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert!(!topology.is_degraded());
    assert_eq!(topology.cells[0].host_cpus(), (0..12).collect::<BTreeSet<u32>>());
    assert_eq!(topology.consumed_host_numa_ids, BTreeSet::from([0, 1]));
    assert_invariants(&topology, &host, &request);
}

#[test]
fn nics_from_every_network_join_their_node_cell() {
    let host = uniform_host(2, 4, 64_000);
    let request = RequestedResources::new(4, 2048);
    let bindings = NetworkBindings::new(vec![
        vnuma_planner::NetworkBinding::new("mgmt", vec![nic("eth0", Some(0)), nic("eth9", None)]),
        vnuma_planner::NetworkBinding::new("data", vec![nic("eth1", Some(1))]),
    ]);

    let topology = plan(&host, &request, &bindings).unwrap();

    assert_eq!(topology.cells.len(), 2);
    let names: Vec<_> = topology.cells[0].nics.iter().map(|n| n.name.clone()).collect();
    assert_eq!(names, vec!["eth0"]);
    let names: Vec<_> = topology.cells[1].nics.iter().map(|n| n.name.clone()).collect();
    assert_eq!(names, vec!["eth1"]);
}

#[test]
fn hugepages_flag_is_threaded_through() {
    let host = uniform_host(1, 4, 8192);
    let request = RequestedResources::new(2, 1024).with_hugepages(true);

    let topology = plan(&host, &request, &nics_on(&[0])).unwrap();
    assert!(topology.hugepages);

    let collapsed = plan(&host, &RequestedResources::new(64, 1024).with_hugepages(true), &nics_on(&[0])).unwrap();
    assert!(collapsed.hugepages);
}

#[test]
fn identical_inputs_serialize_identically() {
    let host = scenario_b_host();
    let request = RequestedResources::new(10, 6000);
    let bindings = nics_on(&[1, 0]);

    let first = plan(&host, &request, &bindings).unwrap().to_json_pretty().unwrap();
    let second = plan(&host, &request, &bindings).unwrap().to_json_pretty().unwrap();
    assert_eq!(first, second);
}

#[test]
fn preconditions_are_fatal() {
    let host = uniform_host(1, 4, 8192);
    let bindings = nics_on(&[0]);

    assert_eq!(
        plan(&host, &RequestedResources::new(0, 1024), &bindings),
        Err(ConfigurationError::ZeroCpus)
    );
    assert_eq!(
        plan(&host, &RequestedResources::new(2, 0), &bindings),
        Err(ConfigurationError::ZeroMemory)
    );
    assert_eq!(
        allocate_multi_cell(&host, &RequestedResources::new(2, 1024), &NetworkBindings::default()),
        Err(ConfigurationError::NoNetworkBindings)
    );
    assert_eq!(
        plan(&HostTopology::default(), &RequestedResources::new(2, 1024), &bindings),
        Err(ConfigurationError::EmptyHost)
    );
}
