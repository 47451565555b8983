/*
* Guest vNUMA topology allocation
* -------------------------------
*
* Splits a guest's vCPUs and RAM across virtual NUMA cells so that the vCPUs
* driving traffic sit on the host nodes their NICs are attached to.
*
* Pipeline (each stage is a pure function returning a fresh GuestTopology):
*
*   allocate_multi_cell ──ok─────────────────────┐
*          │                                      ├──> repair_degenerate_cells
*          └──degraded──> allocate_single_cell ───┘
*
* Tiers:
* ------
* 1. Multi-cell: one cell per host node that owns bucketed NICs, sized in
*    proportion to that node's share of the NICs.
* 2. Single-cell collapse: everything in one cell, either kept on the first
*    host node or spread over the whole host. Used whenever tier 1 cannot be
*    satisfied exactly; the reason is recorded as a Degradation.
* 3. Repair: runs only on clean plans. Over-fragmented plans collapse, a lone
*    cell that got memory but no vCPUs is folded into a sibling.
*
* The allocator never fails on infeasible placement. Errors are reserved for
* broken preconditions (ConfigurationError).
*/

use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::guest::{CpuPinning, Degradation, GuestTopology, VirtualNumaCell};
use super::host::{HostNumaNode, HostTopology};
use super::network::{NetworkBindings, NicBuckets};
use super::split;
use crate::core::errors::ConfigurationError;
use crate::core::vm::RequestedResources;
use crate::errors::ResourceType;

/// Plans with more cells than this are considered over-fragmented.
pub const MAX_CELLS: usize = 3;

/// Full planning pipeline: multi-cell attempt, single-cell fallback, repair.
pub fn plan(
    host: &HostTopology,
    request: &RequestedResources,
    bindings: &NetworkBindings,
) -> Result<GuestTopology, ConfigurationError> {
    validate(host, request, bindings)?;
    let buckets = NicBuckets::collect(bindings, host);

    let topology = allocate_with_buckets(host, request, &buckets)?;
    let topology = repair_degenerate_cells(topology, host, request, &buckets)?;

    info!(
        cells = topology.cells.len(),
        vcpus = request.cpus,
        ram_mb = request.ram_mb,
        cpu_degraded = topology.degradation.cpu,
        memory_degraded = topology.degradation.memory,
        "Guest vNUMA topology planned"
    );
    Ok(topology)
}

/// Places the guest across one cell per NIC-owning host node, falling back
/// to a single cell whenever that placement cannot be honored exactly.
pub fn allocate_multi_cell(
    host: &HostTopology,
    request: &RequestedResources,
    bindings: &NetworkBindings,
) -> Result<GuestTopology, ConfigurationError> {
    validate(host, request, bindings)?;
    let buckets = NicBuckets::collect(bindings, host);
    allocate_with_buckets(host, request, &buckets)
}

/// Collapses the guest into a single cell (`cell_id` 0) holding all of its
/// memory and every bucketed NIC.
///
/// vCPU `i` is pinned to entry `i` of the eligible host CPU pool. With
/// `restrict_to_first_node` the pool is the first node's CPUs, continued onto
/// the following nodes only when the first one is too small; otherwise the
/// pool is every host CPU in node order. An oversubscribed request wraps
/// around the pool.
///
/// Never sets degradation; callers falling back to it record their reason.
pub fn allocate_single_cell(
    host: &HostTopology,
    request: &RequestedResources,
    buckets: &NicBuckets,
    restrict_to_first_node: bool,
) -> Result<GuestTopology, ConfigurationError> {
    request.validate()?;

    let wanted = request.cpus as usize;
    let pool = eligible_pool(host, wanted, restrict_to_first_node);
    if pool.is_empty() {
        return Err(ConfigurationError::EmptyHost);
    }

    let mut cpu_pinning = CpuPinning::new();
    let mut consumed = BTreeSet::new();
    for vcpu in 0..request.cpus {
        let (node, cpu) = pool[vcpu as usize % pool.len()];
        cpu_pinning.insert(vcpu, BTreeSet::from([cpu]));
        consumed.insert(node);
    }

    debug!(
        restrict_to_first_node,
        pool = pool.len(),
        nodes = ?consumed,
        "Collapsed guest into a single cell"
    );

    let cell = VirtualNumaCell {
        cell_id: 0,
        memory_mb: request.ram_mb,
        cpu_pinning,
        nics: buckets.all_nics(),
        host_nodes: consumed.clone(),
    };

    Ok(GuestTopology {
        cells: vec![cell],
        consumed_host_numa_ids: consumed,
        degradation: Degradation::default(),
        hugepages: request.hugepages,
    })
}

/// Second look at a clean plan.
///
/// Degraded plans pass through untouched. More than [`MAX_CELLS`] cells, or
/// more than one cell without vCPUs, collapses the plan onto the whole host
/// with both degradations flagged. A single cell without vCPUs is removed:
/// its memory and NICs move to the first remaining cell and cell ids are
/// renumbered from 0.
pub fn repair_degenerate_cells(
    topology: GuestTopology,
    host: &HostTopology,
    request: &RequestedResources,
    buckets: &NicBuckets,
) -> Result<GuestTopology, ConfigurationError> {
    if topology.is_degraded() {
        return Ok(topology);
    }

    if topology.cells.len() > MAX_CELLS {
        let message = format!(
            "Guest would span {} vNUMA cells (limit {}), collapsing into a single cell",
            topology.cells.len(),
            MAX_CELLS
        );
        return collapse(host, request, buckets, Degradation::both(message), false);
    }

    let cpuless: Vec<usize> = topology
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.is_cpuless())
        .map(|(index, _)| index)
        .collect();

    match cpuless.as_slice() {
        [] => Ok(topology),
        [evicted] if topology.cells.len() > 1 => Ok(fold_cpuless_cell(topology, *evicted)),
        _ => {
            let message = format!(
                "{} of {} vNUMA cells received no vCPUs, collapsing into a single cell",
                cpuless.len(),
                topology.cells.len()
            );
            collapse(host, request, buckets, Degradation::both(message), false)
        }
    }
}

fn validate(
    host: &HostTopology,
    request: &RequestedResources,
    bindings: &NetworkBindings,
) -> Result<(), ConfigurationError> {
    request.validate()?;
    if bindings.is_empty() {
        return Err(ConfigurationError::NoNetworkBindings);
    }
    if host.total_cpus() == 0 {
        return Err(ConfigurationError::EmptyHost);
    }
    Ok(())
}

fn collapse(
    host: &HostTopology,
    request: &RequestedResources,
    buckets: &NicBuckets,
    degradation: Degradation,
    restrict_to_first_node: bool,
) -> Result<GuestTopology, ConfigurationError> {
    warn!(
        cpu = degradation.cpu,
        memory = degradation.memory,
        restrict_to_first_node,
        "{}",
        degradation.message
    );
    Ok(allocate_single_cell(host, request, buckets, restrict_to_first_node)?
        .with_degradation(degradation))
}

fn allocate_with_buckets(
    host: &HostTopology,
    request: &RequestedResources,
    buckets: &NicBuckets,
) -> Result<GuestTopology, ConfigurationError> {
    let host_cpus = host.total_cpus();
    if request.cpus as usize > host_cpus {
        let message = format!(
            "Requested {} vCPUs but the host only has {} CPUs, pinning across the whole host",
            request.cpus, host_cpus
        );
        return collapse(host, request, buckets, Degradation::both(message), false);
    }

    if buckets.is_empty() {
        // No locality data at all: nothing to prefer, not a failure.
        debug!("No NIC carries NUMA affinity, keeping the guest on the first host node");
        return allocate_single_cell(host, request, buckets, true);
    }

    let total_ports = buckets.total_ports() as u64;
    let mut cells: Vec<VirtualNumaCell> = Vec::new();
    let mut consumed = BTreeSet::new();
    let mut next_vcpu: u32 = 0;
    let mut allocated_cpus: u64 = 0;

    for node in host.nodes() {
        let bucket = buckets.bucket(node.id);
        if bucket.is_empty() {
            continue;
        }

        let percentage = split::percentage(bucket.len() as u64, total_ports);
        let mem_share = split::share(percentage, request.ram_mb);
        let cpu_share = split::share(percentage, u64::from(request.cpus));
        let cpu_fits = cpu_share <= node.cpu_count() as u64;
        let mem_fits = mem_share <= node.total_ram_mb;

        debug!(
            node = node.id,
            nics = bucket.len(),
            percentage,
            cpu_share,
            mem_share,
            "Proportional share for host node"
        );

        match (cpu_fits, mem_fits) {
            (false, false) => {
                let message = format!(
                    "Host node {} cannot hold its share of {} vCPUs and {} MB, pinning across the whole host",
                    node.id, cpu_share, mem_share
                );
                return collapse(host, request, buckets, Degradation::both(message), false);
            }
            (false, true) => {
                let message = shortfall(ResourceType::Cpu, node, cpu_share, node.cpu_count() as u64);
                return collapse(host, request, buckets, Degradation::cpu(message), false);
            }
            (true, _) if cpu_share == 0 => {
                let message = format!(
                    "Host node {} would receive no vCPUs from its {}% share, keeping a single vCPU cell",
                    node.id, percentage
                );
                let degradation = Degradation {
                    cpu: true,
                    memory: !mem_fits,
                    message,
                };
                return collapse(host, request, buckets, degradation, true);
            }
            (true, false) => {
                let message = shortfall(ResourceType::Memory, node, mem_share, node.total_ram_mb);
                return collapse(host, request, buckets, Degradation::memory(message), true);
            }
            (true, true) => {}
        }

        if mem_share > node.free_ram_mb {
            warn!(
                node = node.id,
                mem_share,
                free_ram_mb = node.free_ram_mb,
                "Memory share exceeds the node's currently free RAM"
            );
        }

        let cpu_pinning: CpuPinning = (next_vcpu..)
            .zip(node.cpu_ids.iter().take(cpu_share as usize))
            .map(|(vcpu, &cpu)| (vcpu, BTreeSet::from([cpu])))
            .collect();
        next_vcpu += cpu_pinning.len() as u32;
        allocated_cpus += cpu_share;

        cells.push(VirtualNumaCell {
            cell_id: cells.len() as u32,
            memory_mb: mem_share,
            cpu_pinning,
            nics: bucket.iter().cloned().collect(),
            host_nodes: BTreeSet::from([node.id]),
        });
        consumed.insert(node.id);
    }

    if allocated_cpus != u64::from(request.cpus) {
        let message = format!(
            "Cannot distribute {} vCPUs across NUMA cells ({} placed), pinning across the whole host",
            request.cpus, allocated_cpus
        );
        return collapse(host, request, buckets, Degradation::cpu(message), false);
    }

    if let Err(degradation) = reconcile_memory(&mut cells, host, request.ram_mb) {
        return collapse(host, request, buckets, degradation, true);
    }

    Ok(GuestTopology {
        cells,
        consumed_host_numa_ids: consumed,
        degradation: Degradation::default(),
        hugepages: request.hugepages,
    })
}

fn shortfall(resource: ResourceType, node: &HostNumaNode, share: u64, capacity: u64) -> String {
    let unit = match resource {
        ResourceType::Cpu => "CPUs",
        ResourceType::Memory => "MB",
    };
    format!(
        "{} share of {} {} exceeds host node {} capacity of {} {}",
        resource, share, unit, node.id, capacity, unit
    )
}

// Rounding leaves the per-cell memory shares a few MB off the request. The
// difference goes to the largest cell (first one on ties), provided its host
// node can still hold it.
fn reconcile_memory(
    cells: &mut [VirtualNumaCell],
    host: &HostTopology,
    ram_mb: u64,
) -> Result<(), Degradation> {
    let assigned: u64 = cells.iter().map(|cell| cell.memory_mb).sum();
    if assigned == ram_mb {
        return Ok(());
    }

    let Some((_, target)) = cells
        .iter_mut()
        .enumerate()
        .max_by_key(|(index, cell)| (cell.memory_mb, Reverse(*index)))
    else {
        return Err(Degradation::memory("No vNUMA cell available to absorb memory rounding"));
    };

    let capacity = target
        .host_nodes
        .iter()
        .filter_map(|&id| host.node(id))
        .map(|node| node.total_ram_mb)
        .sum::<u64>();
    let adjusted = (target.memory_mb + ram_mb).checked_sub(assigned);

    match adjusted {
        Some(memory_mb) if memory_mb <= capacity => {
            debug!(
                cell = target.cell_id,
                from = target.memory_mb,
                to = memory_mb,
                "Absorbed memory rounding drift"
            );
            target.memory_mb = memory_mb;
            Ok(())
        }
        _ => Err(Degradation::memory(format!(
            "Cannot reconcile {} MB across NUMA cells ({} MB placed), keeping the guest on the first host node",
            ram_mb, assigned
        ))),
    }
}

fn fold_cpuless_cell(topology: GuestTopology, evicted: usize) -> GuestTopology {
    let GuestTopology {
        mut cells,
        degradation,
        hugepages,
        ..
    } = topology;

    let removed = cells.remove(evicted);
    if let Some(sibling) = cells.first_mut() {
        debug!(
            evicted = removed.cell_id,
            sibling = sibling.cell_id,
            memory_mb = removed.memory_mb,
            "Folding vCPU-less cell into sibling"
        );
        sibling.memory_mb += removed.memory_mb;
        sibling.nics.extend(removed.nics);
    }

    for (index, cell) in cells.iter_mut().enumerate() {
        cell.cell_id = index as u32;
    }

    let consumed_host_numa_ids = cells
        .iter()
        .flat_map(|cell| cell.host_nodes.iter().copied())
        .collect();

    GuestTopology {
        cells,
        consumed_host_numa_ids,
        degradation,
        hugepages,
    }
}

// (host node, host CPU) pairs in pinning order.
fn eligible_pool(host: &HostTopology, wanted: usize, restrict_to_first_node: bool) -> Vec<(u32, u32)> {
    let mut pool = Vec::new();
    for node in host.nodes() {
        if restrict_to_first_node && !pool.is_empty() && pool.len() >= wanted {
            break;
        }
        pool.extend(node.cpu_ids.iter().map(|&cpu| (node.id, cpu)));
    }
    pool
}
