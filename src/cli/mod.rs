/*
* vNUMA Planner Command Line Interface
* ------------------------------------
*
* Command Structure:
* ------------------
* vnuma-planner [--config DIR]
* ├── plan       // plan the guest vNUMA topology and print it
* ├── buckets    // show which host NUMA node each candidate NIC lands on
* └── init       // write config/default.json with the built-in defaults
*
* Inventory files default to the paths in the [inventory] settings section,
* so a deployment that drops its collector output there only needs `plan`.
*
* A degraded plan is still a plan: it is printed with a warning for the
* operator and the command succeeds.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::{generate_default_config, OutputFormat, Settings};
use crate::core::ResourceManager;
use crate::numa::{GuestTopology, HostTopology, NetworkBindings, NicBuckets};

#[derive(Parser)]
#[command(name = "vnuma-planner")]
#[command(about = "Guest virtual-NUMA topology planner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default.*, local.*)
    #[arg(short, long, value_name = "DIR", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan the guest vNUMA topology
    Plan {
        #[command(flatten)]
        inventory: InventoryArgs,
        /// Number of guest vCPUs
        #[arg(long, visible_alias = "vcpus")]
        cpus: Option<u32>,
        /// Guest RAM in MB
        #[arg(short, long)]
        memory: Option<u64>,
        /// Mark the guest as huge-page capable
        #[arg(long)]
        hugepages: bool,
        /// Print the topology as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the NIC-to-NUMA buckets
    Buckets {
        #[command(flatten)]
        inventory: InventoryArgs,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(clap::Args)]
pub struct InventoryArgs {
    /// Host NUMA topology JSON
    #[arg(long, value_name = "FILE")]
    pub host: Option<PathBuf>,
    /// Network bindings JSON
    #[arg(long, value_name = "FILE")]
    pub networks: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(dir) => Settings::new_from_dir(dir),
        None => Settings::new(),
    }
    .context("failed to load settings")?;

    if !settings.output.color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Plan {
            inventory,
            cpus,
            memory,
            hugepages,
            json,
        } => handle_plan_command(&settings, &inventory, cpus, memory, hugepages, json),
        Commands::Buckets { inventory } => handle_buckets_command(&settings, &inventory),
        Commands::Init { force } => {
            let dir = cli.config.unwrap_or_else(|| PathBuf::from("config"));
            handle_init_command(&dir, force)
        }
    }
}

fn load_inventory(settings: &Settings, args: &InventoryArgs) -> Result<(HostTopology, NetworkBindings)> {
    let host_path = args
        .host
        .as_deref()
        .unwrap_or(&settings.inventory.host_topology_path);
    let networks_path = args
        .networks
        .as_deref()
        .unwrap_or(&settings.inventory.network_bindings_path);

    let host = HostTopology::from_json_file(host_path)?;
    let bindings = NetworkBindings::from_json_file(networks_path)?;
    Ok((host, bindings))
}

fn handle_plan_command(
    settings: &Settings,
    inventory: &InventoryArgs,
    cpus: Option<u32>,
    memory: Option<u64>,
    hugepages: bool,
    json: bool,
) -> Result<()> {
    let (host, bindings) = load_inventory(settings, inventory)?;
    let manager = ResourceManager::from_settings(settings);

    let request = manager.resolve_request(cpus, memory, hugepages)?;
    info!(
        "Planning guest: {} vCPUs, {} MB across {} host NUMA node(s)",
        request.cpus,
        request.ram_mb,
        host.nodes().len()
    );
    let topology = manager.plan(&host, &bindings, &request)?;

    if json || settings.output.format == OutputFormat::Json {
        println!("{}", topology.to_json_pretty()?);
    } else {
        print_topology(&topology);
    }

    if topology.is_degraded() {
        error!(
            cpu = topology.degradation.cpu,
            memory = topology.degradation.memory,
            "Guest topology is degraded: {}",
            topology.degradation.message
        );
    }
    Ok(())
}

fn handle_buckets_command(settings: &Settings, inventory: &InventoryArgs) -> Result<()> {
    let (host, bindings) = load_inventory(settings, inventory)?;
    let buckets = NicBuckets::collect(&bindings, &host);

    println!("{}", "NIC-to-NUMA buckets:".bold());
    for node in host.nodes() {
        let bucket = buckets.bucket(node.id);
        let names: Vec<&str> = bucket.iter().map(|nic| nic.name.as_str()).collect();
        let line = format!("- node {} ({} CPUs): {}", node.id, node.cpu_count(), names.join(", "));
        if bucket.is_empty() {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }
    println!("Bucketed ports: {}", buckets.total_ports());
    Ok(())
}

fn handle_init_command(config_dir: &Path, force: bool) -> Result<()> {
    let target = config_dir.join("default.json");
    if target.exists() && !force {
        error!("{} already exists. Use --force to overwrite.", target.display());
        return Ok(());
    }

    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("failed to create {}", config_dir.display()))?;
    let config_str = serde_json::to_string_pretty(&generate_default_config())?;
    std::fs::write(&target, config_str)
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!("{} Default configuration written to {}", "✓".green(), target.display());
    Ok(())
}

fn print_topology(topology: &GuestTopology) {
    println!(
        "{} {} cell(s), {} vCPU(s), {} MB{}",
        "Guest vNUMA topology:".bold(),
        topology.cells.len(),
        topology.total_vcpus(),
        topology.total_memory_mb(),
        if topology.hugepages { ", hugepages" } else { "" }
    );

    for cell in &topology.cells {
        println!(
            "  cell {}: {} MB on host node(s) {}",
            cell.cell_id.to_string().cyan(),
            cell.memory_mb,
            join(&cell.host_nodes)
        );
        for (vcpu, host_cpus) in &cell.cpu_pinning {
            println!("    vcpu {:>3} -> host cpu {}", vcpu, join(host_cpus));
        }
        if !cell.nics.is_empty() {
            let names: Vec<&str> = cell.nics.iter().map(|nic| nic.name.as_str()).collect();
            println!("    nics: {}", names.join(", "));
        }
    }

    println!("  consumed host nodes: {}", join(&topology.consumed_host_numa_ids));

    let degradation = &topology.degradation;
    if degradation.is_degraded() {
        let mut affected = Vec::new();
        if degradation.cpu {
            affected.push("cpu");
        }
        if degradation.memory {
            affected.push("memory");
        }
        println!(
            "{} degraded ({}): {}",
            "⚠".yellow(),
            affected.join(", ").yellow(),
            degradation.message
        );
    } else {
        println!("{} placement honored", "✓".green());
    }
}

fn join(ids: &BTreeSet<u32>) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}
