/*
* vNUMA Planner Configuration
* ---------------------------
*
* Layered configuration, lowest to highest priority:
*
* 1. Hardcoded defaults (set_default below)
* 2. <config dir>/default.{json,toml,yaml} (optional)
* 3. <config dir>/local.{json,toml,yaml} (optional, machine-specific)
* 4. Environment variables: VNUMA__<SECTION>__<KEY>, e.g.
*    VNUMA__GUEST__DEFAULT_VCPUS=8
*
* The config dir is taken from the CLI (--config), then CONFIG_PATH, then
* falls back to ./config.
*
* Sections:
* ---------
* guest:     vCPU/RAM used when the operator does not specify them, plus the
*            huge-page capability flag.
* inventory: where the collector drops the host topology and NIC bindings.
* output:    report format and coloring.
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENV_PREFIX: &str = "VNUMA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub guest: GuestSettings,
    pub inventory: InventorySettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestSettings {
    pub default_vcpus: u32,
    pub default_memory_mb: u64,
    pub hugepages: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    pub host_topology_path: PathBuf,
    pub network_bindings_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for GuestSettings {
    fn default() -> Self {
        Self {
            default_vcpus: 2,
            default_memory_mb: 4096,
            hugepages: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        Self::new_from_dir(Path::new(&config_path))
    }

    pub fn new_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        Self::build(config_dir, environment())
    }

    /// Loads settings with an explicit environment source, so overrides can
    /// be exercised without touching the process environment.
    pub fn build(config_dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        info!("Loading configuration from path: {}", config_dir.display());

        let defaults = generate_default_config();
        let config = Config::builder()
            .set_default("guest.default_vcpus", i64::from(defaults.guest.default_vcpus))?
            .set_default(
                "guest.default_memory_mb",
                i64::try_from(defaults.guest.default_memory_mb).unwrap_or(i64::MAX),
            )?
            .set_default("guest.hugepages", defaults.guest.hugepages)?
            .set_default(
                "inventory.host_topology_path",
                path_default(&defaults.inventory.host_topology_path),
            )?
            .set_default(
                "inventory.network_bindings_path",
                path_default(&defaults.inventory.network_bindings_path),
            )?
            .set_default("output.format", "text")?
            .set_default("output.color", defaults.output.color)?
            .add_source(File::with_name(&format!("{}/default", config_dir.display())).required(false))
            .add_source(File::with_name(&format!("{}/local", config_dir.display())).required(false))
            .add_source(env)
            .build()?;

        config.try_deserialize()
    }
}

pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn path_default(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn generate_default_config() -> Settings {
    Settings {
        guest: GuestSettings::default(),
        inventory: InventorySettings {
            host_topology_path: PathBuf::from("/var/lib/vnuma-planner/host-topology.json"),
            network_bindings_path: PathBuf::from("/var/lib/vnuma-planner/network-bindings.json"),
        },
        output: OutputSettings {
            format: OutputFormat::Text,
            color: true,
        },
    }
}
