pub mod settings;

pub use settings::{
    generate_default_config, GuestSettings, InventorySettings, OutputFormat, OutputSettings,
    Settings,
};
