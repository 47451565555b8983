pub mod errors;
pub mod resource_manager;
pub mod vm;

// exports so callers don't have to spell out the full paths
pub use errors::ConfigurationError;
pub use resource_manager::ResourceManager;
pub use vm::RequestedResources;
