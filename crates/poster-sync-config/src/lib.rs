pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, ImportConfig, SchedulerConfig, ServerConfig, StorageConfig, default_scheduler_config};
pub use credentials::CredentialStore;
pub use paths::PathManager;
