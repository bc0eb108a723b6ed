//! Configuration and logging setup

pub mod config;
pub mod logging;

pub use config::{ConfigError, FusionConfig, FusionSettings, NodeConfig, PublishConfig, TriggerMode};
pub use logging::{init_logging, LogLevel};
