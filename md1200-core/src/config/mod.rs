//! Configuration types for the MD1200 daemon
//!
//! # Architecture
//!
//! Configuration is resolved in layers, each overriding the previous one:
//! - built-in defaults ([`DaemonConfig::default`])
//! - an optional TOML file ([`DaemonConfig::load`])
//! - environment variables ([`DaemonConfig::apply_env`])
//!
//! Command-line flags are applied on top by the daemon binary.

mod daemon_config;
mod env;
mod paths;

pub use daemon_config::{
    CommandConfig, DaemonConfig, LogFormat, LogLevel, LoggingConfig, MetricsExporter,
    ScheduleConfig, SerialConfig, TelemetryConfig,
};
pub use paths::{default_config_path, CONFIG_PATH_ENV};
