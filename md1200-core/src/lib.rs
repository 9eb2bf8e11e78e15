//! MD1200 Core Library
//!
//! Shared types for the MD1200 enclosure fan controller daemon: the error
//! taxonomy, the serial line configuration, the controller command model,
//! and process configuration.

pub mod command;
pub mod config;
pub mod duration;
pub mod error;
pub mod line;

// Re-export commonly used types
pub use command::{Command, Terminator};
pub use config::{default_config_path, DaemonConfig};
pub use duration::{format_duration, parse_duration};
pub use error::*;
pub use line::{DataBits, LineConfig, LineMode, Parity, StopBits, DEFAULT_READ_TIMEOUT};
