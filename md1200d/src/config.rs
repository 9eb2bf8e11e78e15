//! Configuration resolution
//!
//! Layers, lowest to highest precedence: built-in defaults, the TOML file,
//! environment variables, command-line flags.

use md1200_core::config::CONFIG_PATH_ENV;
use md1200_core::{DaemonConfig, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::scheduler::Schedule;

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub schedule: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(device) = &self.device {
            config.serial.port = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(schedule) = &self.schedule {
            config.schedule.expression = schedule.clone();
        }
    }
}

/// Build the final configuration from the process environment.
pub fn resolve(explicit: Option<&Path>, overrides: &Overrides) -> Result<DaemonConfig> {
    resolve_with(explicit, overrides, |name| std::env::var(name).ok())
}

/// Build the final configuration, reading variables through `lookup`.
///
/// The file comes from `explicit`, else from `MD1200_CONFIG`, else from the
/// default location if it exists. The result is fully validated, schedule
/// expression included.
pub fn resolve_with<F>(
    explicit: Option<&Path>,
    overrides: &Overrides,
    lookup: F,
) -> Result<DaemonConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path: Option<PathBuf> = explicit.map(Path::to_path_buf).or_else(|| {
        lookup(CONFIG_PATH_ENV)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });

    match &path {
        Some(path) => debug!("Configuration file: {}", path.display()),
        None => debug!("No configuration file given, checking the default location"),
    }

    let mut config = DaemonConfig::load(path.as_deref())?;
    config.apply_env(&lookup)?;
    overrides.apply(&mut config);

    config.validate()?;
    config.schedule.expression.parse::<Schedule>()?;

    Ok(config)
}
