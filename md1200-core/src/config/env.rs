//! Environment variable overrides
//!
//! Variable names follow the daemon's historical deployment manifests, so
//! existing container definitions keep working unchanged.

use std::str::FromStr;

use super::DaemonConfig;
use crate::duration::parse_duration;
use crate::{Md1200Error, Result};

impl DaemonConfig {
    /// Override fields from the process environment.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Override fields from an arbitrary variable lookup.
    ///
    /// Unset variables leave the field untouched; a set but unparseable
    /// variable is a configuration error naming the variable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = parse_var("LOG_LEVEL", &v)?;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = parse_var("LOG_FORMAT", &v)?;
        }

        if let Some(v) = lookup("METRICS_ENABLED") {
            self.telemetry.metrics_enabled = parse_bool("METRICS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("METRICS_PORT") {
            self.telemetry.metrics_port = parse_var("METRICS_PORT", &v)?;
        }
        if let Some(v) = lookup("LOCAL") {
            self.telemetry.local = parse_bool("LOCAL", &v)?;
        }
        if let Some(v) = lookup("TRACING_ENABLED") {
            self.telemetry.tracing_enabled = parse_bool("TRACING_ENABLED", &v)?;
        }
        if let Some(v) = lookup("TRACING_SAMPLERATE") {
            self.telemetry.tracing_sample_rate = parse_var("TRACING_SAMPLERATE", &v)?;
        }
        if let Some(v) = lookup("TRACING_SERVICE") {
            self.telemetry.tracing_service = v;
        }
        if let Some(v) = lookup("TRACING_VERSION") {
            self.telemetry.tracing_version = Some(v).filter(|s| !s.is_empty());
        }

        if let Some(v) = lookup("SERIAL_PORT") {
            self.serial.port = v;
        }
        if let Some(v) = lookup("SERIAL_BAUDRATE") {
            self.serial.baud_rate = parse_var("SERIAL_BAUDRATE", &v)?;
        }
        if let Some(v) = lookup("SERIAL_DATABITS") {
            self.serial.data_bits = parse_var("SERIAL_DATABITS", &v)?;
        }
        if let Some(v) = lookup("SERIAL_READ_TIMEOUT") {
            self.serial.read_timeout = parse_duration_var("SERIAL_READ_TIMEOUT", &v)?;
        }

        if let Some(v) = lookup("CRON_INTERVAL") {
            self.schedule.expression = v;
        }

        if let Some(v) = lookup("COMMAND_TYPE") {
            self.command.keyword = v;
        }
        if let Some(v) = lookup("COMMAND_VALUE") {
            self.command.value = parse_var("COMMAND_VALUE", &v)?;
        }
        if let Some(v) = lookup("COMMAND_TERMINATOR") {
            self.command.terminator = parse_var("COMMAND_TERMINATOR", &v)?;
        }
        if let Some(v) = lookup("COMMAND_NUM_LOOPS") {
            self.command.num_loops = parse_var("COMMAND_NUM_LOOPS", &v)?;
        }
        if let Some(v) = lookup("COMMAND_LOOP_DELAY") {
            self.command.loop_delay = parse_duration_var("COMMAND_LOOP_DELAY", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE_COMMAND") {
            self.command.temperature_keyword = v;
        }
        if let Some(v) = lookup("TEMPERATURE_TERMINATOR") {
            self.command.temperature_terminator = parse_var("TEMPERATURE_TERMINATOR", &v)?;
        }

        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Md1200Error::Config(format!("Invalid value for {}: '{}' ({})", name, value, e)))
}

fn parse_duration_var(name: &str, value: &str) -> Result<std::time::Duration> {
    parse_duration(value)
        .map_err(|_| Md1200Error::Config(format!("Invalid duration for {}: '{}'", name, value)))
}

/// Accepts `1`/`0`, `t`/`f` and `true`/`false` in lower, upper or title case.
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(Md1200Error::Config(format!(
            "Invalid boolean for {}: '{}'",
            name, value
        ))),
    }
}
