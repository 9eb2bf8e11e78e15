//! Daemon configuration loaded once at startup
//!
//! The configuration is read-only after the daemon starts. Every field has a
//! default, so an empty TOML document (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::command::{
    Command, Terminator, DEFAULT_SHUTUP_VALUE, SHUTUP_KEYWORD, TEMPERATURE_KEYWORD,
};
use crate::line::{DataBits, LineConfig, LineMode, DEFAULT_READ_TIMEOUT};
use crate::{Md1200Error, Result};

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Md1200Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(Md1200Error::Config(format!(
                "Unknown log level: '{}'. Valid options: debug, info, warn, error",
                s
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Md1200Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(Md1200Error::Config(format!(
                "Unknown log format: '{}'. Valid options: text, json",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Where metrics would be exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsExporter {
    /// Prometheus scrape endpoint on the metrics port
    Prometheus,
    /// OTLP over gRPC to a local collector
    OtlpGrpc,
}

/// Telemetry settings. Recorded and reported; no exporter is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    /// Local development mode, switches the export target
    pub local: bool,
    pub tracing_enabled: bool,
    pub tracing_sample_rate: f64,
    pub tracing_service: String,
    pub tracing_version: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_port: 8081,
            local: false,
            tracing_enabled: false,
            tracing_sample_rate: 0.01,
            tracing_service: "md1200d".to_string(),
            tracing_version: None,
        }
    }
}

impl TelemetryConfig {
    pub fn exporter(&self) -> MetricsExporter {
        if self.local {
            MetricsExporter::OtlpGrpc
        } else {
            MetricsExporter::Prometheus
        }
    }
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    /// Upper bound on a single line read
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: 38400,
            data_bits: 8,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Firing schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// `@every <duration>`, a `@descriptor`, or a five-field cron expression
    pub expression: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: "@every 30s".to_string(),
        }
    }
}

/// Commands sent on every firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Keyword of the parameterized command (`_shutup`, `set_speed`, ...)
    pub keyword: String,
    pub value: i64,
    pub terminator: Terminator,
    /// How many times the command sequence is sent per firing
    pub num_loops: u32,
    /// Pause between two passes of the sequence
    #[serde(with = "humantime_serde")]
    pub loop_delay: Duration,
    /// Bare query sent before the parameterized command; blank disables it
    pub temperature_keyword: String,
    pub temperature_terminator: Terminator,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            keyword: SHUTUP_KEYWORD.to_string(),
            value: DEFAULT_SHUTUP_VALUE,
            terminator: Terminator::Cr,
            num_loops: 5,
            loop_delay: Duration::from_millis(200),
            temperature_keyword: TEMPERATURE_KEYWORD.to_string(),
            temperature_terminator: Terminator::Lf,
        }
    }
}

/// Complete daemon configuration.
///
/// Located at `~/.config/md1200/config.toml` by default; environment
/// variables override file values (see [`DaemonConfig::apply_env`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub serial: SerialConfig,
    pub schedule: ScheduleConfig,
    pub command: CommandConfig,
}

impl DaemonConfig {
    /// Parse DaemonConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize DaemonConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a TOML file.
    ///
    /// An explicitly requested file must exist. Without one, the default
    /// location is used when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = super::default_config_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Md1200Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&contents).map_err(|e| {
            Md1200Error::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Build the validated line configuration.
    pub fn line_config(&self) -> Result<LineConfig> {
        let data_bits = DataBits::try_from(self.serial.data_bits)?;

        LineConfig::builder()
            .address(self.serial.port.clone())
            .mode(LineMode::new(self.serial.baud_rate, data_bits))
            .read_timeout(self.serial.read_timeout)
            .build()
    }

    /// Commands sent on each pass of a firing, in order.
    ///
    /// The temperature query comes first when configured, then the
    /// parameterized command.
    pub fn commands(&self) -> Result<Vec<Command>> {
        let mut commands = Vec::with_capacity(2);

        let temperature = self.command.temperature_keyword.trim();
        if !temperature.is_empty() {
            let query = Command::new(temperature).terminated_by(self.command.temperature_terminator);
            query.validate()?;
            commands.push(query);
        }

        let command = Command::with_value(self.command.keyword.trim(), self.command.value)
            .terminated_by(self.command.terminator);
        command.validate()?;
        commands.push(command);

        Ok(commands)
    }

    /// Check everything that can be checked without touching hardware.
    pub fn validate(&self) -> Result<()> {
        self.line_config()?;
        self.commands()?;

        if self.command.num_loops == 0 {
            return Err(Md1200Error::Config(
                "command loop count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.telemetry.tracing_sample_rate) {
            return Err(Md1200Error::Config(format!(
                "tracing sample rate must be between 0 and 1, got {}",
                self.telemetry.tracing_sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_daemon_defaults() {
        let config = DaemonConfig::default();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.serial.port, "/dev/ttyS0");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.serial.read_timeout, Duration::from_secs(5));
        assert_eq!(config.schedule.expression, "@every 30s");
        assert_eq!(config.command.keyword, "_shutup");
        assert_eq!(config.command.value, 20);
        assert_eq!(config.command.num_loops, 5);
        assert_eq!(config.command.loop_delay, Duration::from_millis(200));
        assert!(config.telemetry.metrics_enabled);
        assert_eq!(config.telemetry.metrics_port, 8081);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_commands_order_and_encoding() {
        let commands = DaemonConfig::default().commands().unwrap();
        let encoded: Vec<Vec<u8>> = commands.iter().map(Command::encode).collect();

        assert_eq!(
            encoded,
            vec![b"_temp_rd\n".to_vec(), b"_shutup 20\r".to_vec()]
        );
    }

    #[test]
    fn test_blank_temperature_keyword_disables_query() {
        let mut config = DaemonConfig::default();
        config.command.temperature_keyword = "  ".to_string();

        let commands = config.commands().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].keyword(), "_shutup");
    }

    #[test]
    fn test_empty_command_keyword_rejected() {
        let mut config = DaemonConfig::default();
        config.command.keyword = String::new();
        assert!(matches!(config.commands(), Err(Md1200Error::Config(_))));
    }

    #[test]
    fn test_line_config_from_serial_section() {
        let mut config = DaemonConfig::default();
        config.serial.port = "/dev/ttyUSB1".to_string();
        config.serial.baud_rate = 9600;
        config.serial.data_bits = 7;

        let line = config.line_config().unwrap();
        assert_eq!(line.address(), "/dev/ttyUSB1");
        assert_eq!(line.mode().baud_rate, 9600);
        assert_eq!(line.mode().data_bits, DataBits::Seven);
    }

    #[test]
    fn test_invalid_data_bits_rejected() {
        let mut config = DaemonConfig::default();
        config.serial.data_bits = 9;
        assert!(config.line_config().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_loops_rejected() {
        let mut config = DaemonConfig::default();
        config.command.num_loops = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exporter_follows_local_flag() {
        let mut telemetry = TelemetryConfig::default();
        assert_eq!(telemetry.exporter(), MetricsExporter::Prometheus);
        telemetry.local = true;
        assert_eq!(telemetry.exporter(), MetricsExporter::OtlpGrpc);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [serial]
            port = "/dev/ttyS1"

            [command]
            value = 35
            loop_delay = "1s"
        "#;

        let config = DaemonConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.command.value, 35);
        assert_eq!(config.command.loop_delay, Duration::from_secs(1));
        assert_eq!(config.command.keyword, "_shutup");
        assert_eq!(config.schedule.expression, "@every 30s");
    }

    #[test]
    fn test_toml_serialization_round_trip() {
        let mut config = DaemonConfig::default();
        config.logging.format = LogFormat::Json;
        config.command.terminator = Terminator::CrLf;

        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("loop_delay = \"200ms\""));
        assert!(toml_str.contains("terminator = \"crlf\""));

        assert_eq!(DaemonConfig::from_toml(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_sub_millisecond_delay_survives_toml() {
        let mut config = DaemonConfig::default();
        config.command.loop_delay = Duration::from_micros(750);

        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("loop_delay = \"750us\""));
        assert_eq!(
            DaemonConfig::from_toml(&toml_str).unwrap().command.loop_delay,
            Duration::from_micros(750)
        );
    }

    #[test]
    fn test_invalid_duration_in_toml() {
        let toml_str = r#"
            [serial]
            read_timeout = "five seconds"
        "#;
        assert!(DaemonConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[schedule]\nexpression = \"*/5 * * * *\"").unwrap();

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.schedule.expression, "*/5 * * * *");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = DaemonConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(Md1200Error::Config(_))));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
