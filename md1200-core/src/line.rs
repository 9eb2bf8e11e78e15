//! Serial line configuration
//!
//! A [`LineConfig`] is built once at startup and never changes afterwards.
//! It can only be obtained through [`LineConfigBuilder::build`], which rejects
//! a missing address or mode before any device access happens.

use crate::{Md1200Error, Result};
use std::fmt;
use std::time::Duration;

/// Read timeout applied to the line once it is open.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    /// Number of bits as an integer
    pub fn bits(&self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = Md1200Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(Md1200Error::Config(format!(
                "Unsupported data bits: {} (must be 5-8)",
                other
            ))),
        }
    }
}

/// Stop bits. The enclosure only speaks one stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
}

/// Parity. The enclosure only speaks no parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
}

/// Electrical framing of the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMode {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl LineMode {
    /// Create a mode with one stop bit and no parity
    pub fn new(baud_rate: u32, data_bits: DataBits) -> Self {
        Self {
            baud_rate,
            data_bits,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl fmt::Display for LineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 38400 8N1
        write!(f, "{} {}N1", self.baud_rate, self.data_bits.bits())
    }
}

/// Validated, immutable line configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    address: String,
    mode: LineMode,
    read_timeout: Duration,
}

impl LineConfig {
    /// Start building a line configuration
    pub fn builder() -> LineConfigBuilder {
        LineConfigBuilder::default()
    }

    /// Device path or identifier (e.g. `/dev/ttyS0`)
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }

    /// Upper bound on a single line read
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

/// Builder for [`LineConfig`]
#[derive(Debug, Default)]
pub struct LineConfigBuilder {
    address: Option<String>,
    mode: Option<LineMode>,
    read_timeout: Option<Duration>,
}

impl LineConfigBuilder {
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn mode(mut self, mode: LineMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Md1200Error::Config`] if the mode or address is missing, the
    /// address is blank, the baud rate is zero, or the read timeout is zero.
    pub fn build(self) -> Result<LineConfig> {
        let mode = self
            .mode
            .ok_or_else(|| Md1200Error::Config("serial mode is required".to_string()))?;

        let address = self
            .address
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Md1200Error::Config("serial port address is required".to_string()))?;

        if mode.baud_rate == 0 {
            return Err(Md1200Error::Config(
                "baud rate must be greater than zero".to_string(),
            ));
        }

        let read_timeout = self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT);
        if read_timeout.is_zero() {
            return Err(Md1200Error::Config(
                "read timeout must be greater than zero".to_string(),
            ));
        }

        Ok(LineConfig {
            address,
            mode,
            read_timeout,
        })
    }
}
