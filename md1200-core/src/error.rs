//! Error types for the MD1200 fan controller daemon

use thiserror::Error;

/// Core error type for fan controller operations
#[derive(Error, Debug)]
pub enum Md1200Error {
    /// Configuration-related errors (missing line address or mode, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port errors raised while opening the line
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Invalid schedule expression
    #[error("Invalid schedule: {0}")]
    Schedule(String),

    /// I/O errors on an open line
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The line returned end-of-file
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),

    /// The session has already been closed
    #[error("Serial session is closed")]
    Closed,

    /// Read access is currently held by another owner
    #[error("Line reader is already in use")]
    ReaderInUse,
}

impl Md1200Error {
    /// Whether the error must stop the process.
    ///
    /// Only construction-time and open-time failures are fatal. Every
    /// steady-state I/O failure is contained by the loop that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Md1200Error::Config(_) | Md1200Error::Serial(_) | Md1200Error::Schedule(_)
        )
    }

    /// Whether the error is a read or write deadline being exceeded.
    pub fn is_timeout(&self) -> bool {
        match self {
            Md1200Error::Timeout(_) => true,
            Md1200Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type alias for fan controller operations
pub type Result<T> = std::result::Result<T, Md1200Error>;
