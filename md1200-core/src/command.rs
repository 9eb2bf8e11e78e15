//! Controller command vocabulary
//!
//! Commands are plain ASCII, one per write. A command carrying a value is
//! encoded as `"<keyword> <value>"`, a bare command as `"<keyword>"`, each
//! followed by its terminator. The controller never acknowledges a command.

use crate::{Md1200Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyword of the alarm-suppression command
pub const SHUTUP_KEYWORD: &str = "_shutup";

/// Keyword of the temperature query command
pub const TEMPERATURE_KEYWORD: &str = "_temp_rd";

/// Default value sent with the suppression command
pub const DEFAULT_SHUTUP_VALUE: i64 = 20;

/// Line terminator appended to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    /// Carriage return (`\r`)
    Cr,
    /// Line feed (`\n`)
    Lf,
    /// Carriage return followed by line feed (`\r\n`)
    CrLf,
}

impl Terminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminator::Cr => "\r",
            Terminator::Lf => "\n",
            Terminator::CrLf => "\r\n",
        }
    }
}

impl FromStr for Terminator {
    type Err = Md1200Error;

    /// Parse a terminator from its name (`cr`, `lf`, `crlf`) or escaped form.
    fn from_str(s: &str) -> Result<Self> {
        // Literal control characters would be lost to trim()
        match s {
            "\r" => return Ok(Terminator::Cr),
            "\n" => return Ok(Terminator::Lf),
            "\r\n" => return Ok(Terminator::CrLf),
            _ => {}
        }

        match s.trim().to_lowercase().as_str() {
            "cr" | "\\r" => Ok(Terminator::Cr),
            "lf" | "\\n" => Ok(Terminator::Lf),
            "crlf" | "\\r\\n" => Ok(Terminator::CrLf),
            _ => Err(Md1200Error::Config(format!(
                "Unknown terminator: '{}'. Valid options: cr, lf, crlf",
                s
            ))),
        }
    }
}

/// A single fire-and-forget instruction for the fan controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    keyword: String,
    value: Option<i64>,
    terminator: Terminator,
}

impl Command {
    /// Bare command, terminated by `\n`
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            value: None,
            terminator: Terminator::Lf,
        }
    }

    /// Parameterized command, terminated by `\r`
    pub fn with_value(keyword: impl Into<String>, value: i64) -> Self {
        Self {
            keyword: keyword.into(),
            value: Some(value),
            terminator: Terminator::Cr,
        }
    }

    /// Replace the default terminator
    pub fn terminated_by(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Alarm suppression with the given threshold
    pub fn shutup(value: i64) -> Self {
        Self::with_value(SHUTUP_KEYWORD, value)
    }

    /// Temperature query
    pub fn temperature() -> Self {
        Self::new(TEMPERATURE_KEYWORD)
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Exact bytes written to the line
    pub fn encode(&self) -> Vec<u8> {
        format!("{}{}", self, self.terminator.as_str()).into_bytes()
    }

    /// Reject commands the controller could never parse.
    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().is_empty() {
            return Err(Md1200Error::Config(
                "command keyword must not be empty".to_string(),
            ));
        }
        if self.keyword.chars().any(|c| c.is_whitespace()) {
            return Err(Md1200Error::Config(format!(
                "command keyword must not contain whitespace: '{}'",
                self.keyword
            )));
        }
        Ok(())
    }
}

/// Renders the command without its terminator, as it appears in logs.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "{} {}", self.keyword, value),
            None => write!(f, "{}", self.keyword),
        }
    }
}
