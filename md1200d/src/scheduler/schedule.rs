//! Schedule expressions
//!
//! A schedule is either a fixed interval (`@every 30s`) or a cron expression,
//! written out in full or as one of the `@daily`-style shorthands.

use chrono::{DateTime, Utc};
use md1200_core::{format_duration, parse_duration, Md1200Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::cron::CronExpr;

/// When the command scheduler fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval; the first firing comes one interval after start
    Every(Duration),
    /// Wall-clock schedule in UTC
    Cron {
        expression: String,
        cron: CronExpr,
    },
}

impl Schedule {
    fn cron(expression: &str) -> Result<Self> {
        Ok(Schedule::Cron {
            expression: expression.to_string(),
            cron: expression.parse()?,
        })
    }

    /// Time to wait, from `now`, until the next firing.
    ///
    /// Returns `None` for a cron expression that can never fire again.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Schedule::Every(period) => Some(*period),
            Schedule::Cron { cron, .. } => {
                let next = cron.next_after(now)?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = Md1200Error;

    /// Parse a schedule expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use md1200d::scheduler::Schedule;
    ///
    /// let every: Schedule = "@every 30s".parse().unwrap();
    /// assert_eq!(every, Schedule::Every(Duration::from_secs(30)));
    ///
    /// assert!("*/5 * * * *".parse::<Schedule>().is_ok());
    /// assert!("@fortnightly".parse::<Schedule>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("@every") {
            let period = parse_duration(rest)
                .map_err(|_| Md1200Error::Schedule(format!("invalid interval in '{}'", s)))?;
            if period.is_zero() {
                return Err(Md1200Error::Schedule(format!(
                    "interval must be greater than zero in '{}'",
                    s
                )));
            }
            return Ok(Schedule::Every(period));
        }

        match s {
            "@yearly" | "@annually" => Self::cron("0 0 1 1 *"),
            "@monthly" => Self::cron("0 0 1 * *"),
            "@weekly" => Self::cron("0 0 * * 0"),
            "@daily" | "@midnight" => Self::cron("0 0 * * *"),
            "@hourly" => Self::cron("0 * * * *"),
            _ if s.starts_with('@') => Err(Md1200Error::Schedule(format!(
                "unknown descriptor '{}'. Valid options: @every <duration>, @yearly, @monthly, @weekly, @daily, @hourly",
                s
            ))),
            _ => Self::cron(s),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Every(period) => write!(f, "@every {}", format_duration(*period)),
            Schedule::Cron { expression, .. } => f.write_str(expression),
        }
    }
}
