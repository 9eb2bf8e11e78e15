//! Five-field cron expressions
//!
//! `minute hour day-of-month month day-of-week`, evaluated in UTC. Each field
//! accepts `*`, single values, `a-b` ranges, comma lists and `/step`. Months
//! and weekdays also accept three-letter names. When both day fields are
//! restricted, a day matches if either of them does.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use md1200_core::{Md1200Error, Result};
use std::str::FromStr;

/// How far ahead to search before declaring an expression unsatisfiable
const SEARCH_YEARS: i32 = 5;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Set of allowed values for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }

    fn insert(&mut self, value: u32) {
        self.0 |= 1 << value;
    }
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value the first entry of `names` maps to
    names_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    names_base: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    names_base: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    names_base: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    names_base: 1,
};
// 7 is accepted as an alias for Sunday and folded onto 0 after parsing
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    names_base: 0,
};

impl FieldSpec {
    fn error(&self, field: &str, reason: &str) -> Md1200Error {
        Md1200Error::Schedule(format!("{} field '{}': {}", self.name, field, reason))
    }

    fn value(&self, field: &str, raw: &str) -> Result<u32> {
        let lower = raw.to_lowercase();
        if let Some(pos) = self.names.iter().position(|n| *n == lower) {
            return Ok(self.names_base + pos as u32);
        }

        let value: u32 = raw
            .parse()
            .map_err(|_| self.error(field, &format!("'{}' is not a number", raw)))?;
        if value < self.min || value > self.max {
            return Err(self.error(
                field,
                &format!("{} is outside {}-{}", value, self.min, self.max),
            ));
        }
        Ok(value)
    }

    /// Parse a whole field. Returns the set and whether it was restricted
    /// (anything other than a bare `*` or `?`).
    fn parse(&self, field: &str) -> Result<(FieldSet, bool)> {
        let mut set = FieldSet(0);
        let restricted = !(field == "*" || field == "?");

        for part in field.split(',') {
            if part.is_empty() {
                return Err(self.error(field, "empty list entry"));
            }

            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| self.error(field, &format!("invalid step '{}'", step)))?;
                    if step == 0 {
                        return Err(self.error(field, "step must be at least 1"));
                    }
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" || range == "?" {
                (self.min, self.max)
            } else if let Some((a, b)) = range.split_once('-') {
                let (a, b) = (self.value(field, a)?, self.value(field, b)?);
                if a > b {
                    return Err(self.error(field, &format!("range {}-{} is reversed", a, b)));
                }
                (a, b)
            } else {
                let start = self.value(field, range)?;
                // "5/15" means every 15 starting at 5
                let end = if step.is_some() { self.max } else { start };
                (start, end)
            };

            let step = step.unwrap_or(1);
            let mut value = Some(start);
            while let Some(v) = value.filter(|v| *v <= end) {
                set.insert(v);
                value = v.checked_add(step);
            }
        }

        Ok((set, restricted))
    }
}

/// A parsed cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl FromStr for CronExpr {
    type Err = Md1200Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Md1200Error::Schedule(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), got {} in '{}'",
                fields.len(),
                s
            )));
        }

        let (minutes, _) = MINUTE.parse(fields[0])?;
        let (hours, _) = HOUR.parse(fields[1])?;
        let (days_of_month, dom_restricted) = DAY_OF_MONTH.parse(fields[2])?;
        let (months, _) = MONTH.parse(fields[3])?;
        let (mut days_of_week, dow_restricted) = DAY_OF_WEEK.parse(fields[4])?;

        if days_of_week.contains(7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted,
            dow_restricted,
        })
    }
}

impl CronExpr {
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// Whether the expression fires at the minute containing `at`
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.months.contains(at.month())
            && self.day_matches(at.date_naive())
            && self.hours.contains(at.hour())
            && self.minutes.contains(at.minute())
    }

    /// First firing strictly after `after`, or `None` if the expression can
    /// never fire (e.g. February 30th).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.naive_utc().with_second(0)?.with_nanosecond(0)?;
        let mut t: NaiveDateTime = start + chrono::Duration::minutes(1);
        let last_year = t.year() + SEARCH_YEARS;

        while t.year() <= last_year {
            if !self.months.contains(t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.hours.contains(t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + chrono::Duration::hours(1);
                continue;
            }

            if !self.minutes.contains(t.minute()) {
                t += chrono::Duration::minutes(1);
                continue;
            }

            return Some(Utc.from_utc_datetime(&t));
        }

        None
    }
}
