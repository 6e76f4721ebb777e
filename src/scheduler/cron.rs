use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use cron::Schedule as CronSchedule;

use crate::error::ConfigError;

/// When sync passes fire, evaluated in a fixed UTC offset.
///
/// Accepts the classic 5-field form (`min hour dom month dow`) or the
/// seconds-first 6/7-field form of the `cron` crate. A 5-field expression
/// gets a `0` seconds field, and its numeric day-of-week values (0 or 7 =
/// Sunday) are shifted to the `cron` crate's numbering (1 = Sunday). The
/// 6/7-field form is passed through untouched.
#[derive(Debug, Clone)]
pub struct SyncSchedule {
    expr: String,
    schedule: CronSchedule,
    offset: FixedOffset,
}

impl SyncSchedule {
    pub fn parse(expr: &str, offset: FixedOffset) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCron {
            expr: expr.to_string(),
            reason,
        };

        let trimmed = expr.trim();
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let normalized = if let [min, hour, dom, month, dow] = fields.as_slice() {
            let dow = classic_day_of_week(dow).map_err(invalid)?;
            format!("0 {min} {hour} {dom} {month} {dow}")
        } else {
            trimmed.to_string()
        };

        let schedule = CronSchedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expr: normalized,
            schedule,
            offset,
        })
    }

    /// Normalized (seconds-first) expression.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        self.schedule
            .after(&after.with_timezone(&self.offset))
            .next()
    }

    /// Fire times within `hours` of `from`. Dry-run preview only.
    pub fn preview(
        &self,
        from: &DateTime<Utc>,
        hours: u64,
    ) -> Result<Vec<DateTime<FixedOffset>>, ConfigError> {
        let end = i64::try_from(hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .and_then(|window| from.checked_add_signed(window))
            .ok_or(ConfigError::PreviewWindow(hours))?
            .with_timezone(&self.offset);

        Ok(self
            .schedule
            .after(&from.with_timezone(&self.offset))
            .take_while(|t| *t <= end)
            .collect())
    }
}

/// Rewrite a classic day-of-week field (0-7, Sunday = 0 or 7) into the
/// `cron` crate's 1-7 numbering. Names and `*`/`?` are left alone.
fn classic_day_of_week(field: &str) -> Result<String, String> {
    field
        .split(',')
        .map(classic_day_item)
        .collect::<Result<Vec<_>, _>>()
        .map(|items| items.join(","))
}

fn classic_day_item(item: &str) -> Result<String, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    if base == "*" || base == "?" || base.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(item.to_string());
    }

    let with_step = |base: String| match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    };

    match base.split_once('-') {
        None => {
            let day = classic_day(base)?;
            match (day, step) {
                (7, Some(_)) => Err(format!("day-of-week '{item}' starts past Saturday")),
                _ => Ok(with_step(shift_day(day).to_string())),
            }
        }
        Some((start, end)) => {
            let (start, end) = (classic_day(start)?, classic_day(end)?);
            if start > end {
                return Err(format!("day-of-week range '{item}' runs backwards"));
            }
            match (shift_day(start), end + 1) {
                // Both ends on the Sunday written as 7.
                (1, 8) if start == 7 => Ok(with_step("1".to_string())),
                (1, 8) => Ok(with_step("1-7".to_string())),
                (_, 8) if step.is_some() => Err(format!(
                    "day-of-week range '{item}' wraps past Saturday; use day names"
                )),
                (from, 8) => Ok(format!("{from}-7,1")),
                (from, to) => Ok(with_step(format!("{from}-{to}"))),
            }
        }
    }
}

fn classic_day(raw: &str) -> Result<u8, String> {
    match raw.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("day-of-week '{raw}' is not between 0 and 7")),
    }
}

/// 0..=6 (Sunday first) to 1..=7; a trailing 7 is Sunday again.
fn shift_day(day: u8) -> u8 {
    if day == 7 {
        1
    } else {
        day + 1
    }
}
