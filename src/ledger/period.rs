//! Canonical calendar-bucket identifiers: `YYYY-MM-DD` days, `YYYY-Www`
//! ISO weeks, and `YYYY-MM` months. All conversions use the date's local
//! calendar fields; week numbering follows ISO-8601 (Monday start, week 1
//! contains the year's first Thursday).

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Day,
    Week,
    Month,
}

pub fn to_day_id(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn to_week_id(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

pub fn to_month_id(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn parse_day_id(id: &str) -> Result<NaiveDate, LedgerError> {
    NaiveDate::parse_from_str(id, "%Y-%m-%d")
        .map_err(|_| LedgerError::validation(format!("invalid day id: {id}")))
}

/// Resolves a week id to the Monday of that ISO week.
pub fn parse_week_id(id: &str) -> Result<NaiveDate, LedgerError> {
    let invalid = || LedgerError::validation(format!("invalid week id: {id}"));
    let (year, week) = id.split_once("-W").ok_or_else(invalid)?;
    if year.len() != 4 || week.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let week: u32 = week.parse().map_err(|_| invalid())?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)
}

/// Resolves a month id to the first day of that month.
pub fn parse_month_id(id: &str) -> Result<NaiveDate, LedgerError> {
    let invalid = || LedgerError::validation(format!("invalid month id: {id}"));
    let (year, month) = id.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)
}

/// Moves a period id forward or backward by whole units and re-normalizes.
/// Month arithmetic rolls years and clamps to the last valid day.
pub fn shift_period(kind: PeriodKind, id: &str, delta: i32) -> Result<String, LedgerError> {
    match kind {
        PeriodKind::Day => {
            let date = parse_day_id(id)? + Duration::days(delta as i64);
            Ok(to_day_id(date))
        }
        PeriodKind::Week => {
            let monday = parse_week_id(id)? + Duration::weeks(delta as i64);
            Ok(to_week_id(monday))
        }
        PeriodKind::Month => {
            let date = shift_month(parse_month_id(id)?, delta);
            Ok(to_month_id(date))
        }
    }
}

/// Produces a display label for a period id. Week labels include the
/// Monday through Sunday date span.
pub fn label_period(kind: PeriodKind, id: &str) -> Result<String, LedgerError> {
    match kind {
        PeriodKind::Day => {
            let date = parse_day_id(id)?;
            Ok(date.format("%b %-d, %Y").to_string())
        }
        PeriodKind::Week => {
            let start = parse_week_id(id)?;
            let end = start + Duration::days(6);
            Ok(format!(
                "{id} ({} – {})",
                start.format("%b %-d"),
                end.format("%b %-d, %Y")
            ))
        }
        PeriodKind::Month => {
            let date = parse_month_id(id)?;
            Ok(date.format("%B %Y").to_string())
        }
    }
}

/// The id of the period containing today, per the local clock.
pub fn current_period_id(kind: PeriodKind) -> String {
    period_id_for(kind, Local::now().date_naive())
}

pub fn period_id_for(kind: PeriodKind, date: NaiveDate) -> String {
    match kind {
        PeriodKind::Day => to_day_id(date),
        PeriodKind::Week => to_week_id(date),
        PeriodKind::Month => to_month_id(date),
    }
}

/// All three period ids of a date, as stored on normalized records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStamp {
    pub day: String,
    pub week: String,
    pub month: String,
}

impl PeriodStamp {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            day: to_day_id(date),
            week: to_week_id(date),
            month: to_month_id(date),
        }
    }

    pub fn id(&self, kind: PeriodKind) -> &str {
        match kind {
            PeriodKind::Day => &self.day,
            PeriodKind::Week => &self.week,
            PeriodKind::Month => &self.month,
        }
    }
}

fn shift_month(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;
    let mut day = date.day();
    while month > 12 {
        month -= 12;
        year += 1;
    }
    while month < 1 {
        month += 12;
        year -= 1;
    }
    day = day.min(days_in_month(year, month as u32));
    NaiveDate::from_ymd_opt(year, month as u32, day).unwrap()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 28).unwrap());
    let last_current = first_next - Duration::days(1);
    last_current.day()
}
