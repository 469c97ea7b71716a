//! Resolution of panel time ranges and intervals to epoch milliseconds.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Timelike, Utc};
use thiserror::Error;

use super::target::TimeSpec;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time expression: {0}")]
    InvalidTime(String),
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
    #[error("Time range start {start} is after end {end}")]
    InvertedRange { start: i64, end: i64 },
    #[error("Time range from {start} to {end} is too large")]
    RangeTooLarge { start: i64, end: i64 },
}

pub type TimeResult<T> = Result<T, TimeError>;

/// Resolves a time specification against the given wall-clock instant.
///
/// Expressions start with `now` followed by any number of `+N<unit>`,
/// `-N<unit>` and `/<unit>` operations, applied left to right. Rounding goes
/// to the start of the unit; see [`resolve_end`] for the upper bound.
pub fn resolve(spec: &TimeSpec, now: DateTime<Utc>) -> TimeResult<i64> {
    resolve_rounded(spec, now, false)
}

/// Like [`resolve`], but `/<unit>` rounds to the last millisecond of the unit
pub fn resolve_end(spec: &TimeSpec, now: DateTime<Utc>) -> TimeResult<i64> {
    resolve_rounded(spec, now, true)
}

fn resolve_rounded(spec: &TimeSpec, now: DateTime<Utc>, round_up: bool) -> TimeResult<i64> {
    match spec {
        TimeSpec::Millis(ms) => Ok(*ms),
        TimeSpec::Expr(expr) => resolve_expr(expr, now, round_up),
    }
}

fn resolve_expr(raw: &str, now: DateTime<Utc>, round_up: bool) -> TimeResult<i64> {
    let expr = raw.trim();

    if let Some(math) = expr.strip_prefix("now") {
        return apply_math(math, now, round_up)
            .map(|dt| dt.timestamp_millis())
            .ok_or_else(|| TimeError::InvalidTime(raw.to_string()));
    }
    if let Ok(ms) = expr.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(expr) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }

    Err(TimeError::InvalidTime(raw.to_string()))
}

fn apply_math(math: &str, now: DateTime<Utc>, round_up: bool) -> Option<DateTime<Utc>> {
    let mut current = now;
    let mut rest = math.trim();

    while let Some(op) = rest.chars().next() {
        let body = &rest[op.len_utf8()..];
        let split = body
            .find(|c: char| matches!(c, '+' | '-' | '/'))
            .unwrap_or(body.len());
        let (operand, next) = body.split_at(split);

        current = match op {
            '/' => round(current, operand, round_up)?,
            '+' | '-' => {
                // `now-d` means one day
                let digits = operand
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(operand.len());
                let amount: i64 = match &operand[..digits] {
                    "" => 1,
                    n => n.parse().ok()?,
                };
                let amount = if op == '-' { -amount } else { amount };
                shift(current, &operand[digits..], amount)?
            }
            _ => return None,
        };
        rest = next;
    }

    Some(current)
}

fn shift(dt: DateTime<Utc>, unit: &str, amount: i64) -> Option<DateTime<Utc>> {
    match unit {
        "M" | "y" => {
            let months = if unit == "y" { amount.checked_mul(12)? } else { amount };
            let span = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            if months < 0 {
                dt.checked_sub_months(span)
            } else {
                dt.checked_add_months(span)
            }
        }
        _ => {
            let ms = fixed_unit_ms(unit)?.checked_mul(amount)?;
            dt.checked_add_signed(Duration::milliseconds(ms))
        }
    }
}

/// Start of the unit containing `dt`, or its last millisecond when rounding up.
/// Weeks start on Monday.
fn round(dt: DateTime<Utc>, unit: &str, round_up: bool) -> Option<DateTime<Utc>> {
    let date = dt.date_naive();
    let start = match unit {
        "ms" => return Some(dt),
        "s" => dt.with_nanosecond(0)?.naive_utc(),
        "m" => date.and_hms_opt(dt.hour(), dt.minute(), 0)?,
        "h" => date.and_hms_opt(dt.hour(), 0, 0)?,
        "d" => date.and_hms_opt(0, 0, 0)?,
        "w" => {
            let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
            monday.and_hms_opt(0, 0, 0)?
        }
        "M" => date.with_day(1)?.and_hms_opt(0, 0, 0)?,
        "y" => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        _ => return None,
    };
    let start = Utc.from_utc_datetime(&start);

    if !round_up {
        return Some(start);
    }
    shift(start, unit, 1)?.checked_sub_signed(Duration::milliseconds(1))
}

/// Parses an interval such as `30s` or `5m` into milliseconds
pub fn parse_interval(raw: &str) -> TimeResult<i64> {
    let invalid = || TimeError::InvalidInterval(raw.to_string());
    let (amount, unit) = split_amount(raw.trim()).ok_or_else(invalid)?;
    let unit_ms = match unit {
        "M" => 30 * 24 * 60 * 60 * 1000,
        "y" => 365 * 24 * 60 * 60 * 1000,
        other => fixed_unit_ms(other).ok_or_else(invalid)?,
    };
    amount.checked_mul(unit_ms).ok_or_else(invalid)
}

fn split_amount(value: &str) -> Option<(i64, &str)> {
    let digits = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let amount = value[..digits].parse().ok()?;
    Some((amount, &value[digits..]))
}

fn fixed_unit_ms(unit: &str) -> Option<i64> {
    match unit {
        "ms" => Some(1),
        "s" => Some(1000),
        "m" => Some(60 * 1000),
        "h" => Some(60 * 60 * 1000),
        "d" => Some(24 * 60 * 60 * 1000),
        "w" => Some(7 * 24 * 60 * 60 * 1000),
        _ => None,
    }
}
