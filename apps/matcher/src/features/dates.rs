//! Date span resolution — turns heterogeneous start/end date tokens into a
//! duration in years.
//!
//! Two encodings are accepted: a compact `MM/YYYY` token (tried first) and a
//! full timestamp as the upstream document store emits it. Parse failures
//! never propagate: an unparsable `end` falls back to "now", a bad or
//! missing `start` degrades the whole span to 0 years with a warning,
//! because one bad date must not abort a whole batch. A missing `end` is
//! also 0 years; only the explicit open-ended tokens mean "still employed".

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

const DAYS_PER_YEAR: f64 = 365.25;

/// Tokens that mark an employment span as ongoing (case-insensitive).
const OPEN_ENDED_TOKENS: &[&str] = &["present", "null", "", "current"];

/// Resolves a start/end token pair to a duration in years, rounded to one
/// decimal, never negative. Total over all inputs; failures degrade to 0.
pub fn resolve_span(start: Option<&str>, end: Option<&str>) -> f64 {
    let now = Utc::now().naive_utc();

    let start_token = match start {
        Some(s) => s,
        None => return 0.0,
    };

    let end_date = match end {
        // Only an explicit open-ended token means the span runs to the
        // present; an absent end date is 0 years, like an absent start.
        Some(token) if is_open_ended(token) => now,
        Some(token) => match parse_date_token(token) {
            Some(date) => date,
            None => {
                warn!("could not parse end date '{token}', using current time");
                now
            }
        },
        None => {
            warn!("missing end date for start '{start_token}', returning 0 years");
            return 0.0;
        }
    };

    let start_date = match parse_date_token(start_token) {
        Some(date) => date,
        None => {
            warn!("could not parse start date '{start_token}', returning 0 years");
            return 0.0;
        }
    };

    if start_date > end_date {
        warn!("start date '{start_token}' is after end date, returning 0 years");
        return 0.0;
    }

    let years = (end_date - start_date).num_days() as f64 / DAYS_PER_YEAR;
    round_tenths(years.max(0.0))
}

fn is_open_ended(token: &str) -> bool {
    let lowered = token.trim().to_lowercase();
    OPEN_ENDED_TOKENS.contains(&lowered.as_str())
}

/// Tries the compact `MM/YYYY` form first, then full timestamps
/// (RFC 3339 with or without the `Z` suffix, then a bare `YYYY-MM-DD`).
fn parse_date_token(token: &str) -> Option<NaiveDateTime> {
    let token = token.trim();

    if let Some(date) = parse_month_year(token) {
        return Some(date);
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(token) {
        return Some(stamp.naive_utc());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(stamp);
    }
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

fn parse_month_year(token: &str) -> Option<NaiveDateTime> {
    let (month_part, year_part) = token.split_once('/')?;
    let month: u32 = month_part.trim().parse().ok()?;
    let year: i32 = year_part.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
