//! Dates in message text.
//!
//! Two attempts, first match wins: numeric (`D/M/Y`, `D-M-Y`, `D.M.Y`), then
//! textual (`D <month> Y`). Order is always day-month-year. A two-digit year
//! means 20xx. Only the first token of each shape is looked at, and if the
//! numeric token exists the textual attempt is skipped even when the numeric
//! one is not a real date.

use chrono::NaiveDate;
use kasboek_core::{DateResolution, MonthTable};
use tracing::{debug, trace};

use crate::patterns::{self, DateToken};

pub fn resolve_date(text: &str) -> DateResolution {
    if let Some(tok) = patterns::first_numeric_date(text) {
        let date = tok
            .month
            .parse::<u32>()
            .ok()
            .and_then(|month| calendar_date(&tok, month));
        return settle(&tok, date);
    }

    if let Some(tok) = patterns::first_textual_date(text) {
        let Some(month) = MonthTable::lookup(tok.month) else {
            debug!(word = tok.month, "not a month name");
            return DateResolution::NotExtracted;
        };
        let date = calendar_date(&tok, month);
        return settle(&tok, date);
    }

    DateResolution::NotExtracted
}

fn settle(tok: &DateToken<'_>, date: Option<NaiveDate>) -> DateResolution {
    match date {
        Some(d) => {
            trace!(day = tok.day, month = tok.month, year = tok.year, date = %d, "date token");
            DateResolution::Extracted(d)
        }
        None => {
            debug!(day = tok.day, month = tok.month, year = tok.year, "not a calendar date");
            DateResolution::NotExtracted
        }
    }
}

/// Build a real calendar date. Out-of-range parts are rejected, never clamped.
fn calendar_date(tok: &DateToken<'_>, month: u32) -> Option<NaiveDate> {
    let year = expand_year(tok.year)?;
    let day: u32 = tok.day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// "24" -> 2024, "2024" -> 2024. Three-digit years and year 0 are invalid.
fn expand_year(year: &str) -> Option<i32> {
    let n: i32 = year.parse().ok()?;
    match year.len() {
        2 => Some(2000 + n),
        4 if n >= 1 => Some(n),
        _ => None,
    }
}
