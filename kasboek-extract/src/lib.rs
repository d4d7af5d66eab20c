//! kasboek-extract: recover amount, date and description from free-text
//! chat messages.
//!
//! Every function here is pure and never fails: a missing or malformed token
//! turns into an absent field, not an error.

pub mod amount;
pub mod date;
pub mod description;
pub mod patterns;

use anyhow::Result;
use chrono_tz::Tz;
use kasboek_core::{ExtractionRecord, FallbackTimestamp, parse_timezone};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use amount::{normalize_amount, resolve_amount};
pub use date::resolve_date;
pub use description::strip;
pub use patterns::TokenPattern;

/// Extract with the fallback date taken on a UTC clock.
pub fn extract(text: &str, ts: FallbackTimestamp) -> ExtractionRecord {
    Extractor::default().extract(text, ts)
}

/// Extract with the fallback date taken on a wall clock in `tz`.
pub fn extract_in(text: &str, ts: FallbackTimestamp, tz: Tz) -> ExtractionRecord {
    Extractor::new(tz).extract(text, ts)
}

/// A message as handed over by a caller. Absent text behaves like "".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: Option<String>,
    pub ts: FallbackTimestamp,
}

impl RawMessage {
    pub fn new(text: Option<String>, ts: FallbackTimestamp) -> Self {
        Self { text, ts }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Extraction bound to the timezone used for fallback dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extractor {
    tz: Tz,
}

impl Default for Extractor {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl Extractor {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_timezone_name(name: &str) -> Result<Self> {
        Ok(Self::new(parse_timezone(name)?))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn extract(&self, text: &str, ts: FallbackTimestamp) -> ExtractionRecord {
        let amount = resolve_amount(text);
        let resolution = resolve_date(text);
        let description = strip(text);

        let record =
            ExtractionRecord::assemble(amount, resolution, || ts.to_date_in(self.tz), description);
        debug!(
            amount = ?record.amount,
            date = %record.transaction_date,
            date_extracted = record.date_extracted,
            "extracted"
        );
        record
    }

    pub fn extract_message(&self, msg: &RawMessage) -> ExtractionRecord {
        self.extract(msg.text(), msg.ts)
    }
}
