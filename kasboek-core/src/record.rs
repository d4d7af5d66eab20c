//! Extraction result types handed to storage and review.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of looking for a date in message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
pub enum DateResolution {
    /// A token was found and is a real calendar date.
    Extracted(NaiveDate),
    /// No token, or the token does not exist on the calendar.
    NotExtracted,
}

impl DateResolution {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateResolution::Extracted(d) => Some(*d),
            DateResolution::NotExtracted => None,
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, DateResolution::Extracted(_))
    }
}

/// Fields recovered from one message.
///
/// `transaction_date` is always set. `date_extracted` is true only when the
/// date came from the text rather than the message timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub amount: Option<Decimal>,
    pub transaction_date: NaiveDate,
    pub date_extracted: bool,
    pub description: String,
}

impl ExtractionRecord {
    /// Assemble a record, taking the date from `resolution` when it was
    /// extracted and from `fallback` otherwise.
    pub fn assemble(
        amount: Option<Decimal>,
        resolution: DateResolution,
        fallback: impl FnOnce() -> NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        let (transaction_date, date_extracted) = match resolution {
            DateResolution::Extracted(d) => (d, true),
            DateResolution::NotExtracted => (fallback(), false),
        };

        Self {
            amount,
            transaction_date,
            date_extracted,
            description: description.into(),
        }
    }
}
