//! Stored chat messages and the fields a reviewer works with.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use kasboek_core::{ExtractionRecord, FallbackTimestamp};
use kasboek_extract::RawMessage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable identity of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub channel: String,
    /// Chat timestamp exactly as the chat service sent it.
    pub ts: String,
}

impl MessageKey {
    pub fn new(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ts: ts.into(),
        }
    }

    pub fn posted_at(&self) -> Result<FallbackTimestamp> {
        self.ts.parse()
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.ts)
    }
}

/// Where a record is in the review workflow. Only `New` records have their
/// extracted fields rewritten when the message text changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    New,
    Reviewed,
    Booked,
}

impl WorkflowStatus {
    pub fn allows_reextraction(&self) -> bool {
        matches!(self, WorkflowStatus::New)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::New => "new",
            WorkflowStatus::Reviewed => "reviewed",
            WorkflowStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(WorkflowStatus::New),
            "reviewed" => Ok(WorkflowStatus::Reviewed),
            "booked" => Ok(WorkflowStatus::Booked),
            other => Err(format!("unknown status '{other}' (new, reviewed, booked)")),
        }
    }
}

/// A message arriving from the chat side, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub key: MessageKey,
    pub user: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub key: MessageKey,
    pub posted_at: FallbackTimestamp,
    pub user: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,

    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub date_extracted: bool,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: WorkflowStatus,
}

impl StoredMessage {
    pub fn from_incoming(incoming: IncomingMessage, posted_at: FallbackTimestamp) -> Self {
        Self {
            key: incoming.key,
            posted_at,
            user: incoming.user,
            text: incoming.text,
            attachments: incoming.attachments,
            amount: None,
            transaction_date: None,
            date_extracted: false,
            description: None,
            status: WorkflowStatus::New,
        }
    }

    pub fn raw(&self) -> RawMessage {
        RawMessage::new(self.text.clone(), self.posted_at)
    }

    /// Overwrite every extracted field.
    pub fn apply_extraction(&mut self, rec: ExtractionRecord) {
        self.amount = rec.amount;
        self.transaction_date = Some(rec.transaction_date);
        self.date_extracted = rec.date_extracted;
        self.description = Some(rec.description);
    }

    /// Fill only the fields that are still empty. Returns true if anything
    /// changed.
    pub fn fill_missing(&mut self, rec: ExtractionRecord) -> bool {
        let mut changed = false;
        if self.amount.is_none() && rec.amount.is_some() {
            self.amount = rec.amount;
            changed = true;
        }
        if self.transaction_date.is_none() {
            self.transaction_date = Some(rec.transaction_date);
            self.date_extracted = rec.date_extracted;
            changed = true;
        }
        if self.description.is_none() {
            self.description = Some(rec.description);
            changed = true;
        }
        changed
    }

    pub fn has_missing_fields(&self) -> bool {
        self.amount.is_none() || self.transaction_date.is_none() || self.description.is_none()
    }
}

/// Hand edits from the review side. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewEdit {
    pub amount: Option<Decimal>,
    pub transaction_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub status: Option<WorkflowStatus>,
}

impl ReviewEdit {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.transaction_date.is_none()
            && self.description.is_none()
            && self.status.is_none()
    }

    fn touches_fields(&self) -> bool {
        self.amount.is_some() || self.transaction_date.is_some() || self.description.is_some()
    }

    /// Apply to a record. Editing any field moves a `New` record to
    /// `Reviewed` unless a status is given explicitly.
    pub fn apply_to(self, msg: &mut StoredMessage) {
        if self.touches_fields() && msg.status == WorkflowStatus::New {
            msg.status = WorkflowStatus::Reviewed;
        }
        if let Some(amount) = self.amount {
            msg.amount = Some(amount);
        }
        if let Some(date) = self.transaction_date {
            msg.transaction_date = Some(date);
            // A hand-entered date did not come from the text
            msg.date_extracted = false;
        }
        if let Some(description) = self.description {
            msg.description = Some(description);
        }
        if let Some(status) = self.status {
            msg.status = status;
        }
    }
}
