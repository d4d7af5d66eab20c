//! CSV export for spreadsheet review.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::message::StoredMessage;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    channel: &'a str,
    ts: &'a str,
    user: &'a str,
    transaction_date: String,
    date_extracted: bool,
    amount: String,
    description: &'a str,
    status: &'static str,
    attachments: String,
}

impl<'a> From<&'a StoredMessage> for ExportRow<'a> {
    fn from(m: &'a StoredMessage) -> Self {
        Self {
            channel: &m.key.channel,
            ts: &m.key.ts,
            user: m.user.as_deref().unwrap_or(""),
            transaction_date: m.transaction_date.map(|d| d.to_string()).unwrap_or_default(),
            date_extracted: m.date_extracted,
            amount: m.amount.map(|a| a.to_string()).unwrap_or_default(),
            description: m.description.as_deref().unwrap_or(""),
            status: m.status.as_str(),
            attachments: m.attachments.join(";"),
        }
    }
}

/// Write one row per message, with a header row. Empty cells stand for
/// absent fields.
pub fn write_csv<'a, W: Write>(
    messages: impl IntoIterator<Item = &'a StoredMessage>,
    writer: W,
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut count = 0;
    for m in messages {
        wtr.serialize(ExportRow::from(m))
            .with_context(|| format!("write row for {}", m.key))?;
        count += 1;
    }
    wtr.flush().context("flush csv")?;
    Ok(count)
}

pub fn export_csv<'a>(
    messages: impl IntoIterator<Item = &'a StoredMessage>,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(messages, file).with_context(|| format!("export {}", path.display()))
}
