//! Message store keyed by (channel, ts), persisted as one JSON file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use kasboek_core::{ExtractionRecord, FallbackTimestamp};
use kasboek_extract::{Extractor, RawMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{ChatEvent, EventAction, EventRouter};
use crate::message::{IncomingMessage, MessageKey, ReviewEdit, StoredMessage};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Text and extracted fields refreshed.
    Updated,
    /// Text refreshed; extracted fields kept because the record is past review.
    TextOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upserted: usize,
    pub ignored: usize,
    pub deleted: usize,
}

/// Work item for a backfill pass.
#[derive(Debug, Clone)]
pub struct BackfillJob {
    pub key: MessageKey,
    pub message: RawMessage,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub channel: Option<String>,
    /// Case-insensitive substring of the raw text.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    path: Option<PathBuf>,
    messages: BTreeMap<MessageKey, StoredMessage>,
}

impl MessageStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Self {
            path: Some(path.to_path_buf()),
            messages: BTreeMap::new(),
        };
        if !path.exists() {
            return Ok(store);
        }

        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let file: StoreFile =
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        if file.version != STORE_VERSION {
            bail!(
                "unsupported store version {} in {} (expected {STORE_VERSION})",
                file.version,
                path.display()
            );
        }
        store.messages = file.messages.into_iter().map(|m| (m.key.clone(), m)).collect();
        debug!(count = store.messages.len(), path = %path.display(), "store loaded");
        Ok(store)
    }

    /// Write back to the file the store was loaded from. The file is
    /// replaced in one rename so readers never see half a store.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            bail!("in-memory store has no file to save to");
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }

        let file = StoreFile {
            version: STORE_VERSION,
            messages: self.messages.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file).context("serialize store")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, key: &MessageKey) -> Option<&StoredMessage> {
        self.messages.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredMessage> {
        self.messages.values()
    }

    /// Insert or refresh a message. Extracted fields are rewritten only
    /// while the record's status allows it.
    pub fn upsert(&mut self, incoming: IncomingMessage, extractor: &Extractor) -> Result<UpsertOutcome> {
        let posted_at = incoming
            .key
            .posted_at()
            .with_context(|| format!("message {}", incoming.key))?;
        let record = extractor.extract(incoming.text.as_deref().unwrap_or(""), posted_at);

        let Some(existing) = self.messages.get_mut(&incoming.key) else {
            let key = incoming.key.clone();
            let mut msg = StoredMessage::from_incoming(incoming, posted_at);
            msg.apply_extraction(record);
            info!(key = %key, "message stored");
            self.messages.insert(key, msg);
            return Ok(UpsertOutcome::Inserted);
        };

        existing.text = incoming.text;
        existing.attachments = incoming.attachments;
        if incoming.user.is_some() {
            existing.user = incoming.user;
        }

        if existing.status.allows_reextraction() {
            existing.apply_extraction(record);
            info!(key = %existing.key, "message updated");
            Ok(UpsertOutcome::Updated)
        } else {
            info!(key = %existing.key, status = %existing.status, "message text updated, fields kept");
            Ok(UpsertOutcome::TextOnly)
        }
    }

    pub fn delete(&mut self, key: &MessageKey) -> bool {
        let removed = self.messages.remove(key).is_some();
        if removed {
            info!(key = %key, "message deleted");
        } else {
            debug!(key = %key, "delete for unknown message");
        }
        removed
    }

    /// Apply one routed event. Returns true if the store changed.
    pub fn apply(&mut self, action: EventAction, extractor: &Extractor) -> Result<bool> {
        match action {
            EventAction::Ignore => Ok(false),
            EventAction::Delete(key) => Ok(self.delete(&key)),
            EventAction::Upsert(incoming) => self.upsert(incoming, extractor).map(|_| true),
        }
    }

    /// Reconcile a channel with a batch of its recent history.
    ///
    /// Every message in the batch is upserted. Stored messages of the
    /// channel that are at least as new as the oldest message in the batch
    /// but missing from it were deleted upstream and are removed here.
    pub fn sync_channel(
        &mut self,
        channel: &str,
        batch: &[ChatEvent],
        router: &EventRouter,
        extractor: &Extractor,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        let oldest = batch
            .iter()
            .filter_map(|e| e.ts.as_deref()?.parse::<FallbackTimestamp>().ok())
            .min();

        let mut seen: HashSet<String> = HashSet::new();
        for event in batch {
            match router.route(event, Some(channel)) {
                EventAction::Upsert(incoming) if incoming.key.channel == channel => {
                    seen.insert(incoming.key.ts.clone());
                    self.upsert(incoming, extractor)?;
                    report.upserted += 1;
                }
                _ => report.ignored += 1,
            }
        }

        let Some(oldest) = oldest else {
            warn!(channel, "history batch without usable timestamps, skipping cleanup");
            return Ok(report);
        };

        let stale: Vec<MessageKey> = self
            .messages
            .values()
            .filter(|m| m.key.channel == channel && m.posted_at >= oldest)
            .filter(|m| !seen.contains(&m.key.ts))
            .map(|m| m.key.clone())
            .collect();

        if !stale.is_empty() {
            info!(channel, count = stale.len(), "sync cleanup: removing messages deleted upstream");
        }
        for key in &stale {
            self.messages.remove(key);
        }
        report.deleted = stale.len();
        Ok(report)
    }

    /// Records with empty fields that a backfill pass may fill. Only `new`
    /// records qualify; the status gate protects reviewed and booked ones.
    pub fn backfill_candidates(&self) -> Vec<BackfillJob> {
        self.messages
            .values()
            .filter(|m| m.status.allows_reextraction() && m.has_missing_fields())
            .map(|m| BackfillJob {
                key: m.key.clone(),
                message: m.raw(),
            })
            .collect()
    }

    /// Fill missing fields from finished backfill jobs. Returns how many
    /// records changed.
    pub fn apply_backfill(&mut self, results: Vec<(MessageKey, ExtractionRecord)>) -> usize {
        let mut changed = 0;
        for (key, record) in results {
            let Some(msg) = self.messages.get_mut(&key) else {
                debug!(key = %key, "backfill result for vanished message");
                continue;
            };
            if !msg.status.allows_reextraction() {
                debug!(key = %key, status = %msg.status, "backfill skipped: status gate");
                continue;
            }
            if msg.fill_missing(record) {
                changed += 1;
            }
        }
        info!(changed, "backfill applied");
        changed
    }

    /// Sequential backfill pass.
    pub fn backfill(&mut self, extractor: &Extractor) -> usize {
        let results = self
            .backfill_candidates()
            .into_iter()
            .map(|job| {
                let record = extractor.extract_message(&job.message);
                (job.key, record)
            })
            .collect();
        self.apply_backfill(results)
    }

    pub fn edit(&mut self, key: &MessageKey, edit: ReviewEdit) -> Result<&StoredMessage> {
        let Some(msg) = self.messages.get_mut(key) else {
            bail!("no message {key}");
        };
        edit.apply_to(msg);
        info!(key = %key, status = %msg.status, "message edited");
        Ok(&*msg)
    }

    /// Matching messages, newest first.
    pub fn list(&self, filter: &ListFilter) -> Vec<&StoredMessage> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut out: Vec<&StoredMessage> = self
            .messages
            .values()
            .filter(|m| filter.channel.as_ref().is_none_or(|c| &m.key.channel == c))
            .filter(|m| {
                needle.as_ref().is_none_or(|n| {
                    m.text
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(n.as_str()))
                })
            })
            .collect();

        out.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| a.key.cmp(&b.key)));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    /// Distinct channels, sorted.
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.messages.keys().map(|k| k.channel.as_str()).collect();
        channels.dedup();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::message::WorkflowStatus;

    fn incoming(channel: &str, ts: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            key: MessageKey::new(channel, ts),
            user: Some("U1".into()),
            text: Some(text.into()),
            attachments: vec![],
        }
    }

    #[test]
    fn test_insert_runs_extraction() {
        let mut store = MessageStore::in_memory();
        let ex = Extractor::default();
        let outcome = store
            .upsert(incoming("C1", "1704067200.000100", "Lunch 12 jan 2024 € 15,00"), &ex)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let msg = store.get(&MessageKey::new("C1", "1704067200.000100")).unwrap();
        assert_eq!(msg.amount, Some(Decimal::from_str("15.00").unwrap()));
        assert_eq!(msg.transaction_date, NaiveDate::from_ymd_opt(2024, 1, 12));
        assert!(msg.date_extracted);
        assert_eq!(msg.description.as_deref(), Some("Lunch"));
        assert_eq!(msg.status, WorkflowStatus::New);
    }

    #[test]
    fn test_status_gate_keeps_reviewed_fields() {
        let mut store = MessageStore::in_memory();
        let ex = Extractor::default();
        let key = MessageKey::new("C1", "1704067200.0");
        store.upsert(incoming("C1", "1704067200.0", "€ 5 koffie"), &ex).unwrap();
        store
            .edit(
                &key,
                ReviewEdit {
                    description: Some("Koffie team".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let outcome = store.upsert(incoming("C1", "1704067200.0", "€ 9 thee"), &ex).unwrap();
        assert_eq!(outcome, UpsertOutcome::TextOnly);
        let msg = store.get(&key).unwrap();
        assert_eq!(msg.text.as_deref(), Some("€ 9 thee"));
        assert_eq!(msg.amount, Some(Decimal::from(5)));
        assert_eq!(msg.description.as_deref(), Some("Koffie team"));
    }

    #[test]
    fn test_backfill_respects_status_gate() {
        let mut store = MessageStore::in_memory();
        let ex = Extractor::default();
        let key = MessageKey::new("C1", "1704067200.0");
        store.upsert(incoming("C1", "1704067200.0", "koffie"), &ex).unwrap();
        store
            .edit(
                &key,
                ReviewEdit {
                    status: Some(WorkflowStatus::Reviewed),
                    ..Default::default()
                },
            )
            .unwrap();

        // Upstream edit adds an amount; the gate keeps the field empty
        let outcome = store.upsert(incoming("C1", "1704067200.0", "koffie € 9"), &ex).unwrap();
        assert_eq!(outcome, UpsertOutcome::TextOnly);
        assert!(store.backfill_candidates().is_empty());
        assert_eq!(store.backfill(&ex), 0);

        // Results computed before the review landed are dropped as well
        let late = ex.extract_message(&store.get(&key).unwrap().raw());
        assert_eq!(store.apply_backfill(vec![(key.clone(), late)]), 0);

        let msg = store.get(&key).unwrap();
        assert_eq!(msg.status, WorkflowStatus::Reviewed);
        assert_eq!(msg.amount, None);
    }

    #[test]
    fn test_new_records_follow_edits() {
        let mut store = MessageStore::in_memory();
        let ex = Extractor::default();
        store.upsert(incoming("C1", "1.0", "€ 5 koffie"), &ex).unwrap();
        let outcome = store.upsert(incoming("C1", "1.0", "€ 9 thee"), &ex).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        let msg = store.get(&MessageKey::new("C1", "1.0")).unwrap();
        assert_eq!(msg.amount, Some(Decimal::from(9)));
        assert_eq!(msg.description.as_deref(), Some("thee"));
    }

    #[test]
    fn test_bad_ts_is_rejected() {
        let mut store = MessageStore::in_memory();
        let err = store.upsert(incoming("C1", "gisteren", "€ 5"), &Extractor::default());
        assert!(err.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_filters_and_orders() {
        let mut store = MessageStore::in_memory();
        let ex = Extractor::default();
        store.upsert(incoming("C1", "100.0", "Koffie € 3"), &ex).unwrap();
        store.upsert(incoming("C1", "300.0", "koffiebonen € 12"), &ex).unwrap();
        store.upsert(incoming("C2", "200.0", "Koffie € 4"), &ex).unwrap();

        let all = store.list(&ListFilter::default());
        let order: Vec<&str> = all.iter().map(|m| m.key.ts.as_str()).collect();
        assert_eq!(order, vec!["300.0", "200.0", "100.0"]);

        let c1 = store.list(&ListFilter {
            channel: Some("C1".into()),
            search: Some("KOFFIE".into()),
            limit: Some(1),
        });
        assert_eq!(c1.len(), 1);
        assert_eq!(c1[0].key.ts, "300.0");
        assert_eq!(store.channels(), vec!["C1", "C2"]);
    }

    #[test]
    fn test_edit_unknown_message() {
        let mut store = MessageStore::in_memory();
        assert!(store.edit(&MessageKey::new("C1", "1.0"), ReviewEdit::default()).is_err());
    }

    #[test]
    fn test_in_memory_store_cannot_save() {
        assert!(MessageStore::in_memory().save().is_err());
    }
}
