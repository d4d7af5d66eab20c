use std::fs;
use std::str::FromStr;

use chrono::NaiveDate;
use kasboek_archive::{
    ChatEvent, EventRouter, IncomingMessage, ListFilter, MessageKey, MessageStore, ReviewEdit,
    UpsertOutcome, WorkflowStatus,
};
use kasboek_extract::Extractor;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

const LIVE_EVENTS: &str = r#"
{"event": {"channel": "C1", "ts": "1704067200.000100", "user": "U1", "text": "Lunch 12 jan 2024 € 15,00 bij Albert Heijn"}}
{"event": {"subtype": "channel_join", "channel": "C1", "ts": "1704067201.000000", "user": "U2"}}
{"event": {"channel": "C1", "ts": "1704067300.000200", "user": "U2", "text": "parkeren 4,50€"}}
{"event": {"subtype": "message_changed", "channel": "C1", "ts": "1704067400.000000", "message": {"ts": "1704067300.000200", "user": "U2", "text": "parkeren € 5,50 centrum"}}}
{"event": {"channel": "C1", "ts": "1704067500.000300", "user": "U1", "text": "oeps"}}
{"event": {"subtype": "message_deleted", "channel": "C1", "deleted_ts": "1704067500.000300"}}
"#;

fn replay(store: &mut MessageStore, lines: &str) {
    let router = EventRouter::default();
    let ex = Extractor::default();
    for line in lines.lines().filter(|l| !l.trim().is_empty()) {
        let event = ChatEvent::from_json(line).unwrap();
        store.apply(router.route(&event, None), &ex).unwrap();
    }
}

#[test]
fn test_live_events_build_archive() {
    let mut store = MessageStore::in_memory();
    replay(&mut store, LIVE_EVENTS);

    assert_eq!(store.len(), 2);

    let lunch = store.get(&MessageKey::new("C1", "1704067200.000100")).unwrap();
    assert_eq!(lunch.amount, Some(Decimal::from_str("15.00").unwrap()));
    assert_eq!(lunch.transaction_date, NaiveDate::from_ymd_opt(2024, 1, 12));
    assert!(lunch.date_extracted);
    assert_eq!(lunch.description.as_deref(), Some("Lunch bij Albert Heijn"));

    let parking = store.get(&MessageKey::new("C1", "1704067300.000200")).unwrap();
    assert_eq!(parking.amount, Some(Decimal::from_str("5.50").unwrap()));
    assert_eq!(parking.transaction_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert!(!parking.date_extracted);
    assert_eq!(parking.description.as_deref(), Some("parkeren centrum"));
}

#[test]
fn test_history_sync_removes_upstream_deletions() {
    let mut store = MessageStore::in_memory();
    let ex = Extractor::default();
    let router = EventRouter::default();

    // An old message outside the fetched window, and one inside it that
    // was deleted upstream.
    replay(
        &mut store,
        r#"
{"channel": "C1", "ts": "100.0", "text": "oud € 1"}
{"channel": "C1", "ts": "250.0", "text": "verwijderd € 2"}
{"channel": "C2", "ts": "260.0", "text": "ander kanaal € 3"}
"#,
    );

    let batch: Vec<ChatEvent> = serde_json::from_str(
        r#"[
            {"ts": "300.0", "user": "U1", "text": "nieuw € 4"},
            {"ts": "220.0", "subtype": "channel_join", "user": "U3"},
            {"ts": "200.0", "user": "U1", "text": "bestaand € 5"}
        ]"#,
    )
    .unwrap();

    let report = store.sync_channel("C1", &batch, &router, &ex).unwrap();
    assert_eq!(report.upserted, 2);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.deleted, 1);

    let keys: Vec<String> = store.iter().map(|m| m.key.to_string()).collect();
    assert_eq!(keys, vec!["C1/100.0", "C1/200.0", "C1/300.0", "C2/260.0"]);
}

#[test]
fn test_store_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive").join("messages.json");

    let mut store = MessageStore::load(&path).unwrap();
    assert!(store.is_empty());
    replay(&mut store, LIVE_EVENTS);
    store
        .edit(
            &MessageKey::new("C1", "1704067300.000200"),
            ReviewEdit {
                status: Some(WorkflowStatus::Booked),
                ..Default::default()
            },
        )
        .unwrap();
    store.save().unwrap();

    let reloaded = MessageStore::load(&path).unwrap();
    let before: Vec<_> = store.iter().cloned().collect();
    let after: Vec<_> = reloaded.iter().cloned().collect();
    assert_eq!(after, before);
    assert!(!dir.path().join("archive").join("messages.json.tmp").exists());
}

#[test]
fn test_backfill_fills_only_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messages.json");

    // Records written before extraction existed: raw text only.
    fs::write(
        &path,
        r#"{
  "version": 1,
  "messages": [
    {"key": {"channel": "C1", "ts": "1704067200.0"}, "posted_at": "1704067200.0",
     "user": "U1", "text": "Taxi 3 feb 2024 € 23,10"},
    {"key": {"channel": "C1", "ts": "1704067300.0"}, "posted_at": "1704067300.0",
     "user": "U1", "text": "Boeken € 40", "description": "Vakliteratuur", "status": "reviewed"},
    {"key": {"channel": "C1", "ts": "1704067400.0"}, "posted_at": "1704067400.0",
     "user": "U1", "text": "Trein € 12", "status": "booked"},
    {"key": {"channel": "C1", "ts": "1704067500.0"}, "posted_at": "1704067500.0",
     "user": "U1", "text": "Lunch € 8", "description": "Lunch met team"}
  ]
}"#,
    )
    .unwrap();

    let mut store = MessageStore::load(&path).unwrap();
    // Only `new` records pass the status gate
    assert_eq!(store.backfill_candidates().len(), 2);

    let changed = store.backfill(&Extractor::default());
    assert_eq!(changed, 2);

    let taxi = store.get(&MessageKey::new("C1", "1704067200.0")).unwrap();
    assert_eq!(taxi.amount, Some(Decimal::from_str("23.10").unwrap()));
    assert_eq!(taxi.transaction_date, NaiveDate::from_ymd_opt(2024, 2, 3));
    assert_eq!(taxi.description.as_deref(), Some("Taxi"));

    let lunch = store.get(&MessageKey::new("C1", "1704067500.0")).unwrap();
    assert_eq!(lunch.amount, Some(Decimal::from(8)));
    assert_eq!(lunch.description.as_deref(), Some("Lunch met team"));

    // Reviewed and booked records keep their empty fields
    let books = store.get(&MessageKey::new("C1", "1704067300.0")).unwrap();
    assert_eq!(books.amount, None);
    assert_eq!(books.transaction_date, None);
    assert_eq!(books.description.as_deref(), Some("Vakliteratuur"));
    assert_eq!(books.status, WorkflowStatus::Reviewed);

    let train = store.get(&MessageKey::new("C1", "1704067400.0")).unwrap();
    assert_eq!(train.amount, None);
    assert_eq!(train.status, WorkflowStatus::Booked);

    assert!(store.backfill_candidates().is_empty());
    assert_eq!(store.backfill(&Extractor::default()), 0);
}

#[test]
fn test_backfill_skips_reviewed_after_upstream_edit() {
    let mut store = MessageStore::in_memory();
    let ex = Extractor::default();
    let key = MessageKey::new("C1", "1704067200.0");
    let message = |text: &str| IncomingMessage {
        key: key.clone(),
        user: Some("U1".into()),
        text: Some(text.into()),
        attachments: vec![],
    };

    store.upsert(message("koffie"), &ex).unwrap();
    store
        .edit(
            &key,
            ReviewEdit {
                status: Some(WorkflowStatus::Reviewed),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(store.upsert(message("koffie € 9"), &ex).unwrap(), UpsertOutcome::TextOnly);

    assert_eq!(store.backfill(&ex), 0);
    let msg = store.get(&key).unwrap();
    assert_eq!(msg.status, WorkflowStatus::Reviewed);
    assert_eq!(msg.amount, None);
    assert_eq!(msg.text.as_deref(), Some("koffie € 9"));
}

#[test]
fn test_search_is_case_insensitive() {
    let mut store = MessageStore::in_memory();
    replay(&mut store, LIVE_EVENTS);
    let hits = store.list(&ListFilter {
        search: Some("ALBERT".into()),
        ..Default::default()
    });
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key.ts, "1704067200.000100");
}
