//! kasboek-archive: chat message archive around the extractor. Routes chat
//! events, stores extracted fields per message, reconciles history, and
//! serves the review side (edits, backfill, CSV export).

pub mod events;
pub mod export;
pub mod message;
pub mod store;

pub use events::{ChatEvent, EventAction, EventRouter};
pub use export::{export_csv, write_csv};
pub use message::{IncomingMessage, MessageKey, ReviewEdit, StoredMessage, WorkflowStatus};
pub use store::{BackfillJob, ListFilter, MessageStore, SyncReport, UpsertOutcome};
