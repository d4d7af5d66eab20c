//! Chat events (real-time or history) and what each one means for the store.
//!
//! Event shape follows the chat service's JSON: new messages carry their
//! payload at the root, edits nest it under `message`, deletions point at
//! the old message through `deleted_ts` or `previous_message.ts`.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::message::{IncomingMessage, MessageKey};

pub const DEFAULT_NOISE_SUBTYPES: [&str; 4] = [
    "channel_join",
    "channel_leave",
    "channel_topic",
    "channel_purpose",
];

const SUBTYPE_CHANGED: &str = "message_changed";
const SUBTYPE_DELETED: &str = "message_deleted";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub message: Option<Box<ChatEvent>>,
    #[serde(default)]
    pub previous_message: Option<Box<ChatEvent>>,
    #[serde(default)]
    pub deleted_ts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Envelope { event: ChatEvent },
    Bare(ChatEvent),
}

impl ChatEvent {
    /// Parse one JSON event, either bare or wrapped as `{"event": {...}}`.
    pub fn from_json(s: &str) -> Result<Self> {
        let wire: Wire = serde_json::from_str(s).context("parse chat event")?;
        Ok(match wire {
            Wire::Envelope { event } => event,
            Wire::Bare(event) => event,
        })
    }

    /// Attachment names, prefixed with the message ts. Files the service
    /// offers no download for are left out.
    fn attachment_names(&self, ts: &str) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.url_private_download.is_some())
            .map(|f| format!("{ts}_{}", f.name.as_deref().unwrap_or("file")))
            .collect()
    }
}

/// What the store should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    Ignore,
    Delete(MessageKey),
    Upsert(IncomingMessage),
}

/// Turns events into store actions, dropping noise subtypes.
#[derive(Debug, Clone)]
pub struct EventRouter {
    noise: HashSet<String>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_SUBTYPES)
    }
}

impl EventRouter {
    pub fn new<I, S>(noise_subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            noise: noise_subtypes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_noise(&self, event: &ChatEvent) -> bool {
        event
            .subtype
            .as_deref()
            .is_some_and(|s| self.noise.contains(s))
    }

    /// `channel` is used when the event does not name one (history batches).
    pub fn route(&self, event: &ChatEvent, channel: Option<&str>) -> EventAction {
        if self.is_noise(event) {
            debug!(subtype = ?event.subtype, "ignoring noise subtype");
            return EventAction::Ignore;
        }

        let Some(channel) = event.channel.as_deref().or(channel) else {
            warn!(ts = ?event.ts, "event without channel");
            return EventAction::Ignore;
        };

        match event.subtype.as_deref() {
            Some(SUBTYPE_DELETED) => {
                let deleted = event
                    .deleted_ts
                    .as_deref()
                    .or_else(|| event.previous_message.as_ref()?.ts.as_deref());
                match deleted {
                    Some(ts) => EventAction::Delete(MessageKey::new(channel, ts)),
                    None => {
                        warn!(channel, "deletion event without deleted ts");
                        EventAction::Ignore
                    }
                }
            }
            Some(SUBTYPE_CHANGED) => match event.message.as_deref() {
                Some(payload) => upsert_from(payload, channel),
                None => {
                    warn!(channel, "edit event without message payload");
                    EventAction::Ignore
                }
            },
            _ => upsert_from(event, channel),
        }
    }
}

fn upsert_from(payload: &ChatEvent, channel: &str) -> EventAction {
    let Some(ts) = payload.ts.as_deref() else {
        warn!(channel, "message without ts");
        return EventAction::Ignore;
    };

    EventAction::Upsert(IncomingMessage {
        key: MessageKey::new(channel, ts),
        user: payload.user.clone(),
        text: payload.text.clone(),
        attachments: payload.attachment_names(ts),
    })
}
