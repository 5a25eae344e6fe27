//! Shared in-memory registry of tracked messages and their open history.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{OpenEvent, OpenRecord, TrackedMessage};

/// The only shared mutable state in the service: a message table and one
/// event list per tracking identifier.
///
/// Both maps are sharded, so operations are linearizable per key and
/// appends to different identifiers do not contend. Callers must finish any
/// network work (enrichment, notification) before calling in; nothing here
/// blocks beyond a brief shard lock.
pub struct TrackingRegistry {
    messages: DashMap<String, TrackedMessage>,
    events: DashMap<String, Vec<OpenEvent>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            events: DashMap::new(),
        }
    }

    /// Register a message under its tracking identifier.
    ///
    /// A collision with a live identifier is last-writer-wins: identifiers
    /// carry enough entropy that a duplicate only means reuse after
    /// eviction or a caller error, neither of which warrants failing the
    /// send path.
    pub fn register(&self, message: TrackedMessage) {
        self.messages.insert(message.tracking_id.clone(), message);
    }

    pub fn get_message(&self, tracking_id: &str) -> Option<TrackedMessage> {
        self.messages.get(tracking_id).map(|entry| entry.clone())
    }

    /// Append a fully-enriched open to the identifier's history and return
    /// the stored event.
    ///
    /// Unknown identifiers are valid: beacons outlive their message records
    /// (eviction, forged or stale links), and those retrievals are still
    /// recorded, just without an owning message.
    pub fn record_open(&self, tracking_id: &str, record: OpenRecord) -> OpenEvent {
        let message_id = self
            .messages
            .get(tracking_id)
            .map(|entry| entry.tracking_id.clone());

        let event = OpenEvent {
            id: Uuid::new_v4().to_string(),
            tracking_id: tracking_id.to_string(),
            message_id,
            ip_address: record.ip_address,
            user_agent: record.user_agent,
            geo: record.geo,
            device: record.device,
            opened_at: record.opened_at,
            base_url: record.base_url,
        };

        self.events
            .entry(tracking_id.to_string())
            .or_default()
            .push(event.clone());

        event
    }

    /// Most recent open for the identifier, i.e. the tail of its history.
    pub fn latest_event(&self, tracking_id: &str) -> Option<OpenEvent> {
        self.events
            .get(tracking_id)
            .and_then(|events| events.last().cloned())
    }

    /// Full history in observation order. Unknown identifiers yield an
    /// empty sequence.
    pub fn all_events(&self, tracking_id: &str) -> Vec<OpenEvent> {
        self.events
            .get(tracking_id)
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Drop every message older than the horizon together with its whole
    /// history, then trim expired events out of the histories that survive.
    ///
    /// The second pass exists because a live message can keep accumulating
    /// opens from resurrected links; those old events expire on the same
    /// horizon even though their message does not. Ownerless histories are
    /// trimmed by the same rule and removed entirely once empty.
    pub fn evict_older_than(&self, horizon: Duration, now: DateTime<Utc>) {
        let cutoff = now - horizon;

        let mut expired = Vec::new();
        self.messages.retain(|tracking_id, message| {
            let keep = message.sent_at >= cutoff;
            if !keep {
                expired.push(tracking_id.clone());
            }
            keep
        });
        for tracking_id in expired {
            self.events.remove(&tracking_id);
        }

        self.events.retain(|_, events| {
            events.retain(|event| event.opened_at > cutoff);
            !events.is_empty()
        });
    }
}

impl Default for TrackingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
