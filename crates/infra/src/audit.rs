//! Audit trail: the in-process notification sink.
//!
//! Subscribes (via the caller's thread or task) to the event bus and keeps
//! a bounded record of every status change that committed. Idempotent under
//! at-least-once delivery - duplicates are dropped by event id.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use groupbuy_core::AggregateId;
use groupbuy_events::EventEnvelope;

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
    pub event_type: String,
    pub sequence_number: u64,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<Uuid>,
    records: Vec<AuditRecord>,
}

/// In-memory audit trail for tests/dev and the reference API.
#[derive(Debug, Default)]
pub struct AuditTrail {
    inner: Mutex<Inner>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one envelope; duplicates (redelivery) are ignored.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if !inner.seen.insert(envelope.event_id()) {
            return;
        }
        inner.records.push(AuditRecord {
            event_id: envelope.event_id(),
            aggregate_type: envelope.aggregate_type().to_string(),
            aggregate_id: envelope.aggregate_id(),
            event_type: envelope.event_type().to_string(),
            sequence_number: envelope.sequence_number(),
            occurred_at: envelope.occurred_at(),
            payload: envelope.payload().clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent `limit` records, newest last.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        match self.inner.lock() {
            Ok(inner) => {
                let skip = inner.records.len().saturating_sub(limit);
                inner.records[skip..].to_vec()
            }
            Err(_) => vec![],
        }
    }
}
