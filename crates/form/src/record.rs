//! Patient record state
//!
//! `PatientRecord` is the plain data; `RecordStore` wraps it with locking
//! and change notifications. All writes arrive through accepted validation
//! outcomes, so the store never re-checks formats.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use voice_intake_config::fields::{self, FormatRule, FIELDS, NOT_NEEDED};

use crate::validator::Accepted;

/// The intake form contents, keyed by schema field name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientRecord {
    values: HashMap<String, String>,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Present with a non-empty value (the `not-needed` sentinel counts as
    /// filled; it is an explicit answer)
    pub fn is_filled(&self, field: &str) -> bool {
        self.get(field).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn filled_count(&self) -> usize {
        FIELDS.iter().filter(|f| self.is_filled(f.name)).count()
    }

    /// Entries in schema order, skipping unfilled fields
    pub fn iter_schema(&self) -> impl Iterator<Item = (&'static str, &str)> {
        FIELDS
            .iter()
            .filter_map(move |f| self.get(f.name).map(|v| (f.name, v)))
    }

    /// First schema field not yet filled, used to steer the conversation
    pub fn next_unfilled(&self) -> Option<&'static str> {
        fields::next_unfilled(|name| self.is_filled(name))
    }

    /// Build the JSON body for final submission
    ///
    /// Stored strings are prevalidated into API types: yes/no answers become
    /// booleans, the `not-needed` sentinel becomes null, everything else is
    /// passed through as stored (dates and phones were normalized on save).
    pub fn submission_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        for def in FIELDS {
            let Some(raw) = self.get(def.name) else { continue };

            let value = if raw == NOT_NEEDED {
                Value::Null
            } else {
                match def.rule {
                    FormatRule::Confirmation => Value::Bool(raw.eq_ignore_ascii_case("yes")),
                    FormatRule::OneOf(opts) if opts == fields::options::YES_NO => {
                        Value::Bool(raw.eq_ignore_ascii_case("yes"))
                    }
                    _ => Value::String(raw.to_string()),
                }
            };
            payload.insert(def.name.to_string(), value);
        }
        payload
    }
}

/// A single applied write, broadcast to observers
#[derive(Debug, Clone)]
pub struct RecordChange {
    pub field: &'static str,
    pub value: String,
}

/// Shared, observable record state
///
/// Change events fire on every applied write, including writes that leave
/// the stored value unchanged; the panel re-renders either way and observers
/// must not assume events imply a delta.
pub struct RecordStore {
    record: RwLock<PatientRecord>,
    changes: broadcast::Sender<RecordChange>,
}

impl RecordStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            record: RwLock::new(PatientRecord::new()),
            changes,
        }
    }

    /// Seed from a recovered record
    pub fn restore(&self, record: PatientRecord) {
        *self.record.write() = record;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }

    /// Apply an accepted validation outcome: the primary write plus any
    /// linked auto-fills, each emitting its own change event
    pub fn apply(&self, field: &'static str, accepted: Accepted) -> Vec<RecordChange> {
        let mut applied = Vec::with_capacity(1 + accepted.linked.len());
        {
            let mut record = self.record.write();
            record.set(field, accepted.value.clone());
            applied.push(RecordChange {
                field,
                value: accepted.value,
            });
            for (linked_field, linked_value) in accepted.linked {
                record.set(linked_field, linked_value.clone());
                applied.push(RecordChange {
                    field: linked_field,
                    value: linked_value,
                });
            }
        }
        for change in &applied {
            let _ = self.changes.send(change.clone());
        }
        applied
    }

    pub fn snapshot(&self) -> PatientRecord {
        self.record.read().clone()
    }

    pub fn is_filled(&self, field: &str) -> bool {
        self.record.read().is_filled(field)
    }

    pub fn next_unfilled(&self) -> Option<&'static str> {
        self.record.read().next_unfilled()
    }

    pub fn clear(&self) {
        *self.record.write() = PatientRecord::new();
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_payload_prevalidation() {
        let mut record = PatientRecord::new();
        record.set("full_name", "Jane Roe");
        record.set("email", NOT_NEEDED);
        record.set("interpreter_need", "No");
        record.set("consent_share_records", "Yes");
        record.set("confirmation", "yes");

        let payload = record.submission_payload();
        assert_eq!(payload["full_name"], Value::String("Jane Roe".into()));
        assert_eq!(payload["email"], Value::Null);
        assert_eq!(payload["interpreter_need"], Value::Bool(false));
        assert_eq!(payload["consent_share_records"], Value::Bool(true));
        assert_eq!(payload["confirmation"], Value::Bool(true));
        assert!(!payload.contains_key("dob"));
    }

    #[test]
    fn test_sentinel_counts_as_filled() {
        let mut record = PatientRecord::new();
        record.set("email", NOT_NEEDED);
        assert!(record.is_filled("email"));
        assert!(!record.is_filled("address"));
    }

    #[test]
    fn test_next_unfilled_order() {
        let mut record = PatientRecord::new();
        record.set("full_name", "Jane Roe");
        assert_eq!(record.next_unfilled(), Some("dob"));
    }

    #[tokio::test]
    async fn test_store_notifies_on_unchanged_save() {
        let store = RecordStore::new();
        let mut rx = store.subscribe();

        let accepted = Accepted {
            value: "Jane Roe".to_string(),
            linked: vec![],
        };
        store.apply("full_name", accepted.clone());
        store.apply("full_name", accepted);

        // Both writes observable even though the value never changed
        assert_eq!(rx.recv().await.unwrap().value, "Jane Roe");
        assert_eq!(rx.recv().await.unwrap().value, "Jane Roe");
    }

    #[tokio::test]
    async fn test_store_applies_linked_writes() {
        let store = RecordStore::new();
        let accepted = Accepted {
            value: "No".to_string(),
            linked: vec![("interpreter_language", NOT_NEEDED.to_string())],
        };
        let applied = store.apply("interpreter_need", accepted);
        assert_eq!(applied.len(), 2);

        let record = store.snapshot();
        assert_eq!(record.get("interpreter_language"), Some(NOT_NEEDED));
    }
}
