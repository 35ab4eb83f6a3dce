//! Contact repository.
//!
//! Contacts live in a `DashMap` keyed by id; ids come from an atomic counter
//! and are never reused.

use offsync_engine::batch::placeholder_batch;
use dashmap::DashMap;
use offsync_engine::{Fields, Record};
use std::sync::atomic::{AtomicI64, Ordering};

/// Thread-safe in-memory contact storage.
#[derive(Debug)]
pub struct ContactRepository {
    contacts: DashMap<i64, Fields>,
    next_id: AtomicI64,
}

impl Default for ContactRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactRepository {
    pub fn new() -> Self {
        Self {
            contacts: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// All contacts ordered by id.
    pub fn list(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .contacts
            .iter()
            .map(|entry| Record::new(*entry.key(), entry.value().clone()))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn get(&self, id: i64) -> Option<Record> {
        self.contacts
            .get(&id)
            .map(|fields| Record::new(id, fields.clone()))
    }

    /// Store a new contact under the next id. `registration_date` defaults to
    /// today (UTC) when the body does not carry one.
    pub fn create(&self, mut fields: Fields) -> Record {
        fields.remove("id");
        let missing_date = fields
            .get("registration_date")
            .map_or(true, |value| value.is_null() || value.as_str() == Some(""));
        if missing_date {
            fields.insert("registration_date".to_string(), today().into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.contacts.insert(id, fields.clone());
        tracing::debug!(contact_id = id, "contact created");
        Record::new(id, fields)
    }

    /// Shallow-merge `changes` into an existing contact. The id never changes.
    pub fn update(&self, id: i64, changes: Fields) -> Option<Record> {
        let mut entry = self.contacts.get_mut(&id)?;
        for (key, value) in changes {
            if key != "id" {
                entry.insert(key, value);
            }
        }
        Some(Record::new(id, entry.clone()))
    }

    /// Remove a contact. Returns whether it existed.
    pub fn delete(&self, id: i64) -> bool {
        let removed = self.contacts.remove(&id).is_some();
        if removed {
            tracing::debug!(contact_id = id, "contact deleted");
        }
        removed
    }

    /// Create `count` generated contacts.
    pub fn generate(&self, count: usize) -> Vec<Record> {
        placeholder_batch(count)
            .into_iter()
            .map(|fields| self.create(fields))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Parse a path id the way the contacts API accepts them: integers only.
pub fn parse_contact_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
