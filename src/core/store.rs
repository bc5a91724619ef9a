//! Record store
//!
//! Holds every record in a concurrent index, optionally mirrored to a
//! SQLite journal. Mutations of one record are serialized by the index
//! shard lock; reads never observe a partially applied update.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use lru::LruCache;

use crate::core::error::{RecordError, Result};
use crate::core::metrics;
use crate::core::persistence::SqliteJournal;
use crate::core::query::{Aggregation, RecordFilter};
use crate::core::record::{Attributes, NewRecord, Record, RecordId};

/// Default number of idempotency keys remembered
pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 1024;

/// Unit-scoped record store
#[derive(Debug)]
pub struct RecordStore {
    /// Records by id
    records: DashMap<RecordId, Record>,
    /// Next id in the creation sequence
    next_seq: AtomicU64,
    /// Write-through journal, if persistence is enabled
    journal: Option<SqliteJournal>,
    /// Recently seen client idempotency keys
    idempotency_keys: Mutex<LruCache<String, RecordId>>,
}

impl RecordStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_IDEMPOTENCY_CAPACITY)
    }

    /// Create an empty in-memory store remembering up to `idempotency_capacity` keys
    pub fn with_capacity(idempotency_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(idempotency_capacity)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            records: DashMap::new(),
            next_seq: AtomicU64::new(1),
            journal: None,
            idempotency_keys: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Create a store backed by a journal, loading everything it already holds
    pub fn with_journal(journal: SqliteJournal, idempotency_capacity: usize) -> Result<Self> {
        let mut store = Self::with_capacity(idempotency_capacity);
        let existing = journal.load_all()?;

        let mut max_seq = 0;
        for record in existing {
            max_seq = max_seq.max(record.id.seq());
            store.records.insert(record.id, record);
        }
        store.next_seq = AtomicU64::new(max_seq + 1);
        store.journal = Some(journal);

        if store.is_empty() {
            info!("Journal is empty, starting a new record sequence");
        } else {
            info!("Loaded {} records from journal", store.records.len());
        }
        metrics::RECORDS_STORED.set(store.records.len() as i64);
        Ok(store)
    }

    /// Whether records are written to a journal
    pub fn is_persistent(&self) -> bool {
        self.journal.is_some()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create a record and return the stored copy
    pub fn create(&self, new_record: NewRecord) -> Result<Record> {
        new_record.validate()?;

        let id = RecordId::new(self.next_seq.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let record = Record {
            id,
            unit: new_record.unit,
            kind: new_record.kind,
            attributes: new_record.attributes,
            created_at: now,
            updated_at: now,
        };

        if let Some(journal) = &self.journal {
            journal.upsert(&record)?;
        }
        self.records.insert(id, record.clone());

        debug!("Created record {} ({}) for unit {}", id, record.kind, record.unit);
        metrics::RECORDS_CREATED.with_label_values(&[record.kind.as_str()]).inc();
        metrics::RECORDS_STORED.set(self.records.len() as i64);
        Ok(record)
    }

    /// Create a record unless `key` was already used, in which case the
    /// record created under that key is returned. The flag is true when a
    /// new record was created.
    pub fn create_idempotent(&self, key: &str, new_record: NewRecord) -> Result<(Record, bool)> {
        let mut keys = self.idempotency_keys
            .lock()
            .map_err(|_| RecordError::Storage("Idempotency cache poisoned".to_string()))?;

        if let Some(id) = keys.get(key).copied() {
            if let Some(existing) = self.get(id) {
                debug!("Idempotency key {} replayed record {}", key, id);
                return Ok((existing, false));
            }
            warn!("Idempotency key {} points at missing record {}", key, id);
        }

        let record = self.create(new_record)?;
        keys.put(key.to_string(), record.id);
        Ok((record, true))
    }

    /// Fetch a single record
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Merge `patch` into a record's attributes and bump `updated_at`
    pub fn update(&self, id: RecordId, patch: Attributes) -> Result<Record> {
        // Held until the new version is in place
        let mut entry = self.records
            .get_mut(&id)
            .ok_or_else(|| RecordError::NotFound(id.to_string()))?;

        let mut updated = entry.value().clone();
        let now = next_timestamp(updated.updated_at);
        updated.apply_patch(patch, now);

        if let Some(journal) = &self.journal {
            journal.upsert(&updated)?;
        }
        *entry.value_mut() = updated.clone();

        debug!("Updated record {}", id);
        metrics::RECORDS_UPDATED.inc();
        Ok(updated)
    }

    /// Matching records ordered by creation time, then id
    pub fn query(&self, filter: &RecordFilter) -> Vec<Record> {
        let mut matched: Vec<Record> = self.records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        metrics::QUERIES_SERVED.with_label_values(&["query"]).inc();
        matched
    }

    /// Single numeric summary over the records matching `filter`
    pub fn aggregate(&self, filter: &RecordFilter, aggregation: &Aggregation) -> Result<f64> {
        let unit = filter.unit.as_deref().unwrap_or("");
        if unit.trim().is_empty() {
            return Err(RecordError::Validation(
                "unit is required for aggregation".to_string()
            ));
        }

        let matched: Vec<Record> = self.records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        let result = aggregation.apply(&matched)?;
        debug!(
            "Aggregated {} over {} records of unit {}: {}",
            aggregation.name(), matched.len(), unit, result
        );
        metrics::QUERIES_SERVED.with_label_values(&[aggregation.name()]).inc();
        Ok(result)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time, forced strictly after `previous`
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}
