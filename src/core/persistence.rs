//! SQLite write-through journal for the record store

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, Row};

use crate::core::error::{RecordError, Result};
use crate::core::record::{Attributes, Record, RecordId, RecordKind};

pub(crate) const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    unit TEXT NOT NULL,
    kind TEXT NOT NULL,
    attributes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const UPSERT_SQL: &str = "INSERT INTO records (id, unit, kind, attributes, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(id) DO UPDATE SET
    attributes = excluded.attributes,
    updated_at = excluded.updated_at";

/// Durable copy of every record, written before a change becomes visible
#[derive(Debug)]
pub struct SqliteJournal {
    conn: Mutex<Connection>,
}

impl SqliteJournal {
    /// Open (or create) a journal file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RecordError::Storage(format!(
                    "Failed to create journal directory {}: {}", parent.display(), e
                )))?;
            }
        }
        info!("Opening record journal at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Journal backed by a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RecordError::Storage("Journal connection poisoned".to_string()))
    }

    /// Insert a new record or overwrite the mutable fields of an existing one
    pub fn upsert(&self, record: &Record) -> Result<()> {
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| RecordError::Storage(format!("Failed to encode attributes: {}", e)))?;
        let conn = self.lock()?;
        conn.execute(
            UPSERT_SQL,
            params![
                record.id.seq() as i64,
                record.unit,
                record.kind.as_str(),
                attributes,
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        )?;
        debug!("Journaled record {}", record.id);
        Ok(())
    }

    /// Every journaled record, in id order
    pub fn load_all(&self) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, unit, kind, attributes, created_at, updated_at FROM records ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| RawRow::from_row(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

/// Columns as stored, decoded into a `Record` outside the SQLite callback
struct RawRow {
    id: i64,
    unit: String,
    kind: String,
    attributes: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            unit: row.get(1)?,
            kind: row.get(2)?,
            attributes: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let id = u64::try_from(self.id)
            .map(RecordId::new)
            .map_err(|_| invalid_data(format!("negative record id {}", self.id)))?;
        let kind: RecordKind = self.kind.parse()
            .map_err(|_| invalid_data(format!("unknown kind '{}' on {}", self.kind, id)))?;
        let attributes: Attributes = serde_json::from_str(&self.attributes)
            .map_err(|e| invalid_data(format!("bad attributes on {}: {}", id, e)))?;

        Ok(Record {
            id,
            unit: self.unit,
            kind,
            attributes,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn invalid_data(message: String) -> RecordError {
    RecordError::Storage(format!("Invalid journal data: {}", message))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| invalid_data(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(seq: u64) -> Record {
        let now = Utc::now();
        let mut attributes = Attributes::new();
        attributes.insert("title".to_string(), json!("Quarterly audit"));
        attributes.insert("status".to_string(), json!("pending"));
        Record {
            id: RecordId::new(seq),
            unit: "west".to_string(),
            kind: RecordKind::Task,
            attributes,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_upsert_and_load() {
        let journal = SqliteJournal::open_in_memory().unwrap();
        let record = sample(1);
        journal.upsert(&record).unwrap();

        let loaded = journal.load_all().unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn test_upsert_overwrites_attributes_only() {
        let journal = SqliteJournal::open_in_memory().unwrap();
        let mut record = sample(3);
        journal.upsert(&record).unwrap();

        record.attributes.insert("status".to_string(), json!("done"));
        record.updated_at = record.updated_at + chrono::Duration::seconds(5);
        journal.upsert(&record).unwrap();

        let loaded = journal.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].attributes["status"], "done");
        assert_eq!(loaded[0].updated_at, record.updated_at);
        assert_eq!(loaded[0].created_at, record.created_at);
    }

    #[test]
    fn test_load_orders_by_id() {
        let journal = SqliteJournal::open_in_memory().unwrap();
        journal.upsert(&sample(10)).unwrap();
        journal.upsert(&sample(2)).unwrap();

        let ids: Vec<u64> = journal.load_all().unwrap().iter().map(|r| r.id.seq()).collect();
        assert_eq!(ids, vec![2, 10]);
    }

    #[test]
    fn test_file_journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");

        {
            let journal = SqliteJournal::open(&path).unwrap();
            journal.upsert(&sample(1)).unwrap();
        }

        let journal = SqliteJournal::open(&path).unwrap();
        assert_eq!(journal.load_all().unwrap().len(), 1);
    }
}
