//! Record data model
//!
//! A single generic entity covers tasks, resource allocations, performance
//! entries, financial entries and feedback entries. Category-specific fields
//! live in the free-form `attributes` map.

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::RecordError;

/// Category-specific fields of a record
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Unique record identifier, rendered as `r<N>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Position in the creation sequence
    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('r')
            .and_then(|digits| digits.parse::<u64>().ok())
            .map(RecordId)
            .ok_or_else(|| RecordError::NotFound(s.to_string()))
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Assigned work item (title, status, assignee)
    Task,
    /// Personnel or equipment allocation (type, allocatedTo)
    Resource,
    /// Performance / KPI entry
    Performance,
    /// Revenue, cost or profit entry
    Financial,
    /// Customer feedback (rating, comments)
    Feedback,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Task,
        RecordKind::Resource,
        RecordKind::Performance,
        RecordKind::Financial,
        RecordKind::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Task => "task",
            RecordKind::Resource => "resource",
            RecordKind::Performance => "performance",
            RecordKind::Financial => "financial",
            RecordKind::Feedback => "feedback",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecordError::Validation(format!(
                "Unrecognized record kind: '{}'", s
            )))
    }
}

/// Unit-scoped record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Assigned at creation, never reused
    pub id: RecordId,
    /// Owning organizational unit
    pub unit: String,
    /// Record category
    pub kind: RecordKind,
    /// Category-specific fields
    pub attributes: Attributes,
    /// Creation time, immutable
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a record
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub unit: String,
    pub kind: RecordKind,
    pub attributes: Attributes,
}

impl NewRecord {
    pub fn new(unit: impl Into<String>, kind: RecordKind, attributes: Attributes) -> Self {
        Self {
            unit: unit.into(),
            kind,
            attributes,
        }
    }

    /// Reject records without an owning unit
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.unit.trim().is_empty() {
            return Err(RecordError::Validation("unit must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Record {
    /// Merge a patch into the attributes; patch keys win
    pub(crate) fn apply_patch(&mut self, patch: Attributes, now: DateTime<Utc>) {
        for (key, value) in patch {
            self.attributes.insert(key, value);
        }
        self.updated_at = now;
    }

    /// Numeric value of an attribute, if present and numeric
    pub fn numeric_attribute(&self, field: &str) -> Option<f64> {
        self.attributes.get(field).and_then(|v| v.as_f64())
    }
}
