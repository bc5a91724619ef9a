//! Record filtering and aggregation

use chrono::{DateTime, Utc};

use crate::core::error::RecordError;
use crate::core::record::{Record, RecordKind};

/// Optional filters applied to the record set. Time bounds are exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub unit: Option<String>,
    pub kind: Option<RecordKind>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl RecordFilter {
    /// Filter scoped to a single unit
    #[cfg(test)]
    pub fn for_unit(unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(unit) = &self.unit {
            if &record.unit != unit {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if record.created_at <= after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if record.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// Aggregation over a filtered record set
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Number of matched records
    Count,
    /// Sum of a numeric attribute
    Sum(String),
    /// Mean of a numeric attribute
    Average(String),
}

impl Aggregation {
    /// Build an aggregation from the `op` / `field` request pair
    pub fn parse(op: &str, field: Option<&str>) -> Result<Self, RecordError> {
        let field = field.map(str::trim).filter(|f| !f.is_empty());
        match (op, field) {
            ("count", _) => Ok(Aggregation::Count),
            ("sum", Some(field)) => Ok(Aggregation::Sum(field.to_string())),
            ("average", Some(field)) => Ok(Aggregation::Average(field.to_string())),
            ("sum", None) | ("average", None) => Err(RecordError::Validation(format!(
                "Aggregation '{}' requires a field", op
            ))),
            _ => Err(RecordError::Validation(format!(
                "Unsupported aggregation: '{}'", op
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum(_) => "sum",
            Aggregation::Average(_) => "average",
        }
    }

    /// Compute the aggregate over an already filtered record set
    pub fn apply<'a, I>(&self, records: I) -> Result<f64, RecordError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let result = match self {
            Aggregation::Count => records.into_iter().count() as f64,
            Aggregation::Sum(field) => sum_field(records, field)?.0,
            Aggregation::Average(field) => {
                let (sum, n) = sum_field(records, field)?;
                if n == 0 {
                    return Err(RecordError::Validation(
                        "No records to average".to_string()
                    ));
                }
                sum / n as f64
            }
        };

        // JSON has no representation for inf / NaN
        if !result.is_finite() {
            return Err(RecordError::Validation(format!(
                "Result of '{}' is out of numeric range", self.name()
            )));
        }
        Ok(result)
    }
}

fn sum_field<'a, I>(records: I, field: &str) -> Result<(f64, usize), RecordError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut sum = 0.0;
    let mut n = 0;
    for record in records {
        let value = record.numeric_attribute(field).ok_or_else(|| {
            RecordError::Validation(format!(
                "Attribute '{}' is missing or not numeric on record {}",
                field, record.id
            ))
        })?;
        sum += value;
        n += 1;
    }
    Ok((sum, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{Attributes, RecordId};
    use chrono::Duration;
    use serde_json::json;

    fn record(seq: u64, unit: &str, kind: RecordKind, attributes: serde_json::Value) -> Record {
        let now = Utc::now();
        let attributes: Attributes = match attributes {
            serde_json::Value::Object(map) => map,
            _ => Attributes::new(),
        };
        Record {
            id: RecordId::new(seq),
            unit: unit.to_string(),
            kind,
            attributes,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_by_unit_and_kind() {
        let a = record(1, "A", RecordKind::Task, json!({}));
        let b = record(2, "B", RecordKind::Task, json!({}));
        let c = record(3, "A", RecordKind::Feedback, json!({}));

        let filter = RecordFilter::for_unit("A");
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));
        assert!(filter.matches(&c));

        let filter = RecordFilter::for_unit("A").with_kind(RecordKind::Feedback);
        assert!(!filter.matches(&a));
        assert!(filter.matches(&c));
    }

    #[test]
    fn test_filter_time_bounds_are_exclusive() {
        let r = record(1, "A", RecordKind::Task, json!({}));
        let at = r.created_at;

        let filter = RecordFilter {
            created_after: Some(at),
            ..RecordFilter::default()
        };
        assert!(!filter.matches(&r));

        let filter = RecordFilter {
            created_after: Some(at - Duration::seconds(1)),
            created_before: Some(at + Duration::seconds(1)),
            ..RecordFilter::default()
        };
        assert!(filter.matches(&r));

        let filter = RecordFilter {
            created_before: Some(at),
            ..RecordFilter::default()
        };
        assert!(!filter.matches(&r));
    }

    #[test]
    fn test_parse_aggregation() {
        assert_eq!(Aggregation::parse("count", None).unwrap(), Aggregation::Count);
        assert_eq!(
            Aggregation::parse("sum", Some("rating")).unwrap(),
            Aggregation::Sum("rating".to_string())
        );
        assert!(Aggregation::parse("sum", None).is_err());
        assert!(Aggregation::parse("average", Some(" ")).is_err());
        assert!(Aggregation::parse("median", Some("rating")).is_err());
    }

    #[test]
    fn test_empty_set_aggregates() {
        let empty: Vec<Record> = Vec::new();
        assert_eq!(Aggregation::Count.apply(&empty).unwrap(), 0.0);
        assert_eq!(Aggregation::Sum("rating".into()).apply(&empty).unwrap(), 0.0);
        let err = Aggregation::Average("rating".into()).apply(&empty).unwrap_err();
        assert!(matches!(err, RecordError::Validation(_)));
    }

    #[test]
    fn test_sum_and_average() {
        let records = vec![
            record(1, "east", RecordKind::Feedback, json!({"rating": 4})),
            record(2, "east", RecordKind::Feedback, json!({"rating": 2.5})),
        ];
        assert_eq!(Aggregation::Count.apply(&records).unwrap(), 2.0);
        assert_eq!(Aggregation::Sum("rating".into()).apply(&records).unwrap(), 6.5);
        assert_eq!(Aggregation::Average("rating".into()).apply(&records).unwrap(), 3.25);
    }

    #[test]
    fn test_non_numeric_attribute_is_rejected() {
        let records = vec![
            record(1, "east", RecordKind::Feedback, json!({"rating": 4})),
            record(2, "east", RecordKind::Feedback, json!({"rating": "great"})),
        ];
        let err = Aggregation::Sum("rating".into()).apply(&records).unwrap_err();
        assert!(err.to_string().contains("r2"));

        let records = vec![record(1, "east", RecordKind::Feedback, json!({"comments": "ok"}))];
        assert!(Aggregation::Average("rating".into()).apply(&records).is_err());
    }

    #[test]
    fn test_overflowing_aggregate_is_rejected() {
        let records = vec![
            record(1, "east", RecordKind::Financial, json!({"revenue": 1.0e308})),
            record(2, "east", RecordKind::Financial, json!({"revenue": 1.0e308})),
        ];
        for aggregation in [Aggregation::Sum("revenue".into()), Aggregation::Average("revenue".into())] {
            let err = aggregation.apply(&records).unwrap_err();
            assert!(matches!(err, RecordError::Validation(_)));
        }
        assert_eq!(Aggregation::Count.apply(&records).unwrap(), 2.0);
    }
}
