use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use crate::core::error::RecordError;
use crate::core::query::{Aggregation, RecordFilter};
use crate::core::record::{Attributes, NewRecord, RecordId, RecordKind};

/// Create record request
#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    #[serde(default)]
    pub unit: String,
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl CreateRecordRequest {
    pub fn into_new_record(self) -> Result<NewRecord, RecordError> {
        let kind = match self.kind.as_deref() {
            Some(kind) => kind.parse::<RecordKind>()?,
            None => return Err(RecordError::Validation("kind is required".to_string())),
        };
        let record = NewRecord::new(self.unit, kind, self.attributes);
        record.validate()?;
        Ok(record)
    }
}

/// Update record request
#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub attributes: Option<Attributes>,
}

/// Query string for listing records
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQueryParams {
    pub unit: Option<String>,
    pub kind: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
}

impl RecordQueryParams {
    pub fn to_filter(&self) -> Result<RecordFilter, RecordError> {
        build_filter(
            self.unit.as_deref(),
            self.kind.as_deref(),
            self.created_after.as_deref(),
            self.created_before.as_deref(),
        )
    }
}

/// Query string for aggregates
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    pub unit: Option<String>,
    pub kind: Option<String>,
    pub op: Option<String>,
    pub field: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
}

impl AggregateParams {
    pub fn to_filter(&self) -> Result<RecordFilter, RecordError> {
        build_filter(
            self.unit.as_deref(),
            self.kind.as_deref(),
            self.created_after.as_deref(),
            self.created_before.as_deref(),
        )
    }

    pub fn to_aggregation(&self) -> Result<Aggregation, RecordError> {
        match non_empty(self.op.as_deref()) {
            Some(op) => Aggregation::parse(op, self.field.as_deref()),
            None => Err(RecordError::Validation("op is required".to_string())),
        }
    }
}

/// Aggregate response
#[derive(Debug, Serialize, Deserialize)]
pub struct AggregateResponse {
    #[serde(serialize_with = "serialize_number")]
    pub result: f64,
}

/// Largest magnitude below which every integer is exactly representable
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Write integral values as JSON integers (`4`, not `4.0`)
fn serialize_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Decision request
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Decision response
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub unit: String,
    pub decision: serde_json::Value,
}

/// Prediction response
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: RecordId,
    pub prediction: serde_json::Value,
}

/// Service status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub records: usize,
    pub uptime_seconds: i64,
    pub storage: String,
    pub capabilities: CapabilityStatus,
}

/// Which external capabilities are wired in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub predictor: bool,
    pub decision_engine: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, RecordError> {
    non_empty(value)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| RecordError::Validation(format!(
                    "{} must be an RFC 3339 timestamp: {}", name, e
                )))
        })
        .transpose()
}

fn build_filter(
    unit: Option<&str>,
    kind: Option<&str>,
    created_after: Option<&str>,
    created_before: Option<&str>,
) -> Result<RecordFilter, RecordError> {
    Ok(RecordFilter {
        // Matched exactly as stored; only an empty value means "any unit"
        unit: unit.filter(|u| !u.is_empty()).map(str::to_string),
        kind: non_empty(kind).map(str::parse::<RecordKind>).transpose()?,
        created_after: parse_time("createdAfter", created_after)?,
        created_before: parse_time("createdBefore", created_before)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_requires_kind() {
        let request: CreateRecordRequest = serde_json::from_value(json!({"unit": "east"})).unwrap();
        assert!(matches!(request.into_new_record(), Err(RecordError::Validation(_))));

        let request: CreateRecordRequest =
            serde_json::from_value(json!({"unit": "east", "kind": "budget"})).unwrap();
        assert!(request.into_new_record().is_err());
    }

    #[test]
    fn test_create_request_requires_unit() {
        let request: CreateRecordRequest = serde_json::from_value(json!({"kind": "task"})).unwrap();
        assert!(matches!(request.into_new_record(), Err(RecordError::Validation(_))));
    }

    #[test]
    fn test_query_params_to_filter() {
        let params = RecordQueryParams {
            unit: Some("east".to_string()),
            kind: Some("".to_string()),
            created_after: Some("2026-01-01T00:00:00Z".to_string()),
            created_before: None,
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(filter.unit.as_deref(), Some("east"));
        assert!(filter.kind.is_none());
        assert!(filter.created_after.is_some());

        let bad = RecordQueryParams {
            created_before: Some("yesterday".to_string()),
            ..RecordQueryParams::default()
        };
        assert!(bad.to_filter().is_err());
    }

    #[test]
    fn test_aggregate_params_require_op() {
        let params = AggregateParams {
            unit: Some("east".to_string()),
            ..AggregateParams::default()
        };
        assert!(params.to_aggregation().is_err());

        let params = AggregateParams {
            op: Some("average".to_string()),
            field: Some("rating".to_string()),
            ..AggregateParams::default()
        };
        assert_eq!(params.to_aggregation().unwrap(), Aggregation::Average("rating".to_string()));
    }

    #[test]
    fn test_unit_filter_is_not_trimmed() {
        let params = RecordQueryParams {
            unit: Some(" east".to_string()),
            ..RecordQueryParams::default()
        };
        assert_eq!(params.to_filter().unwrap().unit.as_deref(), Some(" east"));

        let params = RecordQueryParams {
            unit: Some(String::new()),
            ..RecordQueryParams::default()
        };
        assert!(params.to_filter().unwrap().unit.is_none());
    }

    #[test]
    fn test_aggregate_result_integral_values() {
        let body = serde_json::to_string(&AggregateResponse { result: 4.0 }).unwrap();
        assert_eq!(body, r#"{"result":4}"#);

        let body = serde_json::to_string(&AggregateResponse { result: 3.25 }).unwrap();
        assert_eq!(body, r#"{"result":3.25}"#);

        let body = serde_json::to_string(&AggregateResponse { result: 1.0e300 }).unwrap();
        let parsed: AggregateResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.result, 1.0e300);
    }
}
