//! External capabilities invoked by the record service
//!
//! Prediction and decision engines live outside this service. The core only
//! knows them through these traits; implementations are wired in at startup.

use async_trait::async_trait;

use crate::core::error::RecordError;
use crate::core::record::Attributes;

/// Produces a prediction (e.g. expected performance) for a unit's data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predict a value from a unit and its record attributes
    async fn predict(&self, unit: &str, attributes: &Attributes) -> Result<serde_json::Value, RecordError>;
}

/// Produces a recommendation from a rule-based decision engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Recommend a decision for a unit given its data
    async fn decide(&self, unit: &str, attributes: &Attributes) -> Result<serde_json::Value, RecordError>;
}
