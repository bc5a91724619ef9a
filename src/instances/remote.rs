//! HTTP-backed capability implementations
//!
//! Both engines receive `{"unit", "attributes"}` as a JSON POST body. The
//! predictor answers `{"prediction": ...}` and the decision engine answers
//! `{"decision": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::core::capability::{DecisionEngine, Predictor};
use crate::core::error::RecordError;
use crate::core::record::Attributes;

/// Request body sent to remote engines
#[derive(Debug, Serialize)]
struct CapabilityRequest<'a> {
    unit: &'a str,
    attributes: &'a Attributes,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    prediction: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DecisionResponse {
    decision: serde_json::Value,
}

/// JSON-over-HTTP client shared by the remote engines
#[derive(Debug, Clone)]
struct RemoteEndpoint {
    name: &'static str,
    url: String,
    client: reqwest::Client,
}

impl RemoteEndpoint {
    fn new(name: &'static str, url: &str, timeout: Duration) -> Result<Self, RecordError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecordError::CapabilityUnavailable(format!(
                "Failed to build {} client: {}", name, e
            )))?;
        Ok(Self {
            name,
            url: url.to_string(),
            client,
        })
    }

    async fn call<T>(&self, unit: &str, attributes: &Attributes) -> Result<T, RecordError>
    where
        T: for<'de> Deserialize<'de>,
    {
        debug!("Calling {} at {} for unit {}", self.name, self.url, unit);
        let response = self.client
            .post(&self.url)
            .json(&CapabilityRequest { unit, attributes })
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("responded with {}", status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.failure(format!("invalid response body: {}", e)))
    }

    fn failure(&self, message: String) -> RecordError {
        error!("{} call to {} {}", self.name, self.url, message);
        RecordError::CapabilityFailed(format!("{} {}", self.name, message))
    }
}

/// Predictor that forwards to a remote model service
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    endpoint: RemoteEndpoint,
}

impl HttpPredictor {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RecordError> {
        Ok(Self {
            endpoint: RemoteEndpoint::new("predictor", url, timeout)?,
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, unit: &str, attributes: &Attributes) -> Result<serde_json::Value, RecordError> {
        let response: PredictionResponse = self.endpoint.call(unit, attributes).await?;
        Ok(response.prediction)
    }
}

/// Decision engine that forwards to a remote rules service
#[derive(Debug, Clone)]
pub struct HttpDecisionEngine {
    endpoint: RemoteEndpoint,
}

impl HttpDecisionEngine {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RecordError> {
        Ok(Self {
            endpoint: RemoteEndpoint::new("decision engine", url, timeout)?,
        })
    }
}

#[async_trait]
impl DecisionEngine for HttpDecisionEngine {
    async fn decide(&self, unit: &str, attributes: &Attributes) -> Result<serde_json::Value, RecordError> {
        let response: DecisionResponse = self.endpoint.call(unit, attributes).await?;
        Ok(response.decision)
    }
}
