use actix_web::{web, HttpResponse};
use log::{error, warn};

use crate::core::error::RecordError;
use crate::core::metrics;
use crate::web::models::ErrorResponse;

pub mod capabilities;
pub mod records;
pub mod system;

/// Map a record error onto its HTTP status and standard error body
pub fn error_response(err: &RecordError) -> HttpResponse {
    metrics::API_ERRORS.with_label_values(&[err.code()]).inc();

    let mut builder = match err {
        RecordError::Validation(_) => HttpResponse::BadRequest(),
        RecordError::NotFound(_) => HttpResponse::NotFound(),
        RecordError::Storage(_) => {
            error!("Storage failure: {}", err);
            HttpResponse::InternalServerError()
        }
        RecordError::CapabilityUnavailable(_) => HttpResponse::ServiceUnavailable(),
        RecordError::CapabilityFailed(_) => {
            warn!("Capability failure: {}", err);
            HttpResponse::BadGateway()
        }
    };

    builder.json(ErrorResponse {
        success: false,
        error: err.to_string(),
        error_code: err.code().to_string(),
    })
}

/// Run a store operation on the blocking thread pool. Store calls can wait
/// on a record lock held across a journal write.
pub async fn run_store<T, F>(op: F) -> Result<T, RecordError>
where
    F: FnOnce() -> Result<T, RecordError> + Send + 'static,
    T: Send + 'static,
{
    web::block(op)
        .await
        .map_err(|e| RecordError::Storage(format!("Store worker unavailable: {}", e)))?
}
