//! Web handlers for record creation, update, query and aggregation

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{debug, info};

use crate::core::error::RecordError;
use crate::core::record::{Record, RecordId};
use crate::web::handlers::{error_response, run_store};
use crate::web::models::{
    AggregateParams, AggregateResponse, CreateRecordRequest, RecordQueryParams, UpdateRecordRequest,
};
use crate::web::server::AppState;

/// Header carrying a client-supplied idempotency key for creates
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Create a record
pub async fn create_record(
    data: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<CreateRecordRequest>,
) -> impl Responder {
    let new_record = match request.into_inner().into_new_record() {
        Ok(record) => record,
        Err(e) => return error_response(&e),
    };

    let key = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let store = data.store.clone();
    let result = run_store(move || match key {
        Some(key) => store.create_idempotent(&key, new_record),
        None => store.create(new_record).map(|record| (record, true)),
    })
    .await;

    match result {
        Ok((record, true)) => {
            info!("Created record {} for unit {}", record.id, record.unit);
            HttpResponse::Created().json(record)
        }
        Ok((record, false)) => {
            debug!("Replayed record {} for repeated idempotency key", record.id);
            HttpResponse::Created().json(record)
        }
        Err(e) => error_response(&e),
    }
}

/// Fetch a single record
pub async fn get_record(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = match path.parse::<RecordId>() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let store = data.store.clone();
    let result = run_store(move || {
        store.get(id).ok_or_else(|| RecordError::NotFound(id.to_string()))
    })
    .await;

    match result {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => error_response(&e),
    }
}

/// Merge an attribute patch into a record
pub async fn update_record(
    data: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<UpdateRecordRequest>,
) -> impl Responder {
    let id = match path.parse::<RecordId>() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let patch = match request.into_inner().attributes {
        Some(patch) => patch,
        None => return error_response(&RecordError::Validation(
            "attributes is required".to_string()
        )),
    };

    let store = data.store.clone();
    match run_store(move || store.update(id, patch)).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => error_response(&e),
    }
}

/// List records matching the query filters
pub async fn query_records(
    data: web::Data<AppState>,
    query: web::Query<RecordQueryParams>,
) -> impl Responder {
    let filter = match query.to_filter() {
        Ok(filter) => filter,
        Err(e) => return error_response(&e),
    };

    let store = data.store.clone();
    let result: Result<Vec<Record>, RecordError> = run_store(move || Ok(store.query(&filter))).await;
    match result {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => error_response(&e),
    }
}

/// Count / sum / average over the filtered records
pub async fn aggregate_records(
    data: web::Data<AppState>,
    query: web::Query<AggregateParams>,
) -> impl Responder {
    let (filter, aggregation) = match query
        .to_filter()
        .and_then(|filter| Ok((filter, query.to_aggregation()?)))
    {
        Ok(parsed) => parsed,
        Err(e) => return error_response(&e),
    };

    let store = data.store.clone();
    match run_store(move || store.aggregate(&filter, &aggregation)).await {
        Ok(result) => HttpResponse::Ok().json(AggregateResponse { result }),
        Err(e) => error_response(&e),
    }
}
