//! Prometheus metrics for the record service

use lazy_static::lazy_static;
use log::error;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    /// Registry exposed at `/metrics`
    pub static ref REGISTRY: Registry = Registry::new();

    /// Records created, by kind
    pub static ref RECORDS_CREATED: IntCounterVec = register_counter_vec(
        "records_created_total",
        "Number of records created",
        &["kind"],
    );

    /// Successful record updates
    pub static ref RECORDS_UPDATED: IntCounter = register_counter(
        "records_updated_total",
        "Number of record updates applied",
    );

    /// Queries and aggregates served, by operation
    pub static ref QUERIES_SERVED: IntCounterVec = register_counter_vec(
        "record_queries_total",
        "Number of queries and aggregates served",
        &["operation"],
    );

    /// API errors, by error code
    pub static ref API_ERRORS: IntCounterVec = register_counter_vec(
        "api_errors_total",
        "Number of requests answered with an error",
        &["code"],
    );

    /// Records currently held by the store
    pub static ref RECORDS_STORED: IntGauge = {
        let gauge = IntGauge::new("records_stored", "Number of records held by the store")
            .expect("valid gauge definition");
        REGISTRY.register(Box::new(gauge.clone())).expect("gauge registered once");
        gauge
    };
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    REGISTRY.register(Box::new(counter.clone())).expect("counter registered once");
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .expect("valid counter definition");
    REGISTRY.register(Box::new(counter.clone())).expect("counter registered once");
    counter
}

/// Force registration so every series shows up before first use
pub fn init() {
    lazy_static::initialize(&RECORDS_CREATED);
    lazy_static::initialize(&RECORDS_UPDATED);
    lazy_static::initialize(&QUERIES_SERVED);
    lazy_static::initialize(&API_ERRORS);
    lazy_static::initialize(&RECORDS_STORED);
}

/// Render all metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
