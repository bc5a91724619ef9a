use std::fmt;
use std::sync::Arc;
use actix_web::{error, web, App, HttpRequest, HttpResponse, HttpServer, middleware};
use chrono::{DateTime, Utc};
use log::info;

use crate::config::ServerConfig;
use crate::core::capability::{DecisionEngine, Predictor};
use crate::core::error::RecordError;
use crate::core::store::RecordStore;
use crate::web::handlers;

/// Shared application state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub predictor: Option<Arc<dyn Predictor>>,
    pub decision_engine: Option<Arc<dyn DecisionEngine>>,
    pub started_at: DateTime<Utc>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("predictor", &self.predictor.is_some())
            .field("decision_engine", &self.decision_engine.is_some())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl AppState {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            predictor: None,
            decision_engine: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_decision_engine(mut self, engine: Arc<dyn DecisionEngine>) -> Self {
        self.decision_engine = Some(engine);
        self
    }
}

/// Start the HTTP server and run it until shutdown
pub async fn start_web_server(app_state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    info!("Starting web server on http://{}", config.bind);

    let app_state = web::Data::new(app_state);
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(routes)
    });

    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(&config.bind)?.run().await
}

/// Register extractor settings and API routes
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        bad_request(err.to_string(), err)
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        bad_request(err.to_string(), err)
    }))
    // Record APIs; aggregate must precede the `{id}` routes
    .route("/records", web::post().to(handlers::records::create_record))
    .route("/records", web::get().to(handlers::records::query_records))
    .route("/records/aggregate", web::get().to(handlers::records::aggregate_records))
    .route("/records/{id}", web::get().to(handlers::records::get_record))
    .route("/records/{id}", web::patch().to(handlers::records::update_record))

    // Capability APIs
    .route("/records/{id}/prediction", web::get().to(handlers::capabilities::predict))
    .route("/decisions", web::post().to(handlers::capabilities::decide))

    // System APIs
    .route("/status", web::get().to(handlers::system::get_status))
    .route("/metrics", web::get().to(handlers::system::get_metrics))
    .default_service(web::route().to(not_found));
}

fn bad_request<E>(message: String, err: E) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let response = handlers::error_response(&RecordError::Validation(message));
    error::InternalError::from_response(err, response).into()
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    handlers::error_response(&RecordError::NotFound(req.path().to_string()))
}
