//! Web handlers for the external prediction and decision capabilities
//!
//! The service never computes predictions or decisions itself; it forwards
//! unit data to whichever engine was wired in at startup.

use actix_web::{web, HttpResponse, Responder};
use log::debug;

use crate::core::error::RecordError;
use crate::core::record::RecordId;
use crate::web::handlers::{error_response, run_store};
use crate::web::models::{DecisionRequest, DecisionResponse, PredictionResponse};
use crate::web::server::AppState;

/// Ask the predictor about a stored record
pub async fn predict(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let predictor = match &data.predictor {
        Some(predictor) => predictor.clone(),
        None => return error_response(&RecordError::CapabilityUnavailable(
            "no predictor configured".to_string()
        )),
    };

    let id = match path.parse::<RecordId>() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let store = data.store.clone();
    let record = match run_store(move || {
        store.get(id).ok_or_else(|| RecordError::NotFound(id.to_string()))
    })
    .await
    {
        Ok(record) => record,
        Err(e) => return error_response(&e),
    };

    debug!("Requesting prediction for record {}", record.id);
    match predictor.predict(&record.unit, &record.attributes).await {
        Ok(prediction) => HttpResponse::Ok().json(PredictionResponse {
            id: record.id,
            prediction,
        }),
        Err(e) => error_response(&e),
    }
}

/// Ask the decision engine for a recommendation
pub async fn decide(
    data: web::Data<AppState>,
    request: web::Json<DecisionRequest>,
) -> impl Responder {
    let engine = match &data.decision_engine {
        Some(engine) => engine.clone(),
        None => return error_response(&RecordError::CapabilityUnavailable(
            "no decision engine configured".to_string()
        )),
    };

    let request = request.into_inner();
    if request.unit.trim().is_empty() {
        return error_response(&RecordError::Validation("unit must not be empty".to_string()));
    }

    match engine.decide(&request.unit, &request.attributes).await {
        Ok(decision) => HttpResponse::Ok().json(DecisionResponse {
            unit: request.unit,
            decision,
        }),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use crate::core::capability::{MockDecisionEngine, MockPredictor};
    use crate::core::record::{Attributes, NewRecord, RecordKind};
    use crate::web::server::{routes, testing::memory_state};

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(routes),
            )
            .await
        };
    }

    fn performance_attributes() -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("employee".to_string(), json!("e-17"));
        attributes.insert("kpi".to_string(), json!(0.82));
        attributes
    }

    #[actix_web::test]
    async fn test_predict_forwards_record_data() {
        let mut predictor = MockPredictor::new();
        predictor
            .expect_predict()
            .withf(|unit, attributes| unit == "east" && attributes["kpi"] == json!(0.82))
            .times(1)
            .returning(|_, _| Ok(json!(0.9)));

        let state = memory_state().with_predictor(Arc::new(predictor));
        state
            .store
            .create(NewRecord::new("east", RecordKind::Performance, performance_attributes()))
            .unwrap();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/records/r1/prediction").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["id"], "r1");
        assert_eq!(body["prediction"], json!(0.9));
    }

    #[actix_web::test]
    async fn test_predict_unknown_record() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().times(0);
        let app = app!(memory_state().with_predictor(Arc::new(predictor)));

        let req = test::TestRequest::get().uri("/records/r5/prediction").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_predict_without_predictor_is_unavailable() {
        let app = app!(memory_state());
        let req = test::TestRequest::get().uri("/records/r1/prediction").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_decide_returns_recommendation() {
        let mut engine = MockDecisionEngine::new();
        engine
            .expect_decide()
            .withf(|unit, _| unit == "west")
            .returning(|_, _| Ok(json!("reallocate staff")));
        let app = app!(memory_state().with_decision_engine(Arc::new(engine)));

        let req = test::TestRequest::post()
            .uri("/decisions")
            .set_json(json!({"unit": "west", "attributes": {"backlog": 42}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unit"], "west");
        assert_eq!(body["decision"], "reallocate staff");
    }

    #[actix_web::test]
    async fn test_decide_engine_failure_is_bad_gateway() {
        let mut engine = MockDecisionEngine::new();
        engine
            .expect_decide()
            .returning(|_, _| Err(RecordError::CapabilityFailed("rules engine timed out".to_string())));
        let app = app!(memory_state().with_decision_engine(Arc::new(engine)));

        let req = test::TestRequest::post()
            .uri("/decisions")
            .set_json(json!({"unit": "west"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_decide_requires_unit() {
        let mut engine = MockDecisionEngine::new();
        engine.expect_decide().times(0);
        let app = app!(memory_state().with_decision_engine(Arc::new(engine)));

        let req = test::TestRequest::post()
            .uri("/decisions")
            .set_json(json!({"attributes": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
