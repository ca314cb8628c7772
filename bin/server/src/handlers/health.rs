use crate::state::AppState;
use actix_web::{get, web, HttpResponse, Result as ActixResult};
use common::HealthResponse;
use tracing::warn;

/// Health check endpoint, reporting whether the object store answers
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    match state.storage.probe().await {
        Ok(()) => Ok(HttpResponse::Ok().json(HealthResponse {
            status: "ok".to_string(),
        })),
        Err(e) => {
            warn!("Health check failed: {}", e);
            Ok(HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "unavailable".to_string(),
            }))
        }
    }
}
