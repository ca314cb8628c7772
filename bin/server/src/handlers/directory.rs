use crate::auth::AuthenticatedUser;
use crate::handlers::error::handle_storage_error;
use crate::handlers::resource::PathQuery;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse, Result as ActixResult};
use tracing::info;

/// List the direct children of a directory
#[get("/api/directory")]
pub async fn list_directory(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let entries = state
        .storage
        .list_directory(&query.path, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to list directory", e))?;
    Ok(HttpResponse::Ok().json(entries))
}

/// Create an empty directory
#[post("/api/directory")]
pub async fn create_directory(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(user_id = user.id, path = ?query.path, "POST /api/directory");
    let descriptor = state
        .storage
        .create_directory(&query.path, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to create directory", e))?;
    Ok(HttpResponse::Created().json(descriptor))
}
