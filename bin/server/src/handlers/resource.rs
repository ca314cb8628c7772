use crate::auth::AuthenticatedUser;
use crate::constants::DOWNLOAD_PIPE_CHUNKS;
use crate::handlers::error::{handle_server_error, handle_storage_error};
use crate::handlers::upload_form::UploadForm;
use crate::state::AppState;
use actix_multipart::form::MultipartForm;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, put, web, HttpResponse, Result as ActixResult};
use common::ResourceKind;
use drive::UploadItem;
use serde::Deserialize;
use storage::StoreError;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Describe a file or directory
#[get("/api/resource")]
pub async fn get_resource(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let descriptor = state
        .storage
        .get_resource(&query.path, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to get resource", e))?;
    Ok(HttpResponse::Ok().json(descriptor))
}

/// Delete a file or a directory with its contents
#[delete("/api/resource")]
pub async fn delete_resource(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(user_id = user.id, path = ?query.path, "DELETE /api/resource");
    state
        .storage
        .delete_resource(&query.path, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to delete resource", e))?;
    Ok(HttpResponse::NoContent().finish())
}

/// Move or rename a file or directory
#[put("/api/resource/move")]
pub async fn move_resource(
    user: AuthenticatedUser,
    query: web::Query<MoveQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(user_id = user.id, from = ?query.from, to = ?query.to, "PUT /api/resource/move");
    let descriptor = state
        .storage
        .move_resource(&query.from, &query.to, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to move resource", e))?;
    Ok(HttpResponse::Ok().json(descriptor))
}

/// Search the user's files and directories by name
#[get("/api/resource/search")]
pub async fn search(
    user: AuthenticatedUser,
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let results = state
        .storage
        .search(&query.query, user.id)
        .await
        .map_err(|e| handle_storage_error("Search failed", e))?;
    Ok(HttpResponse::Ok().json(results))
}

/// Handle file upload (multipart/form-data, field `files`)
#[post("/api/resource/upload")]
pub async fn upload(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    form: MultipartForm<UploadForm>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let form = form.into_inner();

    // Temp files are removed when `form` is dropped, after the upload completes
    let mut items = Vec::with_capacity(form.files.len());
    for file in &form.files {
        let handle = file
            .file
            .reopen()
            .map_err(|e| handle_server_error("Failed to read uploaded file", e))?;
        items.push(UploadItem {
            name: file.file_name.clone().unwrap_or_default(),
            content: storage::stream::from_file(tokio::fs::File::from_std(handle)),
            size: file.size as u64,
            content_type: file.content_type.as_ref().map(|mime| mime.to_string()),
        });
    }

    info!(
        user_id = user.id,
        path = ?query.path,
        files = items.len(),
        "POST /api/resource/upload - Request received"
    );

    let uploaded = state
        .storage
        .upload_batch(&query.path, user.id, items)
        .await
        .map_err(|e| handle_storage_error("Failed to upload files", e))?;
    drop(form);

    Ok(HttpResponse::Created().json(uploaded))
}

/// Download a file, or a directory as a ZIP archive.
///
/// The body is produced while it is sent: a background task writes into a
/// bounded pipe that the response drains.
#[get("/api/resource/download")]
pub async fn download(
    user: AuthenticatedUser,
    query: web::Query<PathQuery>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let download = state
        .storage
        .open_download(&query.path, user.id)
        .await
        .map_err(|e| handle_storage_error("Failed to download resource", e))?;

    let content_type = match download.kind() {
        ResourceKind::Directory => "application/zip",
        ResourceKind::File => "application/octet-stream",
    };
    let file_name = download.file_name().to_string();
    info!(
        user_id = user.id,
        path = ?query.path,
        "GET /api/resource/download - Sending {}",
        file_name
    );

    let (writer, body) = storage::stream::pipe(DOWNLOAD_PIPE_CHUNKS);
    let errors = writer.clone();
    let user_id = user.id;
    actix_web::rt::spawn(async move {
        match download.write_to(writer).await {
            Ok(summary) => info!(
                user_id = user_id,
                entries = summary.entries,
                bytes = summary.bytes,
                "Download of {} completed",
                summary.file_name
            ),
            Err(e) => {
                error!(user_id = user_id, "Download failed part way: {:#}", e);
                errors
                    .abort(StoreError::Unavailable(format!("Download failed: {}", e)))
                    .await;
            }
        }
    });

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        })
        .streaming(body))
}
