//! HTTP request handlers

pub mod directory;
pub mod error;
pub mod health;
pub mod resource;
pub mod upload_form;

use actix_web::web;

/// Register every route of the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(resource::get_resource)
        .service(resource::delete_resource)
        .service(resource::move_resource)
        .service(resource::search)
        .service(resource::upload)
        .service(resource::download)
        .service(directory::list_directory)
        .service(directory::create_directory);
}
