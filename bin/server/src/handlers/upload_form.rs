use actix_multipart::form::{tempfile::TempFile, MultipartForm};

/// Multipart form for file upload
#[derive(MultipartForm)]
pub struct UploadForm {
    /// Files being uploaded; a file name may carry a relative sub-path
    #[multipart(limit = "100MB")]
    pub files: Vec<TempFile>,
}
