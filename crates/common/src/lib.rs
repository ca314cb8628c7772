pub mod path_utils;

use serde::{Deserialize, Serialize};

/// Kind of a resource in a user's virtual drive
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    File,
    Directory,
}

/// Descriptor of a file or directory returned to callers
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: String, // Parent directory path, with trailing separator ("" at root)
    pub name: String, // Final path segment
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>, // Present only for files
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl ResourceDescriptor {
    /// Synthetic descriptor for a user's root directory
    pub fn root() -> Self {
        Self {
            path: String::new(),
            name: "root".to_string(),
            size: None,
            kind: ResourceKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// Error body returned by the HTTP layer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

/// Response from health check endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String, // "ok" when healthy
}
