use crate::{ResourceDescriptor, ResourceKind};

/// Virtual path separator
pub const SEPARATOR: char = '/';

/// Error type for virtual path validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Traversal,
    ContainsNullByte,
    Empty,
    NotAFileName,
}

impl PathError {
    pub fn message(&self) -> &'static str {
        match self {
            PathError::Traversal => "Path cannot contain '..' segments",
            PathError::ContainsNullByte => "Path cannot contain null bytes",
            PathError::Empty => "Name cannot be empty",
            PathError::NotAFileName => "Name cannot end with a path separator",
        }
    }
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PathError {}

/// Canonicalize a raw user-supplied path into a virtual path.
///
/// - Blank input is the root (`""`)
/// - Any `..` segment is rejected to prevent escaping the user's root
/// - Runs of separators collapse into one
/// - A single leading separator is stripped
///
/// A trailing separator is preserved, it marks the path as a directory.
pub fn normalize(raw: &str) -> Result<String, PathError> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }

    if raw.contains('\0') {
        return Err(PathError::ContainsNullByte);
    }

    if raw.split(SEPARATOR).any(|segment| segment == "..") {
        return Err(PathError::Traversal);
    }

    let mut collapsed = String::with_capacity(raw.len());
    let mut previous_was_separator = false;
    for c in raw.chars() {
        if c == SEPARATOR {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        collapsed.push(c);
    }

    match collapsed.strip_prefix(SEPARATOR) {
        Some(stripped) => Ok(stripped.to_string()),
        None => Ok(collapsed),
    }
}

/// Canonicalize a path and force directory form (trailing separator).
/// The root stays `""`.
pub fn normalize_directory(raw: &str) -> Result<String, PathError> {
    let mut normalized = normalize(raw)?;
    if !normalized.is_empty() && !is_directory_path(&normalized) {
        normalized.push(SEPARATOR);
    }
    Ok(normalized)
}

pub fn is_directory_path(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

fn strip_trailing_separator(path: &str) -> &str {
    path.strip_suffix(SEPARATOR).unwrap_or(path)
}

/// Path of the containing directory, with trailing separator.
/// Items at the root have the parent `""`.
pub fn parent_of(path: &str) -> &str {
    match strip_trailing_separator(path).rfind(SEPARATOR) {
        Some(last) => &path[..=last],
        None => "",
    }
}

/// Final segment of a path, ignoring a trailing separator
pub fn name_of(path: &str) -> &str {
    let trimmed = strip_trailing_separator(path);
    match trimmed.rfind(SEPARATOR) {
        Some(last) => &trimmed[last + 1..],
        None => trimmed,
    }
}

/// Build a descriptor for a normalized virtual path
pub fn to_descriptor(path: &str, size: Option<u64>, kind: ResourceKind) -> ResourceDescriptor {
    ResourceDescriptor {
        path: parent_of(path).to_string(),
        name: name_of(path).to_string(),
        size: match kind {
            ResourceKind::File => size,
            ResourceKind::Directory => None,
        },
        kind,
    }
}

/// Key prefix that holds every object owned by a user
pub fn user_root(user_id: u64) -> String {
    format!("user-{}-files/", user_id)
}

/// Object key for a normalized virtual path
pub fn object_key(user_id: u64, path: &str) -> String {
    let mut key = user_root(user_id);
    key.push_str(path);
    key
}

/// Convert a full object key back into a descriptor relative to the user's root.
///
/// Returns `None` for the root marker itself and for keys outside the root.
pub fn relative_descriptor(user_id: u64, key: &str, size: u64) -> Option<ResourceDescriptor> {
    let root = user_root(user_id);
    let relative = key.strip_prefix(root.as_str())?;
    if relative.is_empty() {
        return None;
    }

    let descriptor = if is_directory_path(relative) {
        to_descriptor(relative, None, ResourceKind::Directory)
    } else {
        to_descriptor(relative, Some(size), ResourceKind::File)
    };
    Some(descriptor)
}

/// Validate the name of an uploaded item.
///
/// Names may carry a relative sub-path (folder uploads) but must not
/// escape the target directory or name a directory.
pub fn validate_item_name(name: &str) -> Result<String, PathError> {
    let normalized = normalize(name)?;
    if normalized.is_empty() {
        return Err(PathError::Empty);
    }
    if is_directory_path(&normalized) {
        return Err(PathError::NotAFileName);
    }
    Ok(normalized)
}
