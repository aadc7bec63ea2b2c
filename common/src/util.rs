//! Small shared helpers: tilde expansion and session-scoped path resolution.

use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    } else if path == "~" {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(path)
}

/// Resolve a client-supplied relative or absolute path against a session's
/// working directory, rejecting `..` traversal and null bytes. Absolute
/// paths are accepted only when they fall under `working_dir`.
pub fn resolve_under(working_dir: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    if requested.contains('\0') {
        return Err(ApiError::invalid_argument("path contains null bytes"));
    }

    let candidate = Path::new(requested);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        working_dir.join(candidate)
    };

    for component in joined.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err(ApiError::invalid_argument("path traversal (..) not allowed"));
        }
    }

    if !joined.starts_with(working_dir) {
        return Err(ApiError::invalid_argument(
            "path escapes the session working directory",
        ));
    }

    Ok(joined)
}

/// Current time as an RFC 3339 string (UTC), the wire format for every
/// timestamp field in both services.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
