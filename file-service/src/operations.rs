//! File and directory CRUD, scoped under a session's working directory.
//!
//! Mechanical I/O — the non-trivial pieces ([`crate::diff`],
//! [`crate::context`]) live in their own modules. Every path taken from a
//! client is resolved via [`agentfs_common::util::resolve_under`], which
//! rejects `..` traversal and escapes out of `working_dir`.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use agentfs_common::util::resolve_under;
use agentfs_common::ApiError;
use serde::Serialize;

/// `GET /sessions/{id}/files/metadata?path=` shape, and the per-entry shape
/// used by `ListWithMetadata`.
#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: u64,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Content returned by `Read`. Non-UTF-8 bytes are lossily converted —
/// this service is scoped to source/text files, not arbitrary binaries.
#[derive(Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub size: u64,
}

fn entry_type_of(metadata: &std::fs::Metadata) -> &'static str {
    if metadata.is_dir() {
        "dir"
    } else if metadata.file_type().is_symlink() {
        "symlink"
    } else {
        "file"
    }
}

fn format_modified(metadata: &std::fs::Metadata) -> Option<String> {
    let modified = metadata.modified().ok()?;
    let secs = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?.as_secs();
    Some(chrono::DateTime::<chrono::Utc>::from_timestamp(i64::try_from(secs).ok()?, 0)?.to_rfc3339())
}

fn metadata_entry(name: String, metadata: &std::fs::Metadata) -> FileMetadata {
    FileMetadata {
        name,
        entry_type: entry_type_of(metadata).to_string(),
        size: metadata.len(),
        mode: format!("{:04o}", metadata.permissions().mode() & 0o7777),
        modified: format_modified(metadata),
    }
}

/// List a directory's immediate entries, sorted by name.
pub async fn list(working_dir: &Path, rel_path: &str) -> Result<Vec<String>, ApiError> {
    let target = resolve_under(working_dir, rel_path)?;
    let mut names = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// List a directory's immediate entries with full metadata, sorted by name.
pub async fn list_with_metadata(
    working_dir: &Path,
    rel_path: &str,
) -> Result<Vec<FileMetadata>, ApiError> {
    let target = resolve_under(working_dir, rel_path)?;
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        entries.push(metadata_entry(name, &metadata));
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read a file's contents, enforcing `max_size`. Oversized files return
/// `InvalidArgument` rather than being silently truncated.
pub async fn read(working_dir: &Path, rel_path: &str, max_size: usize) -> Result<FileContent, ApiError> {
    let target = resolve_under(working_dir, rel_path)?;
    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    if metadata.is_dir() {
        return Err(ApiError::invalid_argument(format!(
            "{rel_path} is a directory"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    if metadata.len() as usize > max_size {
        return Err(ApiError::invalid_argument(format!(
            "file too large ({} bytes, max {max_size})",
            metadata.len()
        )));
    }

    let bytes = tokio::fs::read(&target)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let size = bytes.len() as u64;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FileContent {
        path: rel_path.to_string(),
        content,
        size,
    })
}

pub async fn get_metadata(working_dir: &Path, rel_path: &str) -> Result<FileMetadata, ApiError> {
    let target = resolve_under(working_dir, rel_path)?;
    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    let name = target
        .file_name()
        .map_or_else(|| rel_path.to_string(), |n| n.to_string_lossy().into_owned());
    Ok(metadata_entry(name, &metadata))
}

/// Create a new file, auto-creating parent directories (mode 0755) and
/// setting the file mode to 0644. Fails if the file already exists.
pub async fn create(
    working_dir: &Path,
    rel_path: &str,
    content: &str,
    max_size: usize,
) -> Result<(), ApiError> {
    if content.len() > max_size {
        return Err(ApiError::invalid_argument(format!(
            "content too large ({} bytes, max {max_size})",
            content.len()
        )));
    }
    let target = resolve_under(working_dir, rel_path)?;
    if tokio::fs::metadata(&target).await.is_ok() {
        return Err(ApiError::invalid_argument(format!(
            "{rel_path} already exists"
        )));
    }
    if let Some(parent) = target.parent() {
        create_dir_all_0755(parent).await?;
    }
    tokio::fs::write(&target, content.as_bytes())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    tokio::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(())
}

async fn create_dir_all_0755(dir: &Path) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let mut component = PathBuf::new();
    for part in dir.components() {
        component.push(part);
        if tokio::fs::metadata(&component).await.is_ok() {
            let _ = tokio::fs::set_permissions(&component, std::fs::Permissions::from_mode(0o755))
                .await;
        }
    }
    Ok(())
}

/// Overwrite an existing file's contents. Unlike `Create`, this does not
/// require the file to be absent, nor does it auto-create parents.
pub async fn update(
    working_dir: &Path,
    rel_path: &str,
    content: &str,
    max_size: usize,
) -> Result<(), ApiError> {
    if content.len() > max_size {
        return Err(ApiError::invalid_argument(format!(
            "content too large ({} bytes, max {max_size})",
            content.len()
        )));
    }
    let target = resolve_under(working_dir, rel_path)?;
    tokio::fs::metadata(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    tokio::fs::write(&target, content.as_bytes())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(())
}

pub async fn delete(working_dir: &Path, rel_path: &str) -> Result<(), ApiError> {
    let target = resolve_under(working_dir, rel_path)?;
    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(&target)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    } else {
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }
    Ok(())
}

#[derive(Serialize)]
pub struct BatchReadResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read many files; a failure on one never fails the batch — each entry
/// reports its own success flag.
pub async fn batch_read(working_dir: &Path, paths: &[String], max_size: usize) -> Vec<BatchReadResult> {
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        match read(working_dir, path, max_size).await {
            Ok(content) => results.push(BatchReadResult {
                path: path.clone(),
                success: true,
                content: Some(content.content),
                error: None,
            }),
            Err(err) => results.push(BatchReadResult {
                path: path.clone(),
                success: false,
                content: None,
                error: Some(err.to_string()),
            }),
        }
    }
    results
}

pub struct BatchCreateEntry {
    pub path: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct BatchCreateResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create many files; a failure on one never fails the batch.
pub async fn batch_create(
    working_dir: &Path,
    entries: Vec<BatchCreateEntry>,
    max_size: usize,
) -> Vec<BatchCreateResult> {
    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        match create(working_dir, &entry.path, &entry.content, max_size).await {
            Ok(()) => results.push(BatchCreateResult {
                path: entry.path,
                success: true,
                error: None,
            }),
            Err(err) => results.push(BatchCreateResult {
                path: entry.path,
                success: false,
                error: Some(err.to_string()),
            }),
        }
    }
    results
}

#[derive(Serialize)]
pub struct SearchMatch {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Recursively search `working_dir` for `query`: a case-sensitive substring
/// match against filenames (path match, no line number) and against file
/// content (one match entry per matching line).
pub async fn search(working_dir: &Path, query: &str) -> Result<Vec<SearchMatch>, ApiError> {
    if query.is_empty() {
        return Err(ApiError::invalid_argument("search query must not be empty"));
    }
    let working_dir = working_dir.to_path_buf();
    let query = query.to_string();

    tokio::task::spawn_blocking(move || {
        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(&working_dir)
            .into_iter()
            .filter_entry(|e| !is_ignored(e))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&working_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();

            if entry.file_name().to_string_lossy().contains(&query) {
                matches.push(SearchMatch {
                    path: rel.clone(),
                    line: None,
                    preview: None,
                });
            }

            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                for (idx, line) in content.lines().enumerate() {
                    if line.contains(&query) {
                        matches.push(SearchMatch {
                            path: rel.clone(),
                            line: Some(idx + 1),
                            preview: Some(line.trim().chars().take(200).collect()),
                        });
                    }
                }
            }
        }
        matches
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))
}

pub(crate) fn is_ignored(entry: &walkdir::DirEntry) -> bool {
    matches!(
        entry.file_name().to_str(),
        Some(".git" | "node_modules" | "target" | ".venv")
    )
}

#[derive(Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Build a nested JSON tree of `working_dir`'s contents, capped at `depth`
/// levels.
pub async fn export_structure(working_dir: &Path, depth: usize) -> Result<TreeNode, ApiError> {
    let working_dir = working_dir.to_path_buf();
    tokio::task::spawn_blocking(move || build_tree(&working_dir, depth))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
}

fn build_tree(path: &Path, remaining_depth: usize) -> Result<TreeNode, ApiError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| agentfs_common::error::from_io_error(e, &path.display().to_string()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned());

    if !metadata.is_dir() {
        return Ok(TreeNode {
            name,
            entry_type: "file".to_string(),
            children: None,
        });
    }

    if remaining_depth == 0 {
        return Ok(TreeNode {
            name,
            entry_type: "dir".to_string(),
            children: None,
        });
    }

    let mut children = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(path)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter_map(Result::ok)
        .filter(|e| !matches!(e.file_name().to_str(), Some(".git" | "node_modules" | "target" | ".venv")))
        .collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        children.push(build_tree(&entry.path(), remaining_depth - 1)?);
    }

    Ok(TreeNode {
        name,
        entry_type: "dir".to_string(),
        children: Some(children),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "a.txt", "hello\n", 1024).await.unwrap();
        let content = read(dir.path(), "a.txt", 1024).await.unwrap();
        assert_eq!(content.content, "hello\n");
    }

    #[tokio::test]
    async fn create_auto_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "nested/dir/a.txt", "x", 1024)
            .await
            .unwrap();
        assert!(dir.path().join("nested/dir/a.txt").exists());
    }

    #[tokio::test]
    async fn create_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "a.txt", "one", 1024).await.unwrap();
        let err = create(dir.path(), "a.txt", "two", 1024).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn read_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "big.txt", "0123456789", 1024).await.unwrap();
        let err = read(dir.path(), "big.txt", 4).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn update_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = update(dir.path(), "missing.txt", "x", 1024).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolve_under_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(dir.path(), "../escape.txt", 1024).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn list_sorts_by_name() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "b.txt", "", 1024).await.unwrap();
        create(dir.path(), "a.txt", "", 1024).await.unwrap();
        let names = list(dir.path(), ".").await.unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn batch_read_reports_per_entry_failure() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "ok.txt", "yes", 1024).await.unwrap();
        let results = batch_read(
            dir.path(),
            &["ok.txt".to_string(), "missing.txt".to_string()],
            1024,
        )
        .await;
        assert!(results[0].success);
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn search_matches_content_and_filename() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "needle_file.txt", "nothing here", 1024)
            .await
            .unwrap();
        create(dir.path(), "other.txt", "contains needle inline", 1024)
            .await
            .unwrap();
        let matches = search(dir.path(), "needle").await.unwrap();
        assert!(matches.iter().any(|m| m.path == "needle_file.txt" && m.line.is_none()));
        assert!(matches.iter().any(|m| m.path == "other.txt" && m.line == Some(1)));
    }

    #[tokio::test]
    async fn export_structure_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        create(dir.path(), "top.txt", "", 1024).await.unwrap();
        create(dir.path(), "sub/deep.txt", "", 1024).await.unwrap();
        let tree = export_structure(dir.path(), 0).await.unwrap();
        assert_eq!(tree.entry_type, "dir");
        assert!(tree.children.is_none());
    }
}
