//! `ProjectContext`: a read-only, best-effort orientation digest for a
//! working directory — file-category counts, detected languages, and
//! top-level declared dependencies. Each heuristic here is deliberately
//! simple text scanning, not a real parser: no semantic analysis, no
//! transitive dependency resolution, no package-manager invocation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use agentfs_common::ApiError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target", ".venv", "dist", "build"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Source,
    Config,
    Docs,
    Test,
    Build,
    Other,
}

impl FileCategory {
    fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Config => "config",
            Self::Docs => "docs",
            Self::Test => "test",
            Self::Build => "build",
            Self::Other => "other",
        }
    }
}

struct WalkEntry {
    path: PathBuf,
    category: FileCategory,
    size: u64,
}

/// Recursively walk `working_dir`, classifying each file by extension/name
/// into one of [`FileCategory`]'s variants. Skips common VCS/build
/// directories unless `include_hidden` is set.
fn walk(working_dir: &Path, max_depth: usize, include_hidden: bool) -> Vec<WalkEntry> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(working_dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || include_hidden
                || !IGNORED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(Result::ok)
    {
        if entry.depth() == 0 || !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        entries.push(WalkEntry {
            path: entry.path().to_path_buf(),
            category: classify(entry.path()),
            size,
        });
    }
    entries
}

fn classify(path: &Path) -> FileCategory {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    if name.contains("test") || name.contains("spec") {
        return FileCategory::Test;
    }
    match ext.as_deref() {
        Some("md" | "mdx" | "rst" | "adoc" | "txt") if name.to_lowercase() != "requirements.txt" => {
            FileCategory::Docs
        }
        Some("toml" | "yaml" | "yml" | "json" | "ini" | "cfg" | "env") => FileCategory::Config,
        Some(
            "rs" | "py" | "js" | "ts" | "tsx" | "jsx" | "go" | "java" | "c" | "h" | "cpp" | "hpp"
            | "rb" | "php" | "swift" | "kt" | "scala",
        ) => FileCategory::Source,
        _ if matches!(name.as_str(), "Makefile" | "Dockerfile" | "CMakeLists.txt") => {
            FileCategory::Build
        }
        _ => FileCategory::Other,
    }
}

fn manifest_language(file_name: &str) -> Option<&'static str> {
    match file_name {
        "Cargo.toml" => Some("rust"),
        "package.json" => Some("node"),
        "pyproject.toml" | "requirements.txt" => Some("python"),
        "go.mod" => Some("go"),
        _ => None,
    }
}

static CARGO_DEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^([A-Za-z0-9_-]+)\s*=\s*"([^"]+)"#).unwrap());
static CARGO_DEP_TABLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^([A-Za-z0-9_-]+)\s*=\s*\{.*version\s*=\s*"([^"]+)"#).unwrap());
static PACKAGE_JSON_DEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"\s*:\s*"([^"]+)""#).unwrap());
static PYTHON_REQUIREMENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_.\-\[\]]+)\s*(?:==|>=|<=|~=|>|<)?\s*([A-Za-z0-9_.\-]*)").unwrap());
static PYTHON_IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:from|import)\s+([A-Za-z0-9_]+)").unwrap());
static GO_REQUIRE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^\s]+)\s+v([0-9][^\s]*)").unwrap());

/// Per-language heuristic dependency extraction. `file` is resolved against
/// a manifest's content, not its path — unrecognized file types return an
/// empty list rather than erroring.
fn extract_dependencies(language: &str, content: &str) -> Vec<(String, Option<String>)> {
    match language {
        "rust" => extract_cargo_dependencies(content),
        "node" => extract_package_json_dependencies(content),
        "python" => {
            if content.lines().any(|l| {
                let trimmed = l.trim_start();
                trimmed.starts_with("import ") || trimmed.starts_with("from ")
            }) {
                extract_python_imports(content)
            } else {
                extract_python_requirements(content)
            }
        }
        "go" => extract_go_requires(content),
        _ => Vec::new(),
    }
}

fn extract_cargo_dependencies(content: &str) -> Vec<(String, Option<String>)> {
    let mut deps = Vec::new();
    let mut in_dependencies = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(section) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_dependencies = section == "dependencies"
                || section.starts_with("dependencies.")
                || section == "dev-dependencies";
            continue;
        }
        if !in_dependencies {
            continue;
        }
        if let Some(caps) = CARGO_DEP_LINE.captures(trimmed) {
            deps.push((caps[1].to_string(), Some(caps[2].to_string())));
        } else if let Some(caps) = CARGO_DEP_TABLE_LINE.captures(trimmed) {
            deps.push((caps[1].to_string(), Some(caps[2].to_string())));
        }
    }
    deps
}

fn extract_package_json_dependencies(content: &str) -> Vec<(String, Option<String>)> {
    let mut deps = Vec::new();
    let mut in_deps_block = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("\"dependencies\"") || trimmed.starts_with("\"devDependencies\"") {
            in_deps_block = true;
            continue;
        }
        if in_deps_block {
            if trimmed.starts_with('}') {
                in_deps_block = false;
                continue;
            }
            if let Some(caps) = PACKAGE_JSON_DEP_LINE.captures(trimmed) {
                deps.push((caps[1].to_string(), Some(caps[2].to_string())));
            }
        }
    }
    deps
}

fn extract_python_requirements(content: &str) -> Vec<(String, Option<String>)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let caps = PYTHON_REQUIREMENT_LINE.captures(l)?;
            let version = caps.get(2).map(|m| m.as_str()).filter(|s| !s.is_empty()).map(str::to_string);
            Some((caps[1].to_string(), version))
        })
        .collect()
}

fn extract_python_imports(content: &str) -> Vec<(String, Option<String>)> {
    let mut seen = HashSet::new();
    let mut deps = Vec::new();
    for line in content.lines() {
        if let Some(caps) = PYTHON_IMPORT_LINE.captures(line.trim_start()) {
            let name = caps[1].to_string();
            if seen.insert(name.clone()) {
                deps.push((name, None));
            }
        }
    }
    deps
}

fn extract_go_requires(content: &str) -> Vec<(String, Option<String>)> {
    let mut deps = Vec::new();
    let mut in_require_block = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("require (") {
            in_require_block = true;
            continue;
        }
        if in_require_block && trimmed == ")" {
            in_require_block = false;
            continue;
        }
        if !in_require_block && !trimmed.starts_with("require ") {
            continue;
        }
        let candidate = trimmed.strip_prefix("require ").unwrap_or(trimmed);
        if let Some(caps) = GO_REQUIRE_LINE.captures(candidate) {
            deps.push((caps[1].to_string(), Some(format!("v{}", &caps[2]))));
        }
    }
    deps
}

/// `Summarize`'s JSON shape: `{file_counts_by_category, total_size_bytes,
/// languages, top_level_dependencies}`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub file_counts_by_category: HashMap<String, usize>,
    pub total_size_bytes: u64,
    pub languages: Vec<String>,
    pub top_level_dependencies: Vec<String>,
}

/// `ContextReport`'s JSON shape: a `Summarize` plus a short human-readable
/// digest paragraph for an agent to read as quick orientation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReportData {
    #[serde(flatten)]
    pub summary: ContextSummary,
    pub digest: String,
}

pub async fn summarize(working_dir: &Path, max_depth: usize, include_hidden: bool) -> Result<ContextSummary, ApiError> {
    let working_dir = working_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let entries = walk(&working_dir, max_depth, include_hidden);

        let mut file_counts_by_category: HashMap<String, usize> = HashMap::new();
        let mut total_size_bytes = 0u64;
        let mut languages = HashSet::new();
        let mut dependencies = Vec::new();

        for entry in &entries {
            *file_counts_by_category
                .entry(entry.category.as_str().to_string())
                .or_insert(0) += 1;
            total_size_bytes += entry.size;

            let file_name = entry.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if let Some(language) = manifest_language(&file_name) {
                languages.insert(language.to_string());
                if let Ok(content) = std::fs::read_to_string(&entry.path) {
                    dependencies.extend(extract_dependencies(language, &content));
                }
            }
        }

        let mut seen = HashSet::new();
        let top_level_dependencies = dependencies
            .into_iter()
            .filter(|(name, _)| seen.insert(name.clone()))
            .map(|(name, version)| match version {
                Some(v) => format!("{name}@{v}"),
                None => name,
            })
            .collect();

        let mut languages: Vec<String> = languages.into_iter().collect();
        languages.sort();

        Ok(ContextSummary {
            file_counts_by_category,
            total_size_bytes,
            languages,
            top_level_dependencies,
        })
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
}

pub async fn context_report(
    working_dir: &Path,
    max_depth: usize,
    include_hidden: bool,
) -> Result<ContextReportData, ApiError> {
    let summary = summarize(working_dir, max_depth, include_hidden).await?;
    let digest = render_digest(&summary);
    Ok(ContextReportData { summary, digest })
}

fn render_digest(summary: &ContextSummary) -> String {
    let source_count = summary.file_counts_by_category.get("source").copied().unwrap_or(0);
    let language_label = match summary.languages.as_slice() {
        [] => "Unclassified".to_string(),
        [one] => capitalize(one),
        many => many.iter().map(|l| capitalize(l)).collect::<Vec<_>>().join("/"),
    };

    let mut digest = format!("{language_label} project, {source_count} source files");
    if summary.top_level_dependencies.is_empty() {
        digest.push('.');
    } else {
        let preview: Vec<&str> = summary
            .top_level_dependencies
            .iter()
            .take(8)
            .map(String::as_str)
            .collect();
        digest.push_str(&format!(
            ", {} dependencies: {}",
            summary.top_level_dependencies.len(),
            preview.join(", ")
        ));
        if summary.top_level_dependencies.len() > preview.len() {
            digest.push_str(", ...");
        }
        digest.push('.');
    }
    digest
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_cargo_manifest_and_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1.0\"\ntokio = { version = \"1\", features = [\"full\"] }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let summary = summarize(dir.path(), 4, false).await.unwrap();
        assert_eq!(summary.languages, vec!["rust".to_string()]);
        assert!(summary.top_level_dependencies.iter().any(|d| d.starts_with("serde@")));
        assert!(summary.top_level_dependencies.iter().any(|d| d.starts_with("tokio@")));
        assert_eq!(summary.file_counts_by_category.get("source").copied(), Some(1));
        assert_eq!(summary.file_counts_by_category.get("config").copied(), Some(1));
    }

    #[tokio::test]
    async fn detects_package_json_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            "{\n  \"dependencies\": {\n    \"react\": \"18.2.0\"\n  }\n}\n",
        )
        .unwrap();

        let summary = summarize(dir.path(), 4, false).await.unwrap();
        assert!(summary.top_level_dependencies.contains(&"react@18.2.0".to_string()));
    }

    #[tokio::test]
    async fn ignores_vcs_and_build_directories_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(dir.path().join("readme.md"), "hi\n").unwrap();

        let summary = summarize(dir.path(), 4, false).await.unwrap();
        let total: usize = summary.file_counts_by_category.values().sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn no_manifest_yields_empty_languages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi\n").unwrap();
        let summary = summarize(dir.path(), 4, false).await.unwrap();
        assert!(summary.languages.is_empty());
        assert!(summary.top_level_dependencies.is_empty());
    }

    #[tokio::test]
    async fn context_report_includes_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let report = context_report(dir.path(), 4, false).await.unwrap();
        assert!(report.digest.contains("Rust project"));
    }
}
