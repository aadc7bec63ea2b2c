//! Shell discovery and selection.
//!
//! Both [`crate::executor`] (foreground) and [`crate::supervisor`]
//! (background) need the same answer to "which shell do we run this
//! command in", so the logic lives here once.

pub mod process;

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

/// Shells we probe for when `/etc/shells` is missing or unreadable.
const FALLBACK_CANDIDATES: &[&str] = &[
    "/bin/bash",
    "/usr/bin/bash",
    "/bin/zsh",
    "/usr/bin/zsh",
    "/bin/fish",
    "/usr/bin/fish",
    "/bin/dash",
    "/bin/ash",
    "/bin/sh",
];

/// Ranks shells roughly by interactive capability; used only to order the
/// `/system/shells` listing, not to pick a default.
fn eliteness(path: &str) -> u8 {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match name.as_ref() {
        "zsh" => 5,
        "fish" => 4,
        "bash" => 3,
        "dash" => 2,
        "ash" => 1,
        _ => 0,
    }
}

/// Enumerate shells available on the host: `/etc/shells` if present,
/// otherwise a hardcoded candidate list, deduplicated by canonical path and
/// ordered most-to-least capable.
pub fn detect_shells() -> Vec<String> {
    let mut candidates: Vec<String> = std::fs::read_to_string("/etc/shells")
        .map(|contents| {
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if candidates.is_empty() {
        candidates = FALLBACK_CANDIDATES.iter().map(|s| s.to_string()).collect();
    }

    let mut seen = std::collections::HashSet::new();
    let mut shells: Vec<String> = candidates
        .into_iter()
        .filter(|path| is_executable_file(path))
        .filter_map(|path| {
            let canonical = std::fs::canonicalize(&path)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or(path);
            seen.insert(canonical.clone()).then_some(canonical)
        })
        .collect();

    shells.sort_by(|a, b| eliteness(b).cmp(&eliteness(a)));
    shells
}

fn is_executable_file(path: &str) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Caches `stat()` results for shell paths already validated this process
/// lifetime, avoiding a repeated syscall on every command/process start.
static VALIDATED: Mutex<Option<HashMap<String, bool>>> = Mutex::new(None);

/// Validate that `candidate` (normally the session's `SHELL` env value) is
/// an executable regular file; fall back to `/bin/bash` otherwise. The
/// result of each candidate's validation is cached for the process
/// lifetime.
pub fn validate_and_select(candidate: &str) -> String {
    if candidate.is_empty() {
        return "/bin/bash".to_string();
    }

    let mut guard = VALIDATED.lock().expect("shell validation cache poisoned");
    let cache = guard.get_or_insert_with(HashMap::new);

    let valid = *cache
        .entry(candidate.to_string())
        .or_insert_with(|| is_executable_file(candidate));

    if valid {
        candidate.to_string()
    } else {
        tracing::warn!(shell = candidate, "configured shell is not executable, falling back to /bin/bash");
        "/bin/bash".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_shells_finds_at_least_one_posix_shell() {
        let shells = detect_shells();
        assert!(shells.iter().any(|s| s.ends_with("sh")));
    }

    #[test]
    fn detect_shells_orders_by_eliteness() {
        let shells = detect_shells();
        for window in shells.windows(2) {
            assert!(eliteness(&window[0]) >= eliteness(&window[1]));
        }
    }

    #[test]
    fn validate_and_select_falls_back_for_empty_candidate() {
        assert_eq!(validate_and_select(""), "/bin/bash");
    }

    #[test]
    fn validate_and_select_falls_back_for_nonexistent_candidate() {
        assert_eq!(validate_and_select("/no/such/shell"), "/bin/bash");
    }

    #[test]
    fn validate_and_select_accepts_an_existing_executable() {
        assert!(std::path::Path::new("/bin/sh").exists());
        assert_eq!(validate_and_select("/bin/sh"), "/bin/sh");
    }
}
