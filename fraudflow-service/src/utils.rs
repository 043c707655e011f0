// Utility Functions
// Common helpers for state directory resolution and file matching

use std::path::{Path, PathBuf};

/// Directory name used under the user's home directory
const STATE_ROOT: &str = ".fraudflow";

/// Default location of persisted dataset snapshots.
///
/// Resolves to `~/.fraudflow/state`. Falls back to `.fraudflow/state` in the
/// current directory when no home directory is available.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_ROOT)
        .join("state")
}

/// Resolve the state directory for a run.
///
/// An explicit directory wins. Relative paths from a definition file are
/// resolved against the file's directory.
///
/// # Arguments
/// * `explicit` - Directory given on the command line
/// * `configured` - Directory named in the pipeline definition
/// * `definition_dir` - Directory holding the definition file, if any
pub fn resolve_state_dir(
    explicit: Option<&Path>,
    configured: Option<&Path>,
    definition_dir: Option<&Path>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match (configured, definition_dir) {
        (Some(dir), Some(base)) if dir.is_relative() => base.join(dir),
        (Some(dir), _) => dir.to_path_buf(),
        (None, _) => default_state_dir(),
    }
}

/// Match a file name against a pattern where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.as_bytes();
    let name = name.as_bytes();

    let (mut p, mut n) = (0, 0);
    // position of the last `*` and the name index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((star, tried)) = backtrack {
            p = star + 1;
            n = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Turn a dataset name into a safe snapshot file stem.
///
/// Bytes outside `[A-Za-z0-9_-]` become `%XX`, so distinct names always map
/// to distinct stems.
pub fn encode_file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}
