//! Path normalization utilities
//!
//! Relative paths are always emitted with '/' as separator. Extension and
//! exclusion sets are normalized here so every stage compares the same forms.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

/// Suffix appended to the sanitized archive name for the download artifact
pub const ARTIFACT_SUFFIX: &str = "_code_extract.txt";

/// Artifact name used when the archive name cannot be sanitized
pub const FALLBACK_ARTIFACT_NAME: &str = "code_extract.txt";

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Normalize one extension to its canonical `.ext` lowercase form.
///
/// All leading dots are stripped before the single canonical dot is added, so
/// `py`, `.py` and `..PY` all become `.py`. Blank input yields `None`.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let bare = ext.trim().trim_start_matches('.');
    if bare.is_empty() {
        return None;
    }
    Some(format!(".{}", bare.to_lowercase()))
}

/// Build the extension inclusion set
pub fn extension_set<S: AsRef<str>>(extensions: &[S]) -> HashSet<String> {
    extensions
        .iter()
        .filter_map(|e| normalize_extension(e.as_ref()))
        .collect()
}

/// Build the exclusion set of case-folded segment names
pub fn exclusion_set<S: AsRef<str>>(names: &[S]) -> HashSet<String> {
    names
        .iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Check a single path segment against the exclusion set (case-insensitive)
pub fn is_excluded_name(name: &OsStr, exclusions: &HashSet<String>) -> bool {
    exclusions.contains(&name.to_string_lossy().to_lowercase())
}

/// The file's suffix in `.ext` lowercase form, if it has one
pub fn file_suffix(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Derive the download artifact name from the uploaded archive's file name.
///
/// The archive's stem keeps alphanumerics, `_` and `-`; every other character
/// becomes `_`. Names without a stem get [`FALLBACK_ARTIFACT_NAME`].
pub fn artifact_name(archive_name: &str) -> String {
    match Path::new(archive_name).file_stem() {
        Some(stem) => sanitized_artifact_name(&stem.to_string_lossy()),
        None => FALLBACK_ARTIFACT_NAME.to_string(),
    }
}

/// Artifact name for a directory run: the whole directory name is kept, dots
/// included, since it has no extension to strip.
pub fn directory_artifact_name(dir_name: &str) -> String {
    if dir_name.is_empty() {
        return FALLBACK_ARTIFACT_NAME.to_string();
    }
    sanitized_artifact_name(dir_name)
}

fn sanitized_artifact_name(base: &str) -> String {
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}{}", safe, ARTIFACT_SUFFIX)
}
