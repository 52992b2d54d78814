//! Filtered file discovery
//!
//! Walks the scan root depth-first with children in file-name order, pruning
//! any entry whose own name is in the exclusion set (so nothing below an
//! excluded directory is ever visited) and keeping files whose suffix is in
//! the extension set.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::config::ExtractConfig;
use crate::core::error::ExtractError;
use crate::core::model::{Discovery, MatchedFile, Warning, WarningCode};
use crate::core::paths::{file_suffix, is_excluded_name, make_relative};
use crate::core::progress::Observer;

/// Normalized inclusion/exclusion sets for one scan
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// `.ext` lowercase suffixes
    pub extensions: HashSet<String>,
    /// Case-folded segment names
    pub exclusions: HashSet<String>,
}

impl ScanFilter {
    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            extensions: config.extension_set(),
            exclusions: config.exclusions_lower(),
        }
    }

    fn accepts_suffix(&self, path: &Path) -> bool {
        file_suffix(path).is_some_and(|s| self.extensions.contains(&s))
    }
}

/// Resolve the effective scan root.
///
/// When `root` holds exactly one entry and it is a directory whose name is not
/// excluded, scanning starts inside it. Any error while looking falls back to
/// `root`. Returns the scan root and whether it was collapsed.
pub fn resolve_scan_root(
    root: &Path,
    exclusions: &HashSet<String>,
    observer: &mut dyn Observer,
    warnings: &mut Vec<Warning>,
) -> (PathBuf, bool) {
    let entries = match fs::read_dir(root).and_then(|rd| rd.collect::<Result<Vec<_>, _>>()) {
        Ok(entries) => entries,
        Err(e) => {
            let warning = Warning::new(
                WarningCode::ScanRoot,
                format!("Could not determine single root folder, scanning from root: {}", e),
            );
            tracing::warn!(root = %root.display(), error = %e, "scan root resolution failed");
            observer.on_warning(&warning);
            warnings.push(warning);
            return (root.to_path_buf(), false);
        }
    };

    if let [only] = entries.as_slice() {
        let path = only.path();
        if path.is_dir() {
            let name = only.file_name();
            if is_excluded_name(&name, exclusions) {
                let message = format!(
                    "Single item '{}' found in root, but it matches an exclusion rule. Scanning from root.",
                    name.to_string_lossy()
                );
                tracing::info!("{}", message);
                observer.on_notice(&message);
            } else {
                let message = format!(
                    "Detected single root folder '{}', scanning inside it.",
                    name.to_string_lossy()
                );
                tracing::info!("{}", message);
                observer.on_notice(&message);
                return (path, true);
            }
        }
    }

    (root.to_path_buf(), false)
}

/// Discover matching files under `root`.
///
/// Fails only when `root` is not an existing directory. Per-entry problems
/// become warnings and the walk continues.
pub fn discover_files(
    root: &Path,
    filter: &ScanFilter,
    observer: &mut dyn Observer,
) -> Result<Discovery, ExtractError> {
    if !root.is_dir() {
        tracing::error!(root = %root.display(), "invalid processing directory");
        return Err(ExtractError::InvalidRoot(root.to_path_buf()));
    }
    let root = root
        .canonicalize()
        .map_err(|_| ExtractError::InvalidRoot(root.to_path_buf()))?;

    let mut warnings = Vec::new();
    let (scan_root, collapsed) =
        resolve_scan_root(&root, &filter.exclusions, observer, &mut warnings);

    tracing::debug!(
        scan_root = %make_relative(&scan_root, &root).filter(|r| !r.is_empty()).unwrap_or_else(|| ".".to_string()),
        "scanning for files"
    );

    let mut files = Vec::new();
    let mut seen = HashSet::new();

    let walker = WalkDir::new(&scan_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded_name(e.file_name(), &filter.exclusions));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let warning = walk_warning(&e, &scan_root);
                tracing::warn!("{}", warning);
                observer.on_warning(&warning);
                warnings.push(warning);
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        let is_file = if entry.path_is_symlink() {
            path.is_file()
        } else {
            entry.file_type().is_file()
        };
        if !is_file || !filter.accepts_suffix(path) {
            continue;
        }

        match path.canonicalize() {
            Ok(resolved) => {
                if seen.insert(resolved.clone()) {
                    files.push(MatchedFile::new(resolved));
                }
            }
            Err(e) => {
                let rel = make_relative(path, &scan_root).unwrap_or_else(|| path.display().to_string());
                let warning = Warning::new(
                    WarningCode::from_io(&e),
                    format!("Skipping entry that could not be resolved: {}", e),
                )
                .with_path(rel);
                tracing::warn!("{}", warning);
                observer.on_warning(&warning);
                warnings.push(warning);
            }
        }
    }

    tracing::info!(count = files.len(), "discovered matching files");

    Ok(Discovery {
        root,
        scan_root,
        collapsed,
        files,
        warnings,
    })
}

fn walk_warning(err: &walkdir::Error, scan_root: &Path) -> Warning {
    let code = err
        .io_error()
        .map(WarningCode::from_io)
        .unwrap_or(WarningCode::Io);
    let message = match code {
        WarningCode::PermissionDenied => "Skipping due to permission error".to_string(),
        WarningCode::NotFound => "Skipping entry that seems to have disappeared".to_string(),
        _ => format!("Skipping due to unexpected error: {}", err),
    };
    let warning = Warning::new(code, message);
    match err.path() {
        Some(p) => warning.with_path(make_relative(p, scan_root).unwrap_or_else(|| p.display().to_string())),
        None => warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::testing::RecordingObserver;
    use crate::core::progress::NoopObserver;
    use std::fs::File;
    use tempfile::tempdir;

    fn filter(exts: &[&str], excl: &[&str]) -> ScanFilter {
        ScanFilter {
            extensions: crate::core::paths::extension_set(exts),
            exclusions: crate::core::paths::exclusion_set(excl),
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn rel_paths(discovery: &Discovery) -> Vec<String> {
        discovery
            .files
            .iter()
            .map(|f| make_relative(&f.path, &discovery.scan_root).unwrap())
            .collect()
    }

    #[test]
    fn test_invalid_root() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing");
        let result = discover_files(&missing, &filter(&["py"], &[]), &mut NoopObserver);
        assert!(matches!(result, Err(ExtractError::InvalidRoot(_))));

        let file = temp.path().join("file.py");
        File::create(&file).unwrap();
        let result = discover_files(&file, &filter(&["py"], &[]), &mut NoopObserver);
        assert!(matches!(result, Err(ExtractError::InvalidRoot(_))));
    }

    #[test]
    fn test_scan_empty_dir() {
        let temp = tempdir().unwrap();
        let discovery = discover_files(temp.path(), &filter(&["py"], &[]), &mut NoopObserver).unwrap();
        assert!(discovery.files.is_empty());
        assert!(!discovery.collapsed);
    }

    #[test]
    fn test_extension_and_exclusion_scenario() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("src/a.py"), "x=1");
        write(&temp.path().join("src/b.log"), "log");
        write(&temp.path().join(".git/config"), "[core]");

        let discovery =
            discover_files(temp.path(), &filter(&[".py"], &[".git"]), &mut NoopObserver).unwrap();
        assert!(!discovery.collapsed);
        assert_eq!(rel_paths(&discovery), vec!["src/a.py"]);
        assert!(discovery.files[0].path.is_absolute());
    }

    #[test]
    fn test_single_folder_collapses() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("project/main.py"), "print()");
        write(&temp.path().join("project/pkg/util.py"), "");

        let mut observer = RecordingObserver::default();
        let discovery = discover_files(temp.path(), &filter(&["py"], &[]), &mut observer).unwrap();
        assert!(discovery.collapsed);
        assert_eq!(
            discovery.scan_root,
            temp.path().join("project").canonicalize().unwrap()
        );
        assert_eq!(rel_paths(&discovery), vec!["main.py", "pkg/util.py"]);
        assert_eq!(observer.notices.len(), 1);
    }

    #[test]
    fn test_single_excluded_folder_does_not_collapse() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("node_modules/lib.js"), "x");

        let discovery =
            discover_files(temp.path(), &filter(&["js"], &["node_modules"]), &mut NoopObserver)
                .unwrap();
        assert!(!discovery.collapsed);
        assert_eq!(discovery.scan_root, temp.path().canonicalize().unwrap());
        assert!(discovery.files.is_empty());
    }

    #[test]
    fn test_single_file_does_not_collapse() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("only.py"), "x");

        let discovery = discover_files(temp.path(), &filter(&["py"], &[]), &mut NoopObserver).unwrap();
        assert!(!discovery.collapsed);
        assert_eq!(rel_paths(&discovery), vec!["only.py"]);
    }

    #[test]
    fn test_exclusions_match_segments_case_insensitively() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("a/Build/deep/x.py"), "");
        write(&temp.path().join("a/builder/y.py"), "");
        write(&temp.path().join("a/SECRET.py"), "");
        write(&temp.path().join("b.py"), "");

        let discovery = discover_files(
            temp.path(),
            &filter(&["py"], &["build", "secret.py"]),
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(rel_paths(&discovery), vec!["a/builder/y.py", "b.py"]);
    }

    #[test]
    fn test_suffix_match_is_case_insensitive() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("A.PY"), "");
        write(&temp.path().join("b.Md"), "");
        write(&temp.path().join("Dockerfile"), "");

        let discovery = discover_files(
            temp.path(),
            &filter(&["py", ".md", "Dockerfile"], &[]),
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(rel_paths(&discovery), vec!["A.PY", "b.Md"]);
    }

    #[test]
    fn test_scan_root_name_itself_is_not_matched() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("src/main.py"), "");
        let root = temp.path().join("src");

        let discovery = discover_files(&root, &filter(&["py"], &["src"]), &mut NoopObserver).unwrap();
        assert_eq!(rel_paths(&discovery), vec!["main.py"]);
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let temp = tempdir().unwrap();
        for name in ["z.py", "a.py", "m/n.py", "m/a.py", "b/c/d.py"] {
            write(&temp.path().join(name), "");
        }

        let f = filter(&["py"], &[]);
        let first = discover_files(temp.path(), &f, &mut NoopObserver).unwrap();
        let second = discover_files(temp.path(), &f, &mut NoopObserver).unwrap();
        assert_eq!(first.files, second.files);
        assert_eq!(
            rel_paths(&first),
            vec!["a.py", "b/c/d.py", "m/a.py", "m/n.py", "z.py"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_duplicates_are_reported_once() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("real.py"), "x");
        write(&temp.path().join("other.txt"), "");
        std::os::unix::fs::symlink(temp.path().join("real.py"), temp.path().join("link.py"))
            .unwrap();

        let discovery = discover_files(temp.path(), &filter(&["py"], &[]), &mut NoopObserver).unwrap();
        assert_eq!(discovery.files.len(), 1);
    }
}
