//! Extraction flow - archive in, prompt-ready text and token count out
//!
//! Steps:
//! 1. extract the archive into a scratch directory (removed when the run ends)
//! 2. discover matching files under the resolved scan root
//! 3. read and concatenate them with path headers
//! 4. count tokens for the chosen profile
//!
//! Only a bad archive, a bad root or a bad configuration aborts a run.

use chrono::Utc;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::backends::archive::{extract_archive, ArchiveLimits, ScratchDir};
use crate::backends::scan::{discover_files, ScanFilter};
use crate::core::config::ExtractConfig;
use crate::core::error::ExtractError;
use crate::core::model::{CountMethod, RunReport, Warning, WarningCode};
use crate::core::paths::{artifact_name, directory_artifact_name, make_relative};
use crate::core::progress::Observer;
use crate::core::tokenizer::count_tokens;
use crate::flows::aggregate::aggregate;

/// Run the pipeline over a directory on disk.
///
/// `source_name` labels the report; the artifact is named after it whole.
pub fn run_directory(
    root: &Path,
    source_name: &str,
    config: &ExtractConfig,
    observer: &mut dyn Observer,
) -> Result<RunReport, ExtractError> {
    run_pipeline(
        root,
        source_name,
        directory_artifact_name(source_name),
        config,
        observer,
    )
}

fn run_pipeline(
    root: &Path,
    source_name: &str,
    artifact: String,
    config: &ExtractConfig,
    observer: &mut dyn Observer,
) -> Result<RunReport, ExtractError> {
    config.validate()?;

    // A previous run may have left its artifact inside the tree.
    let mut filter = ScanFilter::from_config(config);
    filter.exclusions.insert(artifact.to_lowercase());
    let discovery = discover_files(root, &filter, observer)?;

    if discovery.files.is_empty() {
        let message = format!(
            "No files found matching the criteria within '{}'. Check extensions and exclusions.",
            source_name
        );
        tracing::warn!("{}", message);
        observer.on_notice(&message);
    } else {
        tracing::info!(count = discovery.files.len(), "found files matching criteria");
    }

    let aggregation = aggregate(&discovery.files, &discovery.scan_root, observer);

    let token_count = count_tokens(&aggregation.combined_text, &config.model);
    let mut warnings = discovery.warnings;
    warnings.extend(aggregation.warnings);

    let degraded = match token_count.method {
        CountMethod::Exact { .. } => None,
        CountMethod::Approximate => Some(format!(
            "Unknown model '{}'. Using approximation (chars/4).",
            config.model
        )),
        CountMethod::Unavailable => Some(format!(
            "Tokenizer for '{}' could not be loaded. Token count unavailable.",
            config.model
        )),
    };
    if let Some(message) = degraded {
        observer.on_notice(&message);
        warnings.push(Warning::new(WarningCode::Tokenizer, message));
    }

    let scan_root = make_relative(&discovery.scan_root, &discovery.root)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| ".".to_string());

    Ok(RunReport {
        source: source_name.to_string(),
        scan_root,
        collapsed: discovery.collapsed,
        matched_file_count: discovery.files.len(),
        processed_file_count: aggregation.processed,
        token_count,
        artifact_name: artifact,
        records: aggregation.records,
        warnings,
        generated_at: Utc::now(),
        combined_text: aggregation.combined_text,
    })
}

/// Run the full pipeline over an uploaded archive.
///
/// The scratch directory lives exactly as long as this call.
pub fn run_archive<R: Read + Seek>(
    reader: R,
    archive_name: &str,
    config: &ExtractConfig,
    limits: ArchiveLimits,
    observer: &mut dyn Observer,
) -> Result<RunReport, ExtractError> {
    config.validate()?;

    let scratch = ScratchDir::new()?;
    tracing::info!(archive = archive_name, "extracting archive");
    let extracted = extract_archive(reader, scratch.path(), limits).map_err(|e| match e {
        ExtractError::Archive(msg) => ExtractError::Archive(format!(
            "'{}' is not a valid ZIP file or is corrupted: {}",
            archive_name, msg
        )),
        other => other,
    })?;
    for warning in &extracted.warnings {
        observer.on_warning(warning);
    }

    let mut report = run_pipeline(
        scratch.path(),
        archive_name,
        artifact_name(archive_name),
        config,
        observer,
    )?;
    let mut warnings = extracted.warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    Ok(report)
}

/// Run the full pipeline over an archive file on disk
pub fn run_archive_file(
    path: &Path,
    config: &ExtractConfig,
    limits: ArchiveLimits,
    observer: &mut dyn Observer,
) -> Result<RunReport, ExtractError> {
    let file = fs::File::open(path).map_err(|e| {
        ExtractError::Archive(format!("Cannot open {}: {}", path.display(), e))
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    run_archive(std::io::BufReader::new(file), &name, config, limits, observer)
}

/// Write the combined text to `dir` under the report's artifact name.
///
/// Nothing is written when the combined text is empty.
pub fn write_artifact(report: &RunReport, dir: &Path) -> Result<Option<PathBuf>, ExtractError> {
    if report.combined_text.is_empty() {
        return Ok(None);
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(&report.artifact_name);
    fs::write(&path, report.combined_text.as_bytes())?;
    tracing::info!(path = %path.display(), "wrote combined text");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::archive::testing::build_zip;
    use crate::core::model::RecordStatus;
    use crate::core::progress::testing::RecordingObserver;
    use crate::core::progress::NoopObserver;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn config(exts: &[&str], excl: &[&str]) -> ExtractConfig {
        ExtractConfig {
            extensions: exts.iter().map(|s| s.to_string()).collect(),
            exclusions: excl.iter().map(|s| s.to_string()).collect(),
            model: "gpt-4".to_string(),
        }
    }

    #[test]
    fn test_archive_scenario() {
        let bytes = build_zip(&[
            ("src/a.py", b"x=1"),
            ("src/b.log", b"noise"),
            (".git/config", b"[core]"),
        ]);
        let report = run_archive(
            Cursor::new(bytes),
            "demo.zip",
            &config(&[".py"], &[".git"]),
            ArchiveLimits::default(),
            &mut NoopObserver,
        )
        .unwrap();

        assert_eq!(report.matched_file_count, 1);
        assert_eq!(report.processed_file_count, 1);
        assert_eq!(report.records[0].path, "src/a.py");
        assert_eq!(
            report.combined_text,
            "\n========== File: src/a.py ==========\n\nx=1\n"
        );
        assert!(report.token_count.tokens > 0);
        assert_eq!(report.artifact_name, "demo_code_extract.txt");
        assert_eq!(report.scan_root, ".");
        assert!(!report.collapsed);
    }

    #[test]
    fn test_archive_with_wrapper_folder() {
        let bytes = build_zip(&[
            ("my-app/", b""),
            ("my-app/main.py", b"print(1)"),
            ("my-app/lib/util.py", b"pass"),
        ]);
        let mut observer = RecordingObserver::default();
        let report = run_archive(
            Cursor::new(bytes),
            "my-app.zip",
            &config(&["py"], &[]),
            ArchiveLimits::default(),
            &mut observer,
        )
        .unwrap();

        assert!(report.collapsed);
        assert_eq!(report.scan_root, "my-app");
        let paths: Vec<_> = report.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/util.py", "main.py"]);
        assert_eq!(observer.progress.len(), 2);
    }

    #[test]
    fn test_no_matches() {
        let bytes = build_zip(&[("notes.txt", b"hello")]);
        let report = run_archive(
            Cursor::new(bytes),
            "x.zip",
            &config(&["py"], &[]),
            ArchiveLimits::default(),
            &mut NoopObserver,
        )
        .unwrap();

        assert_eq!(report.matched_file_count, 0);
        assert_eq!(report.processed_file_count, 0);
        assert_eq!(report.combined_text, "");
        assert_eq!(report.token_count.tokens, 0);
    }

    #[test]
    fn test_corrupt_archive() {
        let result = run_archive(
            Cursor::new(b"PK\x03\x04 garbage".to_vec()),
            "broken.zip",
            &ExtractConfig::default(),
            ArchiveLimits::default(),
            &mut NoopObserver,
        );
        match result {
            Err(ExtractError::Archive(msg)) => assert!(msg.contains("broken.zip")),
            other => panic!("expected archive error, got {:?}", other.map(|r| r.source)),
        }
    }

    #[test]
    fn test_empty_extensions_rejected_before_extraction() {
        let result = run_archive(
            Cursor::new(b"not even read".to_vec()),
            "x.zip",
            &config(&[], &[]),
            ArchiveLimits::default(),
            &mut NoopObserver,
        );
        assert!(matches!(result, Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_unknown_model_approximates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "abcdefgh").unwrap();
        let mut cfg = config(&["py"], &[]);
        cfg.model = "mystery-model".to_string();

        let mut observer = RecordingObserver::default();
        let report = run_directory(dir.path(), "a", &cfg, &mut observer).unwrap();

        let expected = report.combined_text.chars().count() / 4;
        assert_eq!(report.token_count.tokens, expected);
        assert_eq!(report.token_count.method, CountMethod::Approximate);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::Tokenizer));
        assert!(!observer.notices.is_empty());
    }

    #[test]
    fn test_run_directory_invalid_root() {
        let result = run_directory(
            Path::new("/nonexistent/dir"),
            "dir",
            &ExtractConfig::default(),
            &mut NoopObserver,
        );
        assert!(matches!(result, Err(ExtractError::InvalidRoot(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_recorded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "a").unwrap();
        let locked = dir.path().join("b.py");
        fs::write(&locked, "b").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; nothing to assert in that case.
        if fs::read(&locked).is_ok() {
            return;
        }

        let report =
            run_directory(dir.path(), "d", &config(&["py"], &[]), &mut NoopObserver).unwrap();
        assert_eq!(report.matched_file_count, 2);
        assert_eq!(report.processed_file_count, 1);
        assert_eq!(report.records[1].status, RecordStatus::Failed);
        assert!(report.combined_text.contains("[Error: Permission denied]"));
    }

    #[test]
    fn test_write_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x=1").unwrap();
        let report =
            run_directory(dir.path(), "proj", &config(&["py"], &[]), &mut NoopObserver).unwrap();

        let out = TempDir::new().unwrap();
        let path = write_artifact(&report, out.path()).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "proj_code_extract.txt");
        assert_eq!(fs::read_to_string(path).unwrap(), report.combined_text);
    }

    #[test]
    fn test_second_run_ignores_own_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "a = 1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "todo\n").unwrap();
        let cfg = config(&["py", "txt"], &[]);

        let first = run_directory(dir.path(), "proj", &cfg, &mut NoopObserver).unwrap();
        write_artifact(&first, dir.path()).unwrap().unwrap();
        assert!(dir.path().join("proj_code_extract.txt").exists());

        let second = run_directory(dir.path(), "proj", &cfg, &mut NoopObserver).unwrap();
        let paths: Vec<_> = second.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "notes.txt"]);
        assert_eq!(second.combined_text, first.combined_text);
        assert_eq!(second.token_count.tokens, first.token_count.tokens);
    }

    #[test]
    fn test_directory_name_with_dots_keeps_them() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x=1").unwrap();
        let report =
            run_directory(dir.path(), "repo-v1.2", &config(&["py"], &[]), &mut NoopObserver)
                .unwrap();
        assert_eq!(report.artifact_name, "repo-v1_2_code_extract.txt");
    }

    #[test]
    fn test_write_artifact_skips_empty() {
        let dir = TempDir::new().unwrap();
        let report =
            run_directory(dir.path(), "empty.zip", &config(&["py"], &[]), &mut NoopObserver)
                .unwrap();
        let out = TempDir::new().unwrap();
        assert!(write_artifact(&report, out.path()).unwrap().is_none());
    }
}
