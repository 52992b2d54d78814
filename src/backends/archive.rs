//! ZIP extraction into a scratch directory
//!
//! # Invariants
//! - Nothing is written outside the destination: entries with absolute
//!   names or `..` traversal are skipped with a warning.
//! - Entry count and total decompressed bytes are capped; exceeding either
//!   aborts the extraction as a corrupt archive.
//! - The scratch directory is removed when [`ScratchDir`] drops, whether
//!   the run succeeded or not.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::core::error::ExtractError;
use crate::core::model::{Warning, WarningCode};

/// Default maximum number of entries in one archive
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Default cap on total decompressed bytes (2 GiB)
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Resource caps for one extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// Temporary extraction directory, exclusively owned for one run
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self, ExtractError> {
        let dir = tempfile::Builder::new().prefix("codepack-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        tracing::debug!(path = %self.dir.path().display(), "removing scratch directory");
    }
}

/// Remembers whether a read from the archive failed, so a corrupt entry is
/// not mistaken for a failing write to the destination.
struct EntryReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            self.failed = true;
            e
        })
    }
}

/// What an extraction produced
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub files: usize,
    pub bytes: u64,
    pub warnings: Vec<Warning>,
}

/// Extract a ZIP archive into `dest`
pub fn extract_archive<R: Read + Seek>(
    reader: R,
    dest: &Path,
    limits: ArchiveLimits,
) -> Result<Extracted, ExtractError> {
    let mut archive = ZipArchive::new(reader)?;
    if archive.len() > limits.max_entries {
        return Err(ExtractError::Archive(format!(
            "archive has {} entries, limit is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut out = Extracted::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            let warning = Warning::new(
                WarningCode::UnsafeArchiveEntry,
                "Skipping archive entry that would escape the extraction directory",
            )
            .with_path(name);
            tracing::warn!("{}", warning);
            out.warnings.push(warning);
            continue;
        };
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let remaining = limits.max_total_bytes - out.bytes;
        let mut file = File::create(&target)?;
        let mut reader = EntryReader {
            inner: (&mut entry).take(remaining.saturating_add(1)),
            failed: false,
        };
        let written = match io::copy(&mut reader, &mut file) {
            Ok(n) => n,
            Err(e) if reader.failed => {
                return Err(ExtractError::Archive(format!(
                    "entry '{}' is corrupted: {}",
                    name, e
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if written > remaining {
            return Err(ExtractError::Archive(format!(
                "archive expands beyond {} bytes",
                limits.max_total_bytes
            )));
        }

        out.bytes += written;
        out.files += 1;
    }

    tracing::info!(files = out.files, bytes = out.bytes, "extracted archive");
    Ok(out)
}
