//! Pipeline result model
//!
//! Every stage (discovery, aggregation, token counting) maps its outcome to
//! these types before anything is rendered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Warning codes for recoverable, per-entry problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// Entry could not be read because of permissions
    PermissionDenied,
    /// Entry disappeared between listing and reading
    NotFound,
    /// Any other I/O failure
    Io,
    /// Primary decoding failed and a fallback was used (or also failed)
    Decode,
    /// File path could not be made relative to the scan root
    RelativePath,
    /// Charset detection could not sample the file
    EncodingDetection,
    /// Scan root resolution failed and fell back to the extraction root
    ScanRoot,
    /// Archive entry would have escaped the extraction directory
    UnsafeArchiveEntry,
    /// Tokenizer unavailable or profile unknown
    Tokenizer,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::PermissionDenied => "PERMISSION_DENIED",
            WarningCode::NotFound => "NOT_FOUND",
            WarningCode::Io => "IO",
            WarningCode::Decode => "DECODE",
            WarningCode::RelativePath => "RELATIVE_PATH",
            WarningCode::EncodingDetection => "ENCODING_DETECTION",
            WarningCode::ScanRoot => "SCAN_ROOT",
            WarningCode::UnsafeArchiveEntry => "UNSAFE_ARCHIVE_ENTRY",
            WarningCode::Tokenizer => "TOKENIZER",
        }
    }

    /// Map an I/O error kind onto the matching warning code
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => WarningCode::PermissionDenied,
            std::io::ErrorKind::NotFound => WarningCode::NotFound,
            _ => WarningCode::Io,
        }
    }
}

/// A structured, non-fatal warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,

    pub message: String,

    /// Path of the entry concerned, relative to the scan root when possible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.code.as_str(), path, self.message),
            None => write!(f, "[{}] {}", self.code.as_str(), self.message),
        }
    }
}

/// A file that passed the extension and exclusion filters.
///
/// The path is absolute and existed when it was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchedFile {
    pub path: PathBuf,
}

impl MatchedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Output of the path filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    /// Directory the caller asked to scan
    pub root: PathBuf,

    /// Directory relative paths and exclusion matching start from
    pub scan_root: PathBuf,

    /// Whether a single top-level wrapper folder was collapsed into
    pub collapsed: bool,

    /// Matched files in walk order
    pub files: Vec<MatchedFile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

/// Outcome of reading one matched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Ok,
    Failed,
}

/// One entry of the combined text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRecord {
    /// Path relative to the scan root, '/'-separated. Falls back to the bare
    /// file name when the path is not under the scan root.
    pub path: String,

    pub status: RecordStatus,

    /// Encoding the body was decoded with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Whether replacement characters were substituted while decoding
    #[serde(default)]
    pub lossy: bool,

    /// Whether the detected encoding had no decoder and latin-1 was used
    #[serde(default)]
    pub fallback: bool,

    /// Decoded text (absent when reading failed)
    #[serde(skip)]
    pub body: Option<String>,

    /// Number of characters in the body
    #[serde(default)]
    pub chars: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregatedRecord {
    pub fn success(path: impl Into<String>, encoding: &str, lossy: bool, body: String) -> Self {
        Self {
            path: path.into(),
            status: RecordStatus::Ok,
            encoding: Some(encoding.to_string()),
            lossy,
            fallback: false,
            chars: body.chars().count(),
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: RecordStatus::Failed,
            encoding: None,
            lossy: false,
            fallback: false,
            body: None,
            chars: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == RecordStatus::Ok
    }
}

/// Output of the content aggregator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(skip)]
    pub combined_text: String,

    pub records: Vec<AggregatedRecord>,

    /// Files whose content made it into the combined text
    pub processed: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl Aggregation {
    pub fn failed(&self) -> usize {
        self.records.len() - self.processed
    }
}

/// How a token count was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CountMethod {
    /// BPE encoding of the full text
    Exact { encoding: String },
    /// `chars / 4`, used for unknown profiles
    Approximate,
    /// Tokenizer backend could not be loaded
    Unavailable,
}

/// A derived token count, never cached across runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub tokens: usize,
    pub model: String,
    #[serde(flatten)]
    pub method: CountMethod,
}

/// Everything a run reports back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Archive or directory the run started from
    pub source: String,

    /// Scan root, relative to the extraction root ("." when not collapsed)
    pub scan_root: String,

    pub collapsed: bool,

    pub matched_file_count: usize,

    pub processed_file_count: usize,

    pub token_count: TokenCount,

    /// Name the combined text is offered under
    pub artifact_name: String,

    pub records: Vec<AggregatedRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,

    pub generated_at: DateTime<Utc>,

    #[serde(skip)]
    pub combined_text: String,
}

impl RunReport {
    pub fn failed_file_count(&self) -> usize {
        self.matched_file_count - self.processed_file_count
    }
}
