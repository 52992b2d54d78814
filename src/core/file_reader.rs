//! Encoding-tolerant file reading
//!
//! Provides consistent handling for:
//! - Files in a detected, non-UTF-8 encoding
//! - Malformed byte sequences (replaced, never fatal)
//! - Unknown encodings (latin-1 fallback)
//! - Files that vanish or are unreadable (inline error markers)

use std::fs;
use std::path::Path;

use crate::core::encoding::{decode, decode_latin1, detect_encoding, Decoded};
use crate::core::model::{Warning, WarningCode};

/// Marker substituted for the body of a file that disappeared
pub const MARKER_NOT_FOUND: &str = "[Error: File not found]";

/// Marker substituted for the body of an unreadable file
pub const MARKER_PERMISSION_DENIED: &str = "[Error: Permission denied]";

/// Marker for any other read failure
pub fn marker_read_error(description: impl std::fmt::Display) -> String {
    format!("[Error reading file: {}]", description)
}

/// Result of reading a file
#[derive(Debug, Clone)]
pub struct FileReadResult {
    /// The decoded content (if successfully read)
    pub content: Option<String>,

    /// Decoder used for the content
    pub encoding: Option<&'static str>,

    /// Whether replacement characters were substituted
    pub lossy: bool,

    /// Whether the latin-1 fallback was needed
    pub fallback: bool,

    /// Inline marker to emit instead of content (if reading failed)
    pub error_marker: Option<String>,

    /// Warnings generated during reading
    pub warnings: Vec<Warning>,
}

impl FileReadResult {
    fn decoded(decoded: Decoded) -> Self {
        Self {
            content: Some(decoded.text),
            encoding: Some(decoded.encoding),
            lossy: decoded.lossy,
            fallback: false,
            error_marker: None,
            warnings: Vec::new(),
        }
    }

    fn failed(marker: impl Into<String>) -> Self {
        Self {
            content: None,
            encoding: None,
            lossy: false,
            fallback: false,
            error_marker: Some(marker.into()),
            warnings: Vec::new(),
        }
    }

    fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    fn with_warning(mut self, warning: Warning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.content.is_some()
    }
}

/// Detect the file's encoding, then read and decode it.
///
/// `display_path` is only used to label warnings.
pub fn read_file_detected(path: &Path, display_path: &str) -> FileReadResult {
    let detection = detect_encoding(path);
    tracing::debug!(
        path = display_path,
        encoding = %detection.encoding,
        confidence = detection.confidence,
        "detected encoding"
    );
    let mut result = read_file_as(path, &detection.encoding, display_path);
    if let Some(warning) = detection.warning {
        result.warnings.insert(0, warning.with_path(display_path));
    }
    result
}

/// Read a file and decode it with the given encoding label.
///
/// Malformed bytes never fail the read. An encoding with no decoder falls back
/// to latin-1, which accepts any byte sequence.
pub fn read_file_as(path: &Path, encoding: &str, display_path: &str) -> FileReadResult {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => return read_failure(&e, display_path),
    };

    match decode(&bytes, encoding) {
        Some(decoded) => {
            if decoded.lossy {
                tracing::debug!(
                    path = display_path,
                    encoding = decoded.encoding,
                    "replacement characters substituted"
                );
            }
            FileReadResult::decoded(decoded)
        }
        None => {
            tracing::warn!(
                path = display_path,
                encoding,
                "could not decode with detected encoding, trying latin-1"
            );
            let warning = Warning::new(
                WarningCode::Decode,
                format!(
                    "Could not decode file with detected encoding '{}'. Using 'latin-1'.",
                    encoding
                ),
            )
            .with_path(display_path);
            FileReadResult::decoded(decode_latin1(&bytes))
                .with_fallback()
                .with_warning(warning)
        }
    }
}

fn read_failure(err: &std::io::Error, display_path: &str) -> FileReadResult {
    let code = WarningCode::from_io(err);
    let (marker, message) = match code {
        WarningCode::NotFound => (
            MARKER_NOT_FOUND.to_string(),
            "File not found during read attempt".to_string(),
        ),
        WarningCode::PermissionDenied => (
            MARKER_PERMISSION_DENIED.to_string(),
            "Permission denied reading file".to_string(),
        ),
        _ => (
            marker_read_error(err),
            format!("Could not read file: {}", err),
        ),
    };
    tracing::error!(path = display_path, error = %err, "{}", message);
    FileReadResult::failed(marker).with_warning(Warning::new(code, message).with_path(display_path))
}
