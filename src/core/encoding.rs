//! Charset detection and decoding
//!
//! Detection samples the first [`SAMPLE_SIZE`] bytes of a file and trusts the
//! statistical guess only above [`MIN_CONFIDENCE`]. Decoding never fails on
//! malformed bytes: invalid sequences become U+FFFD. The only outright failure
//! is a label no decoder knows, which sends the caller to [`decode_latin1`].

use encoding_rs::{Encoding, UTF_8};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::core::model::{Warning, WarningCode};

/// Bytes sampled for detection
pub const SAMPLE_SIZE: u64 = 5000;

/// Guesses at or below this confidence are discarded
pub const MIN_CONFIDENCE: f32 = 0.5;

/// Encoding assumed when detection is unsure or impossible
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Name reported for the latin-1 fallback
pub const LATIN1: &str = "ISO-8859-1";

/// Result of sampling a file
#[derive(Debug, Clone)]
pub struct Detection {
    /// Encoding label to decode with
    pub encoding: String,

    /// Detector confidence (0.0 when the default was used)
    pub confidence: f32,

    /// Set when the sample could not be read
    pub warning: Option<Warning>,
}

impl Detection {
    fn fallback(warning: Option<Warning>) -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            confidence: 0.0,
            warning,
        }
    }
}

/// Detect the encoding of a file from its first bytes.
///
/// Read failures are not fatal: they produce a warning and the default encoding.
pub fn detect_encoding(path: &Path) -> Detection {
    match read_sample(path) {
        Ok(sample) => {
            let (encoding, confidence) = detect_bytes(&sample);
            Detection {
                encoding,
                confidence,
                warning: None,
            }
        }
        Err(e) => {
            let message = match e.kind() {
                std::io::ErrorKind::NotFound => "File not found during encoding detection".to_string(),
                _ => format!(
                    "Error detecting encoding, defaulting to {}: {}",
                    DEFAULT_ENCODING, e
                ),
            };
            tracing::warn!(path = %path.display(), error = %e, "encoding detection failed");
            Detection::fallback(Some(
                Warning::new(WarningCode::EncodingDetection, message)
                    .with_path(path.display().to_string()),
            ))
        }
    }
}

/// Guess an encoding label for a byte sample
pub fn detect_bytes(sample: &[u8]) -> (String, f32) {
    if sample.is_empty() {
        return (DEFAULT_ENCODING.to_string(), 0.0);
    }

    if is_utf8_sample(sample) {
        return (DEFAULT_ENCODING.to_string(), 1.0);
    }

    let (charset, confidence, _language) = chardet::detect(&sample.to_vec());
    if charset.is_empty() || confidence <= MIN_CONFIDENCE {
        return (DEFAULT_ENCODING.to_string(), confidence);
    }
    (charset.to_lowercase(), confidence)
}

/// Valid UTF-8, allowing a multibyte sequence cut off by a full-size sample.
///
/// chardet scores short UTF-8 text with a single non-ASCII character as
/// windows-1252, so strict validity wins over the statistical guess.
fn is_utf8_sample(sample: &[u8]) -> bool {
    let valid = Encoding::utf8_valid_up_to(sample);
    if valid == sample.len() {
        return true;
    }
    let tail = &sample[valid..];
    sample.len() as u64 == SAMPLE_SIZE
        && tail.len() < 4
        && (0xC2..=0xF4).contains(&tail[0])
        && tail[1..].iter().all(|b| b & 0xC0 == 0x80)
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE as usize);
    file.take(SAMPLE_SIZE).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Text decoded from raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,

    /// Canonical name of the decoder actually used
    pub encoding: &'static str,

    /// Whether replacement characters were substituted
    pub lossy: bool,
}

/// Resolve a detected label to a decoder.
///
/// `ascii` is widened to UTF-8, since a 5000-byte ASCII sample says nothing
/// about the rest of the file. `utf-8-sig` is plain UTF-8 here; the BOM stays
/// in the text.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().to_lowercase();
    match label.as_str() {
        "ascii" | "us-ascii" | "utf-8-sig" => return Some(UTF_8),
        _ => {}
    }
    Encoding::for_label(label.as_bytes())
}

/// Decode bytes under the given label, replacing malformed sequences.
///
/// Returns `None` when no decoder exists for the label. A byte order mark is
/// kept as content rather than being interpreted.
pub fn decode(bytes: &[u8], label: &str) -> Option<Decoded> {
    let encoding = lookup(label)?;
    let (text, lossy) = encoding.decode_without_bom_handling(bytes);
    Some(Decoded {
        text: text.into_owned(),
        encoding: encoding.name(),
        lossy,
    })
}

/// ISO-8859-1 decoding: every byte maps to the code point of the same value,
/// so this cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> Decoded {
    Decoded {
        text: bytes.iter().map(|&b| char::from(b)).collect(),
        encoding: LATIN1,
        lossy: false,
    }
}
