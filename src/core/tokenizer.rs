//! Token counting against a named tokenizer profile
//!
//! Profiles are model identifiers resolved to a tiktoken BPE encoding. The
//! encodings load lazily, once per process.
//!
//! Degradation rules:
//! - unknown profile name: `chars / 4` approximation (integer division)
//! - encoding fails to load: 0 tokens
//!
//! Both are reported as notices, never as errors.
//!
//! Usage:
//! ```rust,ignore
//! let count = count_tokens("Hello world", "gpt-4");
//! assert_eq!(count.method, CountMethod::Exact { encoding: "cl100k_base".into() });
//! ```

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::{cl100k_base, o200k_base, p50k_base, CoreBPE};

use crate::core::model::{CountMethod, TokenCount};

/// BPE encodings backing the profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpeEncoding {
    Cl100k,
    O200k,
    P50k,
}

impl BpeEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            BpeEncoding::Cl100k => "cl100k_base",
            BpeEncoding::O200k => "o200k_base",
            BpeEncoding::P50k => "p50k_base",
        }
    }

    /// Load (or fetch the cached) encoding
    pub fn load(&self) -> Result<&'static CoreBPE, String> {
        let bpe = match self {
            BpeEncoding::Cl100k => &*CL100K_BPE,
            BpeEncoding::O200k => &*O200K_BPE,
            BpeEncoding::P50k => &*P50K_BPE,
        };
        bpe.as_ref().map_err(Clone::clone)
    }
}

// Lazy-initialized BPE encodings (loaded once on first use)
static CL100K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| cl100k_base().map_err(|e| format!("Failed to load cl100k_base: {}", e)));

static O200K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| o200k_base().map_err(|e| format!("Failed to load o200k_base: {}", e)));

static P50K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| p50k_base().map_err(|e| format!("Failed to load p50k_base: {}", e)));

/// The enumerated tokenizer profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenProfile {
    #[default]
    Gpt4,
    Gpt4Turbo,
    Gpt35Turbo,
    TextEmbeddingAda002,
    TextDavinci003,
    Gpt4o,
}

impl TokenProfile {
    pub const ALL: [TokenProfile; 6] = [
        TokenProfile::Gpt4,
        TokenProfile::Gpt4Turbo,
        TokenProfile::Gpt35Turbo,
        TokenProfile::TextEmbeddingAda002,
        TokenProfile::TextDavinci003,
        TokenProfile::Gpt4o,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TokenProfile::Gpt4 => "gpt-4",
            TokenProfile::Gpt4Turbo => "gpt-4-turbo",
            TokenProfile::Gpt35Turbo => "gpt-3.5-turbo",
            TokenProfile::TextEmbeddingAda002 => "text-embedding-ada-002",
            TokenProfile::TextDavinci003 => "text-davinci-003",
            TokenProfile::Gpt4o => "gpt-4o",
        }
    }

    pub fn encoding(&self) -> BpeEncoding {
        match self {
            TokenProfile::Gpt4
            | TokenProfile::Gpt4Turbo
            | TokenProfile::Gpt35Turbo
            | TokenProfile::TextEmbeddingAda002 => BpeEncoding::Cl100k,
            TokenProfile::TextDavinci003 => BpeEncoding::P50k,
            TokenProfile::Gpt4o => BpeEncoding::O200k,
        }
    }

    /// List all profile names
    pub fn available_models() -> Vec<&'static str> {
        Self::ALL.iter().map(TokenProfile::name).collect()
    }
}

impl fmt::Display for TokenProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown model: {}. Available: {}",
                    s,
                    TokenProfile::available_models().join(", ")
                )
            })
    }
}

/// Character-based approximation: `chars / 4`, rounded down
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Count tokens in `text` with the named profile.
///
/// Empty text is always 0 tokens.
pub fn count_tokens(text: &str, model: &str) -> TokenCount {
    let profile = match model.parse::<TokenProfile>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(model, "{}; using approximation (chars/4)", e);
            return TokenCount {
                tokens: approximate_tokens(text),
                model: model.to_string(),
                method: CountMethod::Approximate,
            };
        }
    };

    let encoding = profile.encoding();
    match encoding.load() {
        Ok(bpe) => TokenCount {
            tokens: if text.is_empty() {
                0
            } else {
                bpe.encode_with_special_tokens(text).len()
            },
            model: profile.name().to_string(),
            method: CountMethod::Exact {
                encoding: encoding.name().to_string(),
            },
        },
        Err(e) => {
            tracing::error!(model, error = %e, "tokenizer backend unavailable");
            TokenCount {
                tokens: 0,
                model: profile.name().to_string(),
                method: CountMethod::Unavailable,
            }
        }
    }
}

/// Availability of every profile's encoding, for `codepack models`
pub fn check_profiles() -> Vec<(TokenProfile, Result<(), String>)> {
    TokenProfile::ALL
        .iter()
        .map(|p| (*p, p.encoding().load().map(|_| ())))
        .collect()
}
