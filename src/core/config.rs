//! Run configuration
//!
//! A single explicit struct carries the extension set, the exclusion names and
//! the tokenizer profile into the pipeline. It can come from a TOML file, with
//! CLI flags layered on top by the caller:
//!
//! ```toml
//! extensions = [".rs", ".toml", "md"]
//! exclusions = ["target", ".git"]
//! model = "gpt-4o"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::core::error::ExtractError;
use crate::core::paths::{exclusion_set, extension_set};

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py",
    ".js",
    ".jsx",
    ".ts",
    ".tsx",
    ".html",
    ".css",
    ".scss",
    ".md",
    ".json",
    ".yaml",
    ".yml",
    ".txt",
    ".sh",
    "Dockerfile",
    ".env.example",
];

/// Exact names, matched case-insensitively against single path segments.
/// Entries that look like globs are still compared literally.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".git",
    ".vscode",
    ".idea",
    "node_modules",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    "dist",
    "build",
    "target",
    "*.log",
    "*.lock",
    "*.env",
    ".DS_Store",
    "package-lock.json",
    "yarn.lock",
    "composer.lock",
];

pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// File suffixes to include, in any spelling (`py`, `.PY`)
    pub extensions: Vec<String>,

    /// Directory or file names to skip, with everything below them
    pub exclusions: Vec<String>,

    /// Tokenizer profile name
    pub model: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ExtractConfig {
    /// Load a TOML config file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&text).map_err(|e| {
            ExtractError::Config(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.extension_set().is_empty() {
            return Err(ExtractError::Config(
                "Please select at least one file extension to include".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ExtractError::Config("Model name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn extension_set(&self) -> HashSet<String> {
        extension_set(&self.extensions)
    }

    /// Case-folded exclusion names
    pub fn exclusions_lower(&self) -> HashSet<String> {
        exclusion_set(&self.exclusions)
    }
}

/// Parse newline-separated exclusion names, ignoring blank lines
pub fn parse_exclusions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
