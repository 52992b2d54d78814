//! Core module - Leaf building blocks shared by every command
//!
//! This module provides:
//! - Run configuration and the fatal error type
//! - The result model and its renderers
//! - Path handling, encoding detection and file reading
//! - Token counting against named tokenizer profiles
//! - Progress/warning observers

pub mod config;
pub mod encoding;
pub mod error;
pub mod file_reader;
pub mod model;
pub mod paths;
pub mod progress;
pub mod render;
pub mod tokenizer;
