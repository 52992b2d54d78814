//! Backends module - Filesystem and archive access
//!
//! Provides:
//! - archive: ZIP extraction into a scratch directory
//! - scan: Filtered file discovery with walkdir

pub mod archive;
pub mod scan;
