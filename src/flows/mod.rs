//! Flows module - Multi-step operations built on core and backends
//!
//! Provides:
//! - aggregate: Read matched files and join them under path headers
//! - extract: Archive (or directory) in, combined text and token count out

pub mod aggregate;
pub mod extract;
