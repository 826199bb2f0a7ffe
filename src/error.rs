//! Error types for adx-query
//!
//! Fatal conditions get a typed variant; non-fatal conditions (schema/header
//! mismatch, an unresolved projection attribute, a missing attribute on a
//! single entry) are surfaced through `log::warn!` or collected on the
//! caller's side instead of raised here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for adx-query operations.
#[derive(Error, Debug)]
pub enum AdxError {
    #[error("snapshot file not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated file: {0}")]
    TruncatedFile(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("filter syntax error: {0}")]
    FilterSyntax(String),
}

/// Result type alias for adx-query operations.
pub type Result<T> = std::result::Result<T, AdxError>;
