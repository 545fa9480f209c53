//! Error handling for tplpack.
//!
//! This module provides:
//! - [`PkgError`]: The main error enum for all packaging operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for packaging operations.
#[derive(Error, Debug)]
pub enum PkgError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Template unavailable: {0}")]
    Template(String),

    #[error("Package key information not found at {}. Run genkey to generate a public and private key used to sign your packages", .0.display())]
    KeyMissing(PathBuf),

    #[error("Package private key or info file exists at {}. Use --replace to replace it", .0.display())]
    KeyExists(PathBuf),

    #[error("Key material error: {0}")]
    Crypto(String),

    #[error("Signature verification failed: {0}")]
    SignatureFailure(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Metadata storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PkgError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Xml(_) => ErrorCode::SerializationError,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Template(_) => ErrorCode::TemplateUnavailable,
            Self::KeyMissing(_) => ErrorCode::KeyMissing,
            Self::KeyExists(_) => ErrorCode::KeyExists,
            Self::Crypto(_) => ErrorCode::KeyInvalid,
            Self::SignatureFailure(_) => ErrorCode::SignatureFailure,
            Self::InvalidPackage(_) => ErrorCode::PackageInvalid,
            Self::Storage(_) => ErrorCode::StorageError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::KeyMissing(path) | Self::KeyExists(path) => {
                Some(serde_json::json!({ "key_dir": path.display().to_string() }))
            }
            Self::NotFound(what) => Some(serde_json::json!({ "resource": what })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_pkg_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "KEY_MISSING")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 201)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "keys", "package")
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_pkg_error(err: &PkgError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&PkgError> for StructuredError {
    fn from(err: &PkgError) -> Self {
        Self::from_pkg_error(err)
    }
}

/// Result type alias using `PkgError`.
pub type Result<T> = std::result::Result<T, PkgError>;
