//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Template and dependency errors
//! - 2xx: Key material errors
//! - 3xx: Config errors
//! - 4xx: Package errors
//! - 6xx: Storage errors
//! - 8xx: Validation errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `KeyMissing` -> E201).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Template errors (1xx)
    // ========================================
    /// E101: Template document could not be exported or read
    TemplateUnavailable,

    // ========================================
    // Key errors (2xx)
    // ========================================
    /// E201: No author keypair has been configured
    KeyMissing,
    /// E202: A keypair already exists and replace was not requested
    KeyExists,
    /// E203: Key material could not be parsed or generated
    KeyInvalid,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Package errors (4xx)
    // ========================================
    /// E401: The document signature did not verify after signing
    SignatureFailure,
    /// E402: A package archive is malformed
    PackageInvalid,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Metadata store is unreachable or unwritable
    StorageError,
    /// E604: Database operation failed
    DatabaseError,
    /// E605: Serialization/deserialization failed
    SerializationError,

    // ========================================
    // Validation errors (8xx)
    // ========================================
    /// E801: A required argument or field is missing or malformed
    ValidationFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E905: Generic not found (catch-all)
    NotFound,
    /// E906: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `KeyMissing` -> 201).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::TemplateUnavailable => 101,

            Self::KeyMissing => 201,
            Self::KeyExists => 202,
            Self::KeyInvalid => 203,

            Self::ConfigInvalid => 301,

            Self::SignatureFailure => 401,
            Self::PackageInvalid => 402,

            Self::StorageError => 601,
            Self::DatabaseError => 604,
            Self::SerializationError => 605,

            Self::ValidationFailed => 801,

            Self::NotFound => 905,
            Self::IoError => 906,
        }
    }

    /// Get the error code as a formatted string (e.g., "E201").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::TemplateUnavailable => "Check that the template export exists and is readable",
            Self::KeyMissing => "Run `genkey --generate --author=<name> --homepage=<url> --email=<address>` to create your signing key first",
            Self::KeyExists => "Pass --replace to overwrite the existing keypair. Packages signed with the old key will no longer match",
            Self::KeyInvalid => "Check that the key files are PEM encoded RSA keys and that the private and public key belong together",
            Self::ConfigInvalid => "Check TOML syntax in the config file and the TPLPACK_* environment variables",
            Self::SignatureFailure => "The package was not written. Regenerate the keypair with `genkey --replace` if the key files were changed",
            Self::PackageInvalid => "The package archive is corrupted or was not produced by tplpack. Rebuild it from the template",
            Self::StorageError => "Check write permissions on the package cache directory",
            Self::DatabaseError => "The metadata database may be corrupted. Move package.db aside and package again",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::ValidationFailed => "Review the reported argument and run the command with --help for usage",
            Self::NotFound => "The requested resource was not found. Check the path or identifier",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::TemplateUnavailable
            | Self::KeyMissing
            | Self::KeyExists
            | Self::KeyInvalid
            | Self::ConfigInvalid
            | Self::StorageError
            | Self::ValidationFailed
            | Self::NotFound
            | Self::IoError => true,

            Self::SignatureFailure
            | Self::PackageInvalid
            | Self::DatabaseError
            | Self::SerializationError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "template",
            2 => "keys",
            3 => "config",
            4 => "package",
            6 => "storage",
            8 => "validation",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::TemplateUnavailable,
            Self::KeyMissing,
            Self::KeyExists,
            Self::KeyInvalid,
            Self::ConfigInvalid,
            Self::SignatureFailure,
            Self::PackageInvalid,
            Self::StorageError,
            Self::DatabaseError,
            Self::SerializationError,
            Self::ValidationFailed,
            Self::NotFound,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
