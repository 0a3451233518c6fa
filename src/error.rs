//! Domain-specific error types for the provisioning engine.
//!
//! Internal modules return typed errors (e.g., [`ProfileError`],
//! [`PlatformError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error types
//!
//! ```text
//! ProfileError    : profile lookup, parsing, inheritance
//! PlatformError   : backend selection for the detected OS
//! RepositoryError : repository descriptors a backend rejects
//! ```
//!
//! External process failures are absent: they are captured in
//! [`CommandResult`](crate::exec::CommandResult) values, never raised.

use thiserror::Error;

/// Errors that arise while loading and resolving profile documents.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The requested profile has no backing document.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// A profile names a parent that has no backing document.
    #[error("Parent profile not found: {parent} (inherited by {child})")]
    ParentNotFound {
        /// Name of the missing parent.
        parent: String,
        /// Name of the profile that declared the `inherit` field.
        child: String,
    },

    /// The inheritance chain loops back on itself.
    #[error("Circular profile inheritance: {0}")]
    CircularInheritance(String),

    /// The document exists but could not be deserialized.
    #[error("Invalid profile document {path}: {message}")]
    Parse {
        /// Path of the offending document.
        path: String,
        /// Deserializer message.
        message: String,
    },

    /// An I/O error occurred while reading a profile document.
    #[error("IO error reading profile {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised when selecting a backend for the detected OS family.
///
/// `NotImplemented` is a gap in the supported families; `Unsupported` means
/// the host is not a platform the tool knows about at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The family is recognized but has no backend yet.
    #[error("{operation} is not implemented for {family}")]
    NotImplemented {
        /// Backend kind that was requested (e.g., `"package management"`).
        operation: String,
        /// Display name of the OS family.
        family: String,
    },

    /// The family is not recognized.
    #[error("{operation} is not supported on this platform ({family})")]
    Unsupported {
        /// Backend kind that was requested.
        operation: String,
        /// Display name of the OS family.
        family: String,
    },
}

/// Errors raised by a repository backend for descriptors it cannot handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The descriptor's `type` is not known to the active backend.
    #[error("Repository type '{kind}' is not supported on {platform}")]
    UnsupportedType {
        /// The descriptor's type tag.
        kind: String,
        /// Platform the backend targets.
        platform: String,
    },

    /// The descriptor lacks a field its type requires.
    #[error("Repository '{name}' of type '{kind}' is missing a {field}")]
    MissingField {
        /// Repository name.
        name: String,
        /// The descriptor's type tag.
        kind: String,
        /// Name of the missing field.
        field: &'static str,
    },
}
