//! Error types for identifier construction.

use thiserror::Error;

/// Errors raised while deriving resource identifiers.
///
/// All of these are construction-time failures: they are reported
/// synchronously while a deployment is being declared and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// The type tag is not part of the supported vocabulary
    #[error("unknown resource type tag: '{0}'")]
    UnknownKind(String),

    /// A naming context field has no usable characters
    #[error("naming context field '{field}' is empty after sanitizing '{raw}'")]
    EmptyComponent {
        /// Which field of the context was empty
        field: &'static str,
        /// The value as supplied by the caller
        raw: String,
    },

    /// The derived name came out empty
    #[error("derived name for '{tag}' is empty")]
    EmptyName {
        /// Type tag the name was built for
        tag: String,
    },

    /// A caller tried to replace a tag the builder set
    #[error("tag '{key}' is reserved (builder value '{existing}', caller value '{attempted}')")]
    TagConflict {
        key: String,
        existing: String,
        attempted: String,
    },
}

/// Result type for naming operations.
pub type Result<T> = std::result::Result<T, NamingError>;
