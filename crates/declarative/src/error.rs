//! Error types for graph construction and resolution.
//!
//! Two families are kept apart:
//! - [`ConstructionError`]: raised synchronously while declaring, fatal
//! - [`ResolutionError`]: carried through deferred cells to every dependent

use crate::deferred::CellId;
use naming::{NamingError, ResourceKind};
use std::fmt;
use thiserror::Error;

/// Errors raised while building the graph. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// The identifier builder rejected the inputs
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Binding a cell would make it derive from itself
    #[error("{cell} would depend on itself")]
    CellCycle { cell: CellId },

    /// Descriptors that can never be ordered
    #[error("dependency cycle between: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    /// Explicit dependency on a descriptor declared in another stack
    #[error("'{name}' depends on a resource from a different stack")]
    ForeignDependency { name: String },

    /// Two descriptors derived the same name
    #[error("name '{name}' was already derived in this stack")]
    NameCollision { name: String },
}

/// Broad classes of backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorCategory {
    /// Caller is not allowed to create the resource
    Authorization,
    /// Subscription or service limits reached
    Quota,
    /// Resource exists in an incompatible state
    Conflict,
    /// Something the request refers to does not exist
    NotFound,
    /// Anything else
    Other,
}

impl BackendErrorCategory {
    /// Get a user-friendly description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Authorization => "authorization failed",
            Self::Quota => "quota exceeded",
            Self::Conflict => "conflict",
            Self::NotFound => "not found",
            Self::Other => "backend error",
        }
    }
}

impl fmt::Display for BackendErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure reported by a provisioning backend. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category}: {message}")]
pub struct BackendError {
    pub category: BackendErrorCategory,
    pub message: String,
}

impl BackendError {
    pub fn new(category: BackendErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCategory::Quota, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCategory::Other, message)
    }
}

/// Why a deferred cell failed.
///
/// Cloned unchanged into every derived cell, so the root cause reaches the
/// final output report intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The backend could not realize a descriptor
    #[error("{kind} '{name}' failed: {error}")]
    Backend {
        kind: ResourceKind,
        name: String,
        #[source]
        error: BackendError,
    },

    /// Not dispatched because the run stopped at an earlier failure
    #[error("'{name}' was cancelled after an earlier failure")]
    Cancelled { name: String },

    /// A preview-only placeholder reached a real apply
    #[error("parameter '{parameter}' of '{name}' is a preview placeholder, not a real value")]
    PlaceholderInput { name: String, parameter: String },

    /// An input was still pending when its descriptor was dispatched
    #[error("parameter '{parameter}' of '{name}' never resolved")]
    Unresolved { name: String, parameter: String },

    /// An output field had an unexpected shape
    #[error("output '{field}' is not a {expected} (found {found})")]
    Conversion {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// Declaring a descriptor failed while the graph was resolving
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// A value could not be turned into an output
    #[error("serialization failed: {0}")]
    Serialization(String),
}
