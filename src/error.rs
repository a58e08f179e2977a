//! Error types for dependency wiring

use std::any::type_name;
use thiserror::Error;

/// Errors surfaced to callers of the position-scoped configurator.
///
/// Resolution misses are deliberately not represented here: a miss is a
/// wiring bug, so it goes through the registry's injectable miss policy
/// instead of a `Result`.
#[derive(Error, Debug)]
pub enum WireError {
    /// A view handle could not be bound against the requested capability
    /// because the underlying view is already gone.
    #[error("cannot bind {concrete} as {capability}")]
    CapabilityMismatch {
        concrete: &'static str,
        capability: &'static str,
    },

    /// The same weak handle allocation was used for more than one binding.
    #[error("cannot use the same weak handle for more than one binding")]
    DuplicateWeakHandle,

    /// A per-position dependency build ran with required views or one-shot
    /// arguments missing.
    #[error("cannot build {dependency} at row {row}, section {section}")]
    BuildFailed {
        dependency: &'static str,
        row: usize,
        section: usize,
    },
}

impl WireError {
    /// Create a `CapabilityMismatch` error for a handle type and a capability
    #[inline]
    pub fn capability_mismatch<V: ?Sized + 'static, C: ?Sized + 'static>() -> Self {
        Self::CapabilityMismatch {
            concrete: type_name::<V>(),
            capability: type_name::<C>(),
        }
    }

    /// Create a `BuildFailed` error for a dependency type at a position
    #[inline]
    pub fn build_failed<D: 'static>(row: usize, section: usize) -> Self {
        Self::BuildFailed {
            dependency: type_name::<D>(),
            row,
            section,
        }
    }
}

/// Result type alias for wiring operations
pub type Result<T> = std::result::Result<T, WireError>;
