//! Error types for karta operations.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KartaError>;

/// All failure modes surfaced by the karta core.
///
/// Selection and classification deliberately degrade rather than error in a
/// few documented places: `clean` drops unrepairable features from its
/// output instead of failing, since downstream callers depend on the
/// resulting feature counts.
#[derive(Debug, Error)]
pub enum KartaError {
    /// A required option was not supplied, e.g. `radius` for a
    /// distance-based selection.
    #[error("'{operation}' requires the '{param}' parameter")]
    MissingParameter {
        operation: &'static str,
        param: &'static str,
    },

    /// A spatial predicate name did not parse.
    #[error("unknown spatial predicate: {0}")]
    UnknownPredicate(String),

    /// A mode string (colorize mode, sort order, break mode) did not parse.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// The operation cannot handle the given geometry kind, e.g. geodetic
    /// buffering of lines or cutting point data.
    #[error("'{operation}' does not support {kind} geometries")]
    UnsupportedGeometryType {
        operation: &'static str,
        kind: &'static str,
    },

    /// A spatial index was queried before it was built. Collection-level
    /// queries auto-build and never surface this; it can only come from the
    /// raw index accessor.
    #[error("spatial index queried before build")]
    IndexNotBuilt,

    /// An operation that needs at least one usable dataset got none.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// A row length did not match its collection's field count, or field
    /// names collided.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The projection collaborator rejected a CRS definition or transform.
    #[error("projection error: {0}")]
    Projection(String),

    /// Malformed input that is not one of the more specific cases above.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
