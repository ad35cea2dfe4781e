use displaydoc::Display;
use thiserror::Error;

/// Plan compilation errors.
///
/// Every variant is terminal for the compilation that raised it: no partial
/// plan is produced and nothing is retried, since each one signals a
/// query/schema mismatch rather than a transient condition. Whether a
/// failure surfaces on the query's error channel or falls back to an
/// unprojected load is the embedding engine's policy.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PopulateError {
    /// no entity registered under the name '{0}'
    UnknownEntity(String),
    /// fragment spread cycle detected while resolving fragment '{0}'
    CyclicFragment(String),
    /// inline fragment type condition '{0}' does not name a registered entity
    InvalidTypeCondition(String),
    /// cannot resolve field '{field}' on entity '{entity}'
    UnresolvedReference {
        /// Dotted field path, relative to its relation boundary.
        field: String,
        /// Entity the field was resolved against. For a polymorphic target
        /// this is the subtype names joined with '|', since the field
        /// matched none of them.
        entity: String,
    },
}
