//! Error types used by the crate.

use geoscene_formats::FormatError;
use thiserror::Error;

/// Error evaluating an appearance expression. Scoped to the single property being resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// Expression text cannot be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// A define references itself, directly or through other defines.
    #[error("cyclic define: {0}")]
    CyclicDefine(String),
    /// Call of a function that does not exist.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// A function was called with a wrong number of arguments.
    #[error("function `{name}` expects {expected} arguments, got {found}")]
    Arity {
        /// Function name.
        name: String,
        /// Human readable description of the accepted argument count.
        expected: String,
        /// Number of arguments given.
        found: usize,
    },
}

/// Error of a layer store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No layer with the given id.
    #[error("layer `{0}` not found")]
    LayerNotFound(String),
    /// A layer with the given id is already in the store.
    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),
    /// Several features of the layer share the requested id.
    #[error("feature id `{feature}` is not unique in layer `{layer}`")]
    AmbiguousFeature {
        /// Layer id.
        layer: String,
        /// Feature id.
        feature: String,
    },
    /// The layer has no data source to read a document with.
    #[error("layer `{0}` has no data source")]
    NoDataSource(String),
    /// The data document cannot be read.
    #[error("failed to read layer data")]
    Format(#[from] FormatError),
}
