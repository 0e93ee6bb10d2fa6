use geoscene_types::error::TypesError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("document is not valid utf-8")]
    Encoding,

    #[error("malformed xml: {0}")]
    Xml(String),

    #[error("malformed json: {0}")]
    Json(String),

    #[error("missing geometry field: {0}")]
    MissingGeometryField(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error(transparent)]
    Geometry(#[from] TypesError),
}

impl FormatError {
    /// Entry-scoped errors only drop the entry they occurred in. The rest abort the whole document.
    pub fn is_entry_scoped(&self) -> bool {
        matches!(
            self,
            FormatError::MissingGeometryField(_)
                | FormatError::InvalidCoordinates(_)
                | FormatError::InvalidEntry(_)
                | FormatError::Geometry(_)
        )
    }
}
