use thiserror::Error;

/// Recoverable failures of the viewing core.
///
/// None of these are fatal: the operation that reports one leaves the
/// pipeline, clip box, slice and annotation state exactly as it found them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewerError {
    #[error("Degenerate geometry: zero-length or parallel direction")]
    DegenerateGeometry,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Clip box is not planar enough to extract a slice")]
    NotPlanar,

    #[error("Annotation text is empty")]
    EmptyAnnotationText,

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Evaluation was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ViewerError>;
