use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrainSketchError {
    #[error("sketches with different precisions cannot be compared: {p1} != {p2}")]
    PrecisionMismatch { p1: usize, p2: usize },

    #[error("different ksizes cannot be compared")]
    MismatchKSizes,

    #[error("mismatch in seed; comparison fail")]
    MismatchSeed,

    #[error("corrupt sketch: {message}")]
    CorruptSketch { message: String },

    #[error("sketch not found: {path}")]
    NotFound { path: String },

    #[error("Set precision to a value between 4 and 18 (error rate between 0.26 and 0.00203125)")]
    HLLPrecisionBounds,

    #[error("ksize must be at least 1")]
    InvalidKsize,

    #[error("invalid DNA character in input k-mer: {message}")]
    InvalidDNA { message: String },

    #[error(transparent)]
    NifflerError(#[from] niffler::Error),

    #[error(transparent)]
    NeedletailError(#[from] needletail::errors::ParseError),

    #[error(transparent)]
    CsvError(#[from] csv::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::error::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl StrainSketchError {
    pub(crate) fn corrupt<S: Into<String>>(message: S) -> Self {
        StrainSketchError::CorruptSketch {
            message: message.into(),
        }
    }
}
