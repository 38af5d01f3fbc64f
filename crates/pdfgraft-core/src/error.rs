use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfGraftError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("{operation}: page index {index} out of range (document has {count} pages)")]
    PageOutOfRange {
        operation: &'static str,
        index: i64,
        count: usize,
    },

    /// Carries the 1-based page number, as hosts display it
    #[error("invalid page number: {0}")]
    InvalidPageNumber(usize),

    #[error("{operation}: document has been destroyed")]
    DocumentDestroyed { operation: &'static str },

    #[error("Invalid page dimensions: {width} x {height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("Invalid rotation {0}: must be a multiple of 90 degrees")]
    InvalidRotation(i64),

    #[error("Malformed page label: {0}")]
    MalformedLabel(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Graft map belongs to another destination document")]
    GraftMapMismatch,

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid option: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}
