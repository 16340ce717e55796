use thiserror::Error;

/// Errors produced by the viewer pipeline.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Failed to decode PDF: {0}")]
    Decode(String),

    #[error("Failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("Page index {index} out of bounds (page count {page_count})")]
    Bounds { index: usize, page_count: usize },

    #[error("No document loaded")]
    NoDocument,

    #[error("Invalid zoom factor: {0}")]
    InvalidZoom(f32),

    #[error("View is already cropped")]
    AlreadyCropped,

    #[error("View is not cropped")]
    NotCropped,

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Load was superseded by a newer request")]
    StaleLoad,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A load failure whose message crossed a thread or task boundary.
    #[error("{0}")]
    Load(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
