//! Error types for the delogo crate.

/// Errors that can occur during watermark detection and restoration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The watermark template is unusable (unreadable, empty, or degenerate).
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image decode or encode.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A video could not be opened, decoded, or encoded.
    #[error("video error: {0}")]
    Video(String),

    /// Frame processing failed mid-stream.
    #[error("processing error: {0}")]
    Processing(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
