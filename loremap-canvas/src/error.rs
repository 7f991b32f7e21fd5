//! Canvas error types.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur while drawing or (de)serializing the sketch.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Surface dimensions were zero or too large.
    #[error("Invalid surface dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Colour string could not be parsed.
    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    /// Data URI was malformed.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Surface could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(String),
}
