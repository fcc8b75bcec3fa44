//! Error types for tile image decoding.

use thiserror::Error;

/// Errors that can occur while turning a fetched payload into a texture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureError {
    /// The payload was empty.
    #[error("Empty image payload")]
    Empty,

    /// The payload could not be decoded as an image.
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),

    /// The decoded image has a zero-sized dimension.
    #[error("Invalid dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The background decode task did not complete.
    #[error("Decode task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_error_display_decode_failed() {
        let err = TextureError::DecodeFailed("bad header".to_string());
        assert_eq!(err.to_string(), "Decoding failed: bad header");
    }

    #[test]
    fn test_texture_error_display_invalid_dimensions() {
        let err = TextureError::InvalidDimensions {
            width: 0,
            height: 256,
        };
        assert_eq!(err.to_string(), "Invalid dimensions 0×256");
    }
}
