//! Error types for clip decoding, encoding and loudness measurement

use thiserror::Error;

/// Result type for loudness engine operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur while decoding, encoding or measuring a clip
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// Buffer is too short to hold the container header or a declared chunk
    #[error("Truncated input: needed {needed} bytes, got {actual}")]
    TruncatedInput { needed: usize, actual: usize },

    /// Container tags are missing or wrong
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// A required chunk (`fmt ` or `data`) was not found
    #[error("Missing required chunk: {0:?}")]
    MissingChunk(&'static str),

    /// Non-PCM format tag, non-16-bit depth, or channels of unequal length
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Bilinear transform produced a zero normalizing coefficient
    #[error("Invalid filter design at {0} Hz: normalizing coefficient is zero")]
    InvalidFilterDesign(u32),

    /// Encode was asked for a clip with no channels
    #[error("Audio has no channels")]
    ZeroChannelAudio,

    /// Sample rate of zero in a header or clip
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Portable text was not valid base64
    #[error("Invalid portable text: {0}")]
    InvalidPortableText(#[from] base64::DecodeError),

    /// Normalization target contains unusable values
    #[error("Invalid normalization target: {0}")]
    InvalidTarget(String),
}
