//! Error types for the soundboard client

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packed blob framing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Chunk {index} is {len} bytes, exceeds the 16-bit length prefix")]
    ChunkTooLarge { index: usize, len: usize },

    #[error("Truncated stream at offset {offset}: expected {expected} bytes, {available} available")]
    TruncatedStream {
        offset: usize,
        expected: usize,
        available: usize,
    },
}

/// Codec errors
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(usize),
}

/// Transcoding pipeline errors
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to decode source audio: {0}")]
    Decode(String),

    #[error("Unsupported channel layout: {0} channels")]
    UnsupportedChannelLayout(usize),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error("Packing failed: {0}")]
    Framing(#[from] FramingError),
}

/// Session and transport errors
///
/// Cloneable so that the outcome of a single connection attempt can be
/// handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Guild id and/or channel id not set")]
    IdentityNotConfigured,

    #[error("Invalid server endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection attempt timed out after {0} ms")]
    ConnectTimeout(u64),

    #[error("Disconnected from server")]
    Disconnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload rejected with status {status}")]
    UploadRejected { status: u16 },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_failure_message() {
        let err = Error::from(TranscodeError::from(CodecError::EncodingFailed("bad frame".into())));
        assert_eq!(err.to_string(), "Transcode error: Encoding failed: bad frame");
    }

    #[test]
    fn test_upload_rejected_message() {
        let err = Error::from(SessionError::UploadRejected { status: 500 });
        assert_eq!(err.to_string(), "Session error: Upload rejected with status 500");
    }
}
