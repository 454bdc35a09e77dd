//! Error types for pgrstream

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while reading or writing a stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Container file is malformed
    #[error("Invalid stream format: {0}")]
    InvalidFormat(String),

    /// Container uses an encoding profile this engine does not handle
    #[error(
        "Unsupported stream profile: data format {data_format}, resolution {resolution}, \
         stippled format {stippled_format}"
    )]
    UnsupportedProfile {
        /// Data format tag found in the header
        data_format: u32,
        /// Resolution tag found in the header
        resolution: u32,
        /// Colour filter tag found in the header
        stippled_format: u32,
    },

    /// A container file is already open
    #[error("A stream file is already open")]
    AlreadyOpen,

    /// No container file is open
    #[error("No stream file is open")]
    NotOpen,

    /// Read cursor is past the last frame
    #[error("End of stream reached")]
    EndOfStream,

    /// Requested frame does not exist
    #[error("Frame {frame} out of range: stream has {total} frames")]
    FrameOutOfRange {
        /// Requested frame
        frame: u64,
        /// Total number of frames in the stream
        total: u64,
    },

    /// Stream file not found
    #[error("Stream file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Name does not follow the `<base>-NNNNNN.pgr` pattern
    #[error("Invalid stream file name: {0}")]
    InvalidFileName(String),

    /// Frame cannot fit into a container file
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: u64,
        /// Size limit
        limit: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
