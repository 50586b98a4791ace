//! Error types for image I/O.
//!
//! Low-level file failures arrive wrapped as [`IoError::File`]; format
//! failures carry a human-readable diagnostic. Nothing here is retried, and
//! a failed write leaves whatever was already written on disk.

use pixio_core::FileError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Image I/O error.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failure from the binary file layer (open, truncation, write).
    #[error(transparent)]
    File(#[from] FileError),

    /// OS error raised by an external codec's own file handling.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with a recognized magic number.
    #[error("{}: bad magic number {magic:02X?}", path.display())]
    BadMagic {
        /// File being read
        path: PathBuf,
        /// The bytes found
        magic: [u8; 4],
    },

    /// The channel layout or bit depth cannot be represented.
    #[error("unsupported pixel layout: {0}")]
    UnsupportedPixelLayout(String),

    /// Header fields are inconsistent.
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// No plugin handles this file.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An external codec rejected the data.
    #[error("codec error: {0}")]
    Codec(String),

    /// Options document could not be mapped onto an options struct.
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// A frame pattern or file name could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl IoError {
    /// Returns `true` if the underlying file was shorter than its header
    /// promised.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::File(e) if e.is_truncated())
    }
}

/// Result type for image I/O.
pub type IoResult<T> = Result<T, IoError>;
