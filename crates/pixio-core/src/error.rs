//! Error types for pixio-core operations.
//!
//! The binary file primitive and the buffer types report failures through
//! [`FileError`]. Every failure is fatal to the operation in flight; nothing
//! in this crate retries.
//!
//! # Usage
//!
//! ```rust
//! use pixio_core::{FileError, FileIo, Mode};
//!
//! let mut io = FileIo::new();
//! let err = io.open("", Mode::Read).unwrap_err();
//! assert!(matches!(err, FileError::CannotOpen { .. }));
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`FileError`] as the error type.
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Errors raised by [`crate::FileIo`] and the buffer types built on it.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path could not be opened in the requested mode.
    #[error("{}: cannot open file: {source}", path.display())]
    CannotOpen {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// An operation was attempted on a handle that is not open.
    #[error("file is not open")]
    NotOpen,

    /// Fewer bytes were available than requested.
    ///
    /// Returned for short reads, including reads after seeking past the end
    /// of a read-only file.
    #[error("{}: truncated: requested {requested} bytes at offset {pos}, {available} available", path.display())]
    Truncated {
        /// File being read
        path: PathBuf,
        /// Byte offset of the read
        pos: u64,
        /// Bytes requested
        requested: usize,
        /// Bytes actually available
        available: usize,
    },

    /// The operating system rejected a read.
    #[error("{}: read failed: {source}", path.display())]
    ReadFailed {
        /// File being read
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The operating system rejected a write (disk full, permissions, ...).
    #[error("{}: write failed: {source}", path.display())]
    WriteFailed {
        /// File being written
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Repositioning the file failed.
    #[error("{}: cannot seek to {pos}: {source}", path.display())]
    Seek {
        /// File being positioned
        path: PathBuf,
        /// Requested absolute position
        pos: u64,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A caller-provided buffer does not match the size its shape requires.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize {
        /// Bytes required
        expected: usize,
        /// Bytes provided
        actual: usize,
    },
}

impl FileError {
    /// Returns `true` for [`FileError::Truncated`].
    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Returns `true` for [`FileError::CannotOpen`].
    #[inline]
    pub fn is_cannot_open(&self) -> bool {
        matches!(self, Self::CannotOpen { .. })
    }
}
