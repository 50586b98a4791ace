//! # pixio-core
//!
//! Core types for media file I/O.
//!
//! - [`FileIo`] - endian-aware binary file access with memory mapping
//! - [`PixelDataInfo`], [`PixelData`] - image buffer shape and storage
//! - [`audio::AudioData`] - PCM buffers, sample conversion and channel kernels
//! - [`Endian`] - byte order
//! - [`FileError`] - errors raised by all of the above
//!
//! ## Crate Structure
//!
//! ```text
//! pixio-core (this crate)
//!    ^
//!    |
//!    +-- pixio-io (DPX, PNG, TIFF, OpenEXR codecs)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pixio_core::{PixelData, PixelDataInfo, PixelType};
//!
//! let mut info = PixelDataInfo::new(3, 2, PixelType::RGB_U8);
//! info.align = 4;
//! let image = PixelData::new(info);
//! assert_eq!(image.scanline_byte_count(), 12);
//! assert_eq!(image.data_byte_count(), 24);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod audio;
pub mod endian;
pub mod error;
pub mod file_io;
pub mod pixel;

pub use endian::Endian;
pub use error::{FileError, FileResult};
pub use file_io::{FileIo, Mode};
pub use pixel::{DataType, Layout, Mirror, PixelData, PixelDataInfo, PixelType, Proxy};
