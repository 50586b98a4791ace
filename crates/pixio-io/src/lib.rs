//! # pixio-io
//!
//! Image file I/O for media viewers and playback tools.
//!
//! - **DPX** - film scans, 8/10/12/16-bit, both byte orders
//! - **EXR** - OpenEXR half/float, layers grouped from channel names
//! - **TIFF** - 8/16/32-bit and float, several compressions
//! - **PNG** - 8/16-bit with text chunks
//!
//! Every format reads into a [`pixio_core::PixelData`] plus string
//! [`Tags`], wrapped in an [`Image`].
//!
//! # Architecture
//!
//! - [`SequenceRead`] / [`SequenceWrite`] - per-format reader and writer
//!   traits with serializable options
//! - [`Plugin`] - picks the format from a file extension and dispatches
//! - [`sequence::Sequence`] - maps frame numbers to file names
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pixio_io::{read, write};
//!
//! let image = read("plate.1001.dpx")?;
//! println!("{}x{} {}", image.width(), image.height(), image.pixels.pixel_type());
//! write("plate.1001.tif", &image)?;
//! # Ok::<(), pixio_io::IoError>(())
//! ```
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Depths | Notes |
//! |--------|------|-------|--------|-------|
//! | DPX | Yes | Yes | 8, 10, 12, 16 | Film/TV headers as tags, proxy decode |
//! | EXR | Yes | Yes | 16f, 32f | Channel grouping, all codecs |
//! | TIFF | Yes | Yes | 8, 16, 32, 32f | None/LZW/Deflate/PackBits |
//! | PNG | Yes | Yes | 8, 16 | tEXt chunks |
//!
//! # Feature Flags
//!
//! - `dpx`, `png`, `tiff`, `exr` - enabled by default

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod info;
pub mod plugin;
pub mod sequence;
pub mod tags;

#[cfg(feature = "dpx")]
pub mod dpx;
#[cfg(feature = "exr")]
pub mod exr;
#[cfg(feature = "png")]
pub mod png;
#[cfg(feature = "tiff")]
pub mod tiff;

pub use error::{IoError, IoResult};
pub use image::Image;
pub use info::Info;
pub use plugin::{read, read_info, write, Plugin, SequenceRead, SequenceWrite};
pub use sequence::{FrameRange, Sequence};
pub use tags::Tags;
