//! DPX (Digital Picture Exchange) format support.
//!
//! Film-scan frames per SMPTE 268M. One image element per file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pixio_io::dpx;
//!
//! let image = dpx::read("scan.0001.dpx")?;
//! dpx::write("copy.0001.dpx", &image)?;
//! # Ok::<(), pixio_io::IoError>(())
//! ```
//!
//! # Pixel Layouts
//!
//! | Bits | Layouts        | Memory type | Packing        |
//! |------|----------------|-------------|----------------|
//! | 8    | L, RGB, RGBA   | U8          | any            |
//! | 10   | RGB            | U10         | Type A, Type B |
//! | 12   | L, RGB, RGBA   | U16 (`v<<4`) | Type A, Type B |
//! | 16   | L, RGB, RGBA   | U16         | any            |
//!
//! Anything else fails with [`IoError::UnsupportedPixelLayout`].
//!
//! # Byte Order
//!
//! Files start with `SDPX` (big endian) or `XPDS` (little endian). Reading
//! follows the file; writing follows [`Options::endian`].
//!
//! # Fast Path
//!
//! Files without line padding or Type B packing, read at full resolution,
//! come back as a zero-copy view of the memory-mapped file when no byte
//! swapping is needed.

pub mod header;
pub mod packing;

pub use header::Header;

use crate::image::swap_red_blue;
use crate::plugin::{SequenceRead, SequenceWrite};
use crate::{Image, Info, IoError, IoResult};
use pixio_core::{FileError, FileIo, Layout, Mirror, Mode, PixelData, PixelDataInfo, Proxy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// File format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Version {
    /// SMPTE 268M-1994.
    #[serde(rename = "1.0")]
    V1_0,
    /// SMPTE 268M-2003.
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

impl Version {
    /// Header version string.
    pub const fn label(self) -> &'static str {
        match self {
            Self::V1_0 => "V1.0",
            Self::V2_0 => "V2.0",
        }
    }
}

/// Byte order used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endian {
    /// Host byte order.
    Auto,
    /// Big endian (`SDPX`).
    #[default]
    Msb,
    /// Little endian (`XPDS`).
    Lsb,
}

impl Endian {
    /// Concrete byte order.
    pub fn resolve(self) -> pixio_core::Endian {
        match self {
            Self::Auto => pixio_core::Endian::native(),
            Self::Msb => pixio_core::Endian::Msb,
            Self::Lsb => pixio_core::Endian::Lsb,
        }
    }
}

/// Image orientation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Orient {
    /// Left to right, top to bottom.
    LeftRightTopBottom = 0,
    /// Right to left, top to bottom.
    RightLeftTopBottom = 1,
    /// Left to right, bottom to top.
    LeftRightBottomTop = 2,
    /// Right to left, bottom to top.
    RightLeftBottomTop = 3,
    /// Top to bottom, left to right.
    TopBottomLeftRight = 4,
    /// Top to bottom, right to left.
    TopBottomRightLeft = 5,
    /// Bottom to top, left to right.
    BottomTopLeftRight = 6,
    /// Bottom to top, right to left.
    BottomTopRightLeft = 7,
}

impl Orient {
    const ALL: [Self; 8] = [
        Self::LeftRightTopBottom,
        Self::RightLeftTopBottom,
        Self::LeftRightBottomTop,
        Self::RightLeftBottomTop,
        Self::TopBottomLeftRight,
        Self::TopBottomRightLeft,
        Self::BottomTopLeftRight,
        Self::BottomTopRightLeft,
    ];

    /// Decodes a header value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Columns and rows are swapped.
    pub fn is_transposed(self) -> bool {
        self as u16 >= 4
    }

    /// Axis flips, ignoring any transpose.
    pub fn mirror(self) -> Mirror {
        let v = self as u16 & 3;
        Mirror::new(v & 1 != 0, v & 2 != 0)
    }
}

/// Image element descriptor codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Descriptor {
    User = 0,
    R = 1,
    G = 2,
    B = 3,
    A = 4,
    L = 6,
    Chroma = 7,
    Z = 8,
    CompositeVideo = 9,
    Rgb = 50,
    Rgba = 51,
    Abgr = 52,
    Cbycry = 100,
    Cbyacrya = 101,
    Cbycr = 102,
    Cbycra = 103,
    User2 = 150,
    User3 = 151,
    User4 = 152,
    User5 = 153,
    User6 = 154,
    User7 = 155,
    User8 = 156,
}

impl Descriptor {
    /// Decodes a header value.
    pub fn from_u8(value: u8) -> Option<Self> {
        use Descriptor::*;
        Some(match value {
            0 => User,
            1 => R,
            2 => G,
            3 => B,
            4 => A,
            6 => L,
            7 => Chroma,
            8 => Z,
            9 => CompositeVideo,
            50 => Rgb,
            51 => Rgba,
            52 => Abgr,
            100 => Cbycry,
            101 => Cbyacrya,
            102 => Cbycr,
            103 => Cbycra,
            150 => User2,
            151 => User3,
            152 => User4,
            153 => User5,
            154 => User6,
            155 => User7,
            156 => User8,
            _ => return None,
        })
    }
}

/// Color transfer characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Transfer {
    /// User defined.
    User = 0,
    /// Printing density.
    #[default]
    FilmPrint = 1,
    /// Linear.
    Linear = 2,
    /// Logarithmic.
    Log = 3,
    /// Unspecified video.
    Video = 4,
    /// SMPTE 274M.
    Smpte274M = 5,
    /// ITU-R 709-4.
    ItuR709_4 = 6,
    /// ITU-R 601-5 system B or G.
    ItuR601_5BOrG = 7,
    /// ITU-R 601-5 system M.
    ItuR601_5M = 8,
    /// NTSC composite video.
    Ntsc = 9,
    /// PAL composite video.
    Pal = 10,
    /// Z (depth), linear.
    Z = 11,
    /// Z (depth), homogeneous.
    ZHomogeneous = 12,
}

impl Transfer {
    const ALL: [Self; 13] = [
        Self::User,
        Self::FilmPrint,
        Self::Linear,
        Self::Log,
        Self::Video,
        Self::Smpte274M,
        Self::ItuR709_4,
        Self::ItuR601_5BOrG,
        Self::ItuR601_5M,
        Self::Ntsc,
        Self::Pal,
        Self::Z,
        Self::ZHomogeneous,
    ];

    /// Decodes a header value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Display label, also used for the `Transfer` tag.
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::FilmPrint => "Film Print",
            Self::Linear => "Linear",
            Self::Log => "Log",
            Self::Video => "Video",
            Self::Smpte274M => "SMPTE 274M",
            Self::ItuR709_4 => "ITU-R 709-4",
            Self::ItuR601_5BOrG => "ITU-R 601-5 B or G",
            Self::ItuR601_5M => "ITU-R 601-5 M",
            Self::Ntsc => "NTSC",
            Self::Pal => "PAL",
            Self::Z => "Z",
            Self::ZHomogeneous => "Z Homogeneous",
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Transfer {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IoError::Parse(format!("unknown DPX transfer {s:?}")))
    }
}

/// Component packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Components {
    /// Packed into 32-bit words with no padding.
    Pack = 0,
    /// Filled to 32-bit words, padding in the low bits (method A).
    TypeA = 1,
    /// Filled to 32-bit words, padding in the high bits (method B).
    TypeB = 2,
}

impl Components {
    /// Decodes a header value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Pack),
            1 => Some(Self::TypeA),
            2 => Some(Self::TypeB),
            _ => None,
        }
    }
}

/// DPX options.
///
/// Reading ignores them; the file describes itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Header version written.
    pub version: Version,
    /// Byte order written.
    pub endian: Endian,
    /// Bit depth override. `Some(12)` stores U16 data in 12 bits.
    pub bit_depth: Option<u8>,
}

/// DPX reader.
#[derive(Debug, Clone, Default)]
pub struct DpxReader {
    options: Options,
}

impl DpxReader {
    /// Creates a reader with default options.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceRead for DpxReader {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn read_info(&self, path: &Path) -> IoResult<Info> {
        let mut io = FileIo::new();
        io.open(path, Mode::Read)?;
        let (info, _, _) = header::read(&mut io)?;
        Ok(info)
    }

    fn read(&self, path: &Path) -> IoResult<Image> {
        read_image(path, Proxy::None)
    }

    fn read_proxy(&self, path: &Path, proxy: Proxy) -> IoResult<Image> {
        read_image(path, proxy)
    }
}

/// DPX writer.
#[derive(Debug, Clone, Default)]
pub struct DpxWriter {
    options: Options,
}

impl DpxWriter {
    /// Creates a writer with default options.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceWrite for DpxWriter {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn write(&self, path: &Path, image: &Image) -> IoResult<()> {
        write_image(path, image, &self.options)
    }
}

/// Reads a DPX file at full resolution.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    read_image(path.as_ref(), Proxy::None)
}

/// Reads the header of a DPX file.
pub fn read_info<P: AsRef<Path>>(path: P) -> IoResult<Info> {
    DpxReader::new().read_info(path.as_ref())
}

/// Writes a DPX file with default options (V2.0, big endian).
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    write_image(path.as_ref(), image, &Options::default())
}

/// Reads a DPX file, optionally at a reduced resolution.
///
/// Tags carry the header metadata plus the `Transfer` label.
pub fn read_image(path: &Path, proxy: Proxy) -> IoResult<Image> {
    let mut io = FileIo::new();
    io.open(path, Mode::Read)?;
    let (info, header, _) = header::read(&mut io)?;
    let Some(layer) = info.first() else {
        return Err(IoError::CorruptHeader("no image layer".into()));
    };
    let mut layer = layer.clone();
    layer.proxy = proxy;

    let data_offset = u64::from(header.data_offset());
    let line_padding = header.line_padding() as usize;
    let type_b = header.components() == Components::TypeB;
    let bit_depth = header.image.elem[0].bit_depth;
    check_pixel_extent(&io, &layer, data_offset, line_padding as u64)?;
    io.set_pos(data_offset)?;

    let mut pixels = PixelData::default();
    if line_padding == 0 && proxy == Proxy::None && !type_b && layer.align == 1 {
        pixels.set_mapped(layer, &mut io)?;
    } else {
        let pixel_bytes = layer.pixel_byte_count();
        let word_size = layer.pixel.data_type().word_size();
        let factor = proxy.factor();
        let (proxy_width, proxy_height) = layer.proxy_size();
        let line_bytes = layer.width as usize * pixel_bytes;
        let file_line = (line_bytes + line_padding) as u64;
        let out_bytes = proxy_width as usize * pixel_bytes;

        pixels.set(layer);
        let mut line = vec![0u8; line_bytes];
        for y in 0..proxy_height {
            io.set_pos(data_offset + u64::from(y * factor) * file_line)?;
            io.read(&mut line, word_size)?;
            if type_b {
                packing::unpack_type_b(&mut line, bit_depth);
            }
            let dst = &mut pixels.scanline_mut(y)[..out_bytes];
            packing::subsample(&line, dst, pixel_bytes, factor as usize);
        }
    }
    tracing::debug!(
        "{}: read DPX {}x{} {} (mapped: {})",
        path.display(),
        pixels.width(),
        pixels.height(),
        pixels.pixel_type(),
        pixels.is_mapped()
    );
    Ok(Image::new(pixels).with_tags(info.tags))
}

/// Fails before any allocation when the header describes more pixel bytes
/// than the file holds.
fn check_pixel_extent(
    io: &FileIo,
    layer: &PixelDataInfo,
    data_offset: u64,
    line_padding: u64,
) -> IoResult<()> {
    let overflow = || {
        IoError::CorruptHeader(format!("{}x{} image is too large", layer.width, layer.height))
    };
    let line_bytes = u64::from(layer.width)
        .checked_mul(layer.pixel_byte_count() as u64)
        .ok_or_else(overflow)?;
    let file_line = line_bytes.checked_add(line_padding).ok_or_else(overflow)?;
    let needed = u64::from(layer.height.saturating_sub(1))
        .checked_mul(file_line)
        .and_then(|rows| rows.checked_add(line_bytes))
        .and_then(|rows| rows.checked_add(data_offset))
        .ok_or_else(overflow)?;
    if usize::try_from(line_bytes).is_err() {
        return Err(overflow());
    }
    if needed > io.size() {
        return Err(FileError::Truncated {
            path: io.file_name().to_path_buf(),
            pos: data_offset,
            requested: usize::try_from(needed - data_offset).unwrap_or(usize::MAX),
            available: usize::try_from(io.size().saturating_sub(data_offset)).unwrap_or(usize::MAX),
        }
        .into());
    }
    Ok(())
}

/// Writes `image` as DPX.
///
/// The transfer comes from the image's `Transfer` tag, defaulting to
/// printing density. A proxy buffer is written at its reduced size.
pub fn write_image(path: &Path, image: &Image, options: &Options) -> IoResult<()> {
    let pixels = &image.pixels;
    let mut info = pixels.info().clone();
    (info.width, info.height) = info.proxy_size();
    info.proxy = Proxy::None;
    if !info.is_valid() {
        return Err(IoError::UnsupportedPixelLayout(format!(
            "empty image {}x{}",
            info.width, info.height
        )));
    }

    let transfer = match image.tags.get(header::tag::TRANSFER) {
        Some(label) => label.parse().unwrap_or_else(|e| {
            tracing::warn!("{e}, writing film print");
            Transfer::FilmPrint
        }),
        None => Transfer::FilmPrint,
    };
    let bit_depth = header::file_bit_depth(info.pixel, options.bit_depth)?;

    let mut io = FileIo::new();
    io.open(path, Mode::Write)?;
    header::write(&mut io, &info, &image.tags, options, transfer)?;

    let line_bytes = info.width as usize * info.pixel_byte_count();
    let word_size = info.pixel.data_type().word_size();
    let swap_channels = info.bgr && matches!(info.pixel.layout(), Layout::Rgb | Layout::Rgba);
    let mut line = vec![0u8; line_bytes];
    for y in 0..info.height {
        let src = &pixels.scanline(y)[..line_bytes];
        if bit_depth == 12 || swap_channels {
            line.copy_from_slice(src);
            if swap_channels {
                swap_red_blue(&mut line, info.pixel_byte_count(), info.pixel.data_type());
            }
            if bit_depth == 12 {
                packing::pack_12bit(&mut line);
            }
            io.write(&line, word_size)?;
        } else {
            io.write(src, word_size)?;
        }
    }
    header::write_finish(&mut io)?;
    io.close()?;
    tracing::debug!(
        "{}: wrote DPX {}x{} {}-bit",
        path.display(),
        info.width,
        info.height,
        bit_depth
    );
    Ok(())
}
