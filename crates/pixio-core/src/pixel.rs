//! Pixel buffer description and storage.
//!
//! - [`PixelType`] - channel layout x data type
//! - [`PixelDataInfo`] - shape of a buffer (size, proxy, mirror, alignment)
//! - [`PixelData`] - the buffer itself, owned or memory mapped
//!
//! # Memory Layout
//!
//! Pixels are stored row-major, top-to-bottom, with channels interleaved.
//! Each scanline is padded to a multiple of [`PixelDataInfo::align`] bytes:
//!
//! ```text
//! Row 0: [R G B R G B R G B .. pad]
//! Row 1: [R G B R G B R G B .. pad]
//! ```
//!
//! [`DataType::U10`] is only defined for RGB and stores one pixel in a
//! native-endian `u32` as `R << 22 | G << 12 | B << 2`.
//!
//! The buffer is sized for [`PixelDataInfo::proxy_size`], never for the
//! full-resolution `size`.
//!
//! # Copy-on-Write
//!
//! Cloning a [`PixelData`] shares its bytes. The first mutation through
//! either copy detaches it into a private buffer, so logically separate
//! copies never alias.
//!
//! ```rust
//! use pixio_core::{PixelData, PixelDataInfo, PixelType};
//!
//! let info = PixelDataInfo::new(4, 2, PixelType::RGB_U8);
//! let mut a = PixelData::new(info);
//! let b = a.clone();
//! a.pixel_mut(1, 1)[0] = 255;
//! assert_eq!(a.pixel(1, 1)[0], 255);
//! assert_eq!(b.pixel(1, 1)[0], 0);
//! ```

use crate::{Endian, FileError, FileIo, FileResult};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// Luminance.
    L,
    /// Luminance + alpha.
    LA,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl Layout {
    /// Number of channels.
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::L => 1,
            Self::LA => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Layout for a channel count, if one exists.
    pub const fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::L),
            2 => Some(Self::LA),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }
}

/// Per-channel storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit unsigned.
    U8,
    /// 10-bit unsigned, three channels packed in a `u32` (RGB only).
    U10,
    /// 16-bit unsigned.
    U16,
    /// 32-bit unsigned.
    U32,
    /// 16-bit half float.
    F16,
    /// 32-bit float.
    F32,
}

impl DataType {
    /// Significant bits per channel.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U10 => 10,
            Self::U16 | Self::F16 => 16,
            Self::U32 | Self::F32 => 32,
        }
    }

    /// Size of the machine word the channel is stored in.
    ///
    /// This is the unit byte-swapped by endian conversion.
    #[inline]
    pub const fn word_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::U10 | Self::U32 | Self::F32 => 4,
        }
    }

    /// Whether the type is floating point.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }
}

/// Channel layout and data type of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelType {
    layout: Layout,
    data_type: DataType,
}

impl PixelType {
    /// 8-bit luminance.
    pub const L_U8: Self = Self::of(Layout::L, DataType::U8);
    /// 16-bit luminance.
    pub const L_U16: Self = Self::of(Layout::L, DataType::U16);
    /// 8-bit RGB.
    pub const RGB_U8: Self = Self::of(Layout::Rgb, DataType::U8);
    /// Packed 10-bit RGB.
    pub const RGB_U10: Self = Self::of(Layout::Rgb, DataType::U10);
    /// 16-bit RGB.
    pub const RGB_U16: Self = Self::of(Layout::Rgb, DataType::U16);
    /// 32-bit float RGB.
    pub const RGB_F32: Self = Self::of(Layout::Rgb, DataType::F32);
    /// 8-bit RGBA.
    pub const RGBA_U8: Self = Self::of(Layout::Rgba, DataType::U8);
    /// 16-bit RGBA.
    pub const RGBA_U16: Self = Self::of(Layout::Rgba, DataType::U16);
    /// Half float RGBA.
    pub const RGBA_F16: Self = Self::of(Layout::Rgba, DataType::F16);
    /// 32-bit float RGBA.
    pub const RGBA_F32: Self = Self::of(Layout::Rgba, DataType::F32);

    const fn of(layout: Layout, data_type: DataType) -> Self {
        Self { layout, data_type }
    }

    /// Combines a layout and data type. `None` for U10 with anything but RGB.
    pub const fn new(layout: Layout, data_type: DataType) -> Option<Self> {
        match (layout, data_type) {
            (Layout::Rgb, DataType::U10) => Some(Self::of(layout, data_type)),
            (_, DataType::U10) => None,
            _ => Some(Self::of(layout, data_type)),
        }
    }

    /// Channel layout.
    #[inline]
    pub const fn layout(self) -> Layout {
        self.layout
    }

    /// Per-channel data type.
    #[inline]
    pub const fn data_type(self) -> DataType {
        self.data_type
    }

    /// Number of channels.
    #[inline]
    pub const fn channels(self) -> usize {
        self.layout.channels()
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn byte_count(self) -> usize {
        match self.data_type {
            DataType::U10 => 4,
            dt => dt.word_size() * self.layout.channels(),
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.layout, self.data_type)
    }
}

/// Reduced-resolution decode factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Proxy {
    /// Full resolution.
    #[default]
    None,
    /// 1/2 resolution.
    Half,
    /// 1/4 resolution.
    Quarter,
    /// 1/8 resolution.
    Eighth,
}

impl Proxy {
    /// Divisor applied to each dimension.
    #[inline]
    pub const fn factor(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
        }
    }

    /// Scales a dimension, rounding up so a non-empty image stays non-empty.
    #[inline]
    pub const fn scale(self, value: u32) -> u32 {
        value.div_ceil(self.factor())
    }
}

/// Per-axis mirroring of the stored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Mirror {
    /// Rows run right to left.
    pub x: bool,
    /// Scanlines run bottom to top.
    pub y: bool,
}

impl Mirror {
    /// Creates mirror flags.
    pub const fn new(x: bool, y: bool) -> Self {
        Self { x, y }
    }
}

/// Shape of a pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelDataInfo {
    /// Source file, for diagnostics.
    pub file_name: String,
    /// Layer name (multi-layer formats).
    pub layer_name: String,
    /// Full-resolution width.
    pub width: u32,
    /// Full-resolution height.
    pub height: u32,
    /// Decode proxy.
    pub proxy: Proxy,
    /// Pixel type.
    pub pixel: PixelType,
    /// Channels are stored blue first.
    pub bgr: bool,
    /// Mirroring.
    pub mirror: Mirror,
    /// Scanline alignment in bytes (at least 1).
    pub align: usize,
    /// Byte order of the buffer.
    pub endian: Endian,
}

impl PixelDataInfo {
    /// Creates an info with default proxy, mirror and alignment.
    pub fn new(width: u32, height: u32, pixel: PixelType) -> Self {
        Self {
            file_name: String::new(),
            layer_name: String::new(),
            width,
            height,
            proxy: Proxy::None,
            pixel,
            bgr: false,
            mirror: Mirror::default(),
            align: 1,
            endian: Endian::native(),
        }
    }

    /// Sets the source file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Dimensions of the buffer after the proxy is applied.
    #[inline]
    pub fn proxy_size(&self) -> (u32, u32) {
        (self.proxy.scale(self.width), self.proxy.scale(self.height))
    }

    /// Bytes per pixel.
    #[inline]
    pub fn pixel_byte_count(&self) -> usize {
        self.pixel.byte_count()
    }

    /// Bytes per scanline, rounded up to `align`.
    ///
    /// Saturates at `usize::MAX` for shapes no buffer could hold; use
    /// [`Self::checked_scanline_byte_count`] on untrusted dimensions.
    pub fn scanline_byte_count(&self) -> usize {
        self.checked_scanline_byte_count().unwrap_or(usize::MAX)
    }

    /// Total buffer size, saturating like [`Self::scanline_byte_count`].
    #[inline]
    pub fn data_byte_count(&self) -> usize {
        self.checked_data_byte_count().unwrap_or(usize::MAX)
    }

    /// Bytes per scanline, or `None` if the count overflows `usize`.
    pub fn checked_scanline_byte_count(&self) -> Option<usize> {
        let raw = (self.proxy_size().0 as usize).checked_mul(self.pixel_byte_count())?;
        let align = self.align.max(1);
        raw.div_ceil(align).checked_mul(align)
    }

    /// Total buffer size, or `None` if the count overflows `usize`.
    pub fn checked_data_byte_count(&self) -> Option<usize> {
        self.checked_scanline_byte_count()?
            .checked_mul(self.proxy_size().1 as usize)
    }

    /// Whether the info describes a non-empty image.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for PixelDataInfo {
    fn default() -> Self {
        Self::new(0, 0, PixelType::RGBA_U8)
    }
}

#[derive(Clone)]
enum Storage {
    Owned(Arc<Vec<u8>>),
    Mapped {
        map: Arc<Mmap>,
        offset: usize,
        len: usize,
    },
}

impl Storage {
    fn zeroed(len: usize) -> Self {
        Self::Owned(Arc::new(vec![0; len]))
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Mapped { map, offset, len } => &map[*offset..*offset + *len],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        if let Self::Mapped { .. } = self {
            *self = Self::Owned(Arc::new(self.bytes().to_vec()));
        }
        match self {
            Self::Owned(v) => Arc::make_mut(v).as_mut_slice(),
            Self::Mapped { .. } => unreachable!("mapped storage detached above"),
        }
    }
}

/// Pixel buffer with copy-on-write storage.
///
/// The cached counts always describe the current buffer:
/// `data().len() == data_byte_count() == scanline_byte_count() * proxy height`.
#[derive(Clone)]
pub struct PixelData {
    info: PixelDataInfo,
    channels: usize,
    pixel_byte_count: usize,
    scanline_byte_count: usize,
    data_byte_count: usize,
    storage: Storage,
}

impl PixelData {
    /// Creates a zero-filled buffer for `info`.
    pub fn new(info: PixelDataInfo) -> Self {
        let mut out = Self::empty();
        out.set(info);
        out
    }

    /// Creates a buffer holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// [`FileError::BufferSize`] if `bytes` is shorter than the buffer.
    pub fn from_bytes(info: PixelDataInfo, bytes: &[u8]) -> FileResult<Self> {
        let mut out = Self::empty();
        out.set_from(info, bytes)?;
        Ok(out)
    }

    fn empty() -> Self {
        Self {
            info: PixelDataInfo::default(),
            channels: 0,
            pixel_byte_count: 0,
            scanline_byte_count: 0,
            data_byte_count: 0,
            storage: Storage::zeroed(0),
        }
    }

    fn set_info(&mut self, info: PixelDataInfo) {
        self.channels = info.pixel.channels();
        self.pixel_byte_count = info.pixel_byte_count();
        self.scanline_byte_count = info.scanline_byte_count();
        self.data_byte_count = info.data_byte_count();
        self.info = info;
    }

    /// Rebinds the shape and zero-fills a fresh buffer.
    pub fn set(&mut self, info: PixelDataInfo) {
        self.set_info(info);
        self.storage = Storage::zeroed(self.data_byte_count);
    }

    /// Rebinds the shape and copies `data_byte_count` bytes from `bytes`.
    ///
    /// Extra source bytes are ignored.
    pub fn set_from(&mut self, info: PixelDataInfo, bytes: &[u8]) -> FileResult<()> {
        let expected = info.data_byte_count();
        if bytes.len() < expected {
            return Err(FileError::BufferSize {
                expected,
                actual: bytes.len(),
            });
        }
        self.set_info(info);
        self.storage = Storage::Owned(Arc::new(bytes[..expected].to_vec()));
        Ok(())
    }

    /// Rebinds the shape to the pixel bytes at the file's current position.
    ///
    /// When the file is memory mapped the buffer is a zero-copy view sharing
    /// the map; otherwise the bytes are read (and swapped, if the handle
    /// converts endianness) into an owned buffer. The position advances past
    /// the pixels either way.
    ///
    /// # Errors
    ///
    /// [`FileError::Truncated`] if the file holds fewer bytes than the buffer
    /// needs.
    pub fn set_mapped(&mut self, info: PixelDataInfo, io: &mut FileIo) -> FileResult<()> {
        let available = usize::try_from(io.size().saturating_sub(io.pos())).unwrap_or(usize::MAX);
        let len = match info.checked_data_byte_count() {
            Some(len) if len <= available => len,
            _ => {
                return Err(FileError::Truncated {
                    path: io.file_name().to_path_buf(),
                    pos: io.pos(),
                    requested: info.data_byte_count(),
                    available,
                })
            }
        };
        match io.mmap_handle() {
            Some(map) if !io.has_endian_conversion() => {
                let offset = io.pos() as usize;
                let available = map.len().saturating_sub(offset);
                if available < len {
                    return Err(FileError::Truncated {
                        path: io.file_name().to_path_buf(),
                        pos: io.pos(),
                        requested: len,
                        available,
                    });
                }
                io.seek(len as u64)?;
                self.set_info(info);
                self.storage = Storage::Mapped { map, offset, len };
            }
            _ => {
                let mut bytes = vec![0u8; len];
                io.read(&mut bytes, info.pixel.data_type().word_size())?;
                self.set_info(info);
                self.storage = Storage::Owned(Arc::new(bytes));
            }
        }
        Ok(())
    }

    /// Zeroes the buffer without changing its shape.
    pub fn zero(&mut self) {
        if self.is_mapped() {
            self.storage = Storage::zeroed(self.data_byte_count);
        } else {
            self.data_mut().fill(0);
        }
    }

    /// Releases any memory map and reverts to an owned zero-filled buffer.
    ///
    /// Other owners of a shared buffer keep their bytes.
    pub fn close(&mut self) {
        self.storage = Storage::zeroed(self.data_byte_count);
    }

    /// Returns `true` if the bytes are a view into a memory-mapped file.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped { .. })
    }

    /// Returns `true` for a non-empty buffer.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.info.is_valid()
    }

    /// Buffer shape.
    #[inline]
    pub fn info(&self) -> &PixelDataInfo {
        &self.info
    }

    /// Full-resolution width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Full-resolution height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Proxy factor.
    #[inline]
    pub fn proxy(&self) -> Proxy {
        self.info.proxy
    }

    /// Pixel type.
    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.info.pixel
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per pixel.
    #[inline]
    pub fn pixel_byte_count(&self) -> usize {
        self.pixel_byte_count
    }

    /// Bytes per scanline including alignment padding.
    #[inline]
    pub fn scanline_byte_count(&self) -> usize {
        self.scanline_byte_count
    }

    /// Total bytes.
    #[inline]
    pub fn data_byte_count(&self) -> usize {
        self.data_byte_count
    }

    /// All bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// All bytes, detaching shared storage first.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.storage.bytes_mut()
    }

    /// Bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Coordinates outside the proxy size are a contract violation and
    /// panic on the slice bounds check.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = self.offset(x, y);
        &self.data()[offset..offset + self.pixel_byte_count]
    }

    /// Mutable bytes of the pixel at `(x, y)`. See [`Self::pixel`].
    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let offset = self.offset(x, y);
        let n = self.pixel_byte_count;
        &mut self.data_mut()[offset..offset + n]
    }

    /// Bytes of scanline `y`, padding included.
    #[inline]
    pub fn scanline(&self, y: u32) -> &[u8] {
        let offset = self.offset(0, y);
        &self.data()[offset..offset + self.scanline_byte_count]
    }

    /// Mutable bytes of scanline `y`.
    #[inline]
    pub fn scanline_mut(&mut self, y: u32) -> &mut [u8] {
        let offset = self.offset(0, y);
        let n = self.scanline_byte_count;
        &mut self.data_mut()[offset..offset + n]
    }

    /// Nearest-neighbor copy at a reduced resolution.
    ///
    /// Keeps every `factor`-th pixel of every `factor`-th row. The source
    /// must be at full resolution; a buffer that already carries a proxy is
    /// returned as a plain clone.
    pub fn to_proxy(&self, proxy: Proxy) -> PixelData {
        if proxy == Proxy::None || self.info.proxy != Proxy::None {
            return self.clone();
        }
        let mut info = self.info.clone();
        info.proxy = proxy;
        let mut out = PixelData::new(info);
        let factor = proxy.factor();
        let pb = self.pixel_byte_count;
        let (width, height) = out.info.proxy_size();
        for y in 0..height {
            let src = self.scanline(y * factor);
            let dst = out.scanline_mut(y);
            for x in 0..width as usize {
                let s = x * factor as usize * pb;
                dst[x * pb..(x + 1) * pb].copy_from_slice(&src[s..s + pb]);
            }
        }
        out
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.scanline_byte_count + x as usize * self.pixel_byte_count
    }
}

impl Default for PixelData {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for PixelData {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.data() == other.data()
    }
}

impl Eq for PixelData {}

impl fmt::Debug for PixelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelData")
            .field("info", &self.info)
            .field("data_byte_count", &self.data_byte_count)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;
    use tempfile::tempdir;

    #[test]
    fn test_pixel_type_byte_counts() {
        assert_eq!(PixelType::RGB_U8.byte_count(), 3);
        assert_eq!(PixelType::RGB_U10.byte_count(), 4);
        assert_eq!(PixelType::RGBA_U16.byte_count(), 8);
        assert_eq!(PixelType::RGBA_F16.byte_count(), 8);
        assert_eq!(PixelType::RGB_F32.byte_count(), 12);
        assert!(PixelType::new(Layout::Rgba, DataType::U10).is_none());
        assert!(PixelType::new(Layout::L, DataType::F32).is_some());
    }

    #[test]
    fn test_scanline_alignment() {
        let mut info = PixelDataInfo::new(5, 3, PixelType::RGB_U8);
        assert_eq!(info.scanline_byte_count(), 15);
        info.align = 4;
        assert_eq!(info.scanline_byte_count(), 16);
        assert_eq!(info.data_byte_count(), 16 * 3);

        let data = PixelData::new(info);
        assert_eq!(data.data().len(), data.data_byte_count());
        assert_eq!(data.scanline(2).len(), 16);
    }

    #[test]
    fn test_proxy_sizes_buffer() {
        let mut info = PixelDataInfo::new(9, 5, PixelType::L_U8);
        info.proxy = Proxy::Quarter;
        assert_eq!(info.proxy_size(), (3, 2));
        let data = PixelData::new(info);
        assert_eq!(data.width(), 9);
        assert_eq!(data.data_byte_count(), 6);
    }

    #[test]
    fn test_to_proxy_keeps_every_other_pixel() {
        let info = PixelDataInfo::new(3, 3, PixelType::L_U8);
        let full = PixelData::from_bytes(info, &[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        let half = full.to_proxy(Proxy::Half);
        assert_eq!(half.proxy(), Proxy::Half);
        assert_eq!(half.data(), &[1, 3, 7, 9]);
        assert_eq!(half.to_proxy(Proxy::Quarter), half);
    }

    #[test]
    fn test_copy_on_write() {
        let info = PixelDataInfo::new(2, 2, PixelType::L_U16);
        let a = PixelData::from_bytes(info, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.scanline_mut(1).copy_from_slice(&[9, 9, 9, 9]);
        assert_eq!(a.scanline(1), &[5, 6, 7, 8]);
        assert_ne!(a, b);
        b.zero();
        assert!(b.data().iter().all(|&v| v == 0));
        assert_eq!(a.pixel(1, 0), &[3, 4]);
    }

    #[test]
    fn test_close_zeroes_owned_buffer() {
        let info = PixelDataInfo::new(2, 1, PixelType::L_U8);
        let a = PixelData::from_bytes(info, &[7, 8]).unwrap();
        let mut b = a.clone();
        b.close();
        assert_eq!(b.data(), &[0, 0]);
        assert_eq!(a.data(), &[7, 8]);
    }

    #[test]
    fn test_byte_counts_overflow() {
        let mut info = PixelDataInfo::new(0x7FFF_FFFF, 0x7FFF_FFFF, PixelType::RGBA_F32);
        info.align = 8;
        #[cfg(target_pointer_width = "64")]
        assert_eq!(info.checked_scanline_byte_count(), Some(0x7FFF_FFFF * 16));
        assert_eq!(info.checked_data_byte_count(), None);
        assert_eq!(info.data_byte_count(), usize::MAX);
    }

    #[test]
    fn test_set_mapped_rejects_oversized_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.raw");
        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[1, 2, 3, 4]).unwrap();

        for mmap in [true, false] {
            io.set_mmap(mmap);
            io.open(&path, Mode::Read).unwrap();
            let info = PixelDataInfo::new(0x7FFF_FFFF, 0x7FFF_FFFF, PixelType::RGBA_U16);
            let mut data = PixelData::default();
            let err = data.set_mapped(info, &mut io).unwrap_err();
            assert!(err.is_truncated(), "mmap {mmap}: {err}");
            assert!(!data.is_valid());
        }
    }

    #[test]
    fn test_set_from_short_source() {
        let info = PixelDataInfo::new(4, 4, PixelType::RGBA_U8);
        let err = PixelData::from_bytes(info, &[0; 10]).unwrap_err();
        assert!(matches!(
            err,
            FileError::BufferSize {
                expected: 64,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_mapped_view_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pixels.raw");
        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[0xAA, 1, 2, 3, 4, 5, 6]).unwrap();

        io.open(&path, Mode::Read).unwrap();
        io.seek(1).unwrap();
        let info = PixelDataInfo::new(2, 1, PixelType::RGB_U8);
        let mut data = PixelData::default();
        data.set_mapped(info, &mut io).unwrap();
        assert!(data.is_mapped());
        assert_eq!(io.pos(), 7);
        io.close().unwrap();

        // The map outlives the handle.
        assert_eq!(data.data(), &[1, 2, 3, 4, 5, 6]);

        let copy = data.clone();
        data.pixel_mut(0, 0)[0] = 100;
        assert!(!data.is_mapped());
        assert!(copy.is_mapped());
        assert_eq!(copy.pixel(0, 0), &[1, 2, 3]);

        let mut mapped = copy;
        mapped.close();
        assert!(!mapped.is_mapped());
        assert_eq!(mapped.data(), &[0; 6]);
    }

    #[test]
    fn test_mapped_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.raw");
        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[1, 2, 3]).unwrap();

        for mmap in [true, false] {
            io.set_mmap(mmap);
            io.open(&path, Mode::Read).unwrap();
            let info = PixelDataInfo::new(2, 1, PixelType::RGB_U8);
            let err = PixelData::default().set_mapped(info, &mut io).unwrap_err();
            assert!(err.is_truncated(), "mmap {mmap}: {err}");
        }
    }

    #[test]
    fn test_set_mapped_swaps_without_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swap.raw");
        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[1, 2, 3, 4]).unwrap();

        io.open(&path, Mode::Read).unwrap();
        io.set_endian_conversion(true);
        let info = PixelDataInfo::new(2, 1, PixelType::L_U16);
        let mut data = PixelData::default();
        data.set_mapped(info, &mut io).unwrap();
        assert!(!data.is_mapped());
        assert_eq!(data.data(), &[2, 1, 4, 3]);
    }
}
