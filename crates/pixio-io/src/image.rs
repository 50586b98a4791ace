//! Decoded image: pixels plus metadata.

use crate::Tags;
use byteorder::{ByteOrder, NativeEndian};
use pixio_core::{DataType, Layout, PixelData, PixelDataInfo};

/// A decoded frame.
///
/// Cloning is cheap; the pixel buffer is shared until mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    /// Pixel buffer.
    pub pixels: PixelData,
    /// Metadata read from, or to be written to, the file.
    pub tags: Tags,
}

impl Image {
    /// Wraps a pixel buffer with no tags.
    pub fn new(pixels: PixelData) -> Self {
        Self {
            pixels,
            tags: Tags::new(),
        }
    }

    /// Attaches tags.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Shape of the pixel buffer.
    #[inline]
    pub fn info(&self) -> &PixelDataInfo {
        self.pixels.info()
    }

    /// Full-resolution width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Full-resolution height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Unpadded scanlines in top-to-bottom, left-to-right order with red
    /// first, undoing the buffer's mirror and BGR flags.
    ///
    /// For formats that have no way to record either flag.
    pub fn display_rows(&self) -> Vec<u8> {
        let info = self.pixels.info();
        let (width, height) = info.proxy_size();
        let pixel_bytes = info.pixel_byte_count();
        let row = width as usize * pixel_bytes;
        let mut out = Vec::with_capacity(row * height as usize);
        for y in 0..height {
            let src = if info.mirror.y { height - 1 - y } else { y };
            let start = out.len();
            out.extend_from_slice(&self.pixels.scanline(src)[..row]);
            let line = &mut out[start..];
            if info.mirror.x {
                reverse_pixels(line, pixel_bytes);
            }
            if info.bgr && matches!(info.pixel.layout(), Layout::Rgb | Layout::Rgba) {
                swap_red_blue(line, pixel_bytes, info.pixel.data_type());
            }
        }
        out
    }
}

fn reverse_pixels(line: &mut [u8], pixel_bytes: usize) {
    let count = line.len() / pixel_bytes;
    for i in 0..count / 2 {
        let (head, tail) = line.split_at_mut((count - 1 - i) * pixel_bytes);
        head[i * pixel_bytes..(i + 1) * pixel_bytes].swap_with_slice(&mut tail[..pixel_bytes]);
    }
}

pub(crate) fn swap_red_blue(line: &mut [u8], pixel_bytes: usize, data_type: DataType) {
    if data_type == DataType::U10 {
        for word in line.chunks_exact_mut(4) {
            let v = NativeEndian::read_u32(word);
            let (a, g, b) = (v >> 22 & 0x3FF, v >> 12 & 0x3FF, v >> 2 & 0x3FF);
            NativeEndian::write_u32(word, b << 22 | g << 12 | a << 2 | v & 3);
        }
        return;
    }
    let size = data_type.word_size();
    for px in line.chunks_exact_mut(pixel_bytes) {
        let (red, rest) = px.split_at_mut(size);
        red.swap_with_slice(&mut rest[size..2 * size]);
    }
}
