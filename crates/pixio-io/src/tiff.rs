//! TIFF format support via the `tiff` crate.
//!
//! - L, LA (read only), RGB, RGBA
//! - 8/16/32-bit integer and 16/32-bit float samples; half floats are widened
//!   to 32-bit on write
//! - None, LZW, Deflate and PackBits compression
//! - Text tags (artist, copyright, ...) map to tags

use crate::plugin::{SequenceRead, SequenceWrite};
use crate::{Image, Info, IoError, IoResult, Tags};
use byteorder::{ByteOrder, NativeEndian};
use half::f16;
use pixio_core::{DataType, Layout, PixelData, PixelDataInfo, PixelType};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, DeflateLevel, TiffEncoder};
use tiff::tags::{SampleFormat, Tag};
use tiff::ColorType;

/// Compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    /// Uncompressed.
    None,
    /// LZW.
    #[default]
    Lzw,
    /// ZIP / Deflate.
    Deflate,
    /// PackBits run-length encoding.
    PackBits,
}

impl Compression {
    fn codec(self) -> tiff::encoder::Compression {
        match self {
            Self::None => tiff::encoder::Compression::Uncompressed,
            Self::Lzw => tiff::encoder::Compression::Lzw,
            Self::Deflate => tiff::encoder::Compression::Deflate(DeflateLevel::default()),
            Self::PackBits => tiff::encoder::Compression::Packbits,
        }
    }
}

/// TIFF options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Compression used when writing.
    pub compression: Compression,
}

const TEXT_TAGS: [(Tag, &str); 6] = [
    (Tag::Artist, "Creator"),
    (Tag::Copyright, "Copyright"),
    (Tag::DateTime, "Time"),
    (Tag::ImageDescription, "Description"),
    (Tag::Software, "Software"),
    (Tag::HostComputer, "Host Computer"),
];

fn tiff_err(e: tiff::TiffError) -> IoError {
    IoError::Codec(e.to_string())
}

fn open(path: &Path) -> IoResult<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(tiff_err)
}

fn pixel_type(color: ColorType, format: SampleFormat) -> IoResult<PixelType> {
    let (layout, bits) = match color {
        ColorType::Gray(b) => (Layout::L, b),
        ColorType::GrayA(b) => (Layout::LA, b),
        ColorType::RGB(b) => (Layout::Rgb, b),
        ColorType::RGBA(b) => (Layout::Rgba, b),
        other => {
            return Err(IoError::UnsupportedPixelLayout(format!("TIFF {other:?}")));
        }
    };
    let data_type = match (format, bits) {
        (SampleFormat::Uint, 8) => DataType::U8,
        (SampleFormat::Uint, 16) => DataType::U16,
        (SampleFormat::Uint, 32) => DataType::U32,
        (SampleFormat::IEEEFP, 16) => DataType::F16,
        (SampleFormat::IEEEFP, 32) => DataType::F32,
        (format, b) => {
            return Err(IoError::UnsupportedPixelLayout(format!("TIFF {b}-bit {format:?}")));
        }
    };
    PixelType::new(layout, data_type)
        .ok_or_else(|| IoError::UnsupportedPixelLayout(format!("{layout:?} {data_type:?}")))
}

fn describe(path: &Path, decoder: &mut Decoder<BufReader<File>>) -> IoResult<Info> {
    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let format = decoder
        .find_tag_unsigned_vec::<u16>(Tag::SampleFormat)
        .map_err(tiff_err)?
        .and_then(|formats| formats.first().copied())
        .map_or(SampleFormat::Uint, SampleFormat::from_u16_exhaustive);
    let pixel = pixel_type(decoder.colortype().map_err(tiff_err)?, format)?;
    let layer = PixelDataInfo::new(width, height, pixel).with_file_name(path.to_string_lossy());
    let mut info = Info::new(path.to_string_lossy(), layer);
    for (tag, key) in TEXT_TAGS {
        if let Ok(value) = decoder.get_tag_ascii_string(tag) {
            info.tags.set(key, value.trim_end_matches('\0'));
        }
    }
    Ok(info)
}

/// Reads the TIFF header of the first page.
pub fn read_info<P: AsRef<Path>>(path: P) -> IoResult<Info> {
    let path = path.as_ref();
    describe(path, &mut open(path)?)
}

/// Reads the first page of a TIFF file.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let info = describe(path, &mut decoder)?;
    let layer = info.video[0].clone();

    let bytes = match (decoder.read_image().map_err(tiff_err)?, layer.pixel.data_type()) {
        (DecodingResult::U8(buf), DataType::U8) => buf,
        (DecodingResult::U16(buf), DataType::U16) => {
            buf.iter().flat_map(|v| v.to_ne_bytes()).collect()
        }
        (DecodingResult::U32(buf), DataType::U32) => {
            buf.iter().flat_map(|v| v.to_ne_bytes()).collect()
        }
        (DecodingResult::F16(buf), DataType::F16) => {
            buf.iter().flat_map(|v| v.to_bits().to_ne_bytes()).collect()
        }
        (DecodingResult::F32(buf), DataType::F32) => {
            buf.iter().flat_map(|v| v.to_ne_bytes()).collect()
        }
        (_, data_type) => {
            return Err(IoError::UnsupportedPixelLayout(format!(
                "TIFF samples do not decode as {data_type:?}"
            )));
        }
    };
    let pixels = PixelData::from_bytes(layer, &bytes)?;
    tracing::debug!("{}: read TIFF {}", path.display(), pixels.pixel_type());
    Ok(Image::new(pixels).with_tags(info.tags))
}

macro_rules! encode {
    ($encoder:expr, $ct:ty, $w:expr, $h:expr, $tags:expr, $data:expr) => {{
        let mut page = $encoder.new_image::<$ct>($w, $h).map_err(tiff_err)?;
        for (tag, key) in TEXT_TAGS {
            if let Some(value) = $tags.get(key) {
                page.encoder().write_tag(tag, value).map_err(tiff_err)?;
            }
        }
        page.write_data($data).map_err(tiff_err)?;
    }};
}

/// Writes an image as TIFF.
///
/// Mirrored and BGR buffers are stored top-down in RGB order.
pub fn write_with<P: AsRef<Path>>(path: P, image: &Image, options: &Options) -> IoResult<()> {
    let path = path.as_ref();
    let pixels = &image.pixels;
    let pixel = pixels.pixel_type();
    let (w, h) = pixels.info().proxy_size();
    let raw = image.display_rows();

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file)
        .map_err(tiff_err)?
        .with_compression(options.compression.codec());
    let tags: &Tags = &image.tags;
    let unsupported = || IoError::UnsupportedPixelLayout(format!("TIFF cannot store {pixel}"));

    match pixel.data_type() {
        DataType::U8 => {
            let data = &raw[..];
            match pixel.layout() {
                Layout::L => encode!(encoder, colortype::Gray8, w, h, tags, data),
                Layout::Rgb => encode!(encoder, colortype::RGB8, w, h, tags, data),
                Layout::Rgba => encode!(encoder, colortype::RGBA8, w, h, tags, data),
                Layout::LA => return Err(unsupported()),
            }
        }
        DataType::U16 => {
            let mut words = vec![0u16; raw.len() / 2];
            NativeEndian::read_u16_into(&raw, &mut words);
            let data = &words[..];
            match pixel.layout() {
                Layout::L => encode!(encoder, colortype::Gray16, w, h, tags, data),
                Layout::Rgb => encode!(encoder, colortype::RGB16, w, h, tags, data),
                Layout::Rgba => encode!(encoder, colortype::RGBA16, w, h, tags, data),
                Layout::LA => return Err(unsupported()),
            }
        }
        DataType::U32 => {
            let mut words = vec![0u32; raw.len() / 4];
            NativeEndian::read_u32_into(&raw, &mut words);
            let data = &words[..];
            match pixel.layout() {
                Layout::L => encode!(encoder, colortype::Gray32, w, h, tags, data),
                Layout::Rgb => encode!(encoder, colortype::RGB32, w, h, tags, data),
                Layout::Rgba => encode!(encoder, colortype::RGBA32, w, h, tags, data),
                Layout::LA => return Err(unsupported()),
            }
        }
        DataType::F16 | DataType::F32 => {
            let floats: Vec<f32> = if pixel.data_type() == DataType::F16 {
                raw.chunks_exact(2)
                    .map(|b| f16::from_bits(NativeEndian::read_u16(b)).to_f32())
                    .collect()
            } else {
                let mut out = vec![0f32; raw.len() / 4];
                NativeEndian::read_f32_into(&raw, &mut out);
                out
            };
            let data = &floats[..];
            match pixel.layout() {
                Layout::L => encode!(encoder, colortype::Gray32Float, w, h, tags, data),
                Layout::Rgb => encode!(encoder, colortype::RGB32Float, w, h, tags, data),
                Layout::Rgba => encode!(encoder, colortype::RGBA32Float, w, h, tags, data),
                Layout::LA => return Err(unsupported()),
            }
        }
        DataType::U10 => return Err(unsupported()),
    }
    tracing::debug!(
        "{}: wrote TIFF {} ({:?})",
        path.display(),
        pixel,
        options.compression
    );
    Ok(())
}

/// Writes an image as LZW-compressed TIFF.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    write_with(path, image, &Options::default())
}

/// TIFF reader.
#[derive(Debug, Clone, Default)]
pub struct TiffReader {
    options: Options,
}

impl SequenceRead for TiffReader {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn read_info(&self, path: &Path) -> IoResult<Info> {
        read_info(path)
    }

    fn read(&self, path: &Path) -> IoResult<Image> {
        read(path)
    }
}

/// TIFF writer.
#[derive(Debug, Clone, Default)]
pub struct TiffWriter {
    options: Options,
}

impl SequenceWrite for TiffWriter {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn write(&self, path: &Path, image: &Image) -> IoResult<()> {
        write_with(path, image, &self.options)
    }
}
