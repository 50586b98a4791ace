//! PNG format support via the `png` crate.
//!
//! - L, LA, RGB, RGBA at 8 or 16 bits
//! - Palette and sub-byte grayscale expand to 8-bit on read
//! - `tEXt` chunks map to tags
//!
//! 16-bit samples are big endian on disk and native endian in memory.

use crate::plugin::{SequenceRead, SequenceWrite};
use crate::{Image, Info, IoError, IoResult, Tags};
use pixio_core::file_io::swap_words;
use pixio_core::{DataType, Endian, Layout, PixelData, PixelDataInfo, PixelType};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn decode_err(e: png::DecodingError) -> IoError {
    IoError::Codec(e.to_string())
}

fn encode_err(e: png::EncodingError) -> IoError {
    IoError::Codec(e.to_string())
}

type Decoded = png::Reader<BufReader<File>>;

fn open(path: &Path) -> IoResult<Decoded> {
    let file = File::open(path)?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND);
    decoder.read_info().map_err(decode_err)
}

fn pixel_type(color: png::ColorType, depth: png::BitDepth) -> IoResult<PixelType> {
    let layout = match color {
        png::ColorType::Grayscale => Layout::L,
        png::ColorType::GrayscaleAlpha => Layout::LA,
        png::ColorType::Rgb => Layout::Rgb,
        png::ColorType::Rgba => Layout::Rgba,
        png::ColorType::Indexed => {
            return Err(IoError::UnsupportedPixelLayout("unexpanded palette".into()));
        }
    };
    let data_type = match depth {
        png::BitDepth::Eight => DataType::U8,
        png::BitDepth::Sixteen => DataType::U16,
        d => {
            return Err(IoError::UnsupportedPixelLayout(format!("PNG {d:?} bit")));
        }
    };
    PixelType::new(layout, data_type)
        .ok_or_else(|| IoError::UnsupportedPixelLayout(format!("{layout:?} {data_type:?}")))
}

fn describe(path: &Path, reader: &Decoded) -> IoResult<Info> {
    let (color, depth) = reader.output_color_type();
    let png_info = reader.info();
    let layer = PixelDataInfo::new(png_info.width, png_info.height, pixel_type(color, depth)?)
        .with_file_name(path.to_string_lossy());
    let mut info = Info::new(path.to_string_lossy(), layer);
    for chunk in &png_info.uncompressed_latin1_text {
        info.tags.set(chunk.keyword.clone(), chunk.text.clone());
    }
    Ok(info)
}

/// Reads the PNG header.
pub fn read_info<P: AsRef<Path>>(path: P) -> IoResult<Info> {
    let path = path.as_ref();
    describe(path, &open(path)?)
}

/// Reads a PNG file.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let info = describe(path, &reader)?;
    let size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::Codec("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; size];
    let frame = reader.next_frame(&mut buf).map_err(decode_err)?;
    buf.truncate(frame.buffer_size());

    let layer = info.video[0].clone();
    if layer.pixel.data_type() == DataType::U16 && Endian::native() == Endian::Lsb {
        swap_words(&mut buf, 2);
    }
    let pixels = PixelData::from_bytes(layer, &buf)?;
    tracing::debug!("{}: read PNG {}", path.display(), pixels.pixel_type());
    Ok(Image::new(pixels).with_tags(info.tags))
}

/// Writes an 8 or 16-bit image as PNG.
///
/// PNG has no orientation or channel order field, so mirrored and BGR
/// buffers are stored top-down in RGB order.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let path = path.as_ref();
    let pixels = &image.pixels;
    let pixel = pixels.pixel_type();
    let color = match pixel.layout() {
        Layout::L => png::ColorType::Grayscale,
        Layout::LA => png::ColorType::GrayscaleAlpha,
        Layout::Rgb => png::ColorType::Rgb,
        Layout::Rgba => png::ColorType::Rgba,
    };
    let depth = match pixel.data_type() {
        DataType::U8 => png::BitDepth::Eight,
        DataType::U16 => png::BitDepth::Sixteen,
        _ => return Err(IoError::UnsupportedPixelLayout(format!("PNG cannot store {pixel}"))),
    };

    let (width, height) = pixels.info().proxy_size();
    let mut data = image.display_rows();
    if depth == png::BitDepth::Sixteen && Endian::native() == Endian::Lsb {
        swap_words(&mut data, 2);
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(depth);
    encoder.set_compression(png::Compression::default());
    for (k, v) in image.tags.iter() {
        encoder
            .add_text_chunk(k.to_string(), v.to_string())
            .map_err(encode_err)?;
    }
    let mut writer = encoder.write_header().map_err(encode_err)?;
    writer.write_image_data(&data).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    tracing::debug!("{}: wrote PNG {}", path.display(), pixel);
    Ok(())
}

/// PNG reader. PNG has no options.
#[derive(Debug, Clone, Default)]
pub struct PngReader;

impl SequenceRead for PngReader {
    type Options = ();

    fn with_options(_: ()) -> Self {
        Self
    }

    fn options(&self) -> &() {
        &()
    }

    fn read_info(&self, path: &Path) -> IoResult<Info> {
        read_info(path)
    }

    fn read(&self, path: &Path) -> IoResult<Image> {
        read(path)
    }
}

/// PNG writer.
#[derive(Debug, Clone, Default)]
pub struct PngWriter;

impl SequenceWrite for PngWriter {
    type Options = ();

    fn with_options(_: ()) -> Self {
        Self
    }

    fn options(&self) -> &() {
        &()
    }

    fn write(&self, path: &Path, image: &Image) -> IoResult<()> {
        write(path, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip_rgba8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        let info = PixelDataInfo::new(16, 8, PixelType::RGBA_U8);
        let bytes: Vec<u8> = (0..16 * 8 * 4).map(|i| (i % 256) as u8).collect();
        let pixels = PixelData::from_bytes(info, &bytes).unwrap();
        let tags: Tags = [("Comment", "hello")].into_iter().collect();
        write(&path, &Image::new(pixels).with_tags(tags)).unwrap();

        let back = read(&path).unwrap();
        assert_eq!(back.pixels.pixel_type(), PixelType::RGBA_U8);
        assert_eq!(back.pixels.data(), &bytes[..]);
        assert_eq!(back.tags.get("Comment"), Some("hello"));
    }

    #[test]
    fn test_roundtrip_l16_is_native_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("l16.png");
        let values: Vec<u16> = vec![0, 1, 256, 65535, 4660, 22136];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let pixels = PixelData::from_bytes(PixelDataInfo::new(3, 2, PixelType::L_U16), &bytes).unwrap();
        write(&path, &Image::new(pixels)).unwrap();

        let back = read(&path).unwrap();
        assert_eq!(back.pixels.pixel(1, 1), &4660u16.to_ne_bytes());
        assert_eq!(back.pixels.data(), &bytes[..]);
    }

    #[test]
    fn test_mirrored_bgr_written_upright() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flipped.png");
        let mut info = PixelDataInfo::new(2, 2, PixelType::RGB_U8);
        info.mirror = pixio_core::Mirror::new(false, true);
        info.bgr = true;
        let stored = [3, 2, 1, 6, 5, 4, 9, 8, 7, 12, 11, 10];
        write(&path, &Image::new(PixelData::from_bytes(info, &stored).unwrap())).unwrap();

        let back = read(&path).unwrap();
        let layer = back.pixels.info();
        assert_eq!(layer.mirror, pixio_core::Mirror::default());
        assert!(!layer.bgr);
        assert_eq!(back.pixels.data(), &[7, 8, 9, 10, 11, 12, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_float_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.png");
        let image = Image::new(PixelData::new(PixelDataInfo::new(1, 1, PixelType::RGBA_F32)));
        assert!(matches!(
            write(&path, &image),
            Err(IoError::UnsupportedPixelLayout(_))
        ));
    }
}
