//! OpenEXR format support via the `exr` crate.
//!
//! # Layers
//!
//! EXR stores named channels (`R`, `diffuse.G`, `Z`, ...). [`read_info`]
//! groups them into image layers according to [`Channels`]:
//!
//! | Mode    | Grouping                                              |
//! |---------|-------------------------------------------------------|
//! | `None`  | every channel is its own luminance layer              |
//! | `Known` | `R G B [A]` and `Y [A]` per prefix, the rest singly   |
//! | `All`   | every prefix with 1 to 4 channels becomes one layer   |
//!
//! [`read`] decodes the first layer; [`read_layer`] picks another.
//!
//! # Sample Types
//!
//! Half, float and uint channels load as F16, F32 and U32. A layer mixing
//! types loads as F32. Writing accepts F16, F32 and U32 as is; U8 and U16
//! are normalized to F32 in `[0, 1]`.

use crate::plugin::{SequenceRead, SequenceWrite};
use crate::{Info, IoError, IoResult, Tags};
use byteorder::{ByteOrder, NativeEndian};
use pixio_core::{DataType, Layout, PixelData, PixelDataInfo, PixelType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Channel grouping used to build layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channels {
    /// One layer per channel.
    None,
    /// Group well-known channel names.
    #[default]
    Known,
    /// Group every channel sharing a prefix.
    All,
}

/// Compression used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    /// No compression.
    None,
    /// Run-length.
    Rle,
    /// Zlib, one scanline per block.
    Zips,
    /// Zlib, 16 scanlines per block.
    Zip,
    /// Wavelet, lossless.
    #[default]
    Piz,
    /// Lossy 24-bit float.
    Pxr24,
    /// Lossy 4x4 blocks.
    B44,
    /// B44 with flat-area optimization.
    B44a,
    /// Lossy DCT, 32 scanlines per block.
    Dwaa,
    /// Lossy DCT, 256 scanlines per block.
    Dwab,
}

/// OpenEXR options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Worker threads; `1` decodes and encodes on the calling thread, any
    /// other value uses the codec's shared pool.
    pub thread_count: usize,
    /// Channel grouping.
    pub channels: Channels,
    /// Compression written.
    pub compression: Compression,
    /// Quality for DWAA / DWAB.
    pub dwa_compression_level: f32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            thread_count: 4,
            channels: Channels::Known,
            compression: Compression::Piz,
            dwa_compression_level: 45.0,
        }
    }
}

impl Options {
    fn codec_compression(&self) -> exr::compression::Compression {
        use exr::compression::Compression as C;
        let level = Some(self.dwa_compression_level);
        match self.compression {
            Compression::None => C::Uncompressed,
            Compression::Rle => C::RLE,
            Compression::Zips => C::ZIP1,
            Compression::Zip => C::ZIP16,
            Compression::Piz => C::PIZ,
            Compression::Pxr24 => C::PXR24,
            Compression::B44 => C::B44,
            Compression::B44a => C::B44A,
            Compression::Dwaa => C::DWAA(level),
            Compression::Dwab => C::DWAB(level),
        }
    }
}

fn exr_err(e: exr::error::Error) -> IoError {
    IoError::Codec(e.to_string())
}

/// A layer found by channel grouping: indices into one header's channel
/// list, in interleave order.
#[derive(Debug, Clone, PartialEq)]
struct Group {
    header: usize,
    name: String,
    channels: Vec<usize>,
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

fn join_name(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{prefix}.{suffix}")
    }
}

/// Groups channel names for one header.
fn group_channels(header: usize, names: &[String], mode: Channels) -> Vec<Group> {
    let single = |i: usize| Group {
        header,
        name: names[i].clone(),
        channels: vec![i],
    };
    if mode == Channels::None {
        return (0..names.len()).map(single).collect();
    }

    let mut prefixes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, name) in names.iter().enumerate() {
        prefixes.entry(split_name(name).0).or_default().push(i);
    }

    let mut groups = Vec::new();
    for (prefix, indices) in prefixes {
        let find = |suffix: &str| {
            indices
                .iter()
                .copied()
                .find(|&i| split_name(&names[i]).1.eq_ignore_ascii_case(suffix))
        };
        let (r, g, b, a, y) = (find("R"), find("G"), find("B"), find("A"), find("Y"));

        let mut used = Vec::new();
        if let (Some(r), Some(g), Some(b)) = (r, g, b) {
            used.extend([r, g, b]);
            used.extend(a);
        } else if let Some(y) = y {
            used.push(y);
            used.extend(a);
        }
        let rest: Vec<usize> = indices.iter().copied().filter(|i| !used.contains(i)).collect();

        match mode {
            Channels::All if used.len() + rest.len() <= 4 => {
                used.extend(rest);
                groups.push(Group {
                    header,
                    name: prefix.to_string(),
                    channels: used,
                });
            }
            _ => {
                if !used.is_empty() {
                    groups.push(Group {
                        header,
                        name: prefix.to_string(),
                        channels: used,
                    });
                }
                groups.extend(rest.into_iter().map(single));
            }
        }
    }
    groups
}

fn group_data_type(types: &[exr::meta::attribute::SampleType]) -> DataType {
    use exr::meta::attribute::SampleType;
    match types.first() {
        Some(&first) if types.iter().all(|&t| t == first) => match first {
            SampleType::F16 => DataType::F16,
            SampleType::F32 => DataType::F32,
            SampleType::U32 => DataType::U32,
        },
        _ => DataType::F32,
    }
}

fn text_tags(attributes: &exr::meta::header::LayerAttributes, tags: &mut Tags) {
    use exr::meta::attribute::AttributeValue;
    for (key, value) in [
        ("Owner", &attributes.owner),
        ("Comments", &attributes.comments),
        ("Capture Date", &attributes.capture_date),
        ("Software", &attributes.software_name),
    ] {
        if let Some(text) = value {
            tags.set(key, text.to_string());
        }
    }
    for (name, value) in &attributes.other {
        if let AttributeValue::Text(text) = value {
            tags.set(name.to_string(), text.to_string());
        }
    }
}

/// Reads headers and groups channels into layers.
pub fn read_info_with<P: AsRef<Path>>(path: P, options: &Options) -> IoResult<Info> {
    let path = path.as_ref();
    let meta = exr::meta::MetaData::read_from_file(path, false).map_err(exr_err)?;
    let file_name = path.to_string_lossy().to_string();
    let mut info = Info {
        file_name: file_name.clone(),
        ..Info::default()
    };

    for (index, header) in meta.headers.iter().enumerate() {
        let names: Vec<String> = header.channels.list.iter().map(|c| c.name.to_string()).collect();
        let (width, height) = (header.layer_size.width() as u32, header.layer_size.height() as u32);
        for group in group_channels(index, &names, options.channels) {
            let types: Vec<_> = group
                .channels
                .iter()
                .map(|&i| header.channels.list[i].sample_type)
                .collect();
            let layout = Layout::from_channels(group.channels.len()).unwrap_or(Layout::L);
            let pixel = PixelType::new(layout, group_data_type(&types))
                .ok_or_else(|| IoError::UnsupportedPixelLayout(format!("EXR {layout:?}")))?;
            let mut layer = PixelDataInfo::new(width, height, pixel).with_file_name(&file_name);
            layer.layer_name = match header.own_attributes.layer_name.as_ref() {
                Some(base) if !group.name.is_empty() => join_name(&base.to_string(), &group.name),
                Some(base) => base.to_string(),
                None => group.name,
            };
            info.video.push(layer);
        }
        text_tags(&header.own_attributes, &mut info.tags);
    }
    tracing::debug!("{}: {} EXR layers", path.display(), info.video.len());
    Ok(info)
}

/// Reads headers with default options.
pub fn read_info<P: AsRef<Path>>(path: P) -> IoResult<Info> {
    read_info_with(path, &Options::default())
}

/// Decodes layer `index` of the grouping described by `options`.
pub fn read_layer<P: AsRef<Path>>(path: P, index: usize, options: &Options) -> IoResult<crate::Image> {
    use exr::prelude::*;

    let path = path.as_ref();
    let info = read_info_with(path, options)?;
    let Some(layer_info) = info.video.get(index).cloned() else {
        return Err(IoError::UnsupportedFormat(format!(
            "{}: no layer {index}",
            path.display()
        )));
    };

    let reader = exr::prelude::read()
        .no_deep_data()
        .largest_resolution_level()
        .all_channels()
        .all_layers()
        .all_attributes();
    let reader = if options.thread_count == 1 {
        reader.non_parallel()
    } else {
        reader
    };
    let image = reader.from_file(path).map_err(exr_err)?;

    // Regroup against the decoded channel lists to find this layer's sources.
    let groups: Vec<Group> = image
        .layer_data
        .iter()
        .enumerate()
        .flat_map(|(h, layer)| {
            let names: Vec<String> =
                layer.channel_data.list.iter().map(|c| c.name.to_string()).collect();
            group_channels(h, &names, options.channels)
        })
        .collect();
    let group = groups
        .get(index)
        .ok_or_else(|| IoError::CorruptHeader("EXR channel list changed while reading".into()))?;
    let source = &image.layer_data[group.header].channel_data.list;

    let data_type = layer_info.pixel.data_type();
    let word = data_type.word_size();
    let pixel_count = layer_info.width as usize * layer_info.height as usize;
    let stride = group.channels.len() * word;
    let mut bytes = vec![0u8; pixel_count * stride];
    for (c, &ch) in group.channels.iter().enumerate() {
        let samples = &source[ch].sample_data;
        for i in 0..pixel_count {
            let out = &mut bytes[i * stride + c * word..][..word];
            match (samples, data_type) {
                (FlatSamples::F16(v), DataType::F16) => NativeEndian::write_u16(out, v[i].to_bits()),
                (FlatSamples::U32(v), DataType::U32) => NativeEndian::write_u32(out, v[i]),
                (FlatSamples::F16(v), _) => NativeEndian::write_f32(out, v[i].to_f32()),
                (FlatSamples::F32(v), _) => NativeEndian::write_f32(out, v[i]),
                (FlatSamples::U32(v), _) => NativeEndian::write_f32(out, v[i] as f32),
            }
        }
    }

    let pixels = PixelData::from_bytes(layer_info, &bytes)?;
    tracing::debug!(
        "{}: read EXR layer {:?} {}",
        path.display(),
        pixels.info().layer_name,
        pixels.pixel_type()
    );
    Ok(crate::Image::new(pixels).with_tags(info.tags))
}

/// Decodes the first layer.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<crate::Image> {
    read_layer(path, 0, &Options::default())
}

fn channel_names(layout: Layout) -> &'static [&'static str] {
    match layout {
        Layout::L => &["Y"],
        Layout::LA => &["Y", "A"],
        Layout::Rgb => &["R", "G", "B"],
        Layout::Rgba => &["R", "G", "B", "A"],
    }
}

/// Writes an image as a single-part scanline EXR.
///
/// Mirrored and BGR buffers are stored top-down in RGB order.
pub fn write_with<P: AsRef<Path>>(path: P, image: &crate::Image, options: &Options) -> IoResult<()> {
    use exr::prelude::*;

    let path = path.as_ref();
    let pixels = &image.pixels;
    let pixel = pixels.pixel_type();
    let (width, height) = pixels.info().proxy_size();
    let channel_count = pixel.channels();
    let word = pixel.data_type().word_size();

    let mut planes: Vec<FlatSamples> = (0..channel_count)
        .map(|_| match pixel.data_type() {
            DataType::F16 => FlatSamples::F16(Vec::new()),
            DataType::U32 => FlatSamples::U32(Vec::new()),
            _ => FlatSamples::F32(Vec::new()),
        })
        .collect();
    let rows = image.display_rows();
    let row_bytes = width as usize * pixels.pixel_byte_count();
    for line in rows.chunks_exact(row_bytes.max(1)) {
        for x in 0..width as usize {
            for (c, plane) in planes.iter_mut().enumerate() {
                let s = &line[(x * channel_count + c) * word..][..word];
                match (plane, pixel.data_type()) {
                    (FlatSamples::F16(v), _) => v.push(half::f16::from_bits(NativeEndian::read_u16(s))),
                    (FlatSamples::U32(v), _) => v.push(NativeEndian::read_u32(s)),
                    (FlatSamples::F32(v), DataType::F32) => v.push(NativeEndian::read_f32(s)),
                    (FlatSamples::F32(v), DataType::U16) => {
                        v.push(f32::from(NativeEndian::read_u16(s)) / 65535.0)
                    }
                    (FlatSamples::F32(v), DataType::U8) => v.push(f32::from(s[0]) / 255.0),
                    _ => {
                        return Err(IoError::UnsupportedPixelLayout(format!(
                            "EXR cannot store {pixel}"
                        )));
                    }
                }
            }
        }
    }

    let channels: Vec<AnyChannel<FlatSamples>> = channel_names(pixel.layout())
        .iter()
        .zip(planes)
        .map(|(name, samples)| AnyChannel::new(*name, samples))
        .collect();

    let layer_name = &pixels.info().layer_name;
    let mut attributes = if layer_name.is_empty() {
        LayerAttributes::default()
    } else {
        LayerAttributes::named(layer_name.as_str())
    };
    for (key, value) in image.tags.iter() {
        let text = Text::new_or_none(value);
        match key {
            "Owner" => attributes.owner = text,
            "Comments" => attributes.comments = text,
            "Capture Date" => attributes.capture_date = text,
            "Software" => attributes.software_name = text,
            _ => {
                if let (Some(name), Some(text)) = (Text::new_or_none(key), text) {
                    attributes.other.insert(name, AttributeValue::Text(text));
                }
            }
        }
    }

    let encoding = Encoding {
        compression: options.codec_compression(),
        ..Encoding::FAST_LOSSLESS
    };
    let layer = Layer::new(
        (width as usize, height as usize),
        attributes,
        encoding,
        AnyChannels::sort(channels.into()),
    );
    let exr_image = Image::from_layer(layer);
    let result = if options.thread_count == 1 {
        exr_image.write().non_parallel().to_file(path)
    } else {
        exr_image.write().to_file(path)
    };
    result.map_err(exr_err)?;
    tracing::debug!(
        "{}: wrote EXR {} ({:?})",
        path.display(),
        pixel,
        options.compression
    );
    Ok(())
}

/// Writes with default options.
pub fn write<P: AsRef<Path>>(path: P, image: &crate::Image) -> IoResult<()> {
    write_with(path, image, &Options::default())
}

/// OpenEXR reader.
#[derive(Debug, Clone, Default)]
pub struct ExrReader {
    options: Options,
}

impl SequenceRead for ExrReader {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn read_info(&self, path: &Path) -> IoResult<Info> {
        read_info_with(path, &self.options)
    }

    fn read(&self, path: &Path) -> IoResult<crate::Image> {
        read_layer(path, 0, &self.options)
    }
}

/// OpenEXR writer.
#[derive(Debug, Clone, Default)]
pub struct ExrWriter {
    options: Options,
}

impl SequenceWrite for ExrWriter {
    type Options = Options;

    fn with_options(options: Options) -> Self {
        Self { options }
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn write(&self, path: &Path, image: &crate::Image) -> IoResult<()> {
        write_with(path, image, &self.options)
    }
}
