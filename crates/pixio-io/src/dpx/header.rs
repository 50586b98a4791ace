//! DPX header layout (SMPTE 268M).
//!
//! The 2048-byte header is five fixed sections:
//!
//! | Section | Offset | Size |
//! |---------|--------|------|
//! | File    | 0      | 768  |
//! | Image   | 768    | 640  |
//! | Source  | 1408   | 256  |
//! | Film    | 1664   | 256  |
//! | TV      | 1920   | 128  |
//!
//! Fields are decoded in host byte order and then swapped with
//! [`Header::convert_endian`] when the file was written on a machine of the
//! other endianness. Numeric fields whose bits are all ones are undefined.

use super::{Components, Descriptor, Options, Orient, Transfer};
use crate::{Info, IoError, IoResult, Tags};
use byteorder::{ByteOrder, NativeEndian};
use pixio_core::{DataType, Endian, FileIo, Layout, Mirror, PixelDataInfo, PixelType};
use std::str::FromStr;

/// `"SDPX"` read as a big-endian word.
pub const MAGIC: u32 = 0x5344_5058;
/// Header size in bytes.
pub const HEADER_SIZE: usize = 2048;
/// Size of the file, image and source sections.
pub const GENERIC_HEADER_SIZE: u32 = 1664;
/// Size of the film and TV sections.
pub const INDUSTRY_HEADER_SIZE: u32 = 384;

const FILE_SIZE_OFFSET: u64 = 16;

/// Undefined `u8` field.
pub const U8_UNDEFINED: u8 = 0xFF;
/// Undefined `u16` field.
pub const U16_UNDEFINED: u16 = 0xFFFF;
/// Undefined `u32` field.
pub const U32_UNDEFINED: u32 = 0xFFFF_FFFF;

/// Tag labels for header fields surfaced as metadata.
pub mod tag {
    /// File creation time.
    pub const TIME: &str = "Time";
    /// Creating application.
    pub const CREATOR: &str = "Creator";
    /// Project name.
    pub const PROJECT: &str = "Project";
    /// Copyright notice.
    pub const COPYRIGHT: &str = "Copyright";
    /// Color transfer of the first image element.
    pub const TRANSFER: &str = "Transfer";
    /// Source image offset.
    pub const SOURCE_OFFSET: &str = "Source Offset";
    /// Source image center.
    pub const SOURCE_CENTER: &str = "Source Center";
    /// Source image size.
    pub const SOURCE_SIZE: &str = "Source Size";
    /// Source file name.
    pub const SOURCE_FILE: &str = "Source File";
    /// Source creation time.
    pub const SOURCE_TIME: &str = "Source Time";
    /// Scanner or camera.
    pub const SOURCE_INPUT_DEVICE: &str = "Source Input Device";
    /// Scanner or camera serial number.
    pub const SOURCE_INPUT_SERIAL: &str = "Source Input Serial";
    /// Border validity (x1 x2 y1 y2).
    pub const SOURCE_BORDER: &str = "Source Border";
    /// Pixel aspect ratio (horizontal vertical).
    pub const SOURCE_PIXEL_ASPECT: &str = "Source Pixel Aspect";
    /// Scanned size.
    pub const SOURCE_SCAN_SIZE: &str = "Source Scan Size";
    /// Film edge code (id:type:prefix:count:offset).
    pub const KEYCODE: &str = "Keycode";
    /// Film format.
    pub const FILM_FORMAT: &str = "Film Format";
    /// Frame position in sequence.
    pub const FILM_FRAME: &str = "Film Frame";
    /// Sequence length.
    pub const FILM_SEQUENCE: &str = "Film Sequence";
    /// Held frame count.
    pub const FILM_HOLD: &str = "Film Hold";
    /// Film frame rate.
    pub const FILM_FRAME_RATE: &str = "Film Frame Rate";
    /// Shutter angle.
    pub const FILM_SHUTTER: &str = "Film Shutter";
    /// Frame identification.
    pub const FILM_FRAME_ID: &str = "Film Frame ID";
    /// Slate information.
    pub const FILM_SLATE: &str = "Film Slate";
    /// SMPTE timecode (hh:mm:ss:ff).
    pub const TIMECODE: &str = "Timecode";
    /// Interlace flag.
    pub const TV_INTERLACE: &str = "TV Interlace";
    /// Field number.
    pub const TV_FIELD: &str = "TV Field";
    /// Video signal standard.
    pub const TV_VIDEO_SIGNAL: &str = "TV Video Signal";
    /// Sampling rate (horizontal vertical).
    pub const TV_SAMPLE_RATE: &str = "TV Sample Rate";
    /// Temporal sampling rate.
    pub const TV_FRAME_RATE: &str = "TV Frame Rate";
    /// Time offset from sync to first pixel.
    pub const TV_TIME_OFFSET: &str = "TV Time Offset";
    /// Gamma.
    pub const TV_GAMMA: &str = "TV Gamma";
    /// Black level code value.
    pub const TV_BLACK_LEVEL: &str = "TV Black Level";
    /// Black gain.
    pub const TV_BLACK_GAIN: &str = "TV Black Gain";
    /// Breakpoint.
    pub const TV_BREAKPOINT: &str = "TV Breakpoint";
    /// Reference white level code value.
    pub const TV_WHITE_LEVEL: &str = "TV White Level";
    /// Integration time.
    pub const TV_INTEGRATION_TIMES: &str = "TV Integration Times";
}

/// File information section.
#[derive(Debug, Clone)]
pub struct FileSection {
    /// Magic number, [`MAGIC`] once endian-corrected.
    pub magic: u32,
    /// Offset to the image data.
    pub image_offset: u32,
    /// Version string (`"V1.0"` / `"V2.0"`).
    pub version: [u8; 8],
    /// Total file size.
    pub size: u32,
    /// 0 = same as previous frame, 1 = new.
    pub ditto_key: u32,
    /// Generic header size.
    pub header_size: u32,
    /// Industry header size.
    pub industry_header_size: u32,
    /// User header size.
    pub user_header_size: u32,
    /// File name.
    pub name: [u8; 100],
    /// Creation time (`YYYY:MM:DD:hh:mm:ssLTZ`).
    pub time: [u8; 24],
    /// Creator.
    pub creator: [u8; 100],
    /// Project.
    pub project: [u8; 200],
    /// Copyright.
    pub copyright: [u8; 200],
    /// Encryption key, undefined when unencrypted.
    pub encryption_key: u32,
    /// Reserved.
    pub pad: [u8; 104],
}

/// Image element descriptor.
#[derive(Debug, Clone)]
pub struct Element {
    /// 0 = unsigned, 1 = signed.
    pub data_sign: u32,
    /// Reference low code value.
    pub low_data: u32,
    /// Quantity represented by `low_data`.
    pub low_quantity: f32,
    /// Reference high code value.
    pub high_data: u32,
    /// Quantity represented by `high_data`.
    pub high_quantity: f32,
    /// Channel descriptor.
    pub descriptor: u8,
    /// Color transfer.
    pub transfer: u8,
    /// Colorimetric specification.
    pub colorimetric: u8,
    /// Bits per component.
    pub bit_depth: u8,
    /// Component packing.
    pub packing: u16,
    /// 0 = uncompressed, 1 = RLE.
    pub encoding: u16,
    /// Offset to this element's data.
    pub data_offset: u32,
    /// Padding bytes at the end of each line.
    pub line_padding: u32,
    /// Padding bytes at the end of the element.
    pub elem_padding: u32,
    /// Description.
    pub description: [u8; 32],
}

/// Image information section.
#[derive(Debug, Clone)]
pub struct ImageSection {
    /// Orientation code (see [`Orient`]).
    pub orient: u16,
    /// Number of image elements in use.
    pub elem_size: u16,
    /// Pixels per line, lines per element.
    pub size: [u32; 2],
    /// Element descriptors.
    pub elem: [Element; 8],
    /// Reserved.
    pub pad: [u8; 52],
}

/// Source information section.
#[derive(Debug, Clone)]
pub struct SourceSection {
    /// X, Y offset.
    pub offset: [u32; 2],
    /// X, Y center.
    pub center: [f32; 2],
    /// Original X, Y size.
    pub size: [u32; 2],
    /// Source file name.
    pub file: [u8; 100],
    /// Source creation time.
    pub time: [u8; 24],
    /// Input device.
    pub input_device: [u8; 32],
    /// Input device serial number.
    pub input_serial: [u8; 32],
    /// Border validity (XL, XR, YT, YB).
    pub border: [u16; 4],
    /// Pixel aspect ratio.
    pub pixel_aspect: [u32; 2],
    /// Scanned size (version 2.0).
    pub scan_size: [f32; 2],
    /// Reserved.
    pub pad: [u8; 20],
}

/// Motion picture film section.
#[derive(Debug, Clone)]
pub struct FilmSection {
    /// Film manufacturer ID.
    pub id: [u8; 2],
    /// Film type.
    pub film_type: [u8; 2],
    /// Offset in perfs.
    pub offset: [u8; 2],
    /// Prefix.
    pub prefix: [u8; 6],
    /// Count.
    pub count: [u8; 4],
    /// Format.
    pub format: [u8; 32],
    /// Frame position in sequence.
    pub frame: u32,
    /// Sequence length.
    pub sequence: u32,
    /// Held count.
    pub hold: u32,
    /// Frame rate.
    pub frame_rate: f32,
    /// Shutter angle.
    pub shutter: f32,
    /// Frame identification.
    pub frame_id: [u8; 32],
    /// Slate.
    pub slate: [u8; 100],
    /// Reserved.
    pub pad: [u8; 56],
}

/// Television section.
#[derive(Debug, Clone)]
pub struct TvSection {
    /// SMPTE timecode, BCD `hhmmssff`.
    pub timecode: u32,
    /// SMPTE user bits.
    pub user_bits: u32,
    /// Interlace.
    pub interlace: u8,
    /// Field number.
    pub field: u8,
    /// Video signal standard.
    pub video_signal: u8,
    /// Reserved.
    pub pad: u8,
    /// Horizontal, vertical sampling rate.
    pub sample_rate: [f32; 2],
    /// Temporal sampling rate.
    pub frame_rate: f32,
    /// Time offset.
    pub time_offset: f32,
    /// Gamma.
    pub gamma: f32,
    /// Black level.
    pub black_level: f32,
    /// Black gain.
    pub black_gain: f32,
    /// Breakpoint.
    pub breakpoint: f32,
    /// White level.
    pub white_level: f32,
    /// Integration time.
    pub integration_times: f32,
    /// Reserved.
    pub pad2: [u8; 76],
}

/// The full 2048-byte header.
#[derive(Debug, Clone)]
pub struct Header {
    /// File section.
    pub file: FileSection,
    /// Image section.
    pub image: ImageSection,
    /// Source section.
    pub source: SourceSection,
    /// Film section.
    pub film: FilmSection,
    /// TV section.
    pub tv: TvSection,
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn u8(&mut self) -> u8 {
        self.pos += 1;
        self.buf[self.pos - 1]
    }

    fn u16(&mut self) -> u16 {
        self.pos += 2;
        NativeEndian::read_u16(&self.buf[self.pos - 2..])
    }

    fn u32(&mut self) -> u32 {
        self.pos += 4;
        NativeEndian::read_u32(&self.buf[self.pos - 4..])
    }

    fn f32(&mut self) -> f32 {
        self.pos += 4;
        NativeEndian::read_f32(&self.buf[self.pos - 4..])
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16s<const N: usize>(&mut self) -> [u16; N] {
        std::array::from_fn(|_| self.u16())
    }

    fn u32s<const N: usize>(&mut self) -> [u32; N] {
        std::array::from_fn(|_| self.u32())
    }

    fn f32s<const N: usize>(&mut self) -> [f32; N] {
        std::array::from_fn(|_| self.f32())
    }
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }
}

#[inline]
fn swap_f32(v: &mut f32) {
    *v = f32::from_bits(v.to_bits().swap_bytes());
}

impl Element {
    fn decode(d: &mut Decoder<'_>) -> Self {
        Self {
            data_sign: d.u32(),
            low_data: d.u32(),
            low_quantity: d.f32(),
            high_data: d.u32(),
            high_quantity: d.f32(),
            descriptor: d.u8(),
            transfer: d.u8(),
            colorimetric: d.u8(),
            bit_depth: d.u8(),
            packing: d.u16(),
            encoding: d.u16(),
            data_offset: d.u32(),
            line_padding: d.u32(),
            elem_padding: d.u32(),
            description: d.bytes(),
        }
    }

    fn encode(&self, e: &mut Encoder) {
        e.u32(self.data_sign);
        e.u32(self.low_data);
        e.f32(self.low_quantity);
        e.u32(self.high_data);
        e.f32(self.high_quantity);
        e.u8(self.descriptor);
        e.u8(self.transfer);
        e.u8(self.colorimetric);
        e.u8(self.bit_depth);
        e.u16(self.packing);
        e.u16(self.encoding);
        e.u32(self.data_offset);
        e.u32(self.line_padding);
        e.u32(self.elem_padding);
        e.bytes(&self.description);
    }

    fn convert_endian(&mut self) {
        self.data_sign = self.data_sign.swap_bytes();
        self.low_data = self.low_data.swap_bytes();
        swap_f32(&mut self.low_quantity);
        self.high_data = self.high_data.swap_bytes();
        swap_f32(&mut self.high_quantity);
        self.packing = self.packing.swap_bytes();
        self.encoding = self.encoding.swap_bytes();
        self.data_offset = self.data_offset.swap_bytes();
        self.line_padding = self.line_padding.swap_bytes();
        self.elem_padding = self.elem_padding.swap_bytes();
    }

    fn clear_strings(&mut self) {
        self.description = [0; 32];
    }
}

impl Header {
    /// A header with every numeric field undefined and every string and
    /// padding region zeroed.
    pub fn zero() -> Self {
        let mut h = Self::decode(&[0xFF; HEADER_SIZE]);
        let f = &mut h.file;
        f.version = [0; 8];
        f.name = [0; 100];
        f.time = [0; 24];
        f.creator = [0; 100];
        f.project = [0; 200];
        f.copyright = [0; 200];
        f.pad = [0; 104];
        h.image.elem.iter_mut().for_each(Element::clear_strings);
        h.image.pad = [0; 52];
        let s = &mut h.source;
        s.file = [0; 100];
        s.time = [0; 24];
        s.input_device = [0; 32];
        s.input_serial = [0; 32];
        s.pad = [0; 20];
        let m = &mut h.film;
        m.id = [0; 2];
        m.film_type = [0; 2];
        m.offset = [0; 2];
        m.prefix = [0; 6];
        m.count = [0; 4];
        m.format = [0; 32];
        m.frame_id = [0; 32];
        m.slate = [0; 100];
        m.pad = [0; 56];
        h.tv.pad = 0;
        h.tv.pad2 = [0; 76];
        h
    }

    /// Decodes a header from host-order bytes.
    ///
    /// # Panics
    ///
    /// If `buf` is shorter than [`HEADER_SIZE`].
    pub fn decode(buf: &[u8]) -> Self {
        let d = &mut Decoder { buf: &buf[..HEADER_SIZE], pos: 0 };
        let file = FileSection {
            magic: d.u32(),
            image_offset: d.u32(),
            version: d.bytes(),
            size: d.u32(),
            ditto_key: d.u32(),
            header_size: d.u32(),
            industry_header_size: d.u32(),
            user_header_size: d.u32(),
            name: d.bytes(),
            time: d.bytes(),
            creator: d.bytes(),
            project: d.bytes(),
            copyright: d.bytes(),
            encryption_key: d.u32(),
            pad: d.bytes(),
        };
        let image = ImageSection {
            orient: d.u16(),
            elem_size: d.u16(),
            size: d.u32s(),
            elem: std::array::from_fn(|_| Element::decode(d)),
            pad: d.bytes(),
        };
        let source = SourceSection {
            offset: d.u32s(),
            center: d.f32s(),
            size: d.u32s(),
            file: d.bytes(),
            time: d.bytes(),
            input_device: d.bytes(),
            input_serial: d.bytes(),
            border: d.u16s(),
            pixel_aspect: d.u32s(),
            scan_size: d.f32s(),
            pad: d.bytes(),
        };
        let film = FilmSection {
            id: d.bytes(),
            film_type: d.bytes(),
            offset: d.bytes(),
            prefix: d.bytes(),
            count: d.bytes(),
            format: d.bytes(),
            frame: d.u32(),
            sequence: d.u32(),
            hold: d.u32(),
            frame_rate: d.f32(),
            shutter: d.f32(),
            frame_id: d.bytes(),
            slate: d.bytes(),
            pad: d.bytes(),
        };
        let tv = TvSection {
            timecode: d.u32(),
            user_bits: d.u32(),
            interlace: d.u8(),
            field: d.u8(),
            video_signal: d.u8(),
            pad: d.u8(),
            sample_rate: d.f32s(),
            frame_rate: d.f32(),
            time_offset: d.f32(),
            gamma: d.f32(),
            black_level: d.f32(),
            black_gain: d.f32(),
            breakpoint: d.f32(),
            white_level: d.f32(),
            integration_times: d.f32(),
            pad2: d.bytes(),
        };
        debug_assert_eq!(d.pos, HEADER_SIZE);
        Self {
            file,
            image,
            source,
            film,
            tv,
        }
    }

    /// Encodes the header in host byte order.
    pub fn encode(&self) -> Vec<u8> {
        let e = &mut Encoder {
            buf: Vec::with_capacity(HEADER_SIZE),
        };
        let f = &self.file;
        e.u32(f.magic);
        e.u32(f.image_offset);
        e.bytes(&f.version);
        e.u32(f.size);
        e.u32(f.ditto_key);
        e.u32(f.header_size);
        e.u32(f.industry_header_size);
        e.u32(f.user_header_size);
        e.bytes(&f.name);
        e.bytes(&f.time);
        e.bytes(&f.creator);
        e.bytes(&f.project);
        e.bytes(&f.copyright);
        e.u32(f.encryption_key);
        e.bytes(&f.pad);

        let i = &self.image;
        e.u16(i.orient);
        e.u16(i.elem_size);
        i.size.iter().for_each(|&v| e.u32(v));
        i.elem.iter().for_each(|el| el.encode(e));
        e.bytes(&i.pad);

        let s = &self.source;
        s.offset.iter().for_each(|&v| e.u32(v));
        s.center.iter().for_each(|&v| e.f32(v));
        s.size.iter().for_each(|&v| e.u32(v));
        e.bytes(&s.file);
        e.bytes(&s.time);
        e.bytes(&s.input_device);
        e.bytes(&s.input_serial);
        s.border.iter().for_each(|&v| e.u16(v));
        s.pixel_aspect.iter().for_each(|&v| e.u32(v));
        s.scan_size.iter().for_each(|&v| e.f32(v));
        e.bytes(&s.pad);

        let m = &self.film;
        e.bytes(&m.id);
        e.bytes(&m.film_type);
        e.bytes(&m.offset);
        e.bytes(&m.prefix);
        e.bytes(&m.count);
        e.bytes(&m.format);
        e.u32(m.frame);
        e.u32(m.sequence);
        e.u32(m.hold);
        e.f32(m.frame_rate);
        e.f32(m.shutter);
        e.bytes(&m.frame_id);
        e.bytes(&m.slate);
        e.bytes(&m.pad);

        let t = &self.tv;
        e.u32(t.timecode);
        e.u32(t.user_bits);
        e.u8(t.interlace);
        e.u8(t.field);
        e.u8(t.video_signal);
        e.u8(t.pad);
        t.sample_rate.iter().for_each(|&v| e.f32(v));
        for v in [
            t.frame_rate,
            t.time_offset,
            t.gamma,
            t.black_level,
            t.black_gain,
            t.breakpoint,
            t.white_level,
            t.integration_times,
        ] {
            e.f32(v);
        }
        e.bytes(&t.pad2);

        debug_assert_eq!(e.buf.len(), HEADER_SIZE);
        std::mem::take(&mut e.buf)
    }

    /// Byte-swaps every multi-byte numeric field, element descriptors
    /// included. Applying it twice restores the original.
    pub fn convert_endian(&mut self) {
        let f = &mut self.file;
        for v in [
            &mut f.magic,
            &mut f.image_offset,
            &mut f.size,
            &mut f.ditto_key,
            &mut f.header_size,
            &mut f.industry_header_size,
            &mut f.user_header_size,
            &mut f.encryption_key,
        ] {
            *v = v.swap_bytes();
        }

        let i = &mut self.image;
        i.orient = i.orient.swap_bytes();
        i.elem_size = i.elem_size.swap_bytes();
        i.size.iter_mut().for_each(|v| *v = v.swap_bytes());
        i.elem.iter_mut().for_each(Element::convert_endian);

        let s = &mut self.source;
        s.offset.iter_mut().for_each(|v| *v = v.swap_bytes());
        s.center.iter_mut().for_each(swap_f32);
        s.size.iter_mut().for_each(|v| *v = v.swap_bytes());
        s.border.iter_mut().for_each(|v| *v = v.swap_bytes());
        s.pixel_aspect.iter_mut().for_each(|v| *v = v.swap_bytes());
        s.scan_size.iter_mut().for_each(swap_f32);

        let m = &mut self.film;
        m.frame = m.frame.swap_bytes();
        m.sequence = m.sequence.swap_bytes();
        m.hold = m.hold.swap_bytes();
        swap_f32(&mut m.frame_rate);
        swap_f32(&mut m.shutter);

        let t = &mut self.tv;
        t.timecode = t.timecode.swap_bytes();
        t.user_bits = t.user_bits.swap_bytes();
        t.sample_rate.iter_mut().for_each(swap_f32);
        for v in [
            &mut t.frame_rate,
            &mut t.time_offset,
            &mut t.gamma,
            &mut t.black_level,
            &mut t.black_gain,
            &mut t.breakpoint,
            &mut t.white_level,
            &mut t.integration_times,
        ] {
            swap_f32(v);
        }
    }

    /// Offset of the first element's pixels.
    pub fn data_offset(&self) -> u32 {
        match self.image.elem[0].data_offset {
            U32_UNDEFINED => self.file.image_offset,
            offset => offset,
        }
    }

    /// Padding bytes after each scanline of the first element.
    pub fn line_padding(&self) -> u32 {
        match self.image.elem[0].line_padding {
            U32_UNDEFINED => 0,
            padding => padding,
        }
    }

    /// Packing of the first element.
    pub fn components(&self) -> Components {
        Components::from_u16(self.image.elem[0].packing).unwrap_or(Components::Pack)
    }
}

/// Reads and interprets the header at the start of `io`.
///
/// The magic number is read first; anything other than `SDPX` or `XPDS`
/// fails before more bytes are consumed. When the file's byte order differs
/// from the host's, endian conversion is switched on for `io` so the pixel
/// data that follows is swapped too.
///
/// # Errors
///
/// - [`IoError::BadMagic`] for a foreign file
/// - [`IoError::File`] (truncated) for a short header
/// - [`IoError::CorruptHeader`] for a missing size or element count
/// - [`IoError::UnsupportedPixelLayout`] for layouts without a [`PixelType`]
pub fn read(io: &mut FileIo) -> IoResult<(Info, Header, Transfer)> {
    let mut buf = vec![0u8; HEADER_SIZE];
    io.read(&mut buf[..4], 1)?;
    let file_endian = match &buf[..4] {
        b"SDPX" => Endian::Msb,
        b"XPDS" => Endian::Lsb,
        magic => {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(IoError::BadMagic {
                path: io.file_name().to_path_buf(),
                magic: found,
            });
        }
    };
    io.read(&mut buf[4..], 1)?;

    let mut header = Header::decode(&buf);
    let swap = file_endian.needs_swap();
    if swap {
        header.convert_endian();
    }
    io.set_endian_conversion(swap);
    tracing::debug!(
        "{}: DPX {} header, {}",
        io.file_name().display(),
        file_endian,
        field_str(&header.file.version).unwrap_or_default()
    );

    let image = &header.image;
    match image.elem_size {
        1 => {}
        0 | U16_UNDEFINED => {
            return Err(IoError::CorruptHeader("no image elements".into()));
        }
        n if n > 8 => {
            return Err(IoError::CorruptHeader(format!("{n} image elements")));
        }
        n => {
            return Err(IoError::UnsupportedPixelLayout(format!("{n} image elements")));
        }
    }
    let [width, height] = image.size;
    if width == 0 || height == 0 || width == U32_UNDEFINED || height == U32_UNDEFINED {
        return Err(IoError::CorruptHeader(format!("image size {width}x{height}")));
    }

    let elem = &image.elem[0];
    let pixel = pixel_type(elem)?;
    if elem.encoding != 0 && elem.encoding != U16_UNDEFINED {
        return Err(IoError::UnsupportedPixelLayout("RLE encoding".into()));
    }

    let mut layer = PixelDataInfo::new(width, height, pixel)
        .with_file_name(io.file_name().to_string_lossy());
    layer.mirror = orient_to_mirror(image.orient);

    let transfer = Transfer::from_u8(elem.transfer).unwrap_or(Transfer::User);
    let mut info = Info::new(io.file_name().to_string_lossy(), layer);
    info.tags = to_tags(&header);
    info.tags.set(tag::TRANSFER, transfer.to_string());
    Ok((info, header, transfer))
}

/// Writes a header describing `info`.
///
/// The file size field is left at zero; call [`write_finish`] once the pixel
/// data is written. Endian conversion on `io` is set to match the target
/// byte order.
pub fn write(
    io: &mut FileIo,
    info: &PixelDataInfo,
    tags: &Tags,
    options: &Options,
    transfer: Transfer,
) -> IoResult<()> {
    let bit_depth = file_bit_depth(info.pixel, options.bit_depth)?;
    let descriptor = match info.pixel.layout() {
        Layout::L => Descriptor::L,
        Layout::Rgb => Descriptor::Rgb,
        Layout::Rgba => Descriptor::Rgba,
        Layout::LA => {
            return Err(IoError::UnsupportedPixelLayout(
                "DPX has no luminance + alpha descriptor".into(),
            ));
        }
    };

    let mut h = Header::zero();
    h.file.magic = MAGIC;
    h.file.image_offset = HEADER_SIZE as u32;
    set_field(&mut h.file.version, options.version.label());
    h.file.size = 0;
    h.file.ditto_key = 1;
    h.file.header_size = GENERIC_HEADER_SIZE;
    h.file.industry_header_size = INDUSTRY_HEADER_SIZE;
    h.file.user_header_size = 0;
    if let Some(name) = io.file_name().file_name() {
        set_field(&mut h.file.name, &name.to_string_lossy());
    }
    set_field(&mut h.file.creator, concat!("pixio ", env!("CARGO_PKG_VERSION")));

    h.image.orient = mirror_to_orient(info.mirror) as u16;
    h.image.elem_size = 1;
    h.image.size = [info.width, info.height];
    let el = &mut h.image.elem[0];
    el.data_sign = 0;
    el.low_data = 0;
    el.low_quantity = 0.0;
    el.high_data = (1u32 << bit_depth) - 1;
    el.descriptor = descriptor as u8;
    el.transfer = transfer as u8;
    el.colorimetric = if transfer == Transfer::FilmPrint { 1 } else { 0 };
    el.bit_depth = bit_depth;
    el.packing = match bit_depth {
        10 | 12 => Components::TypeA,
        _ => Components::Pack,
    } as u16;
    el.encoding = 0;
    el.data_offset = HEADER_SIZE as u32;
    el.line_padding = 0;
    el.elem_padding = 0;

    from_tags(&mut h, tags);

    let target = options.endian.resolve();
    let swap = target.needs_swap();
    if swap {
        h.convert_endian();
    }
    io.set_endian_conversion(false);
    io.write(&h.encode(), 1)?;
    io.set_endian_conversion(swap);
    tracing::debug!("{}: wrote DPX {} header", io.file_name().display(), target);
    Ok(())
}

/// Patches the file size field once all pixel data is written.
pub fn write_finish(io: &mut FileIo) -> IoResult<()> {
    let size = io.size();
    io.set_pos(FILE_SIZE_OFFSET)?;
    io.write_u32(size as u32)?;
    io.set_pos(size)?;
    Ok(())
}

/// Bit depth used to store `pixel`, honoring a 12-bit request for U16 data.
pub fn file_bit_depth(pixel: PixelType, requested: Option<u8>) -> IoResult<u8> {
    let bits = match (pixel.layout(), pixel.data_type(), requested) {
        (Layout::LA, ..) => None,
        (_, DataType::U8, None | Some(8)) => Some(8),
        (Layout::Rgb, DataType::U10, None | Some(10)) => Some(10),
        (_, DataType::U16, None | Some(16)) => Some(16),
        (_, DataType::U16, Some(12)) => Some(12),
        _ => None,
    };
    bits.ok_or_else(|| {
        let req = requested.map(|b| format!(" as {b}-bit")).unwrap_or_default();
        IoError::UnsupportedPixelLayout(format!("DPX cannot store {pixel}{req}"))
    })
}

fn pixel_type(elem: &Element) -> IoResult<PixelType> {
    let layout = match Descriptor::from_u8(elem.descriptor) {
        Some(Descriptor::L) => Layout::L,
        Some(Descriptor::Rgb) => Layout::Rgb,
        Some(Descriptor::Rgba) => Layout::Rgba,
        _ => {
            return Err(IoError::UnsupportedPixelLayout(format!(
                "descriptor {}",
                elem.descriptor
            )));
        }
    };
    let filled = matches!(
        Components::from_u16(elem.packing),
        Some(Components::TypeA | Components::TypeB)
    );
    let data_type = match (elem.bit_depth, layout) {
        (8, _) => Some(DataType::U8),
        (10, Layout::Rgb) if filled => Some(DataType::U10),
        (12, _) if filled => Some(DataType::U16),
        (16, _) => Some(DataType::U16),
        _ => None,
    };
    data_type
        .and_then(|dt| PixelType::new(layout, dt))
        .ok_or_else(|| {
            IoError::UnsupportedPixelLayout(format!(
                "{:?} {}-bit, packing {}",
                layout, elem.bit_depth, elem.packing
            ))
        })
}

fn orient_to_mirror(orient: u16) -> Mirror {
    match Orient::from_u16(orient) {
        Some(o) => {
            if o.is_transposed() {
                tracing::warn!("DPX orientation {o:?} is read without transposing");
            }
            o.mirror()
        }
        None => Mirror::default(),
    }
}

fn mirror_to_orient(mirror: Mirror) -> Orient {
    match (mirror.x, mirror.y) {
        (false, false) => Orient::LeftRightTopBottom,
        (true, false) => Orient::RightLeftTopBottom,
        (false, true) => Orient::LeftRightBottomTop,
        (true, true) => Orient::RightLeftBottomTop,
    }
}

// --- Fields <-> text ---

fn field_str(bytes: &[u8]) -> Option<String> {
    match bytes.first() {
        None | Some(0) | Some(&U8_UNDEFINED) => None,
        Some(_) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let s = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
    }
}

fn set_field(dst: &mut [u8], value: &str) {
    dst.fill(0);
    let n = value.len().min(dst.len());
    dst[..n].copy_from_slice(&value.as_bytes()[..n]);
}

fn defined_u32(v: u32) -> bool {
    v != U32_UNDEFINED
}

fn defined_f32(v: f32) -> bool {
    v.is_finite()
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(" ")
}

fn parse_list<T: FromStr, const N: usize>(s: &str) -> Option<[T; N]> {
    let values: Vec<T> = s
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    values.try_into().ok()
}

/// Formats a BCD timecode as `hh:mm:ss:ff`.
pub fn timecode_to_string(tc: u32) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}",
        (tc >> 24) & 0xFF,
        (tc >> 16) & 0xFF,
        (tc >> 8) & 0xFF,
        tc & 0xFF
    )
}

/// Parses `hh:mm:ss:ff` into BCD.
pub fn string_to_timecode(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut tc = 0u32;
    for p in parts {
        if p.is_empty() || p.len() > 2 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        tc = (tc << 8) | u32::from_str_radix(p, 16).ok()?;
    }
    Some(tc)
}

fn to_tags(h: &Header) -> Tags {
    let mut tags = Tags::new();
    let mut text = |key: &str, bytes: &[u8]| {
        if let Some(v) = field_str(bytes) {
            tags.set(key, v);
        }
    };
    text(tag::TIME, &h.file.time);
    text(tag::CREATOR, &h.file.creator);
    text(tag::PROJECT, &h.file.project);
    text(tag::COPYRIGHT, &h.file.copyright);
    text(tag::SOURCE_FILE, &h.source.file);
    text(tag::SOURCE_TIME, &h.source.time);
    text(tag::SOURCE_INPUT_DEVICE, &h.source.input_device);
    text(tag::SOURCE_INPUT_SERIAL, &h.source.input_serial);
    text(tag::FILM_FORMAT, &h.film.format);
    text(tag::FILM_FRAME_ID, &h.film.frame_id);
    text(tag::FILM_SLATE, &h.film.slate);

    let s = &h.source;
    if s.offset.iter().all(|&v| defined_u32(v)) {
        tags.set(tag::SOURCE_OFFSET, join(&s.offset));
    }
    if s.center.iter().all(|&v| defined_f32(v)) {
        tags.set(tag::SOURCE_CENTER, join(&s.center));
    }
    if s.size.iter().all(|&v| defined_u32(v)) {
        tags.set(tag::SOURCE_SIZE, join(&s.size));
    }
    if s.border.iter().all(|&v| v != U16_UNDEFINED) {
        tags.set(tag::SOURCE_BORDER, join(&s.border));
    }
    if s.pixel_aspect.iter().all(|&v| defined_u32(v)) {
        tags.set(tag::SOURCE_PIXEL_ASPECT, join(&s.pixel_aspect));
    }
    if s.scan_size.iter().all(|&v| defined_f32(v)) {
        tags.set(tag::SOURCE_SCAN_SIZE, join(&s.scan_size));
    }

    let m = &h.film;
    let keycode = [&m.id[..], &m.film_type, &m.prefix, &m.count, &m.offset].map(field_str);
    if keycode.iter().all(Option::is_some) {
        let parts: Vec<String> = keycode.into_iter().flatten().collect();
        tags.set(tag::KEYCODE, parts.join(":"));
    }
    for (key, v) in [
        (tag::FILM_FRAME, m.frame),
        (tag::FILM_SEQUENCE, m.sequence),
        (tag::FILM_HOLD, m.hold),
    ] {
        if defined_u32(v) {
            tags.set(key, v.to_string());
        }
    }
    for (key, v) in [
        (tag::FILM_FRAME_RATE, m.frame_rate),
        (tag::FILM_SHUTTER, m.shutter),
    ] {
        if defined_f32(v) {
            tags.set(key, v.to_string());
        }
    }

    let t = &h.tv;
    if defined_u32(t.timecode) {
        tags.set(tag::TIMECODE, timecode_to_string(t.timecode));
    }
    for (key, v) in [
        (tag::TV_INTERLACE, t.interlace),
        (tag::TV_FIELD, t.field),
        (tag::TV_VIDEO_SIGNAL, t.video_signal),
    ] {
        if v != U8_UNDEFINED {
            tags.set(key, v.to_string());
        }
    }
    if t.sample_rate.iter().all(|&v| defined_f32(v)) {
        tags.set(tag::TV_SAMPLE_RATE, join(&t.sample_rate));
    }
    for (key, v) in [
        (tag::TV_FRAME_RATE, t.frame_rate),
        (tag::TV_TIME_OFFSET, t.time_offset),
        (tag::TV_GAMMA, t.gamma),
        (tag::TV_BLACK_LEVEL, t.black_level),
        (tag::TV_BLACK_GAIN, t.black_gain),
        (tag::TV_BREAKPOINT, t.breakpoint),
        (tag::TV_WHITE_LEVEL, t.white_level),
        (tag::TV_INTEGRATION_TIMES, t.integration_times),
    ] {
        if defined_f32(v) {
            tags.set(key, v.to_string());
        }
    }
    tags
}

fn from_tags(h: &mut Header, tags: &Tags) {
    let f = &mut h.file;
    for (key, dst) in [
        (tag::TIME, &mut f.time[..]),
        (tag::CREATOR, &mut f.creator[..]),
        (tag::PROJECT, &mut f.project[..]),
        (tag::COPYRIGHT, &mut f.copyright[..]),
    ] {
        if let Some(v) = tags.get(key) {
            set_field(dst, v);
        }
    }

    let s = &mut h.source;
    for (key, dst) in [
        (tag::SOURCE_FILE, &mut s.file[..]),
        (tag::SOURCE_TIME, &mut s.time[..]),
        (tag::SOURCE_INPUT_DEVICE, &mut s.input_device[..]),
        (tag::SOURCE_INPUT_SERIAL, &mut s.input_serial[..]),
    ] {
        if let Some(v) = tags.get(key) {
            set_field(dst, v);
        }
    }
    if let Some(v) = tags.get(tag::SOURCE_OFFSET).and_then(parse_list) {
        s.offset = v;
    }
    if let Some(v) = tags.get(tag::SOURCE_CENTER).and_then(parse_list) {
        s.center = v;
    }
    if let Some(v) = tags.get(tag::SOURCE_SIZE).and_then(parse_list) {
        s.size = v;
    }
    if let Some(v) = tags.get(tag::SOURCE_BORDER).and_then(parse_list) {
        s.border = v;
    }
    if let Some(v) = tags.get(tag::SOURCE_PIXEL_ASPECT).and_then(parse_list) {
        s.pixel_aspect = v;
    }
    if let Some(v) = tags.get(tag::SOURCE_SCAN_SIZE).and_then(parse_list) {
        s.scan_size = v;
    }

    let m = &mut h.film;
    if let Some(v) = tags.get(tag::KEYCODE) {
        let parts: Vec<&str> = v.split(':').collect();
        if let [id, film_type, prefix, count, offset] = parts[..] {
            set_field(&mut m.id, id);
            set_field(&mut m.film_type, film_type);
            set_field(&mut m.prefix, prefix);
            set_field(&mut m.count, count);
            set_field(&mut m.offset, offset);
        } else {
            tracing::debug!("ignoring malformed keycode {v:?}");
        }
    }
    for (key, dst) in [
        (tag::FILM_FORMAT, &mut m.format[..]),
        (tag::FILM_FRAME_ID, &mut m.frame_id[..]),
        (tag::FILM_SLATE, &mut m.slate[..]),
    ] {
        if let Some(v) = tags.get(key) {
            set_field(dst, v);
        }
    }
    for (key, dst) in [
        (tag::FILM_FRAME, &mut m.frame),
        (tag::FILM_SEQUENCE, &mut m.sequence),
        (tag::FILM_HOLD, &mut m.hold),
    ] {
        if let Some(v) = tags.get(key).and_then(|s| s.trim().parse().ok()) {
            *dst = v;
        }
    }
    for (key, dst) in [
        (tag::FILM_FRAME_RATE, &mut m.frame_rate),
        (tag::FILM_SHUTTER, &mut m.shutter),
    ] {
        if let Some(v) = tags.get(key).and_then(|s| s.trim().parse().ok()) {
            *dst = v;
        }
    }

    let t = &mut h.tv;
    if let Some(v) = tags.get(tag::TIMECODE) {
        match string_to_timecode(v) {
            Some(tc) => t.timecode = tc,
            None => tracing::debug!("ignoring malformed timecode {v:?}"),
        }
    }
    for (key, dst) in [
        (tag::TV_INTERLACE, &mut t.interlace),
        (tag::TV_FIELD, &mut t.field),
        (tag::TV_VIDEO_SIGNAL, &mut t.video_signal),
    ] {
        if let Some(v) = tags.get(key).and_then(|s| s.trim().parse().ok()) {
            *dst = v;
        }
    }
    if let Some(v) = tags.get(tag::TV_SAMPLE_RATE).and_then(parse_list) {
        t.sample_rate = v;
    }
    for (key, dst) in [
        (tag::TV_FRAME_RATE, &mut t.frame_rate),
        (tag::TV_TIME_OFFSET, &mut t.time_offset),
        (tag::TV_GAMMA, &mut t.gamma),
        (tag::TV_BLACK_LEVEL, &mut t.black_level),
        (tag::TV_BLACK_GAIN, &mut t.black_gain),
        (tag::TV_BREAKPOINT, &mut t.breakpoint),
        (tag::TV_WHITE_LEVEL, &mut t.white_level),
        (tag::TV_INTEGRATION_TIMES, &mut t.integration_times),
    ] {
        if let Some(v) = tags.get(key).and_then(|s| s.trim().parse().ok()) {
            *dst = v;
        }
    }
}
