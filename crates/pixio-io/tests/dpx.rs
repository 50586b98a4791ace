//! DPX integration tests: bit depths, byte orders and damaged files.

#![cfg(feature = "dpx")]

use pixio_core::{Endian as HostEndian, Mirror, PixelData, PixelDataInfo, PixelType, Proxy};
use pixio_io::dpx::header::{self, Header, HEADER_SIZE, MAGIC};
use pixio_io::dpx::{self, Components, Descriptor, DpxReader, DpxWriter, Endian, Options, Orient, Transfer};
use pixio_io::{Image, IoError, SequenceRead, SequenceWrite, Sequence, Tags};
use std::path::Path;
use tempfile::tempdir;

fn ramp(info: PixelDataInfo) -> PixelData {
    let mut data = PixelData::new(info);
    for (i, b) in data.data_mut().iter_mut().enumerate() {
        *b = (i * 31 % 253) as u8;
    }
    data
}

/// 10-bit RGB words, `R << 22 | G << 12 | B << 2`.
fn rgb10(width: u32, height: u32) -> PixelData {
    let mut data = PixelData::new(PixelDataInfo::new(width, height, PixelType::RGB_U10));
    for (i, word) in data.data_mut().chunks_exact_mut(4).enumerate() {
        let v = i as u32 * 37;
        let (r, g, b) = (v % 1024, (v * 3) % 1024, (v * 7) % 1024);
        word.copy_from_slice(&(r << 22 | g << 12 | b << 2).to_ne_bytes());
    }
    data
}

/// 12-bit values stored high in 16-bit words.
fn u16_12bit(info: PixelDataInfo) -> PixelData {
    let mut data = PixelData::new(info);
    for (i, word) in data.data_mut().chunks_exact_mut(2).enumerate() {
        let v = ((i as u16).wrapping_mul(97) % 4096) << 4;
        word.copy_from_slice(&v.to_ne_bytes());
    }
    data
}

fn options(endian: Endian, bit_depth: Option<u8>) -> Options {
    Options {
        endian,
        bit_depth,
        ..Options::default()
    }
}

fn roundtrip(path: &Path, pixels: PixelData, options: Options) -> Image {
    let writer = DpxWriter::with_options(options);
    writer.write(path, &Image::new(pixels)).unwrap();
    dpx::read(path).unwrap()
}

fn raw_header(path: &Path) -> Header {
    let bytes = std::fs::read(path).unwrap();
    let mut header = Header::decode(&bytes[..HEADER_SIZE]);
    if header.file.magic != MAGIC {
        header.convert_endian();
    }
    header
}

/// Writes a host-order file with a single element and the given payload.
fn hand_built(
    path: &Path,
    width: u32,
    height: u32,
    setup: impl FnOnce(&mut Header),
    payload: &[u8],
) {
    let mut h = Header::zero();
    h.file.magic = MAGIC;
    h.file.image_offset = HEADER_SIZE as u32;
    h.file.size = (HEADER_SIZE + payload.len()) as u32;
    h.image.orient = Orient::LeftRightTopBottom as u16;
    h.image.elem_size = 1;
    h.image.size = [width, height];
    let elem = &mut h.image.elem[0];
    elem.encoding = 0;
    elem.data_offset = HEADER_SIZE as u32;
    elem.line_padding = 0;
    setup(&mut h);
    let mut bytes = h.encode();
    bytes.extend_from_slice(payload);
    std::fs::write(path, bytes).unwrap();
}

fn words_u32(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_ne_bytes()).collect()
}

fn words_u16(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_ne_bytes()).collect()
}

#[test]
fn roundtrip_all_depths_and_byte_orders() {
    let dir = tempdir().unwrap();
    let cases = [
        (PixelType::L_U8, None),
        (PixelType::RGB_U8, None),
        (PixelType::RGBA_U8, None),
        (PixelType::L_U16, None),
        (PixelType::RGB_U16, None),
        (PixelType::RGBA_U16, None),
    ];
    for endian in [Endian::Msb, Endian::Lsb] {
        for (pixel, bits) in cases {
            let path = dir.path().join(format!("{pixel}_{endian:?}.dpx"));
            let source = ramp(PixelDataInfo::new(9, 4, pixel));
            let back = roundtrip(&path, source.clone(), options(endian, bits));
            let info = back.pixels.info();
            assert_eq!((info.width, info.height), (9, 4), "{pixel} {endian:?}");
            assert_eq!(info.pixel, pixel, "{pixel} {endian:?}");
            assert_eq!(info.mirror, Mirror::default());
            assert!(!info.bgr);
            assert_eq!(back.pixels.data(), source.data(), "{pixel} {endian:?}");
        }
    }
}

#[test]
fn mirror_round_trips_through_orientation() {
    let dir = tempdir().unwrap();
    for (x, y) in [(true, false), (false, true), (true, true)] {
        let path = dir.path().join(format!("mirror_{x}_{y}.dpx"));
        let mut info = PixelDataInfo::new(3, 2, PixelType::RGB_U8);
        info.mirror = Mirror::new(x, y);
        let source = ramp(info);
        let back = roundtrip(&path, source.clone(), Options::default());
        assert_eq!(back.pixels.info().mirror, Mirror::new(x, y));
        assert_eq!(back.pixels.data(), source.data());
        assert_eq!(dpx::read_info(&path).unwrap().video[0].mirror, Mirror::new(x, y));
    }
}

#[test]
fn bgr_buffer_written_as_rgb() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bgr.dpx");
    let mut info = PixelDataInfo::new(2, 1, PixelType::RGB_U16);
    info.bgr = true;
    let stored: Vec<u8> = [3u16, 2, 1, 6, 5, 4].iter().flat_map(|v| v.to_ne_bytes()).collect();
    let back = roundtrip(
        &path,
        PixelData::from_bytes(info, &stored).unwrap(),
        options(Endian::Msb, None),
    );
    assert!(!back.pixels.info().bgr);
    assert_eq!(back.pixels.data(), words_u16(&[1, 2, 3, 4, 5, 6]).as_slice());
}

#[test]
fn type_b_10bit_words_are_realigned() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("type_b_10.dpx");
    let rgb = [(1023u32, 512u32, 1u32), (0, 1, 1023), (300, 600, 900), (7, 8, 9)];
    let file: Vec<u32> = rgb.iter().map(|&(r, g, b)| r << 20 | g << 10 | b).collect();
    hand_built(
        &path,
        2,
        2,
        |h| {
            let e = &mut h.image.elem[0];
            e.descriptor = Descriptor::Rgb as u8;
            e.bit_depth = 10;
            e.packing = Components::TypeB as u16;
        },
        &words_u32(&file),
    );

    let image = dpx::read(&path).unwrap();
    assert_eq!(image.pixels.pixel_type(), PixelType::RGB_U10);
    let memory: Vec<u32> = rgb.iter().map(|&(r, g, b)| r << 22 | g << 12 | b << 2).collect();
    assert_eq!(image.pixels.data(), words_u32(&memory).as_slice());
}

#[test]
fn type_b_12bit_values_move_high() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("type_b_12.dpx");
    let values = [4095u16, 1, 2048, 0, 77, 3000];
    hand_built(
        &path,
        3,
        2,
        |h| {
            let e = &mut h.image.elem[0];
            e.descriptor = Descriptor::L as u8;
            e.bit_depth = 12;
            e.packing = Components::TypeB as u16;
        },
        &words_u16(&values),
    );

    let image = dpx::read(&path).unwrap();
    assert_eq!(image.pixels.pixel_type(), PixelType::L_U16);
    let shifted: Vec<u16> = values.iter().map(|v| v << 4).collect();
    assert_eq!(image.pixels.data(), words_u16(&shifted).as_slice());

    let small = DpxReader::new().read_proxy(&path, Proxy::Half).unwrap();
    assert_eq!(small.pixels.info().proxy_size(), (2, 1));
    assert_eq!(small.pixels.data(), words_u16(&[4095 << 4, 2048 << 4]).as_slice());
}

#[test]
fn line_padding_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("padded.dpx");
    let rows: [[u8; 9]; 3] = [
        [1, 2, 3, 4, 5, 6, 7, 8, 9],
        [10, 11, 12, 13, 14, 15, 16, 17, 18],
        [19, 20, 21, 22, 23, 24, 25, 26, 27],
    ];
    let mut payload = Vec::new();
    for row in &rows {
        payload.extend_from_slice(row);
        payload.extend_from_slice(&[0xEE; 3]);
    }
    hand_built(
        &path,
        3,
        3,
        |h| {
            let e = &mut h.image.elem[0];
            e.descriptor = Descriptor::Rgb as u8;
            e.bit_depth = 8;
            e.packing = Components::Pack as u16;
            e.line_padding = 3;
        },
        &payload,
    );

    let image = dpx::read(&path).unwrap();
    assert!(!image.pixels.is_mapped());
    assert_eq!(image.pixels.data(), rows.concat().as_slice());

    let small = DpxReader::new().read_proxy(&path, Proxy::Half).unwrap();
    assert_eq!(small.pixels.data(), &[1, 2, 3, 7, 8, 9, 19, 20, 21, 25, 26, 27]);
}

#[test]
fn orientation_sets_mirror_flags() {
    let dir = tempdir().unwrap();
    let cases = [
        (Orient::RightLeftBottomTop, Mirror::new(true, true)),
        (Orient::LeftRightBottomTop, Mirror::new(false, true)),
        (Orient::TopBottomRightLeft, Mirror::new(true, false)),
        (Orient::BottomTopLeftRight, Mirror::new(false, true)),
    ];
    for (orient, mirror) in cases {
        let path = dir.path().join(format!("{orient:?}.dpx"));
        hand_built(
            &path,
            2,
            2,
            |h| {
                h.image.orient = orient as u16;
                let e = &mut h.image.elem[0];
                e.descriptor = Descriptor::L as u8;
                e.bit_depth = 8;
                e.packing = Components::Pack as u16;
            },
            &[1, 2, 3, 4],
        );
        let image = dpx::read(&path).unwrap();
        assert_eq!(image.pixels.info().mirror, mirror, "{orient:?}");
        assert_eq!(image.pixels.data(), &[1, 2, 3, 4], "{orient:?}");
    }
}

#[test]
fn oversized_dimensions_fail_without_allocating() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.dpx");
    roundtrip(
        &path,
        ramp(PixelDataInfo::new(2, 2, PixelType::RGBA_U16)),
        options(Endian::Lsb, None),
    );
    let original = std::fs::read(&path).unwrap();

    for size in [[0x7FFF_FFFF, 0x7FFF_FFFF], [2, 1000], [0x7FFF_FFFF, 1]] {
        let mut h = raw_header(&path);
        h.image.size = size;
        let mut bytes = h.encode();
        bytes.extend_from_slice(&original[HEADER_SIZE..]);
        let patched = dir.path().join(format!("patched_{}x{}.dpx", size[0], size[1]));
        std::fs::write(&patched, &bytes).unwrap();

        match dpx::read(&patched) {
            Err(IoError::CorruptHeader(_)) => {}
            Err(err) => assert!(err.is_truncated(), "{size:?}: {err}"),
            Ok(_) => panic!("{size:?}: read past the end of the file"),
        }
        let proxy = DpxReader::new().read_proxy(&patched, Proxy::Quarter);
        assert!(proxy.is_err(), "{size:?}");
    }
}

#[test]
fn roundtrip_10bit_both_byte_orders() {
    let dir = tempdir().unwrap();
    let source = rgb10(6, 3);
    for endian in [Endian::Msb, Endian::Lsb] {
        let path = dir.path().join(format!("rgb10_{endian:?}.dpx"));
        let back = roundtrip(&path, source.clone(), options(endian, None));
        assert_eq!(back.pixels.pixel_type(), PixelType::RGB_U10);
        assert_eq!(back.pixels.data(), source.data());

        let h = raw_header(&path);
        assert_eq!(h.image.elem[0].bit_depth, 10);
        assert_eq!(h.image.elem[0].high_data, 1023);
    }
}

#[test]
fn big_endian_10bit_words_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("be.dpx");
    let source = rgb10(2, 1);
    roundtrip(&path, source.clone(), options(Endian::Msb, None));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"SDPX");
    let mut first = [0u8; 4];
    first.copy_from_slice(&source.data()[..4]);
    let word = u32::from_ne_bytes(first);
    assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &word.to_be_bytes());
}

#[test]
fn roundtrip_12bit() {
    let dir = tempdir().unwrap();
    for pixel in [PixelType::L_U16, PixelType::RGB_U16, PixelType::RGBA_U16] {
        for endian in [Endian::Msb, Endian::Lsb] {
            let path = dir.path().join(format!("{pixel}_12_{endian:?}.dpx"));
            let source = u16_12bit(PixelDataInfo::new(5, 3, pixel));
            let back = roundtrip(&path, source.clone(), options(endian, Some(12)));
            assert_eq!(back.pixels.data(), source.data(), "{pixel} {endian:?}");
            assert_eq!(raw_header(&path).image.elem[0].bit_depth, 12);
        }
    }
}

#[test]
fn twelve_bit_write_drops_low_nibble() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nibble.dpx");
    let mut source = PixelData::new(PixelDataInfo::new(2, 1, PixelType::L_U16));
    source.data_mut()[..2].copy_from_slice(&0x1237u16.to_ne_bytes());
    source.data_mut()[2..].copy_from_slice(&0xFFFFu16.to_ne_bytes());
    let back = roundtrip(&path, source, options(Endian::Msb, Some(12)));
    assert_eq!(back.pixels.pixel(0, 0), &0x1230u16.to_ne_bytes());
    assert_eq!(back.pixels.pixel(1, 0), &0xFFF0u16.to_ne_bytes());
}

#[test]
fn headers_match_across_byte_orders() {
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("msb")).unwrap();
    std::fs::create_dir(dir.path().join("lsb")).unwrap();
    let msb = dir.path().join("msb").join("frame.dpx");
    let lsb = dir.path().join("lsb").join("frame.dpx");
    let tags: Tags = [("Project", "symmetry"), ("Keycode", "KD 12 345678 1234 12")]
        .into_iter()
        .collect();
    let image = Image::new(ramp(PixelDataInfo::new(4, 2, PixelType::RGB_U16))).with_tags(tags);

    DpxWriter::with_options(options(Endian::Msb, None)).write(&msb, &image).unwrap();
    DpxWriter::with_options(options(Endian::Lsb, None)).write(&lsb, &image).unwrap();

    assert_eq!(&std::fs::read(&msb).unwrap()[..4], b"SDPX");
    assert_eq!(&std::fs::read(&lsb).unwrap()[..4], b"XPDS");
    assert_eq!(raw_header(&msb).encode(), raw_header(&lsb).encode());

    let a = dpx::read(&msb).unwrap();
    let b = dpx::read(&lsb).unwrap();
    assert_eq!(a.pixels.data(), b.pixels.data());
    assert_eq!(a.tags, b.tags);
}

#[test]
fn auto_endian_follows_host() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("auto.dpx");
    roundtrip(
        &path,
        ramp(PixelDataInfo::new(2, 2, PixelType::L_U16)),
        options(Endian::Auto, None),
    );
    let magic = &std::fs::read(&path).unwrap()[..4];
    match HostEndian::native() {
        HostEndian::Msb => assert_eq!(magic, b"SDPX"),
        HostEndian::Lsb => assert_eq!(magic, b"XPDS"),
    }
}

#[test]
fn bad_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.dpx");
    let mut bytes = vec![0u8; HEADER_SIZE + 16];
    bytes[..4].copy_from_slice(b"JUNK");
    std::fs::write(&path, &bytes).unwrap();

    match dpx::read(&path) {
        Err(IoError::BadMagic { magic, .. }) => assert_eq!(&magic, b"JUNK"),
        other => panic!("expected bad magic, got {other:?}"),
    }
    assert!(matches!(dpx::read_info(&path), Err(IoError::BadMagic { .. })));
}

#[test]
fn truncated_inside_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("full.dpx");
    let cut = dir.path().join("cut.dpx");
    roundtrip(&path, ramp(PixelDataInfo::new(3, 3, PixelType::RGB_U8)), Options::default());

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&cut, &bytes[..700]).unwrap();
    let err = dpx::read(&cut).unwrap_err();
    assert!(err.is_truncated(), "{err}");
}

#[test]
fn truncated_inside_pixels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("full.dpx");
    let cut = dir.path().join("cut.dpx");
    let info = PixelDataInfo::new(8, 4, PixelType::RGB_U16);
    roundtrip(&path, ramp(info), options(Endian::Lsb, None));

    let bytes = std::fs::read(&path).unwrap();
    let row = 8 * 6;
    std::fs::write(&cut, &bytes[..HEADER_SIZE + row * 2 + row / 2]).unwrap();

    assert!(dpx::read_info(&cut).is_ok());
    assert!(dpx::read(&cut).unwrap_err().is_truncated());
    let reader = DpxReader::new();
    assert!(reader.read_proxy(&cut, Proxy::Half).unwrap_err().is_truncated());
}

#[test]
fn proxy_matches_decimated_full_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("proxy.dpx");
    let source = ramp(PixelDataInfo::new(9, 7, PixelType::RGBA_U16));
    roundtrip(&path, source.clone(), options(Endian::Msb, None));

    let reader = DpxReader::new();
    for proxy in [Proxy::Half, Proxy::Quarter] {
        let small = reader.read_proxy(&path, proxy).unwrap();
        let expected = source.to_proxy(proxy);
        assert_eq!(small.pixels.info().proxy_size(), expected.info().proxy_size());
        assert_eq!(small.pixels.data(), expected.data(), "{proxy:?}");
    }
}

#[test]
fn transfer_round_trips_through_tag() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("transfer.dpx");
    let mut tags = Tags::new();
    tags.set(header::tag::TRANSFER, Transfer::Linear.label());
    let image = Image::new(ramp(PixelDataInfo::new(2, 2, PixelType::RGB_U8))).with_tags(tags);
    dpx::write(&path, &image).unwrap();

    let back = dpx::read(&path).unwrap();
    assert_eq!(back.tags.get(header::tag::TRANSFER), Some(Transfer::Linear.label()));
    let h = raw_header(&path);
    assert_eq!(h.image.elem[0].transfer, Transfer::Linear as u8);
    assert_eq!(h.image.elem[0].colorimetric, 0);
}

#[test]
fn sequence_frames() {
    let dir = tempdir().unwrap();
    let mut seq = Sequence::from_pattern("shot.####.dpx").unwrap().with_dir(dir.path());
    let writer = DpxWriter::new();
    for frame in 1001..=1003 {
        let mut pixels = PixelData::new(PixelDataInfo::new(2, 2, PixelType::L_U8));
        pixels.data_mut().fill(frame as u8);
        writer.write_frame(&seq, frame, &Image::new(pixels)).unwrap();
    }
    assert!(dir.path().join("shot.1002.dpx").exists());
    assert_eq!(seq.scan().unwrap().map(|r| r.len()), Some(3));

    let reader = DpxReader::new();
    let image = reader.read_frame(&seq, 1002).unwrap();
    assert_eq!(image.pixels.data(), &[1002u32 as u8; 4]);
}
