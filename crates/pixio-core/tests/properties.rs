//! Cross-module behavior of pixio-core: file access against pixel and
//! audio buffers.

use approx::assert_abs_diff_eq;
use pixio_core::audio::{self, AudioData, AudioInfo, SampleType};
use pixio_core::{FileError, FileIo, Mode, PixelData, PixelDataInfo, PixelType};
use tempfile::tempdir;

fn write_file(path: &std::path::Path, bytes: &[u8]) {
    let mut io = FileIo::new();
    io.open(path, Mode::Write).unwrap();
    io.write_u8_slice(bytes).unwrap();
    io.close().unwrap();
}

#[test]
fn mapped_and_buffered_reads_agree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pixels.raw");
    let bytes: Vec<u8> = (0..4 * 3 * 6).map(|i| (i * 7 % 251) as u8).collect();
    write_file(&path, &bytes);
    let info = PixelDataInfo::new(4, 3, PixelType::RGB_U16);

    let mut mapped = PixelData::default();
    let mut io = FileIo::new();
    io.open(&path, Mode::Read).unwrap();
    assert!(io.is_mapped());
    mapped.set_mapped(info.clone(), &mut io).unwrap();
    assert!(mapped.is_mapped());
    assert!(io.is_eof());

    let mut buffered = PixelData::default();
    let mut io = FileIo::new();
    io.set_mmap(false);
    io.open(&path, Mode::Read).unwrap();
    assert!(!io.is_mapped());
    buffered.set_mapped(info, &mut io).unwrap();
    assert!(!buffered.is_mapped());

    assert_eq!(mapped.data(), buffered.data());
    assert_eq!(mapped.data(), &bytes[..]);
}

#[test]
fn swapped_read_reverses_every_word() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("words.raw");
    let values = [0x0102u16, 0xA0B0, 0xFFEE];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    write_file(&path, &bytes);

    let mut io = FileIo::new();
    io.open(&path, Mode::Read).unwrap();
    io.set_endian_conversion(true);
    let mut pixels = PixelData::default();
    pixels
        .set_mapped(PixelDataInfo::new(3, 1, PixelType::L_U16), &mut io)
        .unwrap();
    assert!(!pixels.is_mapped());
    for (x, v) in values.iter().enumerate() {
        assert_eq!(pixels.pixel(x as u32, 0), &v.swap_bytes().to_ne_bytes());
    }
}

#[test]
fn truncation_reports_position() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.raw");
    write_file(&path, &[0u8; 10]);

    let mut io = FileIo::new();
    io.open(&path, Mode::Read).unwrap();
    io.set_pos(8).unwrap();
    match io.read_u32() {
        Err(FileError::Truncated {
            pos,
            requested,
            available,
            ..
        }) => assert_eq!((pos, requested, available), (8, 4, 2)),
        other => panic!("expected truncation, got {other:?}"),
    }
}

#[test]
fn audio_conversion_preserves_sign_and_order() {
    let input: Vec<i16> = vec![i16::MIN, -1000, -1, 0, 1, 1000, i16::MAX];
    let info = AudioInfo::new(1, SampleType::S16, 44_100);
    let pcm = AudioData::from_samples(info, &input).unwrap();

    for to in [SampleType::S8, SampleType::S32, SampleType::F32, SampleType::F64] {
        let out = pcm.convert(to).convert(SampleType::F64);
        let values = out.samples::<f64>().unwrap();
        assert_eq!(values.len(), input.len());
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{to}: {values:?}");
        assert_abs_diff_eq!(values[0], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[6], 1.0, epsilon = 1e-9);
        assert_eq!(values[3], 0.0);
    }
}

#[test]
fn audio_float_roundtrip_is_close() {
    let input: Vec<f32> = (0..64).map(|i| (i as f32 / 32.0) - 1.0).collect();
    let mut back = vec![0f32; input.len()];
    let mut mid = vec![0i32; input.len()];
    audio::convert_slice(&input, &mut mid);
    audio::convert_slice(&mid, &mut back);
    for (a, b) in input.iter().zip(&back) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn audio_planar_roundtrip() {
    let info = AudioInfo::new(3, SampleType::F32, 48_000);
    let samples: Vec<f32> = (0..30).map(|i| i as f32).collect();
    let pcm = AudioData::from_samples(info, &samples).unwrap();
    let back = pcm.planar_deinterleave().planar_interleave();
    assert_eq!(back, pcm);

    let stereo = pcm.extract(2);
    assert_eq!(stereo.channel_count(), 2);
    assert_eq!(stereo.samples::<f32>().unwrap()[..4], [0.0, 1.0, 3.0, 4.0]);
}
