//! PCM audio buffers and sample kernels.
//!
//! [`AudioData`] stores `sample_count` frames of `channel_count` samples in a
//! native-endian byte buffer. Like [`crate::PixelData`], clones share the
//! buffer until one of them is mutated.
//!
//! ```rust
//! use pixio_core::audio::{AudioData, AudioInfo, SampleType};
//!
//! let info = AudioInfo::new(2, SampleType::S16, 48_000);
//! let pcm = AudioData::from_samples(info, &[i16::MIN, i16::MAX]).unwrap();
//! let float = pcm.convert(SampleType::F32);
//! assert_eq!(float.samples::<f32>(), Some(vec![-1.0, 1.0]));
//! ```

pub mod convert;
pub mod kernels;

pub use convert::{Sample, convert, convert_slice};
pub use kernels::{extract, planar_deinterleave, planar_interleave};

use crate::{FileError, FileResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sample storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    /// Signed 8-bit.
    S8,
    /// Signed 16-bit.
    S16,
    /// Signed 32-bit.
    S32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl SampleType {
    /// Bytes per sample.
    #[inline]
    pub const fn byte_count(self) -> usize {
        match self {
            Self::S8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shape of an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Channels per frame.
    pub channel_count: u8,
    /// Sample storage type.
    pub sample_type: SampleType,
    /// Frames per second.
    pub sample_rate: u32,
}

impl AudioInfo {
    /// Creates an info.
    pub const fn new(channel_count: u8, sample_type: SampleType, sample_rate: u32) -> Self {
        Self {
            channel_count,
            sample_type,
            sample_rate,
        }
    }

    /// Bytes per frame.
    #[inline]
    pub fn frame_byte_count(&self) -> usize {
        self.channel_count as usize * self.sample_type.byte_count()
    }

    /// Whether the info can describe samples.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.channel_count > 0
    }
}

/// PCM buffer with copy-on-write storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    info: AudioInfo,
    sample_count: usize,
    data: Arc<Vec<u8>>,
}

impl AudioData {
    /// Creates a zero-filled buffer holding `sample_count` frames.
    pub fn new(info: AudioInfo, sample_count: usize) -> Self {
        Self {
            info,
            sample_count,
            data: Arc::new(vec![0; sample_count * info.frame_byte_count()]),
        }
    }

    /// Creates a buffer from raw native-endian bytes.
    ///
    /// # Errors
    ///
    /// [`FileError::BufferSize`] if `bytes` is not a whole number of frames.
    pub fn from_bytes(info: AudioInfo, bytes: Vec<u8>) -> FileResult<Self> {
        let frame = info.frame_byte_count();
        if frame == 0 || bytes.len() % frame != 0 {
            return Err(FileError::BufferSize {
                expected: bytes.len().next_multiple_of(frame.max(1)),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            info,
            sample_count: bytes.len() / frame,
            data: Arc::new(bytes),
        })
    }

    /// Creates a buffer from interleaved typed samples.
    ///
    /// The sample type of `info` is replaced by `T`'s.
    pub fn from_samples<T: Sample>(mut info: AudioInfo, samples: &[T]) -> FileResult<Self> {
        info.sample_type = T::TYPE;
        let size = T::TYPE.byte_count();
        let mut bytes = vec![0u8; samples.len() * size];
        for (chunk, &s) in bytes.chunks_exact_mut(size).zip(samples) {
            s.write_ne(chunk);
        }
        Self::from_bytes(info, bytes)
    }

    /// Decodes the buffer into typed samples. `None` if `T` is not the
    /// stored type.
    pub fn samples<T: Sample>(&self) -> Option<Vec<T>> {
        if T::TYPE != self.info.sample_type {
            return None;
        }
        Some(
            self.data
                .chunks_exact(T::TYPE.byte_count())
                .map(T::from_ne_slice)
                .collect(),
        )
    }

    /// Buffer shape.
    #[inline]
    pub fn info(&self) -> &AudioInfo {
        &self.info
    }

    /// Channels per frame.
    #[inline]
    pub fn channel_count(&self) -> u8 {
        self.info.channel_count
    }

    /// Sample storage type.
    #[inline]
    pub fn sample_type(&self) -> SampleType {
        self.info.sample_type
    }

    /// Frames per second.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    /// Number of frames.
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Total bytes.
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a buffer with a valid shape.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.info.is_valid()
    }

    /// Raw bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes, detaching shared storage first.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Zeroes every sample.
    pub fn zero(&mut self) {
        self.data_mut().fill(0);
    }

    /// Converts every sample to `to`.
    pub fn convert(&self, to: SampleType) -> AudioData {
        if to == self.info.sample_type {
            return self.clone();
        }
        match self.info.sample_type {
            SampleType::S8 => self.convert_from::<i8>(to),
            SampleType::S16 => self.convert_from::<i16>(to),
            SampleType::S32 => self.convert_from::<i32>(to),
            SampleType::F32 => self.convert_from::<f32>(to),
            SampleType::F64 => self.convert_from::<f64>(to),
        }
    }

    fn convert_from<A: Sample>(&self, to: SampleType) -> AudioData {
        match to {
            SampleType::S8 => self.convert_into::<A, i8>(),
            SampleType::S16 => self.convert_into::<A, i16>(),
            SampleType::S32 => self.convert_into::<A, i32>(),
            SampleType::F32 => self.convert_into::<A, f32>(),
            SampleType::F64 => self.convert_into::<A, f64>(),
        }
    }

    fn convert_into<A: Sample, B: Sample>(&self) -> AudioData {
        let (a, b) = (A::TYPE.byte_count(), B::TYPE.byte_count());
        let mut out = vec![0u8; self.data.len() / a * b];
        for (src, dst) in self.data.chunks_exact(a).zip(out.chunks_exact_mut(b)) {
            convert::<A, B>(A::from_ne_slice(src)).write_ne(dst);
        }
        AudioData {
            info: AudioInfo {
                sample_type: B::TYPE,
                ..self.info
            },
            sample_count: self.sample_count,
            data: Arc::new(out),
        }
    }

    /// Keeps the first `channel_count` channels, padding new ones with
    /// silence.
    pub fn extract(&self, channel_count: u8) -> AudioData {
        let info = AudioInfo {
            channel_count,
            ..self.info
        };
        let mut out = AudioData::new(info, self.sample_count);
        // Byte-level copy: one "sample" of the kernel is one byte, so the
        // channel counts are scaled by the sample size.
        let size = self.info.sample_type.byte_count();
        extract(
            &self.data,
            out.data_mut(),
            self.sample_count,
            self.info.channel_count as usize * size,
            channel_count as usize * size,
        );
        out
    }

    /// Treats the buffer as planar (each channel contiguous) and returns it
    /// interleaved.
    pub fn planar_interleave(&self) -> AudioData {
        self.rearrange(true)
    }

    /// Treats the buffer as interleaved and returns it planar.
    pub fn planar_deinterleave(&self) -> AudioData {
        self.rearrange(false)
    }

    fn rearrange(&self, interleave: bool) -> AudioData {
        let channels = self.info.channel_count as usize;
        let n = self.sample_count;
        let out = match self.info.sample_type {
            SampleType::S8 => rearrange_words::<1>(&self.data, channels, n, interleave),
            SampleType::S16 => rearrange_words::<2>(&self.data, channels, n, interleave),
            SampleType::S32 | SampleType::F32 => {
                rearrange_words::<4>(&self.data, channels, n, interleave)
            }
            SampleType::F64 => rearrange_words::<8>(&self.data, channels, n, interleave),
        };
        AudioData {
            info: self.info,
            sample_count: n,
            data: Arc::new(out),
        }
    }
}

/// Runs the interleave kernels over `N`-byte samples.
fn rearrange_words<const N: usize>(
    data: &[u8],
    channels: usize,
    sample_count: usize,
    interleave: bool,
) -> Vec<u8> {
    if channels == 0 || sample_count == 0 {
        return data.to_vec();
    }
    let words: Vec<[u8; N]> = data
        .chunks_exact(N)
        .map(|c| {
            let mut w = [0u8; N];
            w.copy_from_slice(c);
            w
        })
        .collect();
    let mut out = vec![[0u8; N]; words.len()];
    if interleave {
        let planes: Vec<&[[u8; N]]> = words.chunks_exact(sample_count).collect();
        planar_interleave(&planes, &mut out, sample_count);
    } else {
        let mut planes: Vec<&mut [[u8; N]]> = out.chunks_exact_mut(sample_count).collect();
        planar_deinterleave(&words, &mut planes, sample_count);
    }
    out.concat()
}
