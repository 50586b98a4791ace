//! Endian-aware binary file access.
//!
//! [`FileIo`] is the primitive every codec reads and writes through. It
//! transfers exact byte counts, tracks position and size itself, and can
//! byte-swap fixed-width values on the fly.
//!
//! # Endian Conversion
//!
//! When [`FileIo::set_endian_conversion`] is enabled, every multi-byte
//! element is reversed as it moves between the file and memory. The swap is
//! applied per element (`word_size` bytes at a time), never across a whole
//! buffer, so `read(&mut buf, 4)` on `[1, 2, 3, 4, 5, 6, 7, 8]` yields
//! `[4, 3, 2, 1, 8, 7, 6, 5]`.
//!
//! # Memory Mapping
//!
//! Files opened in [`Mode::Read`] are memory mapped by default. Reads are
//! served from the map and [`FileIo::mmap_remaining`] exposes the bytes
//! between the current position and the end of the file for zero-copy
//! decoding. The map is reference counted; a [`crate::PixelData`] built with
//! [`crate::PixelData::set_mapped`] keeps it alive after the handle closes.
//!
//! # Example
//!
//! ```rust,no_run
//! use pixio_core::{FileIo, Mode};
//!
//! let mut io = FileIo::new();
//! io.open("header.bin", Mode::Write)?;
//! io.write_u32(0x5344_5058)?;
//! io.write_f32(1.5)?;
//!
//! io.open("header.bin", Mode::Read)?;
//! assert_eq!(io.read_u32()?, 0x5344_5058);
//! assert_eq!(io.read_f32()?, 1.5);
//! assert!(io.is_eof());
//! # Ok::<(), pixio_core::FileError>(())
//! ```

pub mod text;

use crate::{FileError, FileResult};
use byteorder::{ByteOrder, NativeEndian};
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(target_endian = "little")]
type Swapped = byteorder::BigEndian;
#[cfg(target_endian = "big")]
type Swapped = byteorder::LittleEndian;

/// File open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Read an existing file.
    #[default]
    Read,
    /// Create or truncate a file for writing.
    Write,
    /// Read and write an existing file.
    ReadWrite,
    /// Write at the end of a file, creating it if needed.
    Append,
}

impl Mode {
    /// Whether reads are permitted in this mode.
    #[inline]
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }
}

/// Binary file handle.
///
/// Not shared between threads; callers needing concurrent access must lock
/// externally.
#[derive(Debug)]
pub struct FileIo {
    path: PathBuf,
    mode: Mode,
    file: Option<File>,
    mmap: Option<Arc<Mmap>>,
    use_mmap: bool,
    pos: u64,
    size: u64,
    endian_conversion: bool,
}

impl Default for FileIo {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! typed_io {
    ($t:ty, $n:expr, $read:ident, $read_into:ident, $write:ident, $write_slice:ident,
     $bo_read_into:ident, $bo_write_into:ident) => {
        #[doc = concat!("Reads one `", stringify!($t), "`.")]
        pub fn $read(&mut self) -> FileResult<$t> {
            let mut bytes = [0u8; $n];
            self.read(&mut bytes, $n)?;
            Ok(<$t>::from_ne_bytes(bytes))
        }

        #[doc = concat!("Reads `out.len()` values of `", stringify!($t), "`.")]
        pub fn $read_into(&mut self, out: &mut [$t]) -> FileResult<()> {
            let mut bytes = vec![0u8; out.len() * $n];
            self.read_raw(&mut bytes)?;
            if self.endian_conversion {
                Swapped::$bo_read_into(&bytes, out);
            } else {
                NativeEndian::$bo_read_into(&bytes, out);
            }
            Ok(())
        }

        #[doc = concat!("Writes one `", stringify!($t), "`.")]
        pub fn $write(&mut self, value: $t) -> FileResult<()> {
            self.write(&value.to_ne_bytes(), $n)
        }

        #[doc = concat!("Writes a slice of `", stringify!($t), "`.")]
        pub fn $write_slice(&mut self, values: &[$t]) -> FileResult<()> {
            let mut bytes = vec![0u8; values.len() * $n];
            if self.endian_conversion {
                Swapped::$bo_write_into(values, &mut bytes);
            } else {
                NativeEndian::$bo_write_into(values, &mut bytes);
            }
            self.write_raw(&bytes)
        }
    };
}

impl FileIo {
    /// Creates an unopened handle.
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            mode: Mode::Read,
            file: None,
            mmap: None,
            use_mmap: true,
            pos: 0,
            size: 0,
            endian_conversion: false,
        }
    }

    /// Opens `path`, closing any file already bound to this handle.
    ///
    /// # Errors
    ///
    /// [`FileError::CannotOpen`] if the path cannot be accessed in `mode`.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: Mode) -> FileResult<()> {
        self.close()?;
        let path = path.as_ref();

        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true).create(true).truncate(true),
            Mode::ReadWrite => options.read(true).write(true),
            Mode::Append => options.append(true).create(true),
        };
        let file = options.open(path).map_err(|source| FileError::CannotOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| FileError::CannotOpen {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        self.mmap = None;
        if mode == Mode::Read && self.use_mmap && size > 0 {
            // SAFETY: the map is read-only and the handle never writes
            // through it. Truncation of the file by another process is
            // outside what this type can guard against.
            match unsafe { Mmap::map(&file) } {
                Ok(map) => self.mmap = Some(Arc::new(map)),
                Err(e) => tracing::warn!("{}: memory map failed, using reads: {}", path.display(), e),
            }
        }

        self.path = path.to_path_buf();
        self.mode = mode;
        self.size = size;
        self.pos = if mode == Mode::Append { size } else { 0 };
        self.file = Some(file);
        tracing::debug!(
            "open {} ({:?}, {} bytes, mmap: {})",
            self.path.display(),
            mode,
            size,
            self.mmap.is_some()
        );
        Ok(())
    }

    /// Opens an anonymous temporary file in [`Mode::ReadWrite`].
    ///
    /// The file is removed by the OS once the handle closes.
    pub fn open_temp(&mut self) -> FileResult<()> {
        self.close()?;
        let file = tempfile::tempfile().map_err(|source| FileError::CannotOpen {
            path: std::env::temp_dir(),
            source,
        })?;
        self.path = PathBuf::new();
        self.mode = Mode::ReadWrite;
        self.size = 0;
        self.pos = 0;
        self.file = Some(file);
        tracing::debug!("open temporary file");
        Ok(())
    }

    /// Flushes and releases the file. Closing an unopened handle is a no-op.
    pub fn close(&mut self) -> FileResult<()> {
        self.mmap = None;
        if let Some(mut file) = self.file.take() {
            tracing::debug!("close {}", self.path.display());
            if self.mode != Mode::Read {
                file.flush().map_err(|source| FileError::WriteFailed {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        self.pos = 0;
        self.size = 0;
        Ok(())
    }

    /// Returns `true` if a file is bound to this handle.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the open file (empty for unopened and temporary handles).
    #[inline]
    pub fn file_name(&self) -> &Path {
        &self.path
    }

    /// Mode the file was opened with.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current file size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current position in bytes.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Returns `true` when the position is at or past the end of the file.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.size
    }

    /// Moves to an absolute position.
    ///
    /// Positions past the end are accepted; subsequent reads fail with
    /// [`FileError::Truncated`].
    pub fn set_pos(&mut self, pos: u64) -> FileResult<()> {
        self.set_pos_inner(pos)
    }

    /// Moves `offset` bytes forward from the current position.
    ///
    /// # Errors
    ///
    /// [`FileError::Seek`] if the target position overflows `u64`; the
    /// position is left unchanged.
    pub fn seek(&mut self, offset: u64) -> FileResult<()> {
        let Some(pos) = self.pos.checked_add(offset) else {
            return Err(FileError::Seek {
                path: self.path.clone(),
                pos: self.pos,
                source: std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("offset {offset} overflows the file position"),
                ),
            });
        };
        self.set_pos_inner(pos)
    }

    fn set_pos_inner(&mut self, pos: u64) -> FileResult<()> {
        let file = self.file.as_mut().ok_or(FileError::NotOpen)?;
        if self.mmap.is_none() {
            file.seek(SeekFrom::Start(pos)).map_err(|source| FileError::Seek {
                path: self.path.clone(),
                pos,
                source,
            })?;
        }
        self.pos = pos;
        Ok(())
    }

    /// Returns `true` if fixed-width values are byte-swapped.
    #[inline]
    pub fn has_endian_conversion(&self) -> bool {
        self.endian_conversion
    }

    /// Enables or disables byte-swapping of fixed-width values.
    #[inline]
    pub fn set_endian_conversion(&mut self, value: bool) {
        self.endian_conversion = value;
    }

    /// Enables or disables memory mapping for subsequent [`Mode::Read`] opens.
    #[inline]
    pub fn set_mmap(&mut self, value: bool) {
        self.use_mmap = value;
    }

    /// Returns `true` if the open file is memory mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mmap.is_some()
    }

    /// The whole memory-mapped file.
    pub fn mmap_bytes(&self) -> Option<&[u8]> {
        self.mmap.as_deref().map(|m| &m[..])
    }

    /// The memory-mapped bytes from the current position to the end.
    ///
    /// Empty when positioned at or past the end.
    pub fn mmap_remaining(&self) -> Option<&[u8]> {
        self.mmap.as_deref().map(|m| {
            let start = (self.pos.min(m.len() as u64)) as usize;
            &m[start..]
        })
    }

    pub(crate) fn mmap_handle(&self) -> Option<Arc<Mmap>> {
        self.mmap.clone()
    }

    /// Reads exactly `buf.len()` bytes.
    ///
    /// `buf.len()` is the element count times `word_size`. With endian
    /// conversion enabled each `word_size` element is byte-reversed.
    ///
    /// # Errors
    ///
    /// - [`FileError::NotOpen`] on an unopened handle
    /// - [`FileError::Truncated`] if fewer than `buf.len()` bytes remain
    /// - [`FileError::ReadFailed`] if the OS read fails
    pub fn read(&mut self, buf: &mut [u8], word_size: usize) -> FileResult<()> {
        self.read_raw(buf)?;
        if self.endian_conversion && word_size > 1 {
            swap_words(buf, word_size);
        }
        Ok(())
    }

    /// Reads one signed byte.
    pub fn read_i8(&mut self) -> FileResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> FileResult<u8> {
        let mut b = [0u8; 1];
        self.read_raw(&mut b)?;
        Ok(b[0])
    }

    /// Reads `out.len()` bytes into `out`.
    pub fn read_u8_into(&mut self, out: &mut [u8]) -> FileResult<()> {
        self.read_raw(out)
    }

    typed_io!(i16, 2, read_i16, read_i16_into, write_i16, write_i16_slice, read_i16_into, write_i16_into);
    typed_io!(u16, 2, read_u16, read_u16_into, write_u16, write_u16_slice, read_u16_into, write_u16_into);
    typed_io!(i32, 4, read_i32, read_i32_into, write_i32, write_i32_slice, read_i32_into, write_i32_into);
    typed_io!(u32, 4, read_u32, read_u32_into, write_u32, write_u32_slice, read_u32_into, write_u32_into);
    typed_io!(f32, 4, read_f32, read_f32_into, write_f32, write_f32_slice, read_f32_into, write_f32_into);

    /// Writes all of `buf`, swapping each `word_size` element when endian
    /// conversion is enabled.
    ///
    /// # Errors
    ///
    /// - [`FileError::NotOpen`] on an unopened handle
    /// - [`FileError::WriteFailed`] if the OS write fails
    pub fn write(&mut self, buf: &[u8], word_size: usize) -> FileResult<()> {
        if self.endian_conversion && word_size > 1 {
            let mut swapped = buf.to_vec();
            swap_words(&mut swapped, word_size);
            self.write_raw(&swapped)
        } else {
            self.write_raw(buf)
        }
    }

    /// Writes one signed byte.
    pub fn write_i8(&mut self, value: i8) -> FileResult<()> {
        self.write_raw(&[value as u8])
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, value: u8) -> FileResult<()> {
        self.write_raw(&[value])
    }

    /// Writes raw bytes.
    pub fn write_u8_slice(&mut self, values: &[u8]) -> FileResult<()> {
        self.write_raw(values)
    }

    /// Writes the bytes of a string (no terminator).
    pub fn write_str(&mut self, value: &str) -> FileResult<()> {
        self.write_raw(value.as_bytes())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> FileResult<()> {
        if self.file.is_none() {
            return Err(FileError::NotOpen);
        }
        let available = self.size.saturating_sub(self.pos);
        if (buf.len() as u64) > available {
            return Err(self.truncated(buf.len(), available as usize));
        }

        if let Some(map) = &self.mmap {
            let start = self.pos as usize;
            buf.copy_from_slice(&map[start..start + buf.len()]);
        } else if let Some(file) = self.file.as_mut() {
            if let Err(source) = file.read_exact(buf) {
                if source.kind() == ErrorKind::UnexpectedEof {
                    return Err(self.truncated(buf.len(), available as usize));
                }
                return Err(FileError::ReadFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn write_raw(&mut self, buf: &[u8]) -> FileResult<()> {
        let file = self.file.as_mut().ok_or(FileError::NotOpen)?;
        file.write_all(buf).map_err(|source| FileError::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        if self.mode == Mode::Append {
            self.size += buf.len() as u64;
            self.pos = self.size;
        } else {
            self.pos += buf.len() as u64;
            self.size = self.size.max(self.pos);
        }
        Ok(())
    }

    fn truncated(&self, requested: usize, available: usize) -> FileError {
        FileError::Truncated {
            path: self.path.clone(),
            pos: self.pos,
            requested,
            available,
        }
    }
}

/// Reverses the bytes of every `word_size` element of `buf` in place.
pub fn swap_words(buf: &mut [u8], word_size: usize) {
    for word in buf.chunks_exact_mut(word_size) {
        word.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unopened_state() {
        let mut io = FileIo::new();
        assert!(!io.is_open());
        assert!(io.file_name().as_os_str().is_empty());
        assert_eq!(io.size(), 0);
        assert_eq!(io.pos(), 0);
        assert!(io.is_eof());
        assert!(!io.has_endian_conversion());
        assert!(matches!(io.write_u8(1), Err(FileError::NotOpen)));
        assert!(matches!(io.read_u8(), Err(FileError::NotOpen)));
    }

    #[test]
    fn test_open_empty_path_fails() {
        for mode in [Mode::Read, Mode::Write, Mode::ReadWrite, Mode::Append] {
            let mut io = FileIo::new();
            let err = io.open("", mode).unwrap_err();
            assert!(err.is_cannot_open(), "{mode:?}: {err}");
        }
    }

    #[test]
    fn test_typed_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typed.bin");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_i8(i8::MAX).unwrap();
        io.write_u8(u8::MAX).unwrap();
        io.write_i16(i16::MAX).unwrap();
        io.write_u16(u16::MAX).unwrap();
        io.write_i32(i32::MAX).unwrap();
        io.write_u32(u32::MAX).unwrap();
        io.write_f32(f32::MAX).unwrap();
        assert_eq!(io.size(), 1 + 1 + 2 + 2 + 4 + 4 + 4);

        io.open(&path, Mode::Read).unwrap();
        assert_eq!(io.read_i8().unwrap(), i8::MAX);
        assert_eq!(io.read_u8().unwrap(), u8::MAX);
        assert_eq!(io.read_i16().unwrap(), i16::MAX);
        assert_eq!(io.read_u16().unwrap(), u16::MAX);
        assert_eq!(io.read_i32().unwrap(), i32::MAX);
        assert_eq!(io.read_u32().unwrap(), u32::MAX);
        assert_eq!(io.read_f32().unwrap(), f32::MAX);
        assert!(io.is_eof());
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.open(&path, Mode::Read).unwrap();
        let mut buf = [0u8; 16];
        let err = io.read(&mut buf, 1).unwrap_err();
        assert!(err.is_truncated());

        io.open(&path, Mode::ReadWrite).unwrap();
        assert!(io.read(&mut buf, 1).unwrap_err().is_truncated());
    }

    #[test]
    fn test_seek_past_end_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seek.bin");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[1, 2, 3, 4]).unwrap();

        io.open(&path, Mode::Read).unwrap();
        io.set_pos(10).unwrap();
        assert_eq!(io.pos(), 10);
        assert!(io.is_eof());
        assert!(io.read_u8().unwrap_err().is_truncated());

        io.set_pos(2).unwrap();
        io.seek(1).unwrap();
        assert_eq!(io.read_u8().unwrap(), 4);
    }

    #[test]
    fn test_seek_overflow_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overflow.bin");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[1, 2, 3, 4]).unwrap();

        for mmap in [true, false] {
            io.set_mmap(mmap);
            io.open(&path, Mode::Read).unwrap();
            io.set_pos(3).unwrap();
            let err = io.seek(u64::MAX).unwrap_err();
            assert!(matches!(err, FileError::Seek { pos: 3, .. }), "mmap {mmap}: {err}");
            assert_eq!(io.pos(), 3);
            assert_eq!(io.read_u8().unwrap(), 4);
        }
    }

    #[test]
    fn test_endian_conversion_per_element() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("endian.bin");
        let a = u32::from_ne_bytes([1, 2, 3, 4]);
        let b = u32::from_ne_bytes([4, 3, 2, 1]);

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u32(a).unwrap();
        io.set_endian_conversion(true);
        assert!(io.has_endian_conversion());
        io.write_u32(a).unwrap();

        io.open(&path, Mode::Read).unwrap();
        io.set_endian_conversion(false);
        assert_eq!(io.read_u32().unwrap(), a);
        assert_eq!(io.read_u32().unwrap(), b);
        io.set_pos(0).unwrap();
        io.set_endian_conversion(true);
        assert_eq!(io.read_u32().unwrap(), b);
        assert_eq!(io.read_u32().unwrap(), a);

        io.set_pos(0).unwrap();
        let mut raw = [0u8; 4];
        io.read(&mut raw, 2).unwrap();
        assert_eq!(raw, [2, 1, 4, 3]);
    }

    #[test]
    fn test_slice_accessors_with_conversion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slice.bin");
        let values = [0x0102u16, 0x0304, 0xA0B0];

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.set_endian_conversion(true);
        io.write_u16_slice(&values).unwrap();

        io.open(&path, Mode::Read).unwrap();
        let mut plain = [0u16; 3];
        io.read_u16_into(&mut plain).unwrap();
        assert_eq!(plain, [0x0201, 0x0403, 0xB0A0]);

        io.set_pos(0).unwrap();
        io.set_endian_conversion(true);
        let mut swapped = [0u16; 3];
        io.read_u16_into(&mut swapped).unwrap();
        assert_eq!(swapped, values);
    }

    #[test]
    fn test_append_positions_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("append.txt");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_str("hello ").unwrap();
        io.open(&path, Mode::Append).unwrap();
        assert_eq!(io.pos(), 6);
        io.write_str("world").unwrap();
        assert_eq!(io.size(), 11);

        io.open(&path, Mode::Read).unwrap();
        assert_eq!(text::read_contents(&mut io).unwrap(), "hello world");
        io.set_pos(0).unwrap();
        assert_eq!(io.pos(), 0);
    }

    #[test]
    fn test_mmap_remaining_tracks_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.bin");

        let mut io = FileIo::new();
        io.open(&path, Mode::Write).unwrap();
        io.write_u8_slice(&[10, 20, 30, 40]).unwrap();

        io.open(&path, Mode::Read).unwrap();
        assert!(io.is_mapped());
        assert_eq!(io.mmap_bytes(), Some(&[10u8, 20, 30, 40][..]));
        io.seek(3).unwrap();
        assert_eq!(io.mmap_remaining(), Some(&[40u8][..]));
        io.seek(5).unwrap();
        assert_eq!(io.mmap_remaining(), Some(&[][..]));

        let mut unmapped = FileIo::new();
        unmapped.set_mmap(false);
        unmapped.open(&path, Mode::Read).unwrap();
        assert!(!unmapped.is_mapped());
        assert_eq!(unmapped.mmap_remaining(), None);
        unmapped.seek(1).unwrap();
        assert_eq!(unmapped.read_u8().unwrap(), 20);
    }

    #[test]
    fn test_temp_file() {
        let mut io = FileIo::new();
        io.open_temp().unwrap();
        assert!(io.is_open());
        assert_eq!(io.mode(), Mode::ReadWrite);
        for b in b"scratch" {
            io.write_u8(*b).unwrap();
        }
        assert_eq!(io.size(), 7);
        io.set_pos(0).unwrap();
        assert_eq!(io.read_u8().unwrap(), b's');
    }

    #[test]
    fn test_swap_words() {
        let mut buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_words(&mut buf, 4);
        assert_eq!(buf, [4, 3, 2, 1, 8, 7, 6, 5]);
    }
}
