//! Numbered frame files.
//!
//! A [`Sequence`] is a file name split around its frame number, e.g.
//! `plate.0042.dpx` is prefix `plate.`, padding 4, suffix `.dpx`. Readers
//! and writers address frames through [`Sequence::frame_path`].
//!
//! ```rust
//! use pixio_io::sequence::{FrameRange, Sequence};
//!
//! let seq = Sequence::from_path("plate.0042.dpx").unwrap();
//! assert_eq!(seq.frame_path(7).to_str(), Some("plate.0007.dpx"));
//!
//! let range: FrameRange = "1001-1003".parse().unwrap();
//! assert_eq!(range.len(), 3);
//! ```

use crate::{IoError, IoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Inclusive frame range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    start: i32,
    end: i32,
}

impl FrameRange {
    /// Creates a range, swapping the bounds if reversed.
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// One frame.
    pub fn single(frame: i32) -> Self {
        Self::new(frame, frame)
    }

    /// First frame.
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Last frame.
    pub fn end(&self) -> i32 {
        self.end
    }

    /// Frame count (at least 1).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        (i64::from(self.end) - i64::from(self.start) + 1) as usize
    }

    /// Whether `frame` lies inside.
    pub fn contains(&self, frame: i32) -> bool {
        (self.start..=self.end).contains(&frame)
    }

    /// Grows the range to cover `frame`.
    pub fn extend(&mut self, frame: i32) {
        self.start = self.start.min(frame);
        self.end = self.end.max(frame);
    }

    /// Union with an overlapping or adjacent range.
    pub fn merge(&self, other: &FrameRange) -> Option<FrameRange> {
        let touches = i64::from(self.end) + 1 >= i64::from(other.start)
            && i64::from(other.end) + 1 >= i64::from(self.start);
        touches.then(|| FrameRange::new(self.start.min(other.start), self.end.max(other.end)))
    }

    /// Iterates frames in order.
    pub fn iter(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }
}

impl IntoIterator for FrameRange {
    type Item = i32;
    type IntoIter = std::ops::RangeInclusive<i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start == self.end {
            true => write!(f, "{}", self.start),
            false => write!(f, "{}-{}", self.start, self.end),
        }
    }
}

impl FromStr for FrameRange {
    type Err = IoError;

    /// Parses `"12"` or `"1001-1100"`. A leading minus is a negative frame.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || IoError::Parse(format!("invalid frame range {s:?}"));
        let split = s
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i);
        match split {
            Some(i) => {
                let a = s[..i].parse().map_err(|_| bad())?;
                let b = s[i + 1..].parse().map_err(|_| bad())?;
                Ok(Self::new(a, b))
            }
            None => s.parse().map(Self::single).map_err(|_| bad()),
        }
    }
}

/// A frame-numbered file name pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    padding: usize,
    range: Option<FrameRange>,
}

impl Sequence {
    /// Creates a pattern in the current directory.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, padding: usize) -> Self {
        Self {
            dir: PathBuf::new(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            padding: padding.max(1),
            range: None,
        }
    }

    /// Splits a concrete frame path around its last run of digits.
    ///
    /// The frame found becomes the sequence's range.
    pub fn from_path<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IoError::Parse(format!("{}: not a file name", path.display())))?;
        let (prefix, digits, suffix) = split_frame(name)
            .ok_or_else(|| IoError::Parse(format!("{name}: no frame number")))?;
        let frame = digits
            .parse()
            .map_err(|_| IoError::Parse(format!("{name}: frame {digits} out of range")))?;

        let mut seq = Self::new(prefix, suffix, digits.len());
        seq.dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        seq.range = Some(FrameRange::single(frame));
        Ok(seq)
    }

    /// Parses `name.%04d.ext`, `name.####.ext` or `name.@@@@.ext`.
    pub fn from_pattern(pattern: &str) -> IoResult<Self> {
        let path = Path::new(pattern);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or(pattern);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut seq = if let Some(start) = name.find('%') {
            let rest = &name[start + 1..];
            let end = rest
                .find('d')
                .ok_or_else(|| IoError::Parse(format!("{pattern}: unterminated %d")))?;
            let width = &rest[..end];
            let padding = if width.is_empty() {
                1
            } else {
                width
                    .parse()
                    .map_err(|_| IoError::Parse(format!("{pattern}: bad width {width:?}")))?
            };
            Self::new(&name[..start], &rest[end + 1..], padding)
        } else if let Some(start) = name.find(['#', '@']) {
            let marker = name[start..].chars().next().unwrap_or('#');
            let len = name[start..].chars().take_while(|&c| c == marker).count();
            Self::new(&name[..start], &name[start + len..], len)
        } else {
            return Err(IoError::Parse(format!("{pattern}: no frame pattern")));
        };
        seq.dir = dir;
        Ok(seq)
    }

    /// Sets the directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Sets the known frame range.
    pub fn with_range(mut self, range: FrameRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Directory holding the frames.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Text before the frame number.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Text after the frame number.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Minimum digit count.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Known frames, if any.
    pub fn range(&self) -> Option<FrameRange> {
        self.range
    }

    /// Path of `frame`.
    pub fn frame_path(&self, frame: i32) -> PathBuf {
        let digits = if frame < 0 {
            format!("-{:0width$}", frame.unsigned_abs(), width = self.padding)
        } else {
            format!("{:0width$}", frame, width = self.padding)
        };
        self.dir.join(format!("{}{}{}", self.prefix, digits, self.suffix))
    }

    /// Paths of every known frame.
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.range
            .into_iter()
            .flat_map(|r| r.iter())
            .map(|f| self.frame_path(f))
    }

    /// `prefix%0Nd suffix` form.
    pub fn printf_pattern(&self) -> String {
        format!("{}%0{}d{}", self.prefix, self.padding, self.suffix)
    }

    /// `prefix#### suffix` form.
    pub fn hash_pattern(&self) -> String {
        format!("{}{}{}", self.prefix, "#".repeat(self.padding), self.suffix)
    }

    /// Scans `dir` for files matching this pattern and sets the range to
    /// the lowest and highest frame found. Gaps are not reported.
    pub fn scan(&mut self) -> IoResult<Option<FrameRange>> {
        let dir = if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.dir.as_path()
        };
        let mut found: Option<FrameRange> = None;
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((prefix, digits, suffix)) = split_frame(name) else {
                continue;
            };
            if prefix != self.prefix || suffix != self.suffix || digits.len() < self.padding {
                continue;
            }
            if let Ok(frame) = digits.parse::<i32>() {
                match found.as_mut() {
                    Some(r) => r.extend(frame),
                    None => found = Some(FrameRange::single(frame)),
                }
            }
        }
        tracing::trace!("{}: scanned {:?}", self, found);
        self.range = found;
        Ok(found)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir.join(self.printf_pattern()).display())?;
        if let Some(range) = self.range {
            write!(f, " [{range}]")?;
        }
        Ok(())
    }
}

/// Splits a file name around its last run of ASCII digits.
fn split_frame(name: &str) -> Option<(&str, &str, &str)> {
    let end = name.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = name[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let (prefix, suffix) = (&name[..start], &name[end..]);
    if prefix.is_empty() && suffix.is_empty() {
        return None;
    }
    Some((prefix, &name[start..end], suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_range_basics() {
        let r = FrameRange::new(20, 10);
        assert_eq!((r.start(), r.end(), r.len()), (10, 20, 11));
        assert!(r.contains(15));
        assert!(!r.contains(21));
        assert_eq!(r.to_string(), "10-20");
        assert_eq!(FrameRange::single(3).to_string(), "3");
        assert_eq!(r.into_iter().count(), 11);
    }

    #[test]
    fn test_range_merge() {
        let a = FrameRange::new(1, 10);
        assert_eq!(a.merge(&FrameRange::new(11, 20)), Some(FrameRange::new(1, 20)));
        assert_eq!(a.merge(&FrameRange::new(12, 20)), None);
    }

    #[test]
    fn test_range_parse() {
        assert_eq!("1001-1100".parse::<FrameRange>().unwrap(), FrameRange::new(1001, 1100));
        assert_eq!("-5".parse::<FrameRange>().unwrap(), FrameRange::single(-5));
        assert_eq!("-5--1".parse::<FrameRange>().unwrap(), FrameRange::new(-5, -1));
        assert!("a-b".parse::<FrameRange>().is_err());
    }

    #[test]
    fn test_from_path() {
        let seq = Sequence::from_path("shots/plate_v2.0042.dpx").unwrap();
        assert_eq!(seq.prefix(), "plate_v2.");
        assert_eq!(seq.suffix(), ".dpx");
        assert_eq!(seq.padding(), 4);
        assert_eq!(seq.dir(), Path::new("shots"));
        assert_eq!(seq.range(), Some(FrameRange::single(42)));
        assert!(Sequence::from_path("1234").is_err());
        assert!(Sequence::from_path("plate.dpx").is_err());
    }

    #[test]
    fn test_patterns() {
        for p in ["comp.%04d.exr", "comp.####.exr", "comp.@@@@.exr"] {
            let seq = Sequence::from_pattern(p).unwrap();
            assert_eq!(seq.printf_pattern(), "comp.%04d.exr", "{p}");
            assert_eq!(seq.hash_pattern(), "comp.####.exr");
        }
        assert_eq!(Sequence::from_pattern("a.%d.png").unwrap().padding(), 1);
        assert!(Sequence::from_pattern("plain.exr").is_err());
    }

    #[test]
    fn test_frame_path_padding() {
        let seq = Sequence::new("f.", ".png", 3);
        assert_eq!(seq.frame_path(7), PathBuf::from("f.007.png"));
        assert_eq!(seq.frame_path(12345), PathBuf::from("f.12345.png"));
        assert_eq!(seq.frame_path(-7), PathBuf::from("f.-007.png"));
    }

    #[test]
    fn test_scan() {
        let dir = tempdir().unwrap();
        for f in [3, 5, 9] {
            std::fs::write(dir.path().join(format!("shot.{f:04}.dpx")), b"").unwrap();
        }
        std::fs::write(dir.path().join("other.0001.dpx"), b"").unwrap();

        let mut seq = Sequence::new("shot.", ".dpx", 4).with_dir(dir.path());
        assert_eq!(seq.scan().unwrap(), Some(FrameRange::new(3, 9)));
        assert_eq!(seq.paths().count(), 7);
    }
}
