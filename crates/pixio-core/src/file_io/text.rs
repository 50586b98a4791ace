//! Line and word reading layered on [`FileIo`].
//!
//! These helpers buffer nothing themselves; they pull bytes through the
//! handle one at a time, which is fine for the small sidecar and config
//! files they are used on.

use super::{FileIo, Mode};
use crate::FileResult;
use std::path::Path;

/// Reads everything from the current position to the end of the file.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_contents(io: &mut FileIo) -> FileResult<String> {
    let remaining = io.size().saturating_sub(io.pos()) as usize;
    let mut buf = vec![0u8; remaining];
    io.read_u8_into(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Reads the next whitespace-delimited word, skipping `#` comments.
///
/// A comment runs from `#` to the end of its line. Returns `None` once the
/// end of the file is reached without finding a word.
pub fn read_word(io: &mut FileIo) -> FileResult<Option<String>> {
    let mut word = Vec::new();
    let mut in_comment = false;
    while !io.is_eof() {
        let c = io.read_u8()?;
        if in_comment {
            if c == b'\n' || c == b'\r' {
                in_comment = false;
            }
            continue;
        }
        match c {
            b'#' if word.is_empty() => in_comment = true,
            c if c.is_ascii_whitespace() => {
                if !word.is_empty() {
                    break;
                }
            }
            c => word.push(c),
        }
    }
    if word.is_empty() {
        Ok(None)
    } else {
        Ok(Some(String::from_utf8_lossy(&word).into_owned()))
    }
}

/// Reads the next line without its terminator.
///
/// Both `\n` and `\r\n` endings are accepted. Returns `None` at end of file.
pub fn read_line(io: &mut FileIo) -> FileResult<Option<String>> {
    if io.is_eof() {
        return Ok(None);
    }
    let mut line = Vec::new();
    while !io.is_eof() {
        match io.read_u8()? {
            b'\n' => break,
            c => line.push(c),
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Reads every line of a file, comments included.
pub fn read_lines<P: AsRef<Path>>(path: P) -> FileResult<Vec<String>> {
    let mut io = FileIo::new();
    io.open(path, Mode::Read)?;
    let mut lines = Vec::new();
    while let Some(line) = read_line(&mut io)? {
        lines.push(line);
    }
    io.close()?;
    Ok(lines)
}

/// Writes `lines` to a file, each followed by `\n`.
pub fn write_lines<P, S>(path: P, lines: &[S]) -> FileResult<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let mut io = FileIo::new();
    io.open(path, Mode::Write)?;
    for line in lines {
        io.write_str(line.as_ref())?;
        io.write_u8(b'\n')?;
    }
    io.close()
}
