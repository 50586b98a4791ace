//! Format plugins: one reader/writer pair per file format.
//!
//! The set of formats is closed and known at compile time, so dispatch is a
//! plain `match` over [`Plugin`] rather than a registry of trait objects.
//!
//! ```rust,no_run
//! use pixio_io::Plugin;
//! use serde_json::json;
//!
//! let mut plugin = Plugin::for_path("out.0001.dpx")?;
//! plugin.set_options(&json!({ "endian": "Lsb", "bit_depth": 12 }))?;
//! let image = pixio_io::read("in.0001.exr")?;
//! plugin.write("out.0001.dpx", &image)?;
//! # Ok::<(), pixio_io::IoError>(())
//! ```

use crate::sequence::Sequence;
use crate::{Image, Info, IoError, IoResult};
use pixio_core::Proxy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[cfg(feature = "dpx")]
use crate::dpx;
#[cfg(feature = "exr")]
use crate::exr;
#[cfg(feature = "png")]
use crate::png;
#[cfg(feature = "tiff")]
use crate::tiff;

/// Reads frames of one format.
pub trait SequenceRead {
    /// Format options, mapped to and from JSON.
    type Options: Clone + Default + Serialize + DeserializeOwned;

    /// Creates a reader.
    fn with_options(options: Self::Options) -> Self
    where
        Self: Sized;

    /// Current options.
    fn options(&self) -> &Self::Options;

    /// Reads the file description without decoding pixels.
    fn read_info(&self, path: &Path) -> IoResult<Info>;

    /// Reads and decodes a whole frame.
    fn read(&self, path: &Path) -> IoResult<Image>;

    /// Reads a frame at reduced resolution.
    ///
    /// Formats without native proxy decoding decode at full resolution and
    /// decimate.
    fn read_proxy(&self, path: &Path, proxy: Proxy) -> IoResult<Image> {
        let image = self.read(path)?;
        Ok(Image {
            pixels: image.pixels.to_proxy(proxy),
            tags: image.tags,
        })
    }

    /// Reads frame `frame` of `sequence`.
    fn read_frame(&self, sequence: &Sequence, frame: i32) -> IoResult<Image> {
        self.read(&sequence.frame_path(frame))
    }
}

/// Writes frames of one format.
pub trait SequenceWrite {
    /// Format options, mapped to and from JSON.
    type Options: Clone + Default + Serialize + DeserializeOwned;

    /// Creates a writer.
    fn with_options(options: Self::Options) -> Self
    where
        Self: Sized;

    /// Current options.
    fn options(&self) -> &Self::Options;

    /// Encodes `image` to `path`, replacing any existing file.
    fn write(&self, path: &Path, image: &Image) -> IoResult<()>;

    /// Writes `image` as frame `frame` of `sequence`.
    fn write_frame(&self, sequence: &Sequence, frame: i32, image: &Image) -> IoResult<()> {
        self.write(&sequence.frame_path(frame), image)
    }
}

/// A file format together with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum Plugin {
    /// SMPTE DPX.
    #[cfg(feature = "dpx")]
    Dpx(dpx::Options),
    /// PNG.
    #[cfg(feature = "png")]
    Png,
    /// TIFF.
    #[cfg(feature = "tiff")]
    Tiff(tiff::Options),
    /// OpenEXR.
    #[cfg(feature = "exr")]
    Exr(exr::Options),
}

impl Plugin {
    /// Every compiled-in plugin with default options.
    pub fn all() -> Vec<Plugin> {
        vec![
            #[cfg(feature = "dpx")]
            Plugin::Dpx(Default::default()),
            #[cfg(feature = "png")]
            Plugin::Png,
            #[cfg(feature = "tiff")]
            Plugin::Tiff(Default::default()),
            #[cfg(feature = "exr")]
            Plugin::Exr(Default::default()),
        ]
    }

    /// Format name.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(_) => "DPX",
            #[cfg(feature = "png")]
            Plugin::Png => "PNG",
            #[cfg(feature = "tiff")]
            Plugin::Tiff(_) => "TIFF",
            #[cfg(feature = "exr")]
            Plugin::Exr(_) => "OpenEXR",
        }
    }

    /// File extensions, lowercase, without the dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(_) => &["dpx"],
            #[cfg(feature = "png")]
            Plugin::Png => &["png"],
            #[cfg(feature = "tiff")]
            Plugin::Tiff(_) => &["tif", "tiff"],
            #[cfg(feature = "exr")]
            Plugin::Exr(_) => &["exr"],
        }
    }

    /// Plugin for an extension (with or without the dot, any case).
    pub fn for_extension(ext: &str) -> Option<Plugin> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|p| p.extensions().contains(&ext.as_str()))
    }

    /// Plugin for a path, by extension.
    ///
    /// # Errors
    ///
    /// [`IoError::UnsupportedFormat`] when no plugin claims the extension.
    pub fn for_path<P: AsRef<Path>>(path: P) -> IoResult<Plugin> {
        let path = path.as_ref();
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::for_extension)
            .ok_or_else(|| IoError::UnsupportedFormat(path.display().to_string()))
    }

    /// Reads the file description.
    pub fn read_info<P: AsRef<Path>>(&self, path: P) -> IoResult<Info> {
        let path = path.as_ref();
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(o) => dpx::DpxReader::with_options(o.clone()).read_info(path),
            #[cfg(feature = "png")]
            Plugin::Png => png::PngReader::with_options(()).read_info(path),
            #[cfg(feature = "tiff")]
            Plugin::Tiff(o) => tiff::TiffReader::with_options(o.clone()).read_info(path),
            #[cfg(feature = "exr")]
            Plugin::Exr(o) => exr::ExrReader::with_options(o.clone()).read_info(path),
        }
    }

    /// Reads a frame.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> IoResult<Image> {
        self.read_proxy(path, Proxy::None)
    }

    /// Reads a frame at reduced resolution.
    pub fn read_proxy<P: AsRef<Path>>(&self, path: P, proxy: Proxy) -> IoResult<Image> {
        let path = path.as_ref();
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(o) => dpx::DpxReader::with_options(o.clone()).read_proxy(path, proxy),
            #[cfg(feature = "png")]
            Plugin::Png => png::PngReader::with_options(()).read_proxy(path, proxy),
            #[cfg(feature = "tiff")]
            Plugin::Tiff(o) => tiff::TiffReader::with_options(o.clone()).read_proxy(path, proxy),
            #[cfg(feature = "exr")]
            Plugin::Exr(o) => exr::ExrReader::with_options(o.clone()).read_proxy(path, proxy),
        }
    }

    /// Writes a frame.
    pub fn write<P: AsRef<Path>>(&self, path: P, image: &Image) -> IoResult<()> {
        let path = path.as_ref();
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(o) => dpx::DpxWriter::with_options(o.clone()).write(path, image),
            #[cfg(feature = "png")]
            Plugin::Png => png::PngWriter::with_options(()).write(path, image),
            #[cfg(feature = "tiff")]
            Plugin::Tiff(o) => tiff::TiffWriter::with_options(o.clone()).write(path, image),
            #[cfg(feature = "exr")]
            Plugin::Exr(o) => exr::ExrWriter::with_options(o.clone()).write(path, image),
        }
    }

    /// Current options as JSON. Formats without options give an empty
    /// object.
    pub fn options(&self) -> IoResult<Value> {
        let value = match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(o) => serde_json::to_value(o)?,
            #[cfg(feature = "png")]
            Plugin::Png => Value::Object(Default::default()),
            #[cfg(feature = "tiff")]
            Plugin::Tiff(o) => serde_json::to_value(o)?,
            #[cfg(feature = "exr")]
            Plugin::Exr(o) => serde_json::to_value(o)?,
        };
        Ok(value)
    }

    /// Updates options from JSON.
    ///
    /// Keys missing from `value` keep their current setting. On error the
    /// options are unchanged.
    ///
    /// # Errors
    ///
    /// [`IoError::Options`] when a key has the wrong type or value.
    pub fn set_options(&mut self, value: &Value) -> IoResult<()> {
        match self {
            #[cfg(feature = "dpx")]
            Plugin::Dpx(o) => *o = patch(o, value)?,
            #[cfg(feature = "png")]
            Plugin::Png => {}
            #[cfg(feature = "tiff")]
            Plugin::Tiff(o) => *o = patch(o, value)?,
            #[cfg(feature = "exr")]
            Plugin::Exr(o) => *o = patch(o, value)?,
        }
        Ok(())
    }
}

fn patch<T: Serialize + DeserializeOwned>(current: &T, value: &Value) -> IoResult<T> {
    let mut merged = serde_json::to_value(current)?;
    match (&mut merged, value) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        (dst, src) => *dst = src.clone(),
    }
    Ok(serde_json::from_value(merged)?)
}

/// Reads a frame, picking the plugin from the extension.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    Plugin::for_path(&path)?.read(path)
}

/// Reads a file description, picking the plugin from the extension.
pub fn read_info<P: AsRef<Path>>(path: P) -> IoResult<Info> {
    Plugin::for_path(&path)?.read_info(path)
}

/// Writes a frame with default options, picking the plugin from the
/// extension.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    Plugin::for_path(&path)?.write(path, image)
}
