//! File description returned before any pixels are decoded.

use crate::Tags;
use pixio_core::PixelDataInfo;
use serde::{Deserialize, Serialize};

/// What a file contains: one entry per image layer plus its tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// Path the info was read from.
    pub file_name: String,
    /// Image layers. Single-layer formats have exactly one.
    pub video: Vec<PixelDataInfo>,
    /// File-level metadata.
    pub tags: Tags,
}

impl Info {
    /// Creates an info with a single layer.
    pub fn new(file_name: impl Into<String>, layer: PixelDataInfo) -> Self {
        Self {
            file_name: file_name.into(),
            video: vec![layer],
            tags: Tags::new(),
        }
    }

    /// The first layer, if any.
    pub fn first(&self) -> Option<&PixelDataInfo> {
        self.video.first()
    }
}
