// ============================================================
// Layer 3 — Example Payload Types
// ============================================================
// The tagged source payload of one example: either a sequence
// of word indices (text mode) or a decoded image (img mode).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of source input a corpus holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Img,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => f.write_str("text"),
            DataType::Img  => f.write_str("img"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(DataType::Text),
            "img"  => Ok(DataType::Img),
            other  => Err(format!("unknown source type '{other}', expected text or img")),
        }
    }
}

/// A decoded image, channel-major (`[C, H, W]`), values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
    pub data:     Vec<f32>,
}

impl ImageTensor {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), channels * height * width);
        Self { channels, height, width, data }
    }

    /// Pixel value at channel `c`, row `y`, column `x`
    pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[(c * self.height + y) * self.width + x]
    }
}

/// Indexed source side of one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceData {
    Text(Vec<u32>),
    Image(ImageTensor),
}

impl SourceData {
    pub fn data_type(&self) -> DataType {
        match self {
            SourceData::Text(_)  => DataType::Text,
            SourceData::Image(_) => DataType::Img,
        }
    }

    /// Sequence length for text, `1` for an image
    pub fn len(&self) -> usize {
        match self {
            SourceData::Text(ids) => ids.len(),
            SourceData::Image(_)  => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&[u32]> {
        match self {
            SourceData::Text(ids) => Some(ids),
            SourceData::Image(_)  => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageTensor> {
        match self {
            SourceData::Text(_)    => None,
            SourceData::Image(img) => Some(img),
        }
    }
}
