//! Output encodings and source bit-depth descriptors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DescriptorError;

/// Encodings tried after the preferred one when a mask frame cannot be written.
pub const DEFAULT_FALLBACK_CHAIN: &[OutputEncoding] = &[OutputEncoding::Png];

/// Per-frame image encoding for written masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    /// 8-bit PNG, always available
    #[default]
    Png,
    /// 32-bit float OpenEXR
    Exr,
    /// 8-bit TIFF
    Tiff,
}

impl OutputEncoding {
    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputEncoding::Png => "png",
            OutputEncoding::Exr => "exr",
            OutputEncoding::Tiff => "tiff",
        }
    }

    /// Map a file extension to an encoding.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(OutputEncoding::Png),
            "exr" => Some(OutputEncoding::Exr),
            "tif" | "tiff" => Some(OutputEncoding::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputEncoding {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim())
            .ok_or_else(|| DescriptorError::UnknownEncoding(s.to_string()))
    }
}

/// Parse a comma separated encoding list such as `"png,tiff"`.
pub fn parse_encoding_list(s: &str) -> Result<Vec<OutputEncoding>, DescriptorError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// Bit depth of the source samples, as reported by the host's reader metadata
/// (`"8-bit fixed"`, `"16-bit half float"`, `"32-bit float"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitDepth {
    pub bits: u8,
    pub float: bool,
}

impl BitDepth {
    pub const FIXED_8: BitDepth = BitDepth { bits: 8, float: false };
    pub const FLOAT_32: BitDepth = BitDepth { bits: 32, float: true };

    /// Infer the bit depth from a source file extension when the host has no metadata.
    pub fn infer_from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "tif" | "tiff" => Some(Self::FIXED_8),
            "exr" => Some(Self::FLOAT_32),
            _ => None,
        }
    }
}

impl Default for BitDepth {
    fn default() -> Self {
        Self::FIXED_8
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.float {
            if self.bits == 16 {
                write!(f, "16-bit half float")
            } else {
                write!(f, "{}-bit float", self.bits)
            }
        } else {
            write!(f, "{}-bit fixed", self.bits)
        }
    }
}

impl FromStr for BitDepth {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let bits = lower
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty())
            .and_then(|part| part.parse::<u8>().ok())
            .ok_or_else(|| DescriptorError::UnknownBitDepth(s.to_string()))?;

        if !matches!(bits, 8 | 10 | 12 | 14 | 16 | 32) {
            return Err(DescriptorError::UnknownBitDepth(s.to_string()));
        }

        let float = lower.contains("float") || lower.contains("half");
        if bits == 32 && !float {
            return Err(DescriptorError::UnknownBitDepth(s.to_string()));
        }

        Ok(Self { bits, float })
    }
}

impl TryFrom<String> for BitDepth {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BitDepth> for String {
    fn from(value: BitDepth) -> Self {
        value.to_string()
    }
}
