//! Frame ranges and numbered sequence path templates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DescriptorError, DescriptorResult};

/// Digit widths accepted for numbered sequences.
pub const SUPPORTED_DIGIT_WIDTHS: &[usize] = &[3, 4];

/// Container extensions that cannot be read as a frame sequence.
const MOVIE_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Inclusive frame range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameRange {
    pub min: u32,
    pub max: u32,
}

impl FrameRange {
    /// Create a range, rejecting `min > max`.
    pub fn new(min: u32, max: u32) -> DescriptorResult<Self> {
        if min > max {
            return Err(DescriptorError::InvalidFrameRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Number of frames in the range.
    pub fn count(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.min && frame <= self.max
    }

    /// Iterate the range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Placeholder {
    /// Byte offset of the token in the raw template
    start: usize,
    /// Byte length of the token (`%04d` is 4, `###` is 3)
    len: usize,
    /// Zero-padded digit width
    width: usize,
}

/// A path template for a numbered frame sequence.
///
/// The file name may contain one positional frame placeholder written either
/// printf-style (`%03d`, `%04d`) or as a run of hashes (`###`, `####`).
/// A template without a placeholder names a single file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameTemplate {
    raw: String,
    placeholder: Option<Placeholder>,
}

impl FrameTemplate {
    /// Parse a template string.
    pub fn parse(raw: impl Into<String>) -> DescriptorResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DescriptorError::invalid_template("path is empty"));
        }
        let placeholder = find_placeholder(&raw)?;
        Ok(Self { raw, placeholder })
    }

    /// Template for a zero-based numbered sequence inside `dir`.
    pub fn numbered_in(dir: &Path, width: usize, extension: &str) -> DescriptorResult<Self> {
        let name = format!("%0{}d.{}", width, extension);
        Self::parse(dir.join(name).to_string_lossy().into_owned())
    }

    /// Whether the template contains a frame placeholder.
    pub fn is_sequence(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Digit width of the placeholder, if any.
    pub fn digit_width(&self) -> Option<usize> {
        self.placeholder.map(|p| p.width)
    }

    /// The template string as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve the path of one frame. Single-file templates ignore `frame`.
    pub fn frame_path(&self, frame: u32) -> PathBuf {
        match self.placeholder {
            Some(p) => {
                let mut out = String::with_capacity(self.raw.len() + 4);
                out.push_str(&self.raw[..p.start]);
                out.push_str(&format!("{:0width$}", frame, width = p.width));
                out.push_str(&self.raw[p.start + p.len..]);
                PathBuf::from(out)
            }
            None => PathBuf::from(&self.raw),
        }
    }

    /// Lowercased extension of the file name, if it has one after the placeholder.
    pub fn extension(&self) -> Option<String> {
        let ext_start = self.extension_dot()? + 1;
        Some(self.raw[ext_start..].to_lowercase())
    }

    /// Copy of this template with the file extension replaced (or appended).
    pub fn with_extension(&self, extension: &str) -> Self {
        let stem_end = self.extension_dot().unwrap_or(self.raw.len());
        let raw = format!("{}.{}", &self.raw[..stem_end], extension);
        Self {
            raw,
            placeholder: self.placeholder,
        }
    }

    /// Directory component of the template.
    pub fn parent(&self) -> Option<PathBuf> {
        Path::new(&self.raw).parent().map(Path::to_path_buf)
    }

    /// File name without extension, placeholder left as written.
    pub fn file_stem(&self) -> String {
        let name_start = file_name_start(&self.raw);
        let stem_end = self.extension_dot().unwrap_or(self.raw.len());
        self.raw[name_start..stem_end].to_string()
    }

    /// Whether the extension names a movie container rather than an image.
    pub fn is_movie_container(&self) -> bool {
        self.extension()
            .map(|ext| MOVIE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Byte offset of the dot that starts the extension.
    fn extension_dot(&self) -> Option<usize> {
        let name_start = file_name_start(&self.raw);
        let dot = name_start + self.raw[name_start..].rfind('.')?;
        // A dot before the placeholder belongs to the stem ("shot.%04d").
        if let Some(p) = self.placeholder {
            if dot < p.start + p.len {
                return None;
            }
        }
        if dot + 1 == self.raw.len() {
            return None;
        }
        Some(dot)
    }
}

fn file_name_start(raw: &str) -> usize {
    raw.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0)
}

/// Locate the frame placeholder in the file name.
///
/// Every `%` and `#` is considered; a `%` not followed by `<digits>d` and a
/// lone `#` are literal characters. When several placeholders qualify the
/// last one wins, since it sits next to the frame number in practice.
fn find_placeholder(raw: &str) -> DescriptorResult<Option<Placeholder>> {
    let name_start = file_name_start(raw);
    let name = &raw[name_start..];
    let bytes = name.as_bytes();

    let mut found = None;
    let mut rejected = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if bytes.get(i + 1 + digits) != Some(&b'd') {
                    i += 1;
                    continue;
                }
                let spec = &name[i + 1..i + 1 + digits];
                let width = spec.parse::<usize>().unwrap_or(0);
                let len = digits + 2;
                if spec.starts_with('0') && SUPPORTED_DIGIT_WIDTHS.contains(&width) {
                    found = Some(Placeholder {
                        start: name_start + i,
                        len,
                        width,
                    });
                } else {
                    rejected = Some(format!("placeholder '%{}d' must be %03d or %04d", spec));
                }
                i += len;
            }
            b'#' => {
                let run = bytes[i..].iter().take_while(|b| **b == b'#').count();
                if SUPPORTED_DIGIT_WIDTHS.contains(&run) {
                    found = Some(Placeholder {
                        start: name_start + i,
                        len: run,
                        width: run,
                    });
                } else if run > 1 {
                    rejected = Some(format!(
                        "placeholder of {} hashes must be ### or ####",
                        run
                    ));
                }
                i += run;
            }
            _ => i += 1,
        }
    }

    match (found, rejected) {
        (Some(placeholder), _) => Ok(Some(placeholder)),
        (None, Some(message)) => Err(DescriptorError::invalid_template(message)),
        (None, None) => Ok(None),
    }
}

impl fmt::Display for FrameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for FrameTemplate {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FrameTemplate {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FrameTemplate> for String {
    fn from(value: FrameTemplate) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_range_count() {
        let range = FrameRange::new(1001, 1200).unwrap();
        assert_eq!(range.count(), 200);
        assert!(range.contains(1001));
        assert!(range.contains(1200));
        assert!(!range.contains(1201));
        assert_eq!(FrameRange::new(5, 5).unwrap().count(), 1);
    }

    #[test]
    fn test_frame_range_rejects_inverted() {
        assert!(matches!(
            FrameRange::new(10, 9),
            Err(DescriptorError::InvalidFrameRange { min: 10, max: 9 })
        ));
    }

    #[test]
    fn test_printf_placeholder() {
        let t = FrameTemplate::parse("/shots/plate.%04d.exr").unwrap();
        assert!(t.is_sequence());
        assert_eq!(t.digit_width(), Some(4));
        assert_eq!(t.frame_path(12), PathBuf::from("/shots/plate.0012.exr"));
        assert_eq!(t.frame_path(1001), PathBuf::from("/shots/plate.1001.exr"));
        assert_eq!(t.extension().as_deref(), Some("exr"));
    }

    #[test]
    fn test_hash_placeholder() {
        let t = FrameTemplate::parse("/shots/plate_###.png").unwrap();
        assert_eq!(t.digit_width(), Some(3));
        assert_eq!(t.frame_path(7), PathBuf::from("/shots/plate_007.png"));
    }

    #[test]
    fn test_placeholder_only_in_file_name() {
        let t = FrameTemplate::parse("/renders/%04d/still.png").unwrap();
        assert!(!t.is_sequence());
        assert_eq!(t.frame_path(3), PathBuf::from("/renders/%04d/still.png"));
    }

    #[test]
    fn test_literal_percent_and_hash_in_name() {
        let t = FrameTemplate::parse("/grades/grade_50%_plate.%04d.png").unwrap();
        assert!(t.is_sequence());
        assert_eq!(
            t.frame_path(1001),
            PathBuf::from("/grades/grade_50%_plate.1001.png")
        );

        let t = FrameTemplate::parse("/takes/take#2_plate.####.png").unwrap();
        assert_eq!(t.digit_width(), Some(4));
        assert_eq!(t.frame_path(12), PathBuf::from("/takes/take#2_plate.0012.png"));
        assert_eq!(t.extension().as_deref(), Some("png"));

        let t = FrameTemplate::parse("/takes/take#2.png").unwrap();
        assert!(!t.is_sequence());
    }

    #[test]
    fn test_unsupported_widths_rejected() {
        assert!(FrameTemplate::parse("/a/b.%05d.png").is_err());
        assert!(FrameTemplate::parse("/a/b.%d.png").is_err());
        assert!(FrameTemplate::parse("/a/b.##.png").is_err());
        assert!(FrameTemplate::parse("").is_err());
    }

    #[test]
    fn test_with_extension() {
        let t = FrameTemplate::parse("/out/mask.%04d.exr").unwrap();
        let png = t.with_extension("png");
        assert_eq!(png.as_str(), "/out/mask.%04d.png");
        assert_eq!(png.frame_path(1), PathBuf::from("/out/mask.0001.png"));

        let bare = FrameTemplate::parse("/out/mask.%04d").unwrap();
        assert_eq!(bare.extension(), None);
        assert_eq!(bare.with_extension("png").as_str(), "/out/mask.%04d.png");
    }

    #[test]
    fn test_file_stem_and_parent() {
        let t = FrameTemplate::parse("/out/mask_####.exr").unwrap();
        assert_eq!(t.file_stem(), "mask_####");
        assert_eq!(t.parent(), Some(PathBuf::from("/out")));
    }

    #[test]
    fn test_numbered_in() {
        let t = FrameTemplate::numbered_in(Path::new("/tmp/seq"), 4, "jpg").unwrap();
        assert_eq!(t.frame_path(0), PathBuf::from("/tmp/seq/0000.jpg"));
        assert_eq!(t.frame_path(199), PathBuf::from("/tmp/seq/0199.jpg"));
    }

    #[test]
    fn test_movie_container() {
        assert!(FrameTemplate::parse("/in/clip.mp4").unwrap().is_movie_container());
        assert!(!FrameTemplate::parse("/in/f.%04d.png").unwrap().is_movie_container());
    }

    #[test]
    fn test_serde_as_string() {
        let t = FrameTemplate::parse("/in/f.%03d.png").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"/in/f.%03d.png\"");
        let back: FrameTemplate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<FrameTemplate>("\"/in/f.%07d.png\"").is_err());
    }
}
