//! Domain types for representing a slide deck as read from its container.
//!
//! A [`Presentation`] is built once by a format backend and treated as
//! read-only by the conversion engine.

use crate::error;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Represents an entire presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: PresentationFormat,

    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create a new presentation with the given filename and format.
    pub fn new(filename: impl Into<String>, format: PresentationFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }
}

/// The format of the source presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary). Detected so it can be rejected clearly.
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }

    /// Detect the format from magic bytes, falling back to the extension.
    pub fn detect(bytes: &[u8], ext: Option<&str>) -> error::Result<Self> {
        Self::from_magic(bytes)
            .or_else(|| ext.and_then(Self::from_extension))
            .ok_or_else(|| {
                error::Error::UnsupportedFormat(format!(
                    "'{}' is neither a PPTX nor a PPT file",
                    ext.unwrap_or("")
                ))
            })
    }

    /// Fail for formats the conversion pipeline cannot read.
    pub fn ensure_supported(self) -> error::Result<()> {
        match self {
            Self::Pptx => Ok(()),
            Self::Ppt => Err(error::Error::UnsupportedFormat(
                "legacy binary .ppt is not supported; save it as .pptx first".to_string(),
            )),
        }
    }
}

/// A single slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,

    /// Top-level shapes in authoring order. Groups keep their children.
    pub shapes: Vec<Shape>,

    /// Speaker notes for this slide, if any.
    pub notes: Option<String>,
}

impl Slide {
    /// Create a new, empty slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            shapes: Vec::new(),
            notes: None,
        }
    }
}

/// The layout slot a placeholder shape occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceholderRole {
    Title,
    CenterTitle,
    Subtitle,
    VerticalTitle,
    Body,
    VerticalBody,
    Object,
    Picture,
    Table,
    Chart,
    Date,
    Footer,
    SlideNumber,
    Other(String),
}

impl PlaceholderRole {
    /// Parse the `type` attribute of a placeholder element. An absent type
    /// means an object placeholder.
    pub fn from_type_attr(value: Option<&str>) -> Self {
        match value {
            None => Self::Object,
            Some("title") => Self::Title,
            Some("ctrTitle") => Self::CenterTitle,
            Some("subTitle") => Self::Subtitle,
            Some("vertTitle") => Self::VerticalTitle,
            Some("body") => Self::Body,
            Some("vertBody") => Self::VerticalBody,
            Some("obj") => Self::Object,
            Some("pic") => Self::Picture,
            Some("tbl") => Self::Table,
            Some("chart") => Self::Chart,
            Some("dt") => Self::Date,
            Some("ftr") => Self::Footer,
            Some("sldNum") => Self::SlideNumber,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// Position and size of a shape, in EMUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub top: i64,
    pub left: i64,
    pub width: i64,
    pub height: i64,
}

/// A node in a slide's visual tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    /// Authoring name, used only in diagnostics.
    pub name: String,

    /// What the shape carries.
    pub kind: ShapeKind,

    /// Placeholder role, if the shape is a layout placeholder.
    pub placeholder: Option<PlaceholderRole>,

    /// Position on the slide. `None` when the source geometry is missing
    /// or malformed.
    pub geometry: Option<Geometry>,

    /// Text content, if the shape can hold text.
    pub text_frame: Option<TextFrame>,
}

impl Shape {
    /// Create a shape of the given kind with no placeholder, geometry or text.
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            placeholder: None,
            geometry: None,
            text_frame: None,
        }
    }

    /// A free-standing text shape.
    pub fn text(name: impl Into<String>, frame: TextFrame) -> Self {
        Self::new(name, ShapeKind::Text).with_text_frame(frame)
    }

    pub fn with_placeholder(mut self, role: PlaceholderRole) -> Self {
        self.placeholder = Some(role);
        self
    }

    pub fn with_geometry(mut self, top: i64, left: i64) -> Self {
        self.geometry = Some(Geometry {
            top,
            left,
            width: 0,
            height: 0,
        });
        self
    }

    pub fn with_text_frame(mut self, frame: TextFrame) -> Self {
        self.text_frame = Some(frame);
        self
    }

    /// Flattened text of the shape's text frame, or an empty string.
    pub fn text_content(&self) -> String {
        self.text_frame
            .as_ref()
            .map(TextFrame::text)
            .unwrap_or_default()
    }

    /// Short label for diagnostics.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            ShapeKind::Text => "text",
            ShapeKind::Picture(_) => "picture",
            ShapeKind::Table(_) => "table",
            ShapeKind::Group(_) => "group",
            ShapeKind::Other => "other",
        }
    }
}

/// The structural kind of a shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeKind {
    /// An auto shape or text box.
    Text,
    /// A picture with its embedded image.
    Picture(Image),
    /// A table as a row-major grid of cell text.
    Table(Table),
    /// A group owning its child shapes.
    Group(Vec<Shape>),
    /// Connectors, charts, media and anything else.
    Other,
}

/// Embedded image payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct Image {
    /// Raw image bytes. Not serialized; dumps only need the format.
    #[serde(skip)]
    pub blob: Vec<u8>,
    /// Lowercase file extension without the dot, e.g. `png`, `wmf`.
    pub ext: String,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("ext", &self.ext)
            .field("bytes", &self.blob.len())
            .finish()
    }
}

/// Table content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// A shape's text body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextFrame {
    pub paragraphs: Vec<Paragraph>,
}

impl TextFrame {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self { paragraphs }
    }

    /// Paragraph texts joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A paragraph: runs plus an indent level (0 = top level).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paragraph {
    pub level: usize,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(level: usize, runs: Vec<Run>) -> Self {
        Self { level, runs }
    }

    /// Plain text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A styled span of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
    pub hyperlink: Option<Hyperlink>,
}

impl Run {
    /// An unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Font color of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Color {
    /// An explicit RGB value.
    Rgb(Rgb),
    /// A symbolic reference into the document theme.
    Theme(ThemeColor),
}

/// A 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse a 6-digit hex value such as `FF0000`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Theme color slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeColor {
    Accent1,
    Accent2,
    Accent3,
    Accent4,
    Accent5,
    Accent6,
    Dark1,
    Dark2,
    Light1,
    Light2,
    Text1,
    Text2,
    Background1,
    Background2,
    Hyperlink,
    FollowedHyperlink,
    Other(String),
}

impl ThemeColor {
    /// Parse the `val` attribute of a scheme color element.
    pub fn from_scheme_value(value: &str) -> Self {
        match value {
            "accent1" => Self::Accent1,
            "accent2" => Self::Accent2,
            "accent3" => Self::Accent3,
            "accent4" => Self::Accent4,
            "accent5" => Self::Accent5,
            "accent6" => Self::Accent6,
            "dk1" => Self::Dark1,
            "dk2" => Self::Dark2,
            "lt1" => Self::Light1,
            "lt2" => Self::Light2,
            "tx1" => Self::Text1,
            "tx2" => Self::Text2,
            "bg1" => Self::Background1,
            "bg2" => Self::Background2,
            "hlink" => Self::Hyperlink,
            "folHlink" => Self::FollowedHyperlink,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_accent(&self) -> bool {
        matches!(
            self,
            Self::Accent1 | Self::Accent2 | Self::Accent3 | Self::Accent4 | Self::Accent5 | Self::Accent6
        )
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark1 | Self::Dark2)
    }
}

/// A hyperlink attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// Relationship id the link was declared with.
    pub rel_id: String,
    /// Target address, if the relationship could be resolved.
    pub target: Option<String>,
}

/// A hyperlink whose target could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("hyperlink relationship '{rel_id}' has no target")]
pub struct HyperlinkError {
    pub rel_id: String,
}

impl Hyperlink {
    /// A link with a known target.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            rel_id: String::new(),
            target: Some(target.into()),
        }
    }

    /// Resolve the link target.
    pub fn resolve(&self) -> Result<&str, HyperlinkError> {
        self.target.as_deref().ok_or_else(|| HyperlinkError {
            rel_id: self.rel_id.clone(),
        })
    }
}
