//! Core document model and the semantic normalization engine that turns a
//! slide deck into linear markup.

pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod fuzzy;
pub mod inline;
pub mod layout;
pub mod notes;
pub mod picture;
pub mod render;
pub mod section;
pub mod slide;
pub mod types;
pub mod wmf;

pub use config::{ConversionConfig, CustomTitles, PageSelection};
pub use convert::{convert, convert_with, ConversionSummary};
pub use error::{Error, Result};
pub use picture::{ImageConverter, PngConverter};
pub use render::{MarkdownRenderer, Renderer, RendererKind, WikiRenderer};
pub use slide::{ConversionContext, Notice, SlideProcessor};
pub use types::{
    Color, Geometry, Hyperlink, Image, Paragraph, PlaceholderRole, Presentation,
    PresentationFormat, Rgb, Run, Shape, ShapeKind, Slide, Table, TextFrame, ThemeColor,
};
