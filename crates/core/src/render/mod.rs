//! Output backends.
//!
//! The engine never writes markup itself. It drives a [`Renderer`], which
//! turns semantic events into text and supplies the inline formatters the
//! run formatter composes.

pub mod markdown;
pub mod wiki;

#[cfg(test)]
pub(crate) mod recording;

pub use markdown::{MarkdownRenderer, MarkdownStyle, TableStyle};
pub use wiki::WikiRenderer;

use crate::error::Result;
use crate::types::Rgb;

/// A sink for semantic document events.
///
/// `emit_*` methods write block-level output. `format_*` and `escape` are
/// pure transformations of inline text. Write failures are fatal.
pub trait Renderer {
    /// A heading at `level` (1 = top).
    fn emit_heading(&mut self, text: &str, level: usize) -> Result<()>;

    fn emit_paragraph(&mut self, text: &str) -> Result<()>;

    /// A list item nested `level` deep (0 = top).
    fn emit_list_item(&mut self, text: &str, level: usize) -> Result<()>;

    /// An image reference, optionally constrained to `max_width`.
    fn emit_image(&mut self, path: &str, max_width: Option<u32>) -> Result<()>;

    /// A table; the first row is the header. Never called with no rows.
    fn emit_table(&mut self, rows: &[Vec<String>]) -> Result<()>;

    /// Text written as-is.
    fn emit_raw(&mut self, text: &str) -> Result<()>;

    /// Neutralize characters that would be read as markup.
    fn escape(&self, text: &str) -> String;

    fn format_emphasis(&self, text: &str) -> String;

    fn format_strong(&self, text: &str) -> String;

    fn format_hyperlink(&self, text: &str, target: &str) -> String;

    fn format_color(&self, text: &str, rgb: Rgb) -> String;

    /// Flush and close the output.
    fn finalize(&mut self) -> Result<()>;
}

/// The renderers available by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    #[default]
    Markdown,
    HeySam,
    Wiki,
}

impl RendererKind {
    /// Conventional file extension of the output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown | Self::HeySam => "md",
            Self::Wiki => "tid",
        }
    }

    /// Build a renderer of this kind writing to `out`.
    pub fn build<'a, W: std::io::Write + 'a>(&self, out: W) -> Box<dyn Renderer + 'a> {
        match self {
            Self::Markdown => Box::new(MarkdownRenderer::new(out)),
            Self::HeySam => Box::new(MarkdownRenderer::heysam(out)),
            Self::Wiki => Box::new(WikiRenderer::new(out)),
        }
    }
}
