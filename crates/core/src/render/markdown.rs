//! Markdown output.
//!
//! One renderer type covers both Markdown dialects. The differences are a
//! capability set ([`MarkdownStyle`]) fixed at construction.

use super::Renderer;
use crate::error::{Error, Result};
use crate::types::Rgb;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

/// Characters Markdown would treat as markup.
static SPECIAL_CHARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\\*`!_{}\[\]()#+\-.])").unwrap());

/// Anything that looks like an HTML tag.
static HTML_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(<[^>]+>)").unwrap());

/// Bytes left untouched when encoding image paths.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// How tables are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStyle {
    /// Centered separator row always present; cell line breaks become `<br />`.
    #[default]
    Aligned,
    /// Separator row only when there are body rows; cell line breaks become spaces.
    Flat,
}

/// Capabilities that distinguish Markdown dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownStyle {
    pub table: TableStyle,
    /// Whether strong text is marked up at all.
    pub strong: bool,
}

impl Default for MarkdownStyle {
    fn default() -> Self {
        Self {
            table: TableStyle::Aligned,
            strong: true,
        }
    }
}

impl MarkdownStyle {
    /// The dialect used by HeySam: flat tables, no strong markup.
    pub fn heysam() -> Self {
        Self {
            table: TableStyle::Flat,
            strong: false,
        }
    }
}

/// Writes Markdown to any [`Write`].
pub struct MarkdownRenderer<W: Write> {
    out: W,
    style: MarkdownStyle,
}

impl<W: Write> MarkdownRenderer<W> {
    /// Standard Markdown.
    pub fn new(out: W) -> Self {
        Self::with_style(out, MarkdownStyle::default())
    }

    /// HeySam-flavored Markdown.
    pub fn heysam(out: W) -> Self {
        Self::with_style(out, MarkdownStyle::heysam())
    }

    pub fn with_style(out: W, style: MarkdownStyle) -> Self {
        Self { out, style }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).map_err(Error::OutputError)
    }

    fn write_aligned_table(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let separator = vec![":-:".to_string(); rows[0].len()];

        let mut table = format!("{}\n{}\n", aligned_row(&rows[0]), aligned_row(&separator));
        // The body always ends in a blank line, even when it has no rows.
        let body: Vec<String> = rows[1..].iter().map(|r| aligned_row(r)).collect();
        table.push_str(&body.join("\n"));
        table.push_str("\n\n");
        self.write(&table)
    }

    fn write_flat_table(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let mut table = flat_row(&rows[0]);
        table.push('\n');
        if rows.len() > 1 {
            let separator = vec!["---".to_string(); rows[0].len()];
            table.push_str(&flat_row(&separator));
            table.push('\n');
            let body: Vec<String> = rows[1..].iter().map(|r| flat_row(r)).collect();
            table.push_str(&body.join("\n"));
            table.push_str("\n\n");
        }
        self.write(&table)
    }
}

/// A table row with line breaks kept as `<br />`.
fn aligned_row(row: &[String]) -> String {
    let cells: Vec<String> = row.iter().map(|c| c.replace('\n', "<br />")).collect();
    format!("| {} |", cells.join(" | "))
}

/// A table row with line breaks flattened to spaces.
fn flat_row(row: &[String]) -> String {
    let cells: Vec<String> = row.iter().map(|c| c.replace('\n', " ")).collect();
    format!("| {} |", cells.join(" | "))
}

impl<W: Write> Renderer for MarkdownRenderer<W> {
    fn emit_heading(&mut self, text: &str, level: usize) -> Result<()> {
        self.write(&format!("{} {}\n\n", "#".repeat(level), text))
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.write(&format!("{}\n\n", text))
    }

    fn emit_list_item(&mut self, text: &str, level: usize) -> Result<()> {
        self.write(&format!("{}* {}\n", "  ".repeat(level), text.trim()))
    }

    fn emit_image(&mut self, path: &str, max_width: Option<u32>) -> Result<()> {
        let line = match max_width {
            None => format!("![]({})\n\n", utf8_percent_encode(path, PATH_SAFE)),
            Some(width) => format!("<img src=\"{}\" style=\"max-width:{}px;\" />\n\n", path, width),
        };
        self.write(&line)
    }

    fn emit_table(&mut self, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        match self.style.table {
            TableStyle::Aligned => self.write_aligned_table(rows),
            TableStyle::Flat => self.write_flat_table(rows),
        }
    }

    fn emit_raw(&mut self, text: &str) -> Result<()> {
        self.write(text)
    }

    fn escape(&self, text: &str) -> String {
        let text = SPECIAL_CHARS_REGEX.replace_all(text, r"\$1");
        HTML_TAG_REGEX.replace_all(&text, r"\$1").into_owned()
    }

    fn format_emphasis(&self, text: &str) -> String {
        format!(" _{}_ ", text)
    }

    fn format_strong(&self, text: &str) -> String {
        if self.style.strong {
            format!(" __{}__ ", text)
        } else {
            text.to_string()
        }
    }

    fn format_hyperlink(&self, text: &str, target: &str) -> String {
        format!("[{}]({})", text, target)
    }

    fn format_color(&self, text: &str, rgb: Rgb) -> String {
        format!(" <span style=\"color:#{}\">{}</span> ", rgb, text)
    }

    fn finalize(&mut self) -> Result<()> {
        self.out.flush().map_err(Error::OutputError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(style: MarkdownStyle, f: impl FnOnce(&mut MarkdownRenderer<Vec<u8>>)) -> String {
        let mut renderer = MarkdownRenderer::with_style(Vec::new(), style);
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_heading_paragraph_and_list() {
        let out = render(MarkdownStyle::default(), |r| {
            r.emit_heading("Title", 2).unwrap();
            r.emit_paragraph("Body text").unwrap();
            r.emit_list_item(" item ", 0).unwrap();
            r.emit_list_item("nested", 2).unwrap();
        });
        assert_eq!(out, "## Title\n\nBody text\n\n* item\n    * nested\n");
    }

    #[test]
    fn test_escape_specials_and_tags() {
        let r = MarkdownRenderer::new(Vec::new());
        assert_eq!(r.escape("a*b_c"), r"a\*b\_c");
        assert_eq!(r.escape("1. done!"), r"1\. done\!");
        assert_eq!(r.escape("x <b> y"), r"x \<b> y");
        assert_eq!(r.escape("plain words"), "plain words");
    }

    #[test]
    fn test_inline_formatters() {
        let r = MarkdownRenderer::new(Vec::new());
        assert_eq!(r.format_emphasis("x"), " _x_ ");
        assert_eq!(r.format_strong("x"), " __x__ ");
        assert_eq!(r.format_hyperlink("x", "https://e.example"), "[x](https://e.example)");
        assert_eq!(
            r.format_color("x", Rgb(255, 0, 0)),
            " <span style=\"color:#FF0000\">x</span> "
        );
    }

    #[test]
    fn test_heysam_strong_is_passthrough() {
        let r = MarkdownRenderer::heysam(Vec::new());
        assert_eq!(r.format_strong("x"), "x");
        assert_eq!(r.format_emphasis("x"), " _x_ ");
    }

    #[test]
    fn test_image_encoding_and_width() {
        let out = render(MarkdownStyle::default(), |r| {
            r.emit_image("img/my deck0.png", None).unwrap();
            r.emit_image("img/a.png", Some(600)).unwrap();
        });
        assert_eq!(
            out,
            "![](img/my%20deck0.png)\n\n<img src=\"img/a.png\" style=\"max-width:600px;\" />\n\n"
        );
    }

    #[test]
    fn test_aligned_table() {
        let out = render(MarkdownStyle::default(), |r| {
            r.emit_table(&rows(&[&["h1", "h2"], &["a\nb", "c"]])).unwrap();
        });
        assert_eq!(out, "| h1 | h2 |\n| :-: | :-: |\n| a<br />b | c |\n\n");
    }

    #[test]
    fn test_aligned_table_single_row_keeps_separator_and_blank_lines() {
        let out = render(MarkdownStyle::default(), |r| {
            r.emit_table(&rows(&[&["only", "header"]])).unwrap();
        });
        assert_eq!(out, "| only | header |\n| :-: | :-: |\n\n\n");
    }

    #[test]
    fn test_flat_table_single_row_has_no_separator() {
        let out = render(MarkdownStyle::heysam(), |r| {
            r.emit_table(&rows(&[&["only", "header"]])).unwrap();
        });
        assert_eq!(out, "| only | header |\n");
    }

    #[test]
    fn test_flat_table_flattens_newlines() {
        let out = render(MarkdownStyle::heysam(), |r| {
            r.emit_table(&rows(&[&["h1", "h2", "h3"], &["a\nb", "c", "d"], &["e", "f", "g"]]))
                .unwrap();
        });
        assert_eq!(
            out,
            "| h1 | h2 | h3 |\n| --- | --- | --- |\n| a b | c | d |\n| e | f | g |\n\n"
        );
    }
}
