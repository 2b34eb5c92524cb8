//! TiddlyWiki output.

use super::Renderer;
use crate::error::{Error, Result};
use crate::types::Rgb;
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

static HTML_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(<[^>]+>)").unwrap());

/// Writes TiddlyWiki markup to any [`Write`].
pub struct WikiRenderer<W: Write> {
    out: W,
}

impl<W: Write> WikiRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).map_err(Error::OutputError)
    }
}

fn wiki_row(row: &[String], header: bool) -> String {
    let cells: Vec<String> = row.iter().map(|c| c.replace('\n', " ")).collect();
    format!("|{}|{}\n", cells.join("|"), if header { "h" } else { "" })
}

impl<W: Write> Renderer for WikiRenderer<W> {
    fn emit_heading(&mut self, text: &str, level: usize) -> Result<()> {
        self.write(&format!("{} {}\n\n", "!".repeat(level), text))
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.write(&format!("{}\n\n", text))
    }

    fn emit_list_item(&mut self, text: &str, level: usize) -> Result<()> {
        self.write(&format!("{} {}\n", "*".repeat(level + 1), text.trim()))
    }

    fn emit_image(&mut self, path: &str, max_width: Option<u32>) -> Result<()> {
        let line = match max_width {
            None => format!("[img[{}]]\n\n", path),
            Some(width) => format!("[img width={}px [{}]]\n\n", width, path),
        };
        self.write(&line)
    }

    fn emit_table(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let Some((header, body)) = rows.split_first() else {
            return Ok(());
        };
        let mut table = wiki_row(header, true);
        for row in body {
            table.push_str(&wiki_row(row, false));
        }
        table.push('\n');
        self.write(&table)
    }

    fn emit_raw(&mut self, text: &str) -> Result<()> {
        self.write(text)
    }

    fn escape(&self, text: &str) -> String {
        HTML_TAG_REGEX.replace_all(text, "\"\"\"$1\"\"\"").into_owned()
    }

    fn format_emphasis(&self, text: &str) -> String {
        format!(" __{}__ ", text)
    }

    fn format_strong(&self, text: &str) -> String {
        format!(" ''{}'' ", text)
    }

    fn format_hyperlink(&self, text: &str, target: &str) -> String {
        format!("[[{}|{}]]", text, target)
    }

    fn format_color(&self, text: &str, rgb: Rgb) -> String {
        format!(" @@color:#{}; {} @@ ", rgb, text)
    }

    fn finalize(&mut self) -> Result<()> {
        self.out.flush().map_err(Error::OutputError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks() {
        let mut r = WikiRenderer::new(Vec::new());
        r.emit_heading("Title", 3).unwrap();
        r.emit_list_item("top", 0).unwrap();
        r.emit_list_item("nested", 1).unwrap();
        r.emit_image("img/a.png", Some(300)).unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();
        assert_eq!(out, "!!! Title\n\n* top\n** nested\n[img width=300px [img/a.png]]\n\n");
    }

    #[test]
    fn test_table_marks_header() {
        let mut r = WikiRenderer::new(Vec::new());
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c\nd".to_string(), "e".to_string()],
        ];
        r.emit_table(&rows).unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();
        assert_eq!(out, "|a|b|h\n|c d|e|\n\n");
    }

    #[test]
    fn test_inline() {
        let r = WikiRenderer::new(Vec::new());
        assert_eq!(r.escape("a <br> b"), "a \"\"\"<br>\"\"\" b");
        assert_eq!(r.format_strong("x"), " ''x'' ");
        assert_eq!(r.format_hyperlink("x", "u"), "[[x|u]]");
        assert_eq!(r.format_color("x", Rgb(0, 0x80, 0xFF)), " @@color:#0080FF; x @@ ");
    }
}
