//! A renderer that records events, for engine tests.

use super::Renderer;
use crate::error::Result;
use crate::types::Rgb;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Heading(String, usize),
    Paragraph(String),
    ListItem(String, usize),
    Image(String, Option<u32>),
    Table(Vec<Vec<String>>),
    Raw(String),
    Finalized,
}

/// Records block events; inline formatters use bracketed tags so nesting is visible.
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub events: Vec<Event>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headings(&self) -> Vec<(String, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Heading(text, level) => Some((text.clone(), *level)),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn emit_heading(&mut self, text: &str, level: usize) -> Result<()> {
        self.events.push(Event::Heading(text.to_string(), level));
        Ok(())
    }

    fn emit_paragraph(&mut self, text: &str) -> Result<()> {
        self.events.push(Event::Paragraph(text.to_string()));
        Ok(())
    }

    fn emit_list_item(&mut self, text: &str, level: usize) -> Result<()> {
        self.events.push(Event::ListItem(text.to_string(), level));
        Ok(())
    }

    fn emit_image(&mut self, path: &str, max_width: Option<u32>) -> Result<()> {
        self.events.push(Event::Image(path.to_string(), max_width));
        Ok(())
    }

    fn emit_table(&mut self, rows: &[Vec<String>]) -> Result<()> {
        self.events.push(Event::Table(rows.to_vec()));
        Ok(())
    }

    fn emit_raw(&mut self, text: &str) -> Result<()> {
        self.events.push(Event::Raw(text.to_string()));
        Ok(())
    }

    fn escape(&self, text: &str) -> String {
        text.replace('*', "\\*")
    }

    fn format_emphasis(&self, text: &str) -> String {
        format!("<em>{}</em>", text)
    }

    fn format_strong(&self, text: &str) -> String {
        format!("<strong>{}</strong>", text)
    }

    fn format_hyperlink(&self, text: &str, target: &str) -> String {
        format!("<a {}>{}</a>", target, text)
    }

    fn format_color(&self, text: &str, rgb: Rgb) -> String {
        format!("<color {}>{}</color>", rgb, text)
    }

    fn finalize(&mut self) -> Result<()> {
        self.events.push(Event::Finalized);
        Ok(())
    }
}
