//! Inline markup for paragraphs.
//!
//! Each run is transformed in a fixed order: escape, hyperlink, emphasis,
//! color. Later wrappers always enclose earlier ones.

use crate::config::ConversionConfig;
use crate::render::Renderer;
use crate::types::{Color, Paragraph, Run};

/// Link target substituted when a run's hyperlink cannot be resolved.
pub const BROKEN_LINK_TARGET: &str = "error:link-parsing-issue";

/// Italic, underlined, or colored with an accent theme slot.
pub fn is_accent(run: &Run) -> bool {
    run.underline
        || run.italic
        || matches!(run.color, Some(Color::Theme(ref theme)) if theme.is_accent())
}

/// Bold, or colored with a dark theme slot.
pub fn is_strong(run: &Run) -> bool {
    run.bold || matches!(run.color, Some(Color::Theme(ref theme)) if theme.is_dark())
}

/// Produces inline markup through a renderer's formatters.
pub struct RunFormatter<'a> {
    renderer: &'a dyn Renderer,
    escape: bool,
    color: bool,
}

impl<'a> RunFormatter<'a> {
    pub fn new(renderer: &'a dyn Renderer, config: &ConversionConfig) -> Self {
        Self {
            renderer,
            escape: !config.disable_escaping,
            color: !config.disable_color,
        }
    }

    /// Markup for one run, or `None` if it contributes nothing.
    pub fn format_run(&self, run: &Run) -> Option<String> {
        if run.text.is_empty() {
            return None;
        }
        let mut text = if self.escape {
            self.renderer.escape(&run.text)
        } else {
            run.text.clone()
        };
        if text.is_empty() {
            return None;
        }

        if let Some(ref link) = run.hyperlink {
            let target = match link.resolve() {
                Ok(target) => target,
                Err(e) => {
                    log::debug!("{}; using placeholder target", e);
                    BROKEN_LINK_TARGET
                }
            };
            text = self.renderer.format_hyperlink(&text, target);
        }

        if is_accent(run) {
            text = self.renderer.format_emphasis(&text);
        } else if is_strong(run) {
            text = self.renderer.format_strong(&text);
        }

        if self.color {
            if let Some(Color::Rgb(rgb)) = run.color {
                text = self.renderer.format_color(&text, rgb);
            }
        }

        Some(text)
    }

    /// Markup for a whole paragraph, trimmed.
    pub fn format_paragraph(&self, paragraph: &Paragraph) -> String {
        let text: String = paragraph
            .runs
            .iter()
            .filter_map(|run| self.format_run(run))
            .collect();
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingRenderer;
    use crate::render::MarkdownRenderer;
    use crate::types::{Hyperlink, Rgb, ThemeColor};

    fn format(run: Run) -> String {
        let renderer = RecordingRenderer::new();
        let config = ConversionConfig::default();
        RunFormatter::new(&renderer, &config)
            .format_run(&run)
            .unwrap_or_default()
    }

    #[test]
    fn test_plain_run_is_only_escaped() {
        assert_eq!(format(Run::plain("a*b")), "a\\*b");
        assert_eq!(format(Run::plain("")), "");
    }

    #[test]
    fn test_accent_beats_strong() {
        let run = Run {
            text: "x".into(),
            bold: true,
            italic: true,
            ..Default::default()
        };
        assert_eq!(format(run), "<em>x</em>");
    }

    #[test]
    fn test_theme_colors_select_emphasis() {
        let accent = Run {
            text: "x".into(),
            color: Some(Color::Theme(ThemeColor::Accent4)),
            ..Default::default()
        };
        assert_eq!(format(accent), "<em>x</em>");

        let dark = Run {
            text: "x".into(),
            color: Some(Color::Theme(ThemeColor::Dark2)),
            ..Default::default()
        };
        assert_eq!(format(dark), "<strong>x</strong>");

        let light = Run {
            text: "x".into(),
            color: Some(Color::Theme(ThemeColor::Light1)),
            ..Default::default()
        };
        assert_eq!(format(light), "x");
    }

    #[test]
    fn test_color_wraps_outside_strong() {
        let run = Run {
            text: "x".into(),
            bold: true,
            color: Some(Color::Rgb(Rgb(0x12, 0x34, 0x56))),
            ..Default::default()
        };
        assert_eq!(format(run), "<color 123456><strong>x</strong></color>");
    }

    #[test]
    fn test_full_wrapping_order() {
        let run = Run {
            text: "a*".into(),
            underline: true,
            color: Some(Color::Rgb(Rgb(1, 2, 3))),
            hyperlink: Some(Hyperlink::to("https://e.example")),
            ..Default::default()
        };
        assert_eq!(
            format(run),
            "<color 010203><em><a https://e.example>a\\*</a></em></color>"
        );
    }

    #[test]
    fn test_broken_link_uses_placeholder() {
        let run = Run {
            text: "x".into(),
            hyperlink: Some(Hyperlink {
                rel_id: "rId7".into(),
                target: None,
            }),
            ..Default::default()
        };
        assert_eq!(format(run), "<a error:link-parsing-issue>x</a>");
    }

    #[test]
    fn test_color_and_escaping_can_be_disabled() {
        let renderer = RecordingRenderer::new();
        let config = ConversionConfig::default().with_color(false).with_escaping(false);
        let formatter = RunFormatter::new(&renderer, &config);
        let run = Run {
            text: "a*".into(),
            color: Some(Color::Rgb(Rgb(1, 2, 3))),
            ..Default::default()
        };
        assert_eq!(formatter.format_run(&run).as_deref(), Some("a*"));
    }

    #[test]
    fn test_paragraph_concatenates_and_trims() {
        let renderer = MarkdownRenderer::new(Vec::new());
        let config = ConversionConfig::default();
        let formatter = RunFormatter::new(&renderer, &config);
        let para = Paragraph::new(
            0,
            vec![
                Run {
                    text: "Bold".into(),
                    bold: true,
                    ..Default::default()
                },
                Run::plain(""),
                Run::plain(" tail"),
            ],
        );
        assert_eq!(formatter.format_paragraph(&para), "__Bold__  tail");
    }
}
