//! Conversion options.

use crate::error::{Error, Result};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Default flattened-text length above which an untagged text shape counts as body text.
pub const DEFAULT_TEXT_BLOCK_THRESHOLD: usize = 10;

/// Default share of non-link characters speaker notes must keep to be emitted.
pub const DEFAULT_MIN_NOTES_PROSE_RATIO: f64 = 0.1;

/// Which slides to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSelection {
    #[default]
    All,
    /// A single slide, 1-based.
    Single(NonZeroUsize),
}

impl PageSelection {
    /// Whether the slide at the 0-based `index` is selected.
    pub fn includes(&self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Single(page) => page.get() == index + 1,
        }
    }
}

/// Configured title text to heading level mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTitles {
    titles: Vec<(String, usize)>,
    max_level: usize,
}

impl CustomTitles {
    /// Build from `(title, level)` pairs. Order is kept; earlier entries win ties.
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut entries: Vec<(String, usize)> = Vec::new();
        for (text, level) in titles {
            let text = text.into();
            match entries.iter_mut().find(|(t, _)| *t == text) {
                Some(entry) => entry.1 = level,
                None => entries.push((text, level)),
            }
        }
        let max_level = entries.iter().map(|(_, l)| *l).max().unwrap_or(0);
        Self {
            titles: entries,
            max_level,
        }
    }

    /// Parse a titles file: one title per line, nesting given by leading spaces.
    ///
    /// Unindented lines are level 1. The first indentation width seen becomes
    /// the unit, and a line indented by `n` units is level `n + 1`.
    pub fn parse(content: &str) -> Self {
        let mut unit: Option<usize> = None;
        let mut entries = Vec::new();

        for line in content.lines() {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let indent = line.chars().take_while(|c| *c == ' ').count();
            let level = if indent == 0 {
                1
            } else {
                let unit = *unit.get_or_insert(indent);
                indent / unit + 1
            };
            entries.push((text.to_string(), level));
        }

        Self::new(entries)
    }

    /// Read and parse a titles file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Highest configured level.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Configured titles in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.titles.iter().map(|(t, l)| (t.as_str(), *l))
    }
}

/// Options controlling a conversion run. Validated once with [`ConversionConfig::validate`].
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub disable_image: bool,
    pub disable_notes: bool,
    pub disable_color: bool,
    pub disable_escaping: bool,
    pub disable_title_newline_removal: bool,
    pub text_block_threshold: usize,
    pub max_image_width: Option<u32>,
    pub page: PageSelection,
    pub min_notes_prose_ratio: f64,
    pub custom_titles: Option<CustomTitles>,
    /// Path of the document being written. Image links are made relative to it.
    pub output_path: PathBuf,
    /// Directory pictures are extracted into.
    pub image_dir: PathBuf,
    /// File-name prefix for extracted pictures.
    pub image_prefix: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            disable_image: false,
            disable_notes: false,
            disable_color: false,
            disable_escaping: false,
            disable_title_newline_removal: false,
            text_block_threshold: DEFAULT_TEXT_BLOCK_THRESHOLD,
            max_image_width: None,
            page: PageSelection::All,
            min_notes_prose_ratio: DEFAULT_MIN_NOTES_PROSE_RATIO,
            custom_titles: None,
            output_path: PathBuf::from("out.md"),
            image_dir: PathBuf::from("img"),
            image_prefix: String::new(),
        }
    }
}

impl ConversionConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    pub fn with_images(mut self, enabled: bool) -> Self {
        self.disable_image = !enabled;
        self
    }

    pub fn with_notes(mut self, enabled: bool) -> Self {
        self.disable_notes = !enabled;
        self
    }

    pub fn with_color(mut self, enabled: bool) -> Self {
        self.disable_color = !enabled;
        self
    }

    pub fn with_escaping(mut self, enabled: bool) -> Self {
        self.disable_escaping = !enabled;
        self
    }

    pub fn with_title_newline_removal(mut self, enabled: bool) -> Self {
        self.disable_title_newline_removal = !enabled;
        self
    }

    pub fn with_text_block_threshold(mut self, threshold: usize) -> Self {
        self.text_block_threshold = threshold;
        self
    }

    pub fn with_max_image_width(mut self, width: Option<u32>) -> Self {
        self.max_image_width = width;
        self
    }

    pub fn with_page(mut self, page: PageSelection) -> Self {
        self.page = page;
        self
    }

    pub fn with_min_notes_prose_ratio(mut self, ratio: f64) -> Self {
        self.min_notes_prose_ratio = ratio;
        self
    }

    pub fn with_custom_titles(mut self, titles: CustomTitles) -> Self {
        self.custom_titles = Some(titles);
        self
    }

    /// Check option ranges before a run.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_notes_prose_ratio) {
            return Err(Error::InvalidConfig(format!(
                "notes prose ratio must be between 0 and 1, got {}",
                self.min_notes_prose_ratio
            )));
        }
        if self.max_image_width == Some(0) {
            return Err(Error::InvalidConfig(
                "max image width must be greater than 0".to_string(),
            ));
        }
        if let Some(ref titles) = self.custom_titles {
            if titles.is_empty() {
                return Err(Error::InvalidConfig("custom title file has no titles".to_string()));
            }
        }
        Ok(())
    }
}
