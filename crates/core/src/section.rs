//! Section header detection and title heading levels.

use crate::classify::{is_table, is_text_block, is_title};
use crate::config::CustomTitles;
use crate::fuzzy;
use crate::types::Shape;

/// Minimum similarity for a title to be replaced by a configured one.
pub const TITLE_MATCH_CUTOFF: f64 = 92.0;

/// Whether a slide is a section header: exactly one title or text block, no
/// table, any number of pictures. The first slide never is.
pub fn is_section_header(slide_index: usize, shapes: &[&Shape], text_block_threshold: usize) -> bool {
    if slide_index == 0 {
        return false;
    }

    let titles = shapes.iter().filter(|s| is_title(s)).count();
    let text_blocks = shapes
        .iter()
        .filter(|s| !is_title(s) && is_text_block(s, text_block_threshold))
        .count();

    titles + text_blocks == 1 && !shapes.iter().any(|s| is_table(s))
}

/// Heading level of a title from traversal state.
///
/// `seen_section_header` must already include the current slide.
pub fn heading_level(slide_is_section_header: bool, seen_section_header: bool) -> usize {
    if slide_is_section_header {
        2
    } else if seen_section_header {
        3
    } else {
        1
    }
}

/// A heading after applying configured titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub text: String,
    pub level: usize,
    /// Set when the configured title replaced the slide text.
    pub substituted: bool,
}

/// Match `text` against configured titles.
///
/// A hit takes the configured text and level. A miss is placed one level
/// below the deepest configured title, whatever the slide position says.
pub fn resolve_custom_title(text: &str, titles: &CustomTitles) -> ResolvedTitle {
    match fuzzy::best_match(text, titles.iter().map(|(t, _)| t), TITLE_MATCH_CUTOFF) {
        Some((matched, _)) => {
            let level = titles
                .iter()
                .find(|(t, _)| *t == matched)
                .map(|(_, l)| l)
                .unwrap_or(titles.max_level());
            ResolvedTitle {
                text: matched.to_string(),
                level,
                substituted: true,
            }
        }
        None => ResolvedTitle {
            text: text.to_string(),
            level: titles.max_level() + 1,
            substituted: false,
        },
    }
}
