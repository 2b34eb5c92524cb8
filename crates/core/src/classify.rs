//! Structural role of a shape in the output.
//!
//! All predicates are pure and look only at the shape itself.

use crate::types::{PlaceholderRole, Shape, ShapeKind};

/// The primary category of a shape. Every shape has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeCategory {
    Title,
    TextBlock,
    Picture,
    Table,
    Ignored,
}

/// Classify a shape, checking title, text block, picture and table in that order.
pub fn classify(shape: &Shape, text_block_threshold: usize) -> ShapeCategory {
    if is_title(shape) {
        ShapeCategory::Title
    } else if is_text_block(shape, text_block_threshold) {
        ShapeCategory::TextBlock
    } else if matches!(shape.kind, ShapeKind::Picture(_)) {
        ShapeCategory::Picture
    } else if is_table(shape) {
        ShapeCategory::Table
    } else {
        ShapeCategory::Ignored
    }
}

/// A title, subtitle, vertical title or centered title placeholder.
pub fn is_title(shape: &Shape) -> bool {
    matches!(
        shape.placeholder,
        Some(
            PlaceholderRole::Title
                | PlaceholderRole::Subtitle
                | PlaceholderRole::VerticalTitle
                | PlaceholderRole::CenterTitle
        )
    )
}

/// A shape with a text frame that is either a body placeholder or holds more
/// than `threshold` characters of text.
pub fn is_text_block(shape: &Shape, threshold: usize) -> bool {
    if shape.text_frame.is_none() {
        return false;
    }
    if shape.placeholder == Some(PlaceholderRole::Body) {
        return true;
    }
    shape.text_content().chars().count() > threshold
}

/// A text frame with visible hierarchy: some paragraph is indented, or
/// paragraphs sit at more than one level.
///
/// The decision covers the whole shape, not individual paragraphs.
pub fn is_list_block(shape: &Shape) -> bool {
    let Some(ref frame) = shape.text_frame else {
        return false;
    };
    let mut levels: Vec<usize> = Vec::new();
    for para in &frame.paragraphs {
        if !levels.contains(&para.level) {
            levels.push(para.level);
        }
        if para.level != 0 || levels.len() > 1 {
            return true;
        }
    }
    false
}

pub fn is_table(shape: &Shape) -> bool {
    matches!(shape.kind, ShapeKind::Table(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Image, Paragraph, Run, Table, TextFrame};

    fn frame(paras: &[(usize, &str)]) -> TextFrame {
        TextFrame::new(
            paras
                .iter()
                .map(|(level, text)| Paragraph::new(*level, vec![Run::plain(*text)]))
                .collect(),
        )
    }

    #[test]
    fn test_title_roles() {
        for role in [
            PlaceholderRole::Title,
            PlaceholderRole::Subtitle,
            PlaceholderRole::VerticalTitle,
            PlaceholderRole::CenterTitle,
        ] {
            let shape = Shape::text("t", frame(&[(0, "Hi")])).with_placeholder(role);
            assert_eq!(classify(&shape, 10), ShapeCategory::Title);
        }
        let body = Shape::text("b", frame(&[(0, "Hi")])).with_placeholder(PlaceholderRole::Body);
        assert!(!is_title(&body));
    }

    #[test]
    fn test_text_block_by_body_role_or_length() {
        let body = Shape::text("b", frame(&[(0, "x")])).with_placeholder(PlaceholderRole::Body);
        assert_eq!(classify(&body, 10), ShapeCategory::TextBlock);

        let short = Shape::text("s", frame(&[(0, "short")]));
        assert_eq!(classify(&short, 10), ShapeCategory::Ignored);

        let long = Shape::text("l", frame(&[(0, "a much longer sentence")]));
        assert_eq!(classify(&long, 10), ShapeCategory::TextBlock);

        // Exactly at the threshold is not enough.
        let edge = Shape::text("e", frame(&[(0, "0123456789")]));
        assert_eq!(classify(&edge, 10), ShapeCategory::Ignored);
    }

    #[test]
    fn test_title_wins_over_text_block() {
        let shape = Shape::text("t", frame(&[(0, "a title that is rather long")]))
            .with_placeholder(PlaceholderRole::Title);
        assert_eq!(classify(&shape, 1), ShapeCategory::Title);
    }

    #[test]
    fn test_picture_and_table() {
        let pic = Shape::new(
            "p",
            ShapeKind::Picture(Image {
                blob: vec![1, 2, 3],
                ext: "png".to_string(),
            }),
        );
        assert_eq!(classify(&pic, 10), ShapeCategory::Picture);

        let table = Shape::new("t", ShapeKind::Table(Table::default()));
        assert_eq!(classify(&table, 10), ShapeCategory::Table);

        let other = Shape::new("o", ShapeKind::Other);
        assert_eq!(classify(&other, 10), ShapeCategory::Ignored);
    }

    #[test]
    fn test_list_block_detection() {
        let flat = Shape::text("f", frame(&[(0, "a"), (0, "b")]));
        assert!(!is_list_block(&flat));

        let nested = Shape::text("n", frame(&[(0, "a"), (1, "b")]));
        assert!(is_list_block(&nested));

        let indented = Shape::text("i", frame(&[(2, "only")]));
        assert!(is_list_block(&indented));

        let empty = Shape::text("e", TextFrame::default());
        assert!(!is_list_block(&empty));
    }
}
