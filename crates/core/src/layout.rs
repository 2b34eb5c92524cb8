//! Reading order of shapes on a slide.

use crate::types::{Shape, ShapeKind};
use std::fmt;

/// Shapes whose position is unknown, so the slide could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnorderedShapes {
    /// `(kind, name)` of each shape without geometry.
    pub missing: Vec<(&'static str, String)>,
}

impl fmt::Display for UnorderedShapes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shape(s) without position:", self.missing.len())?;
        for (kind, name) in &self.missing {
            write!(f, " {} '{}';", kind, name)?;
        }
        Ok(())
    }
}

/// Expand groups depth-first, keeping child order. Group shapes themselves
/// are not part of the result.
pub fn ungroup_shapes(shapes: &[Shape]) -> Vec<&Shape> {
    let mut result = Vec::with_capacity(shapes.len());
    for shape in shapes {
        match shape.kind {
            ShapeKind::Group(ref children) => result.extend(ungroup_shapes(children)),
            _ => result.push(shape),
        }
    }
    result
}

/// Sort by position (top-to-bottom, then left-to-right).
///
/// If any shape has no geometry the slice is left untouched.
pub fn sort_by_position(shapes: &mut [&Shape]) -> Result<(), UnorderedShapes> {
    let missing: Vec<(&'static str, String)> = shapes
        .iter()
        .filter(|s| s.geometry.is_none())
        .map(|s| (s.kind_label(), s.name.clone()))
        .collect();
    if !missing.is_empty() {
        return Err(UnorderedShapes { missing });
    }

    shapes.sort_by_key(|s| s.geometry.map(|g| (g.top, g.left)));
    Ok(())
}

/// Flatten and order a slide's shapes.
///
/// Ordering problems are logged and the flattened authoring order is kept.
pub fn normalize_shapes(slide_number: usize, shapes: &[Shape]) -> Vec<&Shape> {
    let mut flat = ungroup_shapes(shapes);
    if let Err(e) = sort_by_position(&mut flat) {
        log::warn!(
            "Bad shapes encountered in slide {}, keeping authoring order: {}",
            slide_number,
            e
        );
        for shape in &flat {
            log::warn!(
                "  {} '{}' at {:?}",
                shape.kind_label(),
                shape.name,
                shape.geometry
            );
        }
    }
    flat
}
