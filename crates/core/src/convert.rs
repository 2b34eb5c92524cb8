//! Whole-document conversion.

use crate::config::{ConversionConfig, PageSelection};
use crate::error::Result;
use crate::picture::{ImageConverter, PngConverter};
use crate::render::Renderer;
use crate::slide::{ConversionContext, Notice, SlideProcessor};
use crate::types::Presentation;

/// Outcome of a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConversionSummary {
    /// Number of slides that were processed.
    pub slides_processed: usize,
    /// Number of pictures written.
    pub pictures: usize,
    /// Notices in document order.
    pub notices: Vec<Notice>,
}

/// Convert a presentation using the default picture converter.
pub fn convert(
    presentation: &Presentation,
    config: &ConversionConfig,
    renderer: &mut dyn Renderer,
) -> Result<ConversionSummary> {
    convert_with(presentation, config, renderer, &PngConverter)
}

/// Convert a presentation, converting legacy pictures with `converter`.
///
/// Slides are processed in order; the renderer is finalized once at the end.
/// Only fatal errors (I/O on images or output, invalid configuration) are
/// returned. Everything else ends up in the summary's notices or the log.
pub fn convert_with(
    presentation: &Presentation,
    config: &ConversionConfig,
    renderer: &mut dyn Renderer,
    converter: &dyn ImageConverter,
) -> Result<ConversionSummary> {
    config.validate()?;

    if let PageSelection::Single(page) = config.page {
        if page.get() > presentation.slides.len() {
            log::warn!(
                "Page {} requested but {} has only {} slides",
                page,
                presentation.filename,
                presentation.slides.len()
            );
        }
    }

    let processor = SlideProcessor::new(config, converter);
    let mut ctx = ConversionContext::new();
    let mut slides_processed = 0;

    for (index, slide) in presentation.slides.iter().enumerate() {
        if !config.page.includes(index) {
            continue;
        }
        processor.process(index, slide, &mut ctx, renderer)?;
        slides_processed += 1;
    }

    renderer.finalize()?;

    Ok(ConversionSummary {
        slides_processed,
        pictures: ctx.picture_count,
        notices: ctx.notices,
    })
}
