//! Per-slide processing: routes each shape to its handler.

use crate::classify::{classify, is_list_block, ShapeCategory};
use crate::config::ConversionConfig;
use crate::error::Result;
use crate::inline::RunFormatter;
use crate::layout::normalize_shapes;
use crate::notes::should_emit_notes;
use crate::picture::{is_legacy_format, ImageConverter, ImageStore};
use crate::render::Renderer;
use crate::section::{heading_level, is_section_header, resolve_custom_title};
use crate::types::{Image, Shape, ShapeKind, Slide, Table};
use std::fmt;

/// A non-fatal condition worth telling the user about after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// 1-based slide number.
    pub slide: usize,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// State carried from slide to slide, in document order.
#[derive(Debug, Default)]
pub struct ConversionContext {
    /// Index of the next extracted picture.
    pub picture_count: usize,
    /// Whether any processed slide so far was a section header.
    pub seen_section_header: bool,
    pub notices: Vec<Notice>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn notice(&mut self, slide: usize, message: String) {
        self.notices.push(Notice { slide, message });
    }
}

/// Turns slides into renderer events.
pub struct SlideProcessor<'a> {
    config: &'a ConversionConfig,
    images: ImageStore,
    converter: &'a dyn ImageConverter,
}

impl<'a> SlideProcessor<'a> {
    pub fn new(config: &'a ConversionConfig, converter: &'a dyn ImageConverter) -> Self {
        let images = ImageStore::new(
            config.image_dir.clone(),
            config.image_prefix.clone(),
            &config.output_path,
        );
        Self {
            config,
            images,
            converter,
        }
    }

    /// Process the slide at the 0-based `index`.
    pub fn process(
        &self,
        index: usize,
        slide: &Slide,
        ctx: &mut ConversionContext,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let slide_number = index + 1;
        let threshold = self.config.text_block_threshold;
        let shapes = normalize_shapes(slide_number, &slide.shapes);

        let slide_is_section_header = is_section_header(index, &shapes, threshold);
        ctx.seen_section_header |= slide_is_section_header;
        log::debug!(
            "Slide {}: {} shapes, section header: {}",
            slide_number,
            shapes.len(),
            slide_is_section_header
        );

        for shape in shapes {
            match classify(shape, threshold) {
                ShapeCategory::Title => {
                    let level = heading_level(slide_is_section_header, ctx.seen_section_header);
                    self.process_title(shape, slide_number, level, ctx, renderer)?;
                }
                ShapeCategory::TextBlock => self.process_text_block(shape, renderer)?,
                ShapeCategory::Picture => {
                    if let ShapeKind::Picture(ref image) = shape.kind {
                        self.process_picture(image, slide_number, ctx, renderer)?;
                    }
                }
                ShapeCategory::Table => {
                    if let ShapeKind::Table(ref table) = shape.kind {
                        self.process_table(table, renderer)?;
                    }
                }
                ShapeCategory::Ignored => {}
            }
        }

        if !self.config.disable_notes {
            if let Some(ref notes) = slide.notes {
                self.process_notes(notes, renderer)?;
            }
        }

        Ok(())
    }

    fn process_title(
        &self,
        shape: &Shape,
        slide_number: usize,
        level: usize,
        ctx: &mut ConversionContext,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let mut text = shape.text_content().trim().to_string();
        if !self.config.disable_title_newline_removal {
            text = text.replace('\n', " ");
        }
        match self.config.custom_titles {
            Some(ref titles) => {
                let resolved = resolve_custom_title(&text, titles);
                if resolved.substituted {
                    ctx.notice(
                        slide_number,
                        format!(
                            "Title in slide {} \"{}\" is converted to \"{}\" as specified in title file.",
                            slide_number, text, resolved.text
                        ),
                    );
                }
                renderer.emit_heading(&resolved.text, resolved.level)
            }
            None => renderer.emit_heading(&text, level),
        }
    }

    fn process_text_block(&self, shape: &Shape, renderer: &mut dyn Renderer) -> Result<()> {
        let Some(ref frame) = shape.text_frame else {
            return Ok(());
        };

        let formatted: Vec<(String, usize)> = {
            let formatter = RunFormatter::new(&*renderer, self.config);
            frame
                .paragraphs
                .iter()
                .filter(|p| !p.text().trim().is_empty())
                .map(|p| (formatter.format_paragraph(p), p.level))
                .collect()
        };

        if is_list_block(shape) {
            for (text, level) in &formatted {
                renderer.emit_list_item(text, *level)?;
            }
            renderer.emit_raw("\n")?;
        } else {
            for (text, _) in &formatted {
                renderer.emit_paragraph(text)?;
            }
        }
        Ok(())
    }

    fn process_picture(
        &self,
        image: &Image,
        slide_number: usize,
        ctx: &mut ConversionContext,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        if self.config.disable_image {
            return Ok(());
        }

        let saved = self.images.save(image, ctx.picture_count)?;
        ctx.picture_count += 1;
        let max_width = self.config.max_image_width;

        if !is_legacy_format(&image.ext) {
            return renderer.emit_image(&saved.link, max_width);
        }

        match self.converter.convert(&saved.file) {
            Ok(converted) => {
                ctx.notice(
                    slide_number,
                    format!(
                        "Image {} in slide {} converted to png.",
                        saved.file.display(),
                        slide_number
                    ),
                );
                renderer.emit_image(&self.images.link_for(&converted), max_width)
            }
            Err(e) => {
                log::debug!("{}", e);
                ctx.notice(
                    slide_number,
                    format!(
                        "Cannot convert {} image {} in slide {} to png, this probably won't be displayed correctly.",
                        image.ext,
                        saved.file.display(),
                        slide_number
                    ),
                );
                renderer.emit_image(&saved.link, max_width)
            }
        }
    }

    fn process_table(&self, table: &Table, renderer: &mut dyn Renderer) -> Result<()> {
        if table.rows.is_empty() {
            return Ok(());
        }
        renderer.emit_table(&table.rows)
    }

    fn process_notes(&self, notes: &str, renderer: &mut dyn Renderer) -> Result<()> {
        if !should_emit_notes(notes, self.config.min_notes_prose_ratio) {
            return Ok(());
        }
        renderer.emit_paragraph("---")?;
        renderer.emit_paragraph(notes)
    }
}
