//! Windows Metafile rasterizer.
//!
//! Plays the records slide decks commonly carry onto an RGBA canvas:
//! embedded bitmaps, rectangles, ellipses, polygons and lines. Text,
//! clipping and raster operations are ignored.

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

const PLACEABLE_KEY: u32 = 0x9AC6_CDD7;
const PLACEABLE_HEADER_LEN: usize = 22;
const HEADER_LEN: usize = 18;
/// Header size in 16-bit words, fixed by the format.
const HEADER_WORDS: u16 = 9;

/// Resolution of the raster output.
const OUTPUT_DPI: i64 = 96;
/// Units per inch assumed when the placeable header leaves it at zero.
const DEFAULT_UNITS_PER_INCH: i64 = 1440;
const MAX_DIMENSION: f64 = 4096.0;
/// Window extent, in pixels, for metafiles that never declare one.
const DEFAULT_EXTENT: i16 = 1000;
const ELLIPSE_SEGMENTS: usize = 64;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Record function codes.
mod record {
    pub const EOF: u16 = 0x0000;
    pub const SET_WINDOW_ORG: u16 = 0x020B;
    pub const SET_WINDOW_EXT: u16 = 0x020C;
    pub const LINE_TO: u16 = 0x0213;
    pub const MOVE_TO: u16 = 0x0214;
    pub const POLYGON: u16 = 0x0324;
    pub const POLYLINE: u16 = 0x0325;
    pub const ELLIPSE: u16 = 0x0418;
    pub const RECTANGLE: u16 = 0x041B;
    pub const POLYPOLYGON: u16 = 0x0538;

    pub const CREATE_PEN_INDIRECT: u16 = 0x02FA;
    pub const CREATE_BRUSH_INDIRECT: u16 = 0x02FC;
    pub const CREATE_FONT_INDIRECT: u16 = 0x02FB;
    pub const CREATE_PALETTE: u16 = 0x00F7;
    pub const CREATE_REGION: u16 = 0x06FF;
    pub const CREATE_PATTERN_BRUSH: u16 = 0x01F9;
    pub const DIB_CREATE_PATTERN_BRUSH: u16 = 0x0142;
    pub const SELECT_OBJECT: u16 = 0x012D;
    pub const DELETE_OBJECT: u16 = 0x01F0;

    pub const DIB_BIT_BLT: u16 = 0x0940;
    pub const DIB_STRETCH_BLT: u16 = 0x0B41;
    pub const STRETCH_DIB: u16 = 0x0F43;
}

const PS_NULL: u16 = 5;
const BS_NULL: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WmfError {
    #[error("not a Windows Metafile")]
    NotAMetafile,

    #[error("metafile header is truncated")]
    Truncated,

    #[error("metafile frame is empty")]
    EmptyFrame,
}

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn i16_at(data: &[u8], offset: usize) -> Option<i16> {
    u16_at(data, offset).map(|v| v as i16)
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn color_at(data: &[u8], offset: usize) -> Option<Rgba<u8>> {
    let bytes = data.get(offset..offset + 3)?;
    Some(Rgba([bytes[0], bytes[1], bytes[2], 255]))
}

/// Bounding box from the placeable header, in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    left: i16,
    top: i16,
    width: i16,
    height: i16,
    units_per_inch: u16,
}

#[derive(Debug, Clone, Copy)]
struct Record<'a> {
    function: u16,
    params: &'a [u8],
}

/// A metafile split into its headers and records.
#[derive(Debug)]
struct Metafile<'a> {
    frame: Option<Frame>,
    num_objects: usize,
    records: Vec<Record<'a>>,
}

impl<'a> Metafile<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, WmfError> {
        let mut offset = 0;
        let mut frame = None;

        if u32_at(data, 0) == Some(PLACEABLE_KEY) {
            if data.len() < PLACEABLE_HEADER_LEN {
                return Err(WmfError::Truncated);
            }
            let field = |at| i16_at(data, at).ok_or(WmfError::Truncated);
            let (left, top, right, bottom) = (field(6)?, field(8)?, field(10)?, field(12)?);
            frame = Some(Frame {
                left,
                top,
                width: right.saturating_sub(left),
                height: bottom.saturating_sub(top),
                units_per_inch: u16_at(data, 14).ok_or(WmfError::Truncated)?,
            });
            offset = PLACEABLE_HEADER_LEN;
        }

        if data.len() < offset + HEADER_LEN {
            return Err(if frame.is_some() {
                WmfError::Truncated
            } else {
                WmfError::NotAMetafile
            });
        }
        let file_type = u16_at(data, offset).ok_or(WmfError::Truncated)?;
        let header_words = u16_at(data, offset + 2).ok_or(WmfError::Truncated)?;
        if !matches!(file_type, 1 | 2) || header_words != HEADER_WORDS {
            return Err(WmfError::NotAMetafile);
        }
        let num_objects = u16_at(data, offset + 10).ok_or(WmfError::Truncated)? as usize;
        offset += HEADER_LEN;

        let mut records = Vec::new();
        while let (Some(words), Some(function)) = (u32_at(data, offset), u16_at(data, offset + 4)) {
            let size = (words as usize).saturating_mul(2);
            if size < 6 || offset.saturating_add(size) > data.len() {
                log::debug!("Stopping at malformed metafile record at offset {}", offset);
                break;
            }
            if function == record::EOF {
                break;
            }
            records.push(Record {
                function,
                params: &data[offset + 6..offset + size],
            });
            offset += size;
        }

        Ok(Self {
            frame,
            num_objects,
            records,
        })
    }

    /// First value of a window record, as (x, y).
    fn first_point(&self, function: u16) -> Option<(i16, i16)> {
        let record = self.records.iter().find(|r| r.function == function)?;
        Some((i16_at(record.params, 2)?, i16_at(record.params, 0)?))
    }
}

/// Rasterize a metafile onto a white canvas.
///
/// The canvas takes the placeable header's size at 96 dpi, or the window
/// extent in pixels when there is no placeable header. Either is scaled down
/// to fit within 4096 pixels.
pub fn rasterize(data: &[u8]) -> Result<RgbaImage, WmfError> {
    let metafile = Metafile::parse(data)?;
    let mut canvas = Canvas::new(&metafile)?;
    for rec in &metafile.records {
        canvas.play(rec);
    }
    Ok(canvas.image)
}

#[derive(Debug, Clone, Copy)]
enum GdiObject {
    /// `None` draws nothing.
    Pen(Option<Rgba<u8>>),
    Brush(Option<Rgba<u8>>),
    /// Fonts, palettes, regions and pattern brushes only hold a slot.
    Other,
}

struct Canvas {
    image: RgbaImage,
    origin: (f64, f64),
    extent: (f64, f64),
    objects: Vec<Option<GdiObject>>,
    pen: Option<Rgba<u8>>,
    brush: Option<Rgba<u8>>,
    position: (f64, f64),
}

impl Canvas {
    fn new(metafile: &Metafile<'_>) -> Result<Self, WmfError> {
        let (origin, extent, size) = match metafile.frame {
            Some(frame) => {
                let per_inch = match frame.units_per_inch {
                    0 => DEFAULT_UNITS_PER_INCH,
                    n => n as i64,
                };
                let width = (frame.width as i64).abs() * OUTPUT_DPI / per_inch;
                let height = (frame.height as i64).abs() * OUTPUT_DPI / per_inch;
                (
                    (frame.left, frame.top),
                    (frame.width, frame.height),
                    (width as f64, height as f64),
                )
            }
            None => {
                let origin = metafile
                    .first_point(record::SET_WINDOW_ORG)
                    .unwrap_or((0, 0));
                let extent = metafile
                    .first_point(record::SET_WINDOW_EXT)
                    .unwrap_or((DEFAULT_EXTENT, DEFAULT_EXTENT));
                let size = ((extent.0 as f64).abs(), (extent.1 as f64).abs());
                (origin, extent, size)
            }
        };

        if extent.0 == 0 || extent.1 == 0 {
            return Err(WmfError::EmptyFrame);
        }

        let scale = (MAX_DIMENSION / size.0.max(size.1)).min(1.0);
        let width = ((size.0 * scale) as u32).max(1);
        let height = ((size.1 * scale) as u32).max(1);

        Ok(Self {
            image: RgbaImage::from_pixel(width, height, WHITE),
            origin: (origin.0 as f64, origin.1 as f64),
            extent: (extent.0 as f64, extent.1 as f64),
            objects: vec![None; metafile.num_objects],
            pen: Some(BLACK),
            brush: Some(WHITE),
            position: (0.0, 0.0),
        })
    }

    /// Logical coordinates to pixel coordinates.
    fn to_pixel(&self, x: i16, y: i16) -> (f64, f64) {
        (
            (x as f64 - self.origin.0) * self.image.width() as f64 / self.extent.0,
            (y as f64 - self.origin.1) * self.image.height() as f64 / self.extent.1,
        )
    }

    fn play(&mut self, rec: &Record<'_>) {
        let p = rec.params;
        match rec.function {
            record::SET_WINDOW_ORG => {
                if let (Some(y), Some(x)) = (i16_at(p, 0), i16_at(p, 2)) {
                    self.origin = (x as f64, y as f64);
                }
            }
            record::SET_WINDOW_EXT => {
                if let (Some(y), Some(x)) = (i16_at(p, 0), i16_at(p, 2)) {
                    if x != 0 && y != 0 {
                        self.extent = (x as f64, y as f64);
                    }
                }
            }
            record::CREATE_PEN_INDIRECT => {
                if let (Some(style), Some(color)) = (u16_at(p, 0), color_at(p, 6)) {
                    let color = (style & 0x0F != PS_NULL).then_some(color);
                    self.add_object(GdiObject::Pen(color));
                }
            }
            record::CREATE_BRUSH_INDIRECT => {
                if let (Some(style), Some(color)) = (u16_at(p, 0), color_at(p, 2)) {
                    let color = (style != BS_NULL).then_some(color);
                    self.add_object(GdiObject::Brush(color));
                }
            }
            record::CREATE_FONT_INDIRECT
            | record::CREATE_PALETTE
            | record::CREATE_REGION
            | record::CREATE_PATTERN_BRUSH
            | record::DIB_CREATE_PATTERN_BRUSH => self.add_object(GdiObject::Other),
            record::SELECT_OBJECT => {
                let object = u16_at(p, 0).and_then(|i| self.objects.get(i as usize).copied().flatten());
                match object {
                    Some(GdiObject::Pen(color)) => self.pen = color,
                    Some(GdiObject::Brush(color)) => self.brush = color,
                    _ => {}
                }
            }
            record::DELETE_OBJECT => {
                if let Some(slot) = u16_at(p, 0).and_then(|i| self.objects.get_mut(i as usize)) {
                    *slot = None;
                }
            }
            record::MOVE_TO => {
                if let (Some(y), Some(x)) = (i16_at(p, 0), i16_at(p, 2)) {
                    self.position = self.to_pixel(x, y);
                }
            }
            record::LINE_TO => {
                if let (Some(y), Some(x)) = (i16_at(p, 0), i16_at(p, 2)) {
                    let to = self.to_pixel(x, y);
                    if let Some(color) = self.pen {
                        self.draw_line(self.position, to, color);
                    }
                    self.position = to;
                }
            }
            record::RECTANGLE | record::ELLIPSE => {
                let Some(points) = self.box_outline(p, rec.function == record::ELLIPSE) else {
                    return;
                };
                self.fill_and_stroke(&[points]);
            }
            record::POLYGON => {
                if let Some(points) = self.points(p, 2, u16_at(p, 0)) {
                    self.fill_and_stroke(&[points]);
                }
            }
            record::POLYLINE => {
                if let (Some(points), Some(color)) = (self.points(p, 2, u16_at(p, 0)), self.pen) {
                    for pair in points.windows(2) {
                        self.draw_line(pair[0], pair[1], color);
                    }
                }
            }
            record::POLYPOLYGON => {
                if let Some(polygons) = self.polygons(p) {
                    self.fill_and_stroke(&polygons);
                }
            }
            record::STRETCH_DIB => self.draw_bitmap(p, 14, 22),
            record::DIB_STRETCH_BLT => self.draw_bitmap(p, 12, 20),
            record::DIB_BIT_BLT => self.draw_bitmap(p, 8, 16),
            _ => {}
        }
    }

    fn add_object(&mut self, object: GdiObject) {
        match self.objects.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(object),
            None => self.objects.push(Some(object)),
        }
    }

    /// `count` points of (x, y) pairs starting at `offset`.
    fn points(&self, p: &[u8], offset: usize, count: Option<u16>) -> Option<Vec<(f64, f64)>> {
        (0..count? as usize)
            .map(|i| {
                let at = offset + i * 4;
                Some(self.to_pixel(i16_at(p, at)?, i16_at(p, at + 2)?))
            })
            .collect()
    }

    fn polygons(&self, p: &[u8]) -> Option<Vec<Vec<(f64, f64)>>> {
        let count = u16_at(p, 0)? as usize;
        let mut offset = 2 + count * 2;
        let mut polygons = Vec::with_capacity(count);
        for i in 0..count {
            let points = u16_at(p, 2 + i * 2)?;
            polygons.push(self.points(p, offset, Some(points))?);
            offset += points as usize * 4;
        }
        Some(polygons)
    }

    /// Outline of a rectangle or ellipse record. Parameters run bottom,
    /// right, top, left.
    fn box_outline(&self, p: &[u8], ellipse: bool) -> Option<Vec<(f64, f64)>> {
        let (bottom, right, top, left) = (i16_at(p, 0)?, i16_at(p, 2)?, i16_at(p, 4)?, i16_at(p, 6)?);
        let (x0, y0) = self.to_pixel(left, top);
        let (x1, y1) = self.to_pixel(right, bottom);
        if !ellipse {
            return Some(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]);
        }

        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let (rx, ry) = ((x1 - x0).abs() / 2.0, (y1 - y0).abs() / 2.0);
        Some(
            (0..ELLIPSE_SEGMENTS)
                .map(|i| {
                    let angle = i as f64 * std::f64::consts::TAU / ELLIPSE_SEGMENTS as f64;
                    (cx + rx * angle.cos(), cy + ry * angle.sin())
                })
                .collect(),
        )
    }

    fn fill_and_stroke(&mut self, polygons: &[Vec<(f64, f64)>]) {
        if let Some(color) = self.brush {
            self.fill_polygons(polygons, color);
        }
        if let Some(color) = self.pen {
            for points in polygons {
                for (i, &from) in points.iter().enumerate() {
                    let to = points[(i + 1) % points.len()];
                    self.draw_line(from, to, color);
                }
            }
        }
    }

    /// Even-odd scanline fill sampled at pixel centers.
    fn fill_polygons(&mut self, polygons: &[Vec<(f64, f64)>], color: Rgba<u8>) {
        let (width, height) = self.image.dimensions();
        let mut crossings = Vec::new();
        for row in 0..height {
            let y = row as f64 + 0.5;
            crossings.clear();
            for points in polygons {
                for (i, &(x0, y0)) in points.iter().enumerate() {
                    let (x1, y1) = points[(i + 1) % points.len()];
                    if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
                        crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as u32;
                let end = ((span[1] - 0.5).ceil().max(0.0) as u32).min(width);
                for col in start..end {
                    self.image.put_pixel(col, row, color);
                }
            }
        }
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
        let (mut x, mut y) = (from.0.floor() as i64, from.1.floor() as i64);
        let (x1, y1) = (to.0.floor() as i64, to.1.floor() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (width, height) = self.image.dimensions();

        loop {
            if x >= 0 && y >= 0 && x < width as i64 && y < height as i64 {
                self.image.put_pixel(x as u32, y as u32, color);
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Stretch the device-independent bitmap at `dib_offset` into the
    /// destination rectangle at `dest_offset` (height, width, y, x).
    fn draw_bitmap(&mut self, p: &[u8], dest_offset: usize, dib_offset: usize) {
        let dest = (
            i16_at(p, dest_offset),
            i16_at(p, dest_offset + 2),
            i16_at(p, dest_offset + 4),
            i16_at(p, dest_offset + 6),
        );
        let (Some(h), Some(w), Some(y), Some(x)) = dest else {
            return;
        };
        let Some(bitmap) = p.get(dib_offset..).and_then(decode_dib) else {
            log::debug!("Skipping metafile bitmap that could not be decoded");
            return;
        };

        let (x0, y0) = self.to_pixel(x, y);
        let (x1, y1) = self.to_pixel(x.saturating_add(w), y.saturating_add(h));
        let width = (x1 - x0).abs().round() as u32;
        let height = (y1 - y0).abs().round() as u32;
        if width == 0 || height == 0 {
            return;
        }

        let scaled = imageops::resize(&bitmap, width, height, imageops::FilterType::Triangle);
        imageops::overlay(
            &mut self.image,
            &scaled,
            x0.min(x1).round() as i64,
            y0.min(y1).round() as i64,
        );
    }
}

/// Decode a device-independent bitmap by prefixing it with a BMP file header.
fn decode_dib(dib: &[u8]) -> Option<RgbaImage> {
    let header_len = u32_at(dib, 0)?;
    let (bit_count, palette_entry, colors_used, masks) = match header_len {
        12 => (u16_at(dib, 10)?, 3, 0, 0),
        n if n >= 40 => {
            let compression = u32_at(dib, 16)?;
            // BI_BITFIELDS masks follow a 40-byte header.
            let masks = if compression == 3 && header_len == 40 { 12 } else { 0 };
            (u16_at(dib, 14)?, 4, u32_at(dib, 32)?, masks)
        }
        _ => return None,
    };
    let palette_len = match colors_used {
        0 if bit_count <= 8 => 1u32 << bit_count,
        n => n,
    };
    let pixel_offset = 14 + header_len + masks + palette_len * palette_entry;

    let mut bmp = Vec::with_capacity(14 + dib.len());
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&(14 + dib.len() as u32).to_le_bytes());
    bmp.extend_from_slice(&[0u8; 4]);
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(dib);

    image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)
        .ok()
        .map(|img| img.to_rgba8())
}
