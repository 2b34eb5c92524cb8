//! PPTX package reader: walks the package parts and builds the document model.

use crate::rels::{local_name, rels_part_name, Relationships};
use crate::shapes::{parse_shape_tree, InheritedPositions, PartResolver, PlaceholderSlot};
use deck2md_core::{Error, Image, PlaceholderRole, Presentation, PresentationFormat, Result, Slide};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    ///
    /// Only an unreadable container or a missing presentation part fails the
    /// whole parse. Broken slides, layouts, notes and media are logged and
    /// skipped.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new(filename, PresentationFormat::Pptx);

        let presentation_xml = read_part(&mut archive, PRESENTATION_PART).map_err(|e| {
            Error::PptxParseError(format!("{} is not a presentation: {}", filename, e))
        })?;
        let rels_content = read_part(&mut archive, &rels_part_name(PRESENTATION_PART))?;
        let rels = Relationships::parse(PRESENTATION_PART, &rels_content)?;

        let slide_order = self.get_slide_order(&presentation_xml, &rels)?;
        log::debug!("{}: {} slides", filename, slide_order.len());

        let mut templates = TemplateCache::default();
        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1, &mut templates);
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Slide part names in presentation order.
    ///
    /// The order comes from `p:sldIdLst`. Packages without one are ordered by
    /// the numbers in their slide relationships.
    fn get_slide_order(&self, presentation_xml: &str, rels: &Relationships) -> Result<Vec<String>> {
        let ordered: Vec<String> = slide_id_list(presentation_xml)?
            .iter()
            .filter_map(|id| rels.get(id))
            .filter(|rel| rel.is("slide"))
            .filter_map(|rel| rels.part_name(rel))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }

        log::debug!("No slide id list, ordering slides by relationship numbering");
        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|rel| rel.is("slide"))
            .filter_map(|rel| {
                let order_num =
                    extract_slide_number(&rel.target).or_else(|| extract_slide_number(&rel.id));
                rels.part_name(rel).map(|path| (path, order_num))
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
        templates: &mut TemplateCache,
    ) -> Slide {
        let mut slide = Slide::new(slide_number);

        let content = match read_part(archive, slide_path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Slide {} is unreadable, leaving it empty: {}", slide_number, e);
                return slide;
            }
        };

        let rels = read_rels(archive, slide_path);
        let inherited = self.inherited_positions(archive, &rels, templates);

        let mut resolver = ArchiveResolver {
            archive: &mut *archive,
            rels: &rels,
        };
        match parse_shape_tree(&content, &mut resolver, &inherited) {
            Ok(tree) => slide.shapes = tree.shapes,
            Err(e) => log::warn!("Skipping shapes of slide {} ({}): {}", slide_number, slide_path, e),
        }

        slide.notes = self.parse_notes(archive, &rels, slide_number);
        slide
    }

    /// Placeholder positions of the slide's layout and master.
    fn inherited_positions<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_rels: &Relationships,
        templates: &mut TemplateCache,
    ) -> InheritedPositions {
        let Some(layout_part) = slide_rels
            .first_of("slideLayout")
            .and_then(|rel| slide_rels.part_name(rel))
        else {
            return InheritedPositions::default();
        };
        if let Some(positions) = templates.layouts.get(&layout_part) {
            return positions.clone();
        }

        let layout_rels = read_rels(archive, &layout_part);
        let master = match layout_rels
            .first_of("slideMaster")
            .and_then(|rel| layout_rels.part_name(rel))
        {
            Some(master_part) => self.master_slots(archive, &master_part, templates),
            None => Vec::new(),
        };

        let layout = placeholder_slots(
            archive,
            &layout_part,
            &layout_rels,
            &InheritedPositions::new(Vec::new(), master.clone()),
        );
        let positions = InheritedPositions::new(layout, master);
        templates.layouts.insert(layout_part, positions.clone());
        positions
    }

    fn master_slots<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        master_part: &str,
        templates: &mut TemplateCache,
    ) -> Vec<PlaceholderSlot> {
        if let Some(slots) = templates.masters.get(master_part) {
            return slots.clone();
        }
        let rels = read_rels(archive, master_part);
        let slots = placeholder_slots(archive, master_part, &rels, &InheritedPositions::default());
        templates.masters.insert(master_part.to_string(), slots.clone());
        slots
    }

    /// Text of the notes body placeholder, if the slide has non-blank notes.
    fn parse_notes<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_rels: &Relationships,
        slide_number: usize,
    ) -> Option<String> {
        let notes_part = slide_rels
            .first_of("notesSlide")
            .and_then(|rel| slide_rels.part_name(rel))?;

        let content = match read_part(archive, &notes_part) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Notes of slide {} are unreadable: {}", slide_number, e);
                return None;
            }
        };

        let rels = read_rels(archive, &notes_part);
        let mut resolver = ArchiveResolver {
            archive,
            rels: &rels,
        };
        let tree = match parse_shape_tree(&content, &mut resolver, &InheritedPositions::default()) {
            Ok(tree) => tree,
            Err(e) => {
                log::warn!("Notes of slide {} are malformed: {}", slide_number, e);
                return None;
            }
        };

        let text = tree.find_placeholder(&PlaceholderRole::Body)?.text_content();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout and master placeholders already read, keyed by part name.
#[derive(Default)]
struct TemplateCache {
    layouts: HashMap<String, InheritedPositions>,
    masters: HashMap<String, Vec<PlaceholderSlot>>,
}

/// Resolves a part's relationships against the open archive.
struct ArchiveResolver<'a, R: Read + Seek> {
    archive: &'a mut ZipArchive<R>,
    rels: &'a Relationships,
}

impl<'a, R: Read + Seek> PartResolver for ArchiveResolver<'a, R> {
    fn hyperlink_target(&self, rel_id: &str) -> Option<String> {
        self.rels.get(rel_id).map(|rel| rel.target.clone())
    }

    fn image(&mut self, rel_id: &str) -> Option<Image> {
        let rel = self.rels.get(rel_id)?;
        let Some(part) = self.rels.part_name(rel) else {
            log::warn!("Linked image '{}' is not embedded, skipping", rel.target);
            return None;
        };
        match read_bytes(self.archive, &part) {
            Ok(blob) => Some(Image {
                blob,
                ext: image_extension(&part),
            }),
            Err(e) => {
                log::warn!("Skipping image: {}", e);
                None
            }
        }
    }
}

/// Placeholders with a known position declared by a layout or master part.
fn placeholder_slots<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
    rels: &Relationships,
    inherited: &InheritedPositions,
) -> Vec<PlaceholderSlot> {
    let content = match read_part(archive, part) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Template part is unreadable: {}", e);
            return Vec::new();
        }
    };
    let mut resolver = ArchiveResolver { archive, rels };
    match parse_shape_tree(&content, &mut resolver, inherited) {
        Ok(tree) => tree.placeholders,
        Err(e) => {
            log::warn!("Template part '{}' is malformed: {}", part, e);
            Vec::new()
        }
    }
}

/// Relationship ids listed in `p:sldIdLst`, in order.
fn slide_id_list(presentation_xml: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(presentation_xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // `id` is the slide id; the relationship id is the prefixed `r:id`.
                let rel_id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
                if let Some(rel_id) = rel_id {
                    ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Relationships of `part`; a part without a `.rels` part has none.
fn read_rels<R: Read + Seek>(archive: &mut ZipArchive<R>, part: &str) -> Relationships {
    let rels_path = rels_part_name(part);
    if archive.by_name(&rels_path).is_err() {
        log::debug!("No relationships for '{}'", part);
        return Relationships::empty(part);
    }
    match read_part(archive, &rels_path).and_then(|content| Relationships::parse(part, &content)) {
        Ok(rels) => rels,
        Err(e) => {
            log::warn!("Ignoring relationships of '{}': {}", part, e);
            Relationships::empty(part)
        }
    }
}

/// Read a file from the ZIP archive.
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Lowercase extension of a media part name, with `jpeg` shortened to `jpg`.
fn image_extension(part: &str) -> String {
    let ext = part
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpeg" => "jpg".to_string(),
        _ => ext,
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck2md_core::{Geometry, ShapeKind};
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
    const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    fn rels(items: &[(&str, &str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(id, kind, target)| {
                format!(
                    r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                    id, REL, kind, target
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            body
        )
    }

    fn tree(root: &str, shapes: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:{root} {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:{root}>"#
        )
    }

    fn placeholder(name: &str, ph: &str, xfrm: &str, text: &str) -> String {
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="{name}"/><p:cNvSpPr/><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr>{xfrm}</p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        )
    }

    fn xfrm(y: i64) -> String {
        format!(r#"<a:xfrm><a:off x="0" y="{y}"/><a:ext cx="10" cy="10"/></a:xfrm>"#)
    }

    fn package(parts: &[(&str, String)]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    fn sample_deck() -> Cursor<Vec<u8>> {
        let presentation = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldIdLst><p:sldId id="256" r:id="rId3"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst></p:presentation>"#
        );
        let first = tree(
            "sld",
            &placeholder("Intro", r#"<p:ph type="title"/>"#, &xfrm(5), "Welcome"),
        );
        let second = tree(
            "sld",
            &format!(
                r#"{}{}<p:pic><p:nvPicPr><p:cNvPr id="4" name="Photo"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr>{}</p:spPr></p:pic>"#,
                placeholder("Title 1", r#"<p:ph type="title"/>"#, "", "Agenda"),
                placeholder("Content", r#"<p:ph type="body" idx="1"/>"#, "", "Items go here"),
                xfrm(900)
            ),
        );
        let layout = tree(
            "sldLayout",
            &placeholder("Layout Title", r#"<p:ph type="title"/>"#, &xfrm(111), ""),
        );
        let master = tree(
            "sldMaster",
            &format!(
                "{}{}",
                placeholder("Master Title", r#"<p:ph type="title"/>"#, &xfrm(1), ""),
                placeholder("Master Body", r#"<p:ph type="body" idx="1"/>"#, &xfrm(222), "")
            ),
        );
        let notes = tree(
            "notes",
            &format!(
                "{}{}",
                placeholder("Slide Image", r#"<p:ph type="sldImg"/>"#, "", ""),
                placeholder("Notes", r#"<p:ph type="body" idx="1"/>"#, "", "Remember this")
            ),
        );

        package(&[
            ("ppt/presentation.xml", presentation),
            (
                "ppt/_rels/presentation.xml.rels",
                rels(&[
                    ("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
                    ("rId2", "slide", "slides/slide1.xml"),
                    ("rId3", "slide", "slides/slide2.xml"),
                ]),
            ),
            ("ppt/slides/slide2.xml", first),
            ("ppt/slides/slide1.xml", second),
            (
                "ppt/slides/_rels/slide1.xml.rels",
                rels(&[
                    ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                    ("rId2", "image", "../media/image1.JPEG"),
                    ("rId3", "notesSlide", "../notesSlides/notesSlide1.xml"),
                ]),
            ),
            ("ppt/slideLayouts/slideLayout1.xml", layout),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
                rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
            ),
            ("ppt/slideMasters/slideMaster1.xml", master),
            ("ppt/notesSlides/notesSlide1.xml", notes),
            ("ppt/media/image1.JPEG", "jpegbytes".to_string()),
        ])
    }

    #[test]
    fn test_parse_deck() {
        let presentation = PptxParser::new().parse(sample_deck(), "deck.pptx").unwrap();
        assert_eq!(presentation.filename, "deck.pptx");
        assert_eq!(presentation.slides.len(), 2);

        // Ordered by the slide id list, not by part name.
        let first = &presentation.slides[0];
        assert_eq!(first.number, 1);
        assert_eq!(first.shapes[0].text_content(), "Welcome");
        assert_eq!(first.notes, None);

        let second = &presentation.slides[1];
        assert_eq!(second.number, 2);
        assert_eq!(second.shapes.len(), 3);
        assert_eq!(second.shapes[0].geometry.map(|g| g.top), Some(111));
        assert_eq!(second.shapes[1].geometry.map(|g| g.top), Some(222));
        match second.shapes[2].kind {
            ShapeKind::Picture(ref image) => {
                assert_eq!(image.ext, "jpg");
                assert_eq!(image.blob, b"jpegbytes");
            }
            ref other => panic!("expected picture, got {:?}", other),
        }
        assert_eq!(
            second.shapes[2].geometry,
            Some(Geometry {
                top: 900,
                left: 0,
                width: 10,
                height: 10
            })
        );
        assert_eq!(second.notes.as_deref(), Some("Remember this"));
    }

    #[test]
    fn test_slide_order_falls_back_to_numbering() {
        let rels = Relationships::parse(
            PRESENTATION_PART,
            &rels(&[
                ("rId7", "slide", "slides/slide10.xml"),
                ("rId8", "slide", "slides/slide2.xml"),
                ("rId9", "slideMaster", "slideMasters/slideMaster1.xml"),
            ]),
        )
        .unwrap();
        let presentation = format!(r#"<p:presentation {NS}/>"#);
        let order = PptxParser::new().get_slide_order(&presentation, &rels).unwrap();
        assert_eq!(order, vec!["ppt/slides/slide2.xml", "ppt/slides/slide10.xml"]);
    }

    #[test]
    fn test_missing_presentation_part_is_fatal() {
        let cursor = package(&[("docProps/app.xml", "<Properties/>".to_string())]);
        let err = PptxParser::new().parse(cursor, "x.pptx").unwrap_err();
        assert!(matches!(err, Error::PptxParseError(_)));
    }

    #[test]
    fn test_not_a_zip_is_fatal() {
        let err = PptxParser::new()
            .parse(Cursor::new(b"plain text".to_vec()), "x.pptx")
            .unwrap_err();
        assert!(matches!(err, Error::ZipError(_)));
    }

    #[test]
    fn test_unreadable_slide_is_left_empty() {
        let cursor = package(&[
            (
                "ppt/presentation.xml",
                format!(
                    r#"<p:presentation {NS}><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#
                ),
            ),
            (
                "ppt/_rels/presentation.xml.rels",
                rels(&[("rId2", "slide", "slides/slide1.xml")]),
            ),
        ]);
        let presentation = PptxParser::new().parse(cursor, "x.pptx").unwrap();
        assert_eq!(presentation.slides.len(), 1);
        assert!(presentation.slides[0].shapes.is_empty());
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("ppt/media/image1.jpeg"), "jpg");
        assert_eq!(image_extension("ppt/media/image2.PNG"), "png");
        assert_eq!(image_extension("ppt/media/image3.wmf"), "wmf");
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }
}
