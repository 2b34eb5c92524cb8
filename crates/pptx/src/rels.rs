//! Package relationships (`_rels/*.rels` parts).

use deck2md_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One `Relationship` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`: the target is a URL, not a part name.
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship type ends with `/<kind>`, e.g. `slideLayout`.
    pub fn is(&self, kind: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .map(|last| last == kind)
            .unwrap_or(false)
    }
}

/// Relationships of a single source part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    /// Part name the relationships belong to, e.g. `ppt/slides/slide1.xml`.
    source: String,
    items: Vec<Relationship>,
}

impl Relationships {
    /// Relationships of a part that has none.
    pub fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            items: Vec::new(),
        }
    }

    /// Parse the content of `source`'s `.rels` part.
    pub fn parse(source: &str, xml: &str) -> Result<Self> {
        let mut items = Vec::new();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };
                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            b"TargetMode" => rel.external = value == "External",
                            _ => {}
                        }
                    }
                    items.push(rel);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing relationships of '{}': {}",
                        source, e
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            source: source.to_string(),
            items,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// First relationship of the given kind.
    pub fn first_of(&self, kind: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.is(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Part name a relationship points to, or `None` for external targets.
    pub fn part_name(&self, rel: &Relationship) -> Option<String> {
        if rel.external {
            return None;
        }
        Some(resolve_part_name(&self.source, &rel.target))
    }
}

/// Part name of the `.rels` part belonging to `part`.
///
/// `ppt/slides/slide1.xml` has its relationships in
/// `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relative relationship target against the directory of `source`.
pub fn resolve_part_name(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_parse_and_lookup() {
        let rels = Relationships::parse("ppt/slides/slide1.xml", SLIDE_RELS).unwrap();
        assert_eq!(rels.iter().count(), 3);

        let layout = rels.first_of("slideLayout").unwrap();
        assert_eq!(layout.id, "rId1");
        assert_eq!(
            rels.part_name(layout).as_deref(),
            Some("ppt/slideLayouts/slideLayout2.xml")
        );

        let link = rels.get("rId3").unwrap();
        assert!(link.external);
        assert!(link.is("hyperlink"));
        assert_eq!(rels.part_name(link), None);
        assert!(rels.get("rId9").is_none());
    }

    #[test]
    fn test_relationship_kind_matches_last_segment_only() {
        let rels = Relationships::parse("ppt/slides/slide1.xml", SLIDE_RELS).unwrap();
        assert!(rels.first_of("slide").is_none());
    }

    #[test]
    fn test_rels_part_name() {
        assert_eq!(
            rels_part_name("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(
            rels_part_name("ppt/presentation.xml"),
            "ppt/_rels/presentation.xml.rels"
        );
    }

    #[test]
    fn test_resolve_part_name() {
        assert_eq!(
            resolve_part_name("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            resolve_part_name("ppt/presentation.xml", "slides/slide3.xml"),
            "ppt/slides/slide3.xml"
        );
        assert_eq!(
            resolve_part_name("ppt/slides/slide1.xml", "/ppt/media/a.jpeg"),
            "ppt/media/a.jpeg"
        );
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
