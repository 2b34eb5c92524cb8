//! Streaming parser for a slide's shape tree (`p:spTree`).
//!
//! Slides, layouts, masters and notes slides share the same shape tree
//! markup, so all of them go through [`parse_shape_tree`].

use crate::rels::local_name;
use deck2md_core::{
    Color, Error, Geometry, Hyperlink, Image, Paragraph, PlaceholderRole, Result, Rgb, Run, Shape,
    ShapeKind, Table, TextFrame, ThemeColor,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Access to the parts a shape tree refers to.
pub(crate) trait PartResolver {
    /// Target address of a hyperlink relationship.
    fn hyperlink_target(&self, rel_id: &str) -> Option<String>;

    /// Picture bytes behind an image relationship.
    fn image(&mut self, rel_id: &str) -> Option<Image>;
}

/// Position of a placeholder, as declared by a layout or master.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaceholderSlot {
    pub role: PlaceholderRole,
    pub idx: u32,
    pub geometry: Geometry,
}

/// Placeholder positions a shape tree can inherit from.
#[derive(Debug, Clone, Default)]
pub(crate) struct InheritedPositions {
    layout: Vec<PlaceholderSlot>,
    master: Vec<PlaceholderSlot>,
}

impl InheritedPositions {
    pub fn new(layout: Vec<PlaceholderSlot>, master: Vec<PlaceholderSlot>) -> Self {
        Self { layout, master }
    }

    /// Layout placeholder with the same `idx`, then with the same type, then
    /// master placeholder with the same base type.
    pub fn position(&self, role: &PlaceholderRole, idx: u32) -> Option<Geometry> {
        let base = master_role(role);
        self.layout
            .iter()
            .find(|s| s.idx == idx)
            .or_else(|| self.layout.iter().find(|s| s.role == *role))
            .or_else(|| self.master.iter().find(|s| s.role == base))
            .map(|s| s.geometry)
    }
}

/// Masters only carry title, body and footer-area placeholders.
fn master_role(role: &PlaceholderRole) -> PlaceholderRole {
    match role {
        PlaceholderRole::Title | PlaceholderRole::CenterTitle | PlaceholderRole::VerticalTitle => {
            PlaceholderRole::Title
        }
        PlaceholderRole::Date => PlaceholderRole::Date,
        PlaceholderRole::Footer => PlaceholderRole::Footer,
        PlaceholderRole::SlideNumber => PlaceholderRole::SlideNumber,
        _ => PlaceholderRole::Body,
    }
}

/// Parsed shape tree.
#[derive(Debug, Default)]
pub(crate) struct ShapeTree {
    /// Top-level shapes in authoring order.
    pub shapes: Vec<Shape>,
    /// Every placeholder with a known position, nested ones included.
    pub placeholders: Vec<PlaceholderSlot>,
}

impl ShapeTree {
    /// First placeholder shape with the given role, searching groups too.
    pub fn find_placeholder(&self, role: &PlaceholderRole) -> Option<&Shape> {
        fn find<'s>(shapes: &'s [Shape], role: &PlaceholderRole) -> Option<&'s Shape> {
            shapes.iter().find_map(|s| match s.kind {
                ShapeKind::Group(ref children) => find(children, role),
                _ if s.placeholder.as_ref() == Some(role) => Some(s),
                _ => None,
            })
        }
        find(&self.shapes, role)
    }
}

/// Parse shape tree markup into shapes.
pub(crate) fn parse_shape_tree(
    xml: &str,
    resolver: &mut dyn PartResolver,
    inherited: &InheritedPositions,
) -> Result<ShapeTree> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut parser = TreeParser::new(resolver, inherited);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.open(e),
            Ok(Event::Empty(ref e)) => {
                parser.open(e);
                parser.close(local_name(e.name().as_ref()));
            }
            Ok(Event::End(ref e)) => parser.close(local_name(e.name().as_ref())),
            Ok(Event::Text(ref e)) => {
                if parser.wants_text() {
                    let text = e.unescape().unwrap_or_default();
                    parser.text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(parser.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Text,
    Picture,
    Frame,
    Group,
    Connector,
}

/// A shape whose closing tag has not been seen yet.
#[derive(Debug)]
struct ShapeBuilder {
    pending: Pending,
    name: Option<String>,
    placeholder: Option<(PlaceholderRole, u32)>,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    paragraphs: Vec<Paragraph>,
    image_rel: Option<String>,
    table: Option<Vec<Vec<String>>>,
    children: Vec<Shape>,
}

impl ShapeBuilder {
    fn new(pending: Pending) -> Self {
        Self {
            pending,
            name: None,
            placeholder: None,
            offset: None,
            extent: None,
            paragraphs: Vec::new(),
            image_rel: None,
            table: None,
            children: Vec::new(),
        }
    }
}

struct TreeParser<'a> {
    resolver: &'a mut dyn PartResolver,
    inherited: &'a InheritedPositions,
    stack: Vec<ShapeBuilder>,
    shapes: Vec<Shape>,
    placeholders: Vec<PlaceholderSlot>,
    /// Nesting inside `mc:AlternateContent`, which is skipped entirely.
    skip_depth: usize,
    in_xfrm: bool,
    /// Nesting inside a run's `a:rPr`; 1 means directly inside it.
    rpr_depth: usize,
    in_run_fill: bool,
    in_text: bool,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    row: Option<Vec<String>>,
    cell: Option<Vec<String>>,
}

impl<'a> TreeParser<'a> {
    fn new(resolver: &'a mut dyn PartResolver, inherited: &'a InheritedPositions) -> Self {
        Self {
            resolver,
            inherited,
            stack: Vec::new(),
            shapes: Vec::new(),
            placeholders: Vec::new(),
            skip_depth: 0,
            in_xfrm: false,
            rpr_depth: 0,
            in_run_fill: false,
            in_text: false,
            paragraph: None,
            run: None,
            row: None,
            cell: None,
        }
    }

    fn wants_text(&self) -> bool {
        self.skip_depth == 0 && self.in_text && self.run.is_some()
    }

    fn text(&mut self, text: &str) {
        if let Some(ref mut run) = self.run {
            run.text.push_str(text);
        }
    }

    fn open(&mut self, e: &BytesStart) {
        let name = e.name();
        let local = local_name(name.as_ref());

        if local == b"AlternateContent" {
            self.skip_depth += 1;
            return;
        }
        if self.skip_depth > 0 {
            return;
        }

        if self.rpr_depth > 0 {
            self.open_in_run_properties(local, e);
            self.rpr_depth += 1;
            return;
        }

        match local {
            b"sp" => self.stack.push(ShapeBuilder::new(Pending::Text)),
            b"pic" => self.stack.push(ShapeBuilder::new(Pending::Picture)),
            b"graphicFrame" => self.stack.push(ShapeBuilder::new(Pending::Frame)),
            b"grpSp" => self.stack.push(ShapeBuilder::new(Pending::Group)),
            b"cxnSp" => self.stack.push(ShapeBuilder::new(Pending::Connector)),
            b"cNvPr" => {
                if let Some(shape) = self.stack.last_mut() {
                    if shape.name.is_none() {
                        shape.name = Some(attr(e, b"name").unwrap_or_default());
                    }
                }
            }
            b"ph" => {
                if let Some(shape) = self.stack.last_mut() {
                    if shape.placeholder.is_none() {
                        let role = PlaceholderRole::from_type_attr(attr(e, b"type").as_deref());
                        let idx = attr(e, b"idx").and_then(|v| v.parse().ok()).unwrap_or(0);
                        shape.placeholder = Some((role, idx));
                    }
                }
            }
            b"xfrm" => self.in_xfrm = !self.stack.is_empty(),
            b"off" if self.in_xfrm => {
                if let Some(shape) = self.stack.last_mut() {
                    if shape.offset.is_none() {
                        shape.offset = int_attr(e, b"x").zip(int_attr(e, b"y"));
                    }
                }
            }
            b"ext" if self.in_xfrm => {
                if let Some(shape) = self.stack.last_mut() {
                    if shape.extent.is_none() {
                        shape.extent = int_attr(e, b"cx").zip(int_attr(e, b"cy"));
                    }
                }
            }
            b"blip" => {
                if let Some(shape) = self.stack.last_mut() {
                    if shape.pending == Pending::Picture && shape.image_rel.is_none() {
                        shape.image_rel = attr(e, b"embed");
                    }
                }
            }
            b"tbl" => {
                if let Some(shape) = self.stack.last_mut() {
                    shape.table = Some(Vec::new());
                }
            }
            b"tr" => self.row = Some(Vec::new()),
            b"tc" => self.cell = Some(Vec::new()),
            b"p" => self.paragraph = Some(Paragraph::new(0, Vec::new())),
            b"pPr" => {
                if let Some(ref mut paragraph) = self.paragraph {
                    paragraph.level = attr(e, b"lvl").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"r" | b"fld" => {
                if self.paragraph.is_some() {
                    self.run = Some(Run::default());
                }
            }
            b"br" => {
                if let Some(ref mut paragraph) = self.paragraph {
                    paragraph.runs.push(Run::plain("\n"));
                }
            }
            b"rPr" => {
                if let Some(ref mut run) = self.run {
                    run.bold = bool_attr(e, b"b");
                    run.italic = bool_attr(e, b"i");
                    run.underline = attr(e, b"u").map(|u| u != "none").unwrap_or(false);
                    self.rpr_depth = 1;
                }
            }
            b"t" => self.in_text = self.run.is_some(),
            _ => {}
        }
    }

    /// Children of a run's `a:rPr`. Only direct fills count, so outline and
    /// underline fills do not recolor the text.
    fn open_in_run_properties(&mut self, local: &[u8], e: &BytesStart) {
        let Some(ref mut run) = self.run else {
            return;
        };
        match (self.rpr_depth, local) {
            (1, b"solidFill") => self.in_run_fill = true,
            (1, b"hlinkClick") => {
                // An empty id is an action without a target, such as a slide jump.
                if let Some(rel_id) = attr(e, b"id").filter(|id| !id.is_empty()) {
                    let target = self.resolver.hyperlink_target(&rel_id);
                    run.hyperlink = Some(Hyperlink { rel_id, target });
                }
            }
            (2, b"srgbClr") if self.in_run_fill => {
                run.color = attr(e, b"val")
                    .and_then(|v| Rgb::from_hex(&v))
                    .map(Color::Rgb);
            }
            (2, b"schemeClr") if self.in_run_fill => {
                run.color = attr(e, b"val").map(|v| Color::Theme(ThemeColor::from_scheme_value(&v)));
            }
            _ => {}
        }
    }

    fn close(&mut self, local: &[u8]) {
        if self.skip_depth > 0 {
            if local == b"AlternateContent" {
                self.skip_depth -= 1;
            }
            return;
        }

        if self.rpr_depth > 0 {
            self.rpr_depth -= 1;
            if local == b"solidFill" {
                self.in_run_fill = false;
            }
            return;
        }

        match local {
            b"sp" | b"pic" | b"graphicFrame" | b"grpSp" | b"cxnSp" => {
                if let Some(builder) = self.stack.pop() {
                    let shape = self.build(builder);
                    match self.stack.last_mut() {
                        Some(parent) => parent.children.push(shape),
                        None => self.shapes.push(shape),
                    }
                }
            }
            b"xfrm" => self.in_xfrm = false,
            b"t" => self.in_text = false,
            b"r" | b"fld" => {
                if let (Some(run), Some(paragraph)) = (self.run.take(), self.paragraph.as_mut()) {
                    paragraph.runs.push(run);
                }
            }
            b"p" => {
                if let Some(paragraph) = self.paragraph.take() {
                    if let Some(ref mut cell) = self.cell {
                        cell.push(paragraph.text());
                    } else if let Some(shape) = self.stack.last_mut() {
                        shape.paragraphs.push(paragraph);
                    }
                }
            }
            b"tc" => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.push(cell.join("\n"));
                }
            }
            b"tr" => {
                if let Some(row) = self.row.take() {
                    if let Some(table) = self.stack.last_mut().and_then(|s| s.table.as_mut()) {
                        table.push(row);
                    }
                }
            }
            _ => {}
        }
    }

    fn build(&mut self, builder: ShapeBuilder) -> Shape {
        let name = builder.name.unwrap_or_default();

        let kind = match builder.pending {
            Pending::Text => ShapeKind::Text,
            Pending::Picture => match builder.image_rel {
                Some(ref rel_id) => match self.resolver.image(rel_id) {
                    Some(image) => ShapeKind::Picture(image),
                    None => {
                        log::warn!("Picture '{}' refers to missing image '{}'", name, rel_id);
                        ShapeKind::Other
                    }
                },
                None => ShapeKind::Other,
            },
            Pending::Frame => match builder.table {
                Some(rows) => ShapeKind::Table(Table { rows }),
                None => ShapeKind::Other,
            },
            Pending::Group => ShapeKind::Group(builder.children),
            Pending::Connector => ShapeKind::Other,
        };

        let mut shape = Shape::new(name, kind);
        if builder.pending == Pending::Text {
            shape.text_frame = Some(TextFrame::new(builder.paragraphs));
        }

        shape.geometry = match builder.offset {
            Some((left, top)) => {
                let (width, height) = builder.extent.unwrap_or((0, 0));
                Some(Geometry {
                    top,
                    left,
                    width,
                    height,
                })
            }
            None => builder
                .placeholder
                .as_ref()
                .and_then(|(role, idx)| self.inherited.position(role, *idx)),
        };

        if let Some((role, idx)) = builder.placeholder {
            if let Some(geometry) = shape.geometry {
                self.placeholders.push(PlaceholderSlot {
                    role: role.clone(),
                    idx,
                    geometry,
                });
            }
            shape.placeholder = Some(role);
        }

        shape
    }

    fn finish(self) -> ShapeTree {
        ShapeTree {
            shapes: self.shapes,
            placeholders: self.placeholders,
        }
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == name)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string())
        })
}

fn int_attr(e: &BytesStart, name: &[u8]) -> Option<i64> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

fn bool_attr(e: &BytesStart, name: &[u8]) -> bool {
    matches!(attr(e, name).as_deref(), Some("1") | Some("true"))
}
