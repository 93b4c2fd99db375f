//! PPTX extraction: read slides, text and pictures out of the OOXML container.
//!
//! A `.pptx` is a ZIP of XML parts. The parts that matter here:
//!
//! ```text
//! ppt/presentation.xml              p:sldIdLst → r:id per slide, in deck order
//! ppt/_rels/presentation.xml.rels   r:id → slides/slideN.xml
//! ppt/slides/slideN.xml             p:sp (text) / p:pic (picture) shapes
//! ppt/slides/_rels/slideN.xml.rels  r:embed → ../media/imageM.png
//! ```
//!
//! Only raster media the `image` crate can fully decode are kept; vector formats
//! (EMF, WMF, SVG) and non-picture graphics (charts, SmartArt) are logged and
//! skipped.

use crate::error::EbookError;
use crate::model::{AssetKind, Slide, VisualAsset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Text shapes shorter than this may stand in for a missing title placeholder.
const MAX_FALLBACK_TITLE_CHARS: usize = 100;

/// Shape-name keywords that mark a picture as a diagram.
const DIAGRAM_NAME_KEYWORDS: &[&str] = &[
    "diagram",
    "flowchart",
    "chart",
    "flow",
    "process",
    "smartart",
    "graphic",
];

/// Slide-text keywords that mark every picture on the slide as a diagram.
const DIAGRAM_TEXT_KEYWORDS: &[&str] = &[
    "diagram",
    "flowchart",
    "process",
    "workflow",
    "chart",
    "flow",
    "steps",
    "procedure",
];

/// Extract every slide of the deck in presentation order.
///
/// `name` is only used in error messages.
pub fn extract_slides(name: &str, bytes: &[u8]) -> Result<Vec<Slide>, EbookError> {
    let corrupt = |detail: String| EbookError::CorruptPresentation {
        name: name.to_string(),
        detail,
    };

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(format!("not a valid ZIP: {e}")))?;

    let presentation = read_text(&mut archive, PRESENTATION_PART)
        .ok_or_else(|| corrupt(format!("missing {PRESENTATION_PART}")))?;
    let rels_xml = read_text(&mut archive, PRESENTATION_RELS)
        .ok_or_else(|| corrupt(format!("missing {PRESENTATION_RELS}")))?;

    let rels = parse_relationships(&rels_xml).map_err(corrupt)?;
    let order = parse_slide_id_list(&presentation).map_err(corrupt)?;
    let slide_paths = slide_order(&rels, &order);

    if slide_paths.is_empty() {
        return Err(EbookError::EmptyPresentation {
            name: name.to_string(),
        });
    }

    let mut slides = Vec::with_capacity(slide_paths.len());
    for (i, path) in slide_paths.iter().enumerate() {
        let index = i + 1;
        let xml = read_text(&mut archive, path)
            .ok_or_else(|| corrupt(format!("missing slide part {path}")))?;
        let slide = parse_slide(&mut archive, index, path, &xml).map_err(corrupt)?;
        debug!(
            "Slide {}: title {:?}, {} body chars, {} images",
            index,
            slide.title,
            slide.body.len(),
            slide.assets.len()
        );
        slides.push(slide);
    }

    let images: usize = slides.iter().map(|s| s.assets.len()).sum();
    info!("Extracted {} slides, {} images", slides.len(), images);
    Ok(slides)
}

// ── Relationships & ordering ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

impl Relationship {
    fn is_slide(&self) -> bool {
        self.rel_type.ends_with("/slide")
    }
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("error parsing relationships: {e}")),
            _ => {}
        }
    }
    Ok(rels)
}

/// `r:id` values of `p:sldId` entries, in deck order.
fn parse_slide_id_list(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // The plain `id` attribute is a numeric slide id; the
                // namespaced one is the relationship id.
                let rid = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    (key.contains(&b':') && local_name(key) == b"id")
                        .then(|| String::from_utf8_lossy(&attr.value).into_owned())
                });
                if let Some(rid) = rid {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("error parsing {PRESENTATION_PART}: {e}")),
            _ => {}
        }
    }
    Ok(ids)
}

/// Resolve slide part paths, preferring `sldIdLst` order.
fn slide_order(rels: &[Relationship], order: &[String]) -> Vec<String> {
    let by_id: HashMap<&str, &Relationship> = rels
        .iter()
        .filter(|r| r.is_slide())
        .map(|r| (r.id.as_str(), r))
        .collect();

    let listed: Vec<String> = order
        .iter()
        .filter_map(|rid| by_id.get(rid.as_str()))
        .map(|r| resolve_target("ppt", &r.target))
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    // No usable sldIdLst: fall back to numeric order of the slide parts.
    let mut slides: Vec<(Option<usize>, String)> = rels
        .iter()
        .filter(|r| r.is_slide())
        .map(|r| (trailing_number(&r.target), resolve_target("ppt", &r.target)))
        .collect();
    slides.sort_by(|a, b| match (a.0, b.0) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    slides.into_iter().map(|(_, path)| path).collect()
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// `ppt/slides/slide12.xml` → `("ppt/slides", "slide12.xml")`.
fn split_part_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Extract the number from strings like `slides/slide12.xml`.
fn trailing_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml");
    let stem = s.trim_end_matches(|c: char| c.is_ascii_digit());
    s[stem.len()..].parse().ok()
}

// ── Slide parsing ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    Text,
    Picture,
    Graphic,
}

#[derive(Debug)]
struct Shape {
    kind: ShapeKind,
    name: String,
    placeholder: Option<String>,
    paragraphs: Vec<String>,
    embed: Option<String>,
}

impl Shape {
    fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            placeholder: None,
            paragraphs: Vec::new(),
            embed: None,
        }
    }

    fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn is_title_placeholder(&self) -> bool {
        matches!(self.placeholder.as_deref(), Some("title") | Some("ctrTitle"))
    }
}

fn parse_slide<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    path: &str,
    xml: &str,
) -> Result<Slide, String> {
    let shapes = parse_shapes(xml).map_err(|e| format!("{path}: {e}"))?;

    let texts: Vec<(usize, String)> = shapes
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == ShapeKind::Text)
        .map(|(i, s)| (i, s.text()))
        .filter(|(_, t)| !t.is_empty())
        .collect();

    let title_shape = texts
        .iter()
        .find(|(i, _)| shapes[*i].is_title_placeholder())
        .or_else(|| {
            texts
                .iter()
                .find(|(_, t)| t.chars().count() < MAX_FALLBACK_TITLE_CHARS)
        })
        .map(|(i, _)| *i);

    let title = title_shape
        .and_then(|ti| texts.iter().find(|(i, _)| *i == ti))
        .map(|(_, t)| t.replace('\n', " "))
        .unwrap_or_default();
    let body = texts
        .iter()
        .filter(|(i, _)| Some(*i) != title_shape)
        .map(|(_, t)| t.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let slide_text = format!("{title} {body}").to_lowercase();
    let text_says_diagram = DIAGRAM_TEXT_KEYWORDS
        .iter()
        .any(|k| slide_text.contains(k));

    let (dir, file) = split_part_path(path);
    let rels_path = format!("{dir}/_rels/{file}.rels");
    let rels = match read_text(archive, &rels_path) {
        Some(xml) => parse_relationships(&xml)?,
        None => Vec::new(),
    };

    let mut slide = Slide::new(index, title, body);
    for shape in &shapes {
        match shape.kind {
            ShapeKind::Picture => {
                if let Some(asset) = load_picture(archive, index, dir, shape, &rels, text_says_diagram)
                {
                    slide.assets.push(asset);
                }
            }
            ShapeKind::Graphic => {
                info!(
                    "Slide {}: graphic frame '{}' (chart/SmartArt/table) is not rendered",
                    index, shape.name
                );
            }
            ShapeKind::Text => {}
        }
    }
    Ok(slide)
}

fn load_picture<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    dir: &str,
    shape: &Shape,
    rels: &[Relationship],
    text_says_diagram: bool,
) -> Option<VisualAsset> {
    let embed = shape.embed.as_deref()?;
    let Some(rel) = rels.iter().find(|r| r.id == embed) else {
        warn!("Slide {}: picture '{}' references unknown relationship {}", index, shape.name, embed);
        return None;
    };
    if rel.target.starts_with("http://") || rel.target.starts_with("https://") {
        warn!("Slide {}: skipping linked picture {}", index, rel.target);
        return None;
    }

    let media_path = resolve_target(dir, &rel.target);
    let Some(data) = read_bytes(archive, &media_path) else {
        warn!("Slide {}: picture part {} is missing", index, media_path);
        return None;
    };

    let format = match image::guess_format(&data) {
        Ok(f) => f,
        Err(_) => {
            warn!(
                "Slide {}: skipping non-raster picture {} ({} bytes)",
                index,
                media_path,
                data.len()
            );
            return None;
        }
    };
    if let Err(e) = image::load_from_memory_with_format(&data, format) {
        warn!(
            "Slide {}: skipping undecodable picture {} ({:?}): {}",
            index, media_path, format, e
        );
        return None;
    }

    let name_lower = shape.name.to_lowercase();
    let kind = if text_says_diagram || DIAGRAM_NAME_KEYWORDS.iter().any(|k| name_lower.contains(k)) {
        AssetKind::Diagram
    } else {
        AssetKind::Photo
    };
    debug!("Slide {}: {} {} ({} bytes)", index, kind, media_path, data.len());

    Some(
        VisualAsset::new(data, kind)
            .with_media_type(format.to_mime_type())
            .with_name(shape.name.clone()),
    )
}

/// Collect text, picture and graphic-frame shapes in document order.
fn parse_shapes(xml: &str) -> Result<Vec<Shape>, String> {
    let mut reader = Reader::from_str(xml);
    // Run boundaries can fall mid-word; keep whitespace inside a:t.
    reader.trim_text(false);

    let mut shapes = Vec::new();
    let mut current: Option<Shape> = None;
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                match local_name(e.name().as_ref()) {
                    b"sp" => current = Some(Shape::new(ShapeKind::Text)),
                    b"pic" => current = Some(Shape::new(ShapeKind::Picture)),
                    b"graphicFrame" => current = Some(Shape::new(ShapeKind::Graphic)),
                    b"p" => {
                        if let Some(shape) = current.as_mut() {
                            shape.paragraphs.push(String::new());
                        }
                    }
                    b"t" => in_text_run = current.is_some(),
                    _ => {
                        if let Some(shape) = current.as_mut() {
                            apply_properties(shape, e);
                        }
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(shape) = current.as_mut() {
                    match local_name(e.name().as_ref()) {
                        b"br" => {
                            if let Some(p) = shape.paragraphs.last_mut() {
                                p.push('\n');
                            }
                        }
                        _ => apply_properties(shape, e),
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text_run {
                    if let Some(p) = current.as_mut().and_then(|s| s.paragraphs.last_mut()) {
                        p.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text_run = false,
                b"sp" | b"pic" | b"graphicFrame" => {
                    if let Some(shape) = current.take() {
                        shapes.push(shape);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at byte {}: {e}", reader.buffer_position())),
            _ => {}
        }
    }
    Ok(shapes)
}

/// Pick up shape name, placeholder type and picture reference.
fn apply_properties(shape: &mut Shape, e: &BytesStart<'_>) {
    match local_name(e.name().as_ref()) {
        b"cNvPr" if shape.name.is_empty() => {
            if let Some(name) = attribute(e, b"name") {
                shape.name = name;
            }
        }
        b"ph" => {
            // A placeholder without a type is a body placeholder.
            shape.placeholder = Some(attribute(e, b"type").unwrap_or_else(|| "body".to_string()));
        }
        b"blip" => {
            shape.embed = e.attributes().flatten().find_map(|attr| {
                (local_name(attr.key.as_ref()) == b"embed")
                    .then(|| String::from_utf8_lossy(&attr.value).into_owned())
            });
        }
        _ => {}
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

// ── Archive helpers ──────────────────────────────────────────────────────

fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<Vec<u8>> {
    let mut file = archive.by_name(path).ok()?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf).ok()?;
    Some(buf)
}

fn read_text<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let bytes = read_bytes(archive, path)?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Strip the namespace prefix from an element or attribute name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
