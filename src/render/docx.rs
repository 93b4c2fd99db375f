//! DOCX renderer built on `docx-rs`.
//!
//! Word processors paginate on their own, so there is no layout pass: the
//! blocks become styled paragraphs, and the only page breaks are the one
//! after the title page and (optionally) one before each chapter.

use crate::error::RenderError;
use crate::model::{AssetKind, Block};
use crate::render::{decode_opaque, encode_png, RenderMetadata};
use docx_rs::{AlignmentType, BreakType, Docx, Header, Paragraph, Pic, Run, Style, StyleType};
use quick_xml::escape::escape;
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const FORMAT: &str = "DOCX";

const EMU_PER_INCH: u32 = 914_400;
const PHOTO_WIDTH_IN: f32 = 5.0;
const DIAGRAM_WIDTH_IN: f32 = 6.0;

const CAPTION_STYLE: &str = "Caption";

const CORE_PROPERTIES_PART: &str = "docProps/core.xml";
const CORE_PROPERTIES_END: &str = "</cp:coreProperties>";

// Heading sizes in half-points, matching the PDF's 20/18/16/14pt.
const HEADING_STYLES: [(&str, &str, usize); 4] = [
    ("Heading1", "heading 1", 40),
    ("Heading2", "heading 2", 36),
    ("Heading3", "heading 3", 32),
    ("Heading4", "heading 4", 28),
];

fn heading_style(level: u8) -> &'static str {
    let i = (level.clamp(1, 4) - 1) as usize;
    HEADING_STYLES[i].0
}

/// Inline image size in EMU: fixed width per kind, height by aspect ratio.
fn image_extent(width_px: u32, height_px: u32, kind: AssetKind) -> (u32, u32) {
    let width_in = match kind {
        AssetKind::Photo => PHOTO_WIDTH_IN,
        AssetKind::Diagram => DIAGRAM_WIDTH_IN,
    };
    let width = (width_in * EMU_PER_INCH as f32) as u32;
    let height = (width as f64 * height_px as f64 / width_px.max(1) as f64) as u32;
    (width, height)
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

fn centered(run: Run) -> Paragraph {
    Paragraph::new().add_run(run).align(AlignmentType::Center)
}

fn styles(docx: Docx) -> Docx {
    let docx = HEADING_STYLES.iter().fold(docx, |docx, (id, name, size)| {
        docx.add_style(
            Style::new(*id, StyleType::Paragraph)
                .name(*name)
                .size(*size)
                .bold(),
        )
    });
    docx.add_style(
        Style::new(CAPTION_STYLE, StyleType::Paragraph)
            .name("caption")
            .size(20)
            .italic(),
    )
}

fn title_page(docx: Docx, meta: &RenderMetadata) -> Docx {
    let mut docx = docx
        .add_paragraph(centered(Run::new().add_text(&meta.title).bold().size(48)))
        .add_paragraph(centered(
            Run::new().add_text(format!("by {}", meta.author)).size(28),
        ));
    if !meta.date.is_empty() {
        docx = docx.add_paragraph(centered(
            Run::new()
                .add_text(format!("Generated on {}", meta.date))
                .italic()
                .size(22),
        ));
    }
    docx.add_paragraph(page_break())
}

/// Render the blocks as a DOCX document.
pub fn render_docx(blocks: &[Block], meta: &RenderMetadata) -> Result<Vec<u8>, RenderError> {
    let header = Header::new().add_paragraph(
        Paragraph::new().add_run(Run::new().add_text(&meta.header_text).italic().size(18)),
    );
    let mut docx = title_page(styles(Docx::new()).header(header), meta);

    let mut chapters_seen = 0;
    let mut images = 0;
    for block in blocks {
        docx = match block {
            Block::Heading {
                level,
                text,
                chapter,
            } => {
                if chapter.is_some() {
                    chapters_seen += 1;
                    if meta.chapter_starts_new_page && chapters_seen > 1 {
                        docx = docx.add_paragraph(page_break());
                    }
                }
                docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text))
                        .style(heading_style(*level)),
                )
            }
            Block::Paragraph(text) => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            }
            Block::Image { asset, caption } => {
                let undecodable = |detail: String| RenderError::UndecodableImage {
                    format: FORMAT.to_string(),
                    caption: caption.clone(),
                    detail,
                };
                let rgb = decode_opaque(asset).map_err(undecodable)?;
                let png = encode_png(&rgb).map_err(undecodable)?;
                let (w, h) = image_extent(rgb.width(), rgb.height(), asset.kind);
                images += 1;
                docx.add_paragraph(centered(Run::new().add_image(Pic::new(&png).size(w, h))))
                    .add_paragraph(
                        centered(Run::new().add_text(caption).italic()).style(CAPTION_STYLE),
                    )
            }
        };
    }

    let encode = |detail: String| RenderError::Encode {
        format: FORMAT.to_string(),
        detail,
    };
    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| encode(e.to_string()))?;
    let bytes = with_core_properties(&buf.into_inner(), meta).map_err(encode)?;
    debug!("DOCX: {} blocks, {} images", blocks.len(), images);
    Ok(bytes)
}

/// Copy the packed document, writing title and author into `docProps/core.xml`.
///
/// `docx-rs` only exposes the created/modified dates, so the core part is
/// patched after packing. Every other part is copied without recompression.
fn with_core_properties(packed: &[u8], meta: &RenderMetadata) -> Result<Vec<u8>, String> {
    let mut archive = ZipArchive::new(Cursor::new(packed)).map_err(|e| e.to_string())?;
    let mut out = ZipWriter::new(Cursor::new(Vec::with_capacity(packed.len())));

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| e.to_string())?;
        if file.name() != CORE_PROPERTIES_PART {
            out.raw_copy_file(file).map_err(|e| e.to_string())?;
            continue;
        }
        let mut xml = String::new();
        file.read_to_string(&mut xml).map_err(|e| e.to_string())?;
        out.start_file(CORE_PROPERTIES_PART, SimpleFileOptions::default())
            .map_err(|e| e.to_string())?;
        out.write_all(patch_core_xml(&xml, meta).as_bytes())
            .map_err(|e| e.to_string())?;
    }

    out.finish()
        .map(Cursor::into_inner)
        .map_err(|e| e.to_string())
}

fn patch_core_xml(xml: &str, meta: &RenderMetadata) -> String {
    let mut xml = match (xml.find("<dc:creator>"), xml.find("</dc:creator>")) {
        (Some(start), Some(end)) if start < end && !meta.author.is_empty() => format!(
            "{}<dc:creator>{}{}",
            &xml[..start],
            escape(meta.author.as_str()),
            &xml[end..]
        ),
        _ => xml.to_string(),
    };
    if !xml.contains("<dc:title>") {
        if let Some(pos) = xml.rfind(CORE_PROPERTIES_END) {
            xml.insert_str(pos, &format!("<dc:title>{}</dc:title>", escape(meta.title.as_str())));
        }
    }
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisualAsset;

    fn meta() -> RenderMetadata {
        RenderMetadata {
            title: "Systems Programming".into(),
            author: "Ada".into(),
            header_text: "Systems Programming Notes".into(),
            date: "January 01, 2026".into(),
            ..RenderMetadata::default()
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([200, 40, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    fn all_parts(bytes: &[u8]) -> String {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).unwrap();
            if file.name().ends_with(".xml") {
                file.read_to_string(&mut out).unwrap();
            }
        }
        out
    }

    #[test]
    fn headings_use_named_styles() {
        let blocks = vec![
            Block::chapter_start(1, "Chapter 1: Basics"),
            Block::heading(2, "Ownership"),
            Block::paragraph("Every value has one owner."),
        ];
        let bytes = render_docx(&blocks, &meta()).unwrap();
        let document = part(&bytes, "word/document.xml");
        assert!(document.contains("Heading1"));
        assert!(document.contains("Heading2"));
        assert!(document.contains("Chapter 1: Basics"));
        assert!(document.contains("Every value has one owner."));
        assert!(document.contains("Generated on January 01, 2026"));

        let styles = part(&bytes, "word/styles.xml");
        assert!(styles.contains("heading 1"));
        assert!(styles.contains("heading 4"));
    }

    #[test]
    fn core_properties_carry_title_and_author() {
        let meta = RenderMetadata {
            title: "Ops & Tooling".into(),
            author: "Ada <ops>".into(),
            ..meta()
        };
        let bytes = render_docx(&[Block::Paragraph("Body".into())], &meta).unwrap();
        let core = part(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>Ops &amp; Tooling</dc:title>"), "{core}");
        assert!(core.contains("<dc:creator>Ada &lt;ops&gt;</dc:creator>"), "{core}");
        assert!(part(&bytes, "word/document.xml").contains("Body"));
    }

    #[test]
    fn header_carries_header_text() {
        let bytes = render_docx(&[Block::chapter_start(1, "Chapter 1")], &meta()).unwrap();
        assert!(all_parts(&bytes).contains("Systems Programming Notes"));
    }

    #[test]
    fn images_are_embedded_with_captions() {
        let blocks = vec![
            Block::chapter_start(1, "Chapter 1"),
            Block::Image {
                asset: VisualAsset::new(png(40, 20), AssetKind::Diagram),
                caption: "Diagram 1.1: Pipeline".into(),
            },
        ];
        let bytes = render_docx(&blocks, &meta()).unwrap();
        let document = part(&bytes, "word/document.xml");
        assert!(document.contains("Diagram 1.1: Pipeline"));
        assert!(document.contains(CAPTION_STYLE));
        let zip = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        assert!(zip.file_names().any(|n| n.starts_with("word/media/")));
    }

    #[test]
    fn extent_follows_kind_and_aspect() {
        assert_eq!(image_extent(200, 100, AssetKind::Photo), (4_572_000, 2_286_000));
        assert_eq!(image_extent(100, 100, AssetKind::Diagram), (5_486_400, 5_486_400));
    }

    #[test]
    fn chapter_page_breaks_are_optional() {
        let blocks = vec![
            Block::chapter_start(1, "Chapter 1"),
            Block::paragraph("a"),
            Block::chapter_start(2, "Chapter 2"),
            Block::paragraph("b"),
        ];
        let count = |m: &RenderMetadata| {
            let bytes = render_docx(&blocks, m).unwrap();
            part(&bytes, "word/document.xml").matches("w:type=\"page\"").count()
        };
        let plain = count(&meta());
        let breaking = count(&RenderMetadata {
            chapter_starts_new_page: true,
            ..meta()
        });
        assert_eq!(breaking, plain + 1);
    }

    #[test]
    fn undecodable_image_is_a_render_error() {
        let blocks = vec![Block::Image {
            asset: VisualAsset::new(b"junk".to_vec(), AssetKind::Photo),
            caption: "Figure 1.1: Broken".into(),
        }];
        match render_docx(&blocks, &meta()).unwrap_err() {
            RenderError::UndecodableImage { format, .. } => assert_eq!(format, "DOCX"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_document_still_renders() {
        let bytes = render_docx(&[], &meta()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
