//! Synthetic PPTX decks for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// One slide: optional title, body text shapes, and (shape name, PNG) pictures.
pub struct DeckSlide {
    pub title: Option<String>,
    pub texts: Vec<String>,
    pub pictures: Vec<(String, Vec<u8>)>,
}

impl DeckSlide {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            texts: vec![body.to_string()],
            pictures: vec![],
        }
    }

    pub fn picture(mut self, name: &str, png: Vec<u8>) -> Self {
        self.pictures.push((name.to_string(), png));
        self
    }
}

pub fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(w, h, image::Rgb([30, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// `n` slides titled "Topic i" with a two-line body.
pub fn simple_deck(n: usize) -> Vec<u8> {
    let slides: Vec<DeckSlide> = (1..=n)
        .map(|i| DeckSlide::new(&format!("Topic {i}"), &format!("Point {i}a\nPoint {i}b")))
        .collect();
    build_pptx(&slides)
}

fn text_shape(id: usize, name: &str, ph: Option<&str>, text: &str) -> String {
    let ph = ph
        .map(|t| format!(r#"<p:nvPr><p:ph type="{t}"/></p:nvPr>"#))
        .unwrap_or_else(|| "<p:nvPr/>".to_string());
    let paras: String = text
        .split('\n')
        .map(|line| format!("<a:p><a:r><a:t>{line}</a:t></a:r></a:p>"))
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/>{ph}</p:nvSpPr><p:txBody><a:bodyPr/>{paras}</p:txBody></p:sp>"#
    )
}

pub fn build_pptx(slides: &[DeckSlide]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();

    let sld_ids: String = (1..=slides.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + i, 100 + i))
        .collect();
    zip.start_file("ppt/presentation.xml", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>{sld_ids}</p:sldIdLst></p:presentation>"#
    )
    .unwrap();

    let rels: String = (1..=slides.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{i}.xml"/>"#,
                100 + i
            )
        })
        .collect();
    zip.start_file("ppt/_rels/presentation.xml.rels", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="rels">{rels}</Relationships>"#
    )
    .unwrap();

    let mut media = 0;
    for (i, slide) in slides.iter().enumerate() {
        let part = i + 1;
        let mut shapes = String::new();
        let mut slide_rels = String::new();
        let mut id = 2;
        if let Some(title) = &slide.title {
            shapes.push_str(&text_shape(id, "Title 1", Some("title"), title));
            id += 1;
        }
        for text in &slide.texts {
            shapes.push_str(&text_shape(id, "Content", None, text));
            id += 1;
        }
        for (j, (name, bytes)) in slide.pictures.iter().enumerate() {
            media += 1;
            let rid = format!("rId{}", j + 2);
            shapes.push_str(&format!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/></p:blipFill></p:pic>"#
            ));
            id += 1;
            slide_rels.push_str(&format!(
                r#"<Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image{media}.png"/>"#
            ));
            zip.start_file(format!("ppt/media/image{media}.png"), opts).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.start_file(format!("ppt/slides/slide{part}.xml"), opts).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>"#
        )
        .unwrap();
        zip.start_file(format!("ppt/slides/_rels/slide{part}.xml.rels"), opts).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="rels">{slide_rels}</Relationships>"#
        )
        .unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Text of one part of a ZIP container (e.g. `word/document.xml`).
pub fn zip_part(bytes: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut s = String::new();
    file.read_to_string(&mut s).unwrap();
    s
}
