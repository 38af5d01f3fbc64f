//! Documents built through the public API

#![allow(dead_code)]

use lopdf::{Dictionary, Object};
use pdfgraft_core::{Document, Rect, StextOptions};

/// `num_pages` pages reading `"{prefix}-{n}"`; page `i` is `500 + i` points
/// wide. Every page shares one indirect Helvetica font.
pub fn build_document(num_pages: usize, prefix: &str) -> Document {
    let mut doc = Document::new();
    let font = doc
        .add_object(Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ])))
        .unwrap();

    for i in 0..num_pages {
        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let content = format!("BT /F1 11 Tf 40 740 Td ({}-{}) Tj ET", prefix, i + 1);
        let page = doc
            .new_page(
                Rect::new(0.0, 0.0, 500.0 + i as f64, 800.0),
                0,
                resources,
                content.as_bytes(),
            )
            .unwrap();
        doc.insert_page(-1, page).unwrap();
    }
    doc
}

pub fn widths(doc: &Document) -> Vec<f64> {
    (0..doc.page_count().unwrap())
        .map(|i| doc.load_page(i).unwrap().media_box().unwrap().width())
        .collect()
}

pub fn texts(doc: &Document) -> Vec<String> {
    (0..doc.page_count().unwrap())
        .map(|i| {
            doc.load_page(i)
                .unwrap()
                .structured_text(&StextOptions::default())
                .unwrap()
                .text()
        })
        .collect()
}
