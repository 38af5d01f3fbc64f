//! In-memory test documents

use crate::document::Document;
use crate::stext::StextOptions;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    }
}

/// Build a document whose pages each carry their own content stream, all
/// sharing one indirect Helvetica font under the resource name `F1`.
/// Page `i` gets a media box `600 + i` points wide.
fn build(contents: Vec<Vec<u8>>, extra_resources: Dictionary) -> lopdf::Document {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(helvetica());

    let mut kids = Vec::new();
    for (i, content) in contents.into_iter().enumerate() {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let mut resources = extra_resources.clone();
        let mut fonts = match resources.get(b"Font").and_then(Object::as_dict) {
            Ok(fonts) => fonts.clone(),
            Err(_) => Dictionary::new(),
        };
        fonts.set("F1", Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Integer(600 + i as i64), 792.into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn text_content(text: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap()
}

/// `num_pages` pages reading `"{prefix}-Page-{n}"` (1-based).
pub(crate) fn sample_document(num_pages: usize, prefix: &str) -> Document {
    let contents = (1..=num_pages)
        .map(|n| text_content(&format!("{}-Page-{}", prefix, n)))
        .collect();
    Document::from_lopdf(build(contents, Dictionary::new()))
}

/// One page with the given raw content stream.
pub(crate) fn document_with_content(content: &[u8]) -> Document {
    Document::from_lopdf(build(vec![content.to_vec()], Dictionary::new()))
}

/// One page with a 2x1 image XObject `Im1` drawn at 200x100 from (50, 600).
pub(crate) fn image_document() -> Document {
    let mut doc = build(vec![b"q 200 0 0 100 50 600 cm /Im1 Do Q".to_vec()], Dictionary::new());
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255],
    ));
    attach_xobject(&mut doc, "Im1", image_id);
    Document::from_lopdf(doc)
}

/// One page drawing a form XObject `Fm1` translated to (100, 700).
pub(crate) fn form_document(form_content: &[u8]) -> Document {
    let mut doc = build(vec![b"/Fm1 Do".to_vec()], Dictionary::new());
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 200.into(), 50.into()],
            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 700.into()],
        },
        form_content.to_vec(),
    ));
    attach_xobject(&mut doc, "Fm1", form_id);
    Document::from_lopdf(doc)
}

/// One page with font `F2`: FirstChar 65, widths A=600 B=700.
pub(crate) fn document_with_widths(content: &[u8]) -> Document {
    let mut fonts = Dictionary::new();
    fonts.set(
        "F2",
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Custom",
            "FirstChar" => 65,
            "LastChar" => 66,
            "Widths" => vec![600.into(), 700.into()],
        },
    );
    let mut resources = Dictionary::new();
    resources.set("Font", fonts);
    Document::from_lopdf(build(vec![content.to_vec()], resources))
}

/// One page with font `F2`, built by `font` so it can add objects such as a
/// ToUnicode stream.
pub(crate) fn document_with_font(
    content: &[u8],
    font: impl FnOnce(&mut lopdf::Document) -> Dictionary,
) -> Document {
    let mut doc = build(vec![content.to_vec()], Dictionary::new());
    let font = font(&mut doc);
    let font_id = doc.add_object(font);
    let resources = first_page_resources(&mut doc);
    if let Ok(fonts) = resources.get_mut(b"Font").and_then(Object::as_dict_mut) {
        fonts.set("F2", Object::Reference(font_id));
    }
    Document::from_lopdf(doc)
}

/// One page with extra entries, e.g. `/Rotate` or `/CropBox`, on its dictionary.
pub(crate) fn document_with_page_attributes(content: &[u8], attributes: Dictionary) -> Document {
    let mut doc = build(vec![content.to_vec()], Dictionary::new());
    let page_id = *doc.get_pages().values().next().unwrap();
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .unwrap();
    for (key, value) in attributes.iter() {
        page.set(key.clone(), value.clone());
    }
    Document::from_lopdf(doc)
}

fn first_page_resources(doc: &mut lopdf::Document) -> &mut Dictionary {
    let page_id = *doc.get_pages().values().next().unwrap();
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .and_then(|page| page.get_mut(b"Resources"))
        .and_then(Object::as_dict_mut)
        .unwrap()
}

fn attach_xobject(doc: &mut lopdf::Document, name: &str, id: ObjectId) {
    let resources = first_page_resources(doc);
    let mut xobjects = Dictionary::new();
    xobjects.set(name, Object::Reference(id));
    resources.set("XObject", xobjects);
}

/// Id of the shared `F1` font object.
pub(crate) fn font_id(doc: &Document) -> ObjectId {
    let page = doc.load_page(0).unwrap();
    page.resources()
        .unwrap()
        .unwrap()
        .get(b"Font")
        .and_then(Object::as_dict)
        .and_then(|fonts| fonts.get(b"F1"))
        .and_then(Object::as_reference)
        .unwrap()
}

/// Text of one page with line breaks trimmed.
pub(crate) fn page_text(doc: &Document, index: usize) -> String {
    doc.load_page(index)
        .unwrap()
        .structured_text(&StextOptions::default())
        .unwrap()
        .text()
        .trim_end()
        .to_string()
}

/// Media box widths of all pages; identifies pages from `sample_document`.
pub(crate) fn page_widths(doc: &Document) -> Vec<f64> {
    (0..doc.page_count().unwrap())
        .map(|i| doc.load_page(i).unwrap().media_box().unwrap().width())
        .collect()
}
