//! Structured text: a positioned glyph and image event stream for a page
//!
//! The page content stream is interpreted just far enough to place glyphs and
//! images: text state, text and line matrices, the CTM and Form XObjects.
//! Output coordinates are device space: origin at the upper-left corner of the
//! visible (crop) box after the page's `/Rotate` is applied, y growing
//! downwards.

use crate::config::parse_bool;
use crate::document::{number, resolve, Page};
use crate::encoding::{glyph_name_to_char, parse_to_unicode, BaseEncoding, ToUnicodeMap};
use crate::error::PdfGraftError;
use crate::geometry::{Matrix, Point, Quad, Rect};
use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, warn};

const MAX_FORM_DEPTH: usize = 8;
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;
const GLYPH_ASCENT: f64 = 0.8;
const GLYPH_DESCENT: f64 = -0.2;

/// Options for [`Page::structured_text`], parsed from strings such as
/// `"preserve-whitespace,preserve-images"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StextOptions {
    pub preserve_whitespace: bool,
    pub preserve_images: bool,
}

impl FromStr for StextOptions {
    type Err = PdfGraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = StextOptions::default();
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key.trim(), parse_bool(key.trim(), value.trim())?),
                None => (item, true),
            };
            match key {
                "preserve-whitespace" => options.preserve_whitespace = value,
                "preserve-images" => options.preserve_images = value,
                other => warn!(option = other, "ignoring unknown structured text option"),
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub c: char,
    pub origin: Point,
    pub font: String,
    pub size: f64,
    pub quad: Quad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// XObject resource name
    pub name: String,
    pub id: Option<ObjectId>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub bbox: Rect,
    pub matrix: Matrix,
    pub image: ImageRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextEvent {
    Char(Glyph),
    EndLine,
    EndTextBlock,
    Image(ImageBlock),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredText {
    pub events: Vec<TextEvent>,
}

impl StructuredText {
    /// Plain text with one `\n` per line end.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for event in &self.events {
            match event {
                TextEvent::Char(glyph) => text.push(glyph.c),
                TextEvent::EndLine => text.push('\n'),
                TextEvent::EndTextBlock | TextEvent::Image(_) => {}
            }
        }
        text
    }
}

impl<'a> Page<'a> {
    /// Interpret this page's content into glyph, line, block and image events.
    pub fn structured_text(&self, options: &StextOptions) -> Result<StructuredText, PdfGraftError> {
        let view = self.crop_box()?;
        let rotation = self.rotation()?;
        let content = page_content(self.graph, self.dictionary()?)?;
        let resources = self.resources()?;

        let mut interpreter = Interpreter {
            graph: self.graph,
            options: *options,
            device: Matrix::new(1.0, 0.0, 0.0, -1.0, -view.x0, view.y1),
            rotate: Matrix::page_rotation(rotation, view.width(), view.height()),
            events: Vec::new(),
            line_open: false,
            block_open: false,
            last_baseline: None,
        };
        interpreter.run(&content, resources, GraphicsState::default(), 0)?;
        interpreter.close_block();

        debug!(
            page = self.index,
            rotation,
            events = interpreter.events.len(),
            "structured text extracted"
        );
        Ok(StructuredText {
            events: interpreter.events,
        })
    }
}

/// Widths, naming and character mapping for one font resource
#[derive(Debug)]
struct FontMetrics {
    name: String,
    first_char: u32,
    widths: Vec<f64>,
    default_width: f64,
    two_byte: bool,
    /// `None` reads codes as Latin-1, used when no font resource resolves
    base_encoding: Option<BaseEncoding>,
    differences: HashMap<u32, char>,
    to_unicode: Option<ToUnicodeMap>,
}

impl FontMetrics {
    fn fallback(resource_name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(resource_name).into_owned(),
            first_char: 0,
            widths: Vec::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            two_byte: false,
            base_encoding: None,
            differences: HashMap::new(),
            to_unicode: None,
        }
    }

    fn from_dict(graph: &lopdf::Document, resource_name: &[u8], dict: &Dictionary) -> Self {
        let mut metrics = Self::fallback(resource_name);
        if let Ok(Object::Name(base)) = dict.get(b"BaseFont") {
            metrics.name = String::from_utf8_lossy(base).into_owned();
        }
        metrics.to_unicode = load_to_unicode(graph, dict);

        if matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Type0") {
            metrics.two_byte = true;
            metrics.default_width = 1000.0;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|d| resolve(graph, d).ok())
                .and_then(|d| d.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|f| resolve(graph, f).ok())
                .and_then(|f| f.as_dict().ok());
            if let Some(width) = descendant
                .and_then(|f| f.get(b"DW").ok())
                .and_then(|w| resolve(graph, w).ok())
                .and_then(number)
            {
                metrics.default_width = width;
            }
            return metrics;
        }

        metrics.base_encoding = Some(BaseEncoding::Standard);
        match dict.get(b"Encoding").ok().and_then(|e| resolve(graph, e).ok()) {
            Some(Object::Name(name)) => {
                if let Some(encoding) = BaseEncoding::from_name(name) {
                    metrics.base_encoding = Some(encoding);
                }
            }
            Some(Object::Dictionary(encoding)) => {
                if let Ok(Object::Name(name)) = encoding.get(b"BaseEncoding") {
                    if let Some(base) = BaseEncoding::from_name(name) {
                        metrics.base_encoding = Some(base);
                    }
                }
                if let Some(differences) = encoding
                    .get(b"Differences")
                    .ok()
                    .and_then(|d| resolve(graph, d).ok())
                    .and_then(|d| d.as_array().ok())
                {
                    metrics.differences = parse_differences(differences);
                }
            }
            _ => {}
        }

        if let Some(first) = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|f| resolve(graph, f).ok())
            .and_then(number)
        {
            metrics.first_char = first.max(0.0) as u32;
        }
        if let Some(widths) = dict
            .get(b"Widths")
            .ok()
            .and_then(|w| resolve(graph, w).ok())
            .and_then(|w| w.as_array().ok())
        {
            metrics.widths = widths
                .iter()
                .map(|w| {
                    resolve(graph, w)
                        .ok()
                        .and_then(number)
                        .unwrap_or(DEFAULT_GLYPH_WIDTH)
                })
                .collect();
        }
        metrics
    }

    /// Advance width in thousandths of an em
    fn width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.default_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Text for one character code. A ToUnicode entry may map to several
    /// characters, or to none.
    fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|map| map.get(&code)) {
            return text.clone();
        }
        let c = if self.two_byte {
            char::from_u32(code)
        } else if let Some(&c) = self.differences.get(&code) {
            Some(c)
        } else {
            match (self.base_encoding, u8::try_from(code)) {
                (Some(encoding), Ok(byte)) => encoding.decode(byte),
                (None, _) => char::from_u32(code),
                (Some(_), Err(_)) => None,
            }
        };
        c.unwrap_or(char::REPLACEMENT_CHARACTER).to_string()
    }
}

/// Code to character overrides from an `/Differences` array such as
/// `[1 /H /i 32 /space]`. Unknown glyph names leave the base encoding.
fn parse_differences(items: &[Object]) -> HashMap<u32, char> {
    let mut differences = HashMap::new();
    let mut code: u32 = 0;
    for item in items {
        match item {
            Object::Integer(start) => code = u32::try_from(*start).unwrap_or(0),
            Object::Name(glyph) => {
                if let Some(c) = glyph_name_to_char(&String::from_utf8_lossy(glyph)) {
                    differences.insert(code, c);
                }
                code = code.saturating_add(1);
            }
            _ => {}
        }
    }
    differences
}

fn load_to_unicode(graph: &lopdf::Document, font: &Dictionary) -> Option<ToUnicodeMap> {
    let stream = font
        .get(b"ToUnicode")
        .ok()
        .and_then(|t| resolve(graph, t).ok())
        .and_then(|t| t.as_stream().ok())?;
    match stream_bytes(stream) {
        Ok(data) => Some(parse_to_unicode(&data)),
        Err(e) => {
            warn!(error = %e, "unreadable ToUnicode CMap");
            None
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Rc<FontMetrics>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    graph: &'a lopdf::Document,
    options: StextOptions,
    /// Unrotated top-down space; line breaks are detected here
    device: Matrix,
    rotate: Matrix,
    events: Vec<TextEvent>,
    line_open: bool,
    block_open: bool,
    last_baseline: Option<f64>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        mut gs: GraphicsState,
        depth: usize,
    ) -> Result<(), PdfGraftError> {
        let content = Content::decode(content)
            .map_err(|e| PdfGraftError::ParseError(format!("content stream: {}", e)))?;

        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    gs.ctm = m.then(&gs.ctm);
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => self.close_block(),
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        gs.font = Some(Rc::new(self.load_font(resources, name)));
                    }
                    if let Some(size) = op.operands.get(1).and_then(number) {
                        gs.size = size;
                    }
                }
                "Td" if nums.len() == 2 => {
                    tlm = Matrix::translate(nums[0], nums[1]).then(&tlm);
                    tm = tlm;
                }
                "TD" if nums.len() == 2 => {
                    gs.leading = -nums[1];
                    tlm = Matrix::translate(nums[0], nums[1]).then(&tlm);
                    tm = tlm;
                }
                "Tm" if nums.len() == 6 => {
                    tlm = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    tm = tlm;
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                }
                "TL" if !nums.is_empty() => gs.leading = nums[0],
                "Tc" if !nums.is_empty() => gs.char_spacing = nums[0],
                "Tw" if !nums.is_empty() => gs.word_spacing = nums[0],
                "Tz" if !nums.is_empty() => gs.h_scale = nums[0] / 100.0,
                "Ts" if !nums.is_empty() => gs.rise = nums[0],
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(&gs, &mut tm, bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0 * gs.size * gs.h_scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" && nums.len() >= 2 {
                        gs.word_spacing = nums[0];
                        gs.char_spacing = nums[1];
                    }
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.do_xobject(resources, name, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn show(&mut self, gs: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let fallback;
        let font = match &gs.font {
            Some(font) => &**font,
            None => {
                fallback = FontMetrics::fallback(b"");
                &fallback
            }
        };

        for code in font.codes(bytes) {
            let w0 = font.width(code) / 1000.0;
            let trm = Matrix::new(gs.size * gs.h_scale, 0.0, 0.0, gs.size, 0.0, gs.rise)
                .then(tm)
                .then(&gs.ctm)
                .then(&self.device);
            let placed = trm.then(&self.rotate);
            let text = font.decode(code);
            let share = w0 / text.chars().count().max(1) as f64;

            let baseline = trm.apply(0.0, 0.0).y;
            if !text.is_empty() {
                if let Some(last) = self.last_baseline {
                    if (baseline - last).abs() > 0.5 * gs.size.abs() {
                        self.close_line();
                    }
                }
                self.last_baseline = Some(baseline);
            }

            for (i, c) in text.chars().enumerate() {
                let x0 = share * i as f64;
                let x1 = x0 + share;
                let collapse = !self.options.preserve_whitespace
                    && c.is_whitespace()
                    && matches!(self.events.last(), Some(TextEvent::Char(prev)) if prev.c.is_whitespace());
                if collapse {
                    continue;
                }
                self.events.push(TextEvent::Char(Glyph {
                    c,
                    origin: placed.apply(x0, 0.0),
                    font: font.name.clone(),
                    size: gs.size,
                    quad: Quad {
                        ul: placed.apply(x0, GLYPH_ASCENT),
                        ur: placed.apply(x1, GLYPH_ASCENT),
                        ll: placed.apply(x0, GLYPH_DESCENT),
                        lr: placed.apply(x1, GLYPH_DESCENT),
                    },
                }));
                self.line_open = true;
                self.block_open = true;
            }

            let word_spacing = if code == 32 && !font.two_byte {
                gs.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * gs.size + gs.char_spacing + word_spacing) * gs.h_scale;
            *tm = Matrix::translate(tx, 0.0).then(tm);
        }
    }

    fn do_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), PdfGraftError> {
        let graph = self.graph;
        let Some(entry) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve(graph, x).ok())
            .and_then(|x| x.as_dict().ok())
            .and_then(|x| x.get(name).ok())
        else {
            debug!(name = %String::from_utf8_lossy(name), "missing XObject resource");
            return Ok(());
        };
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Ok(stream) = resolve(graph, entry)?.as_stream() else {
            return Ok(());
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Image" => {
                if !self.options.preserve_images {
                    return Ok(());
                }
                let matrix = gs.ctm.then(&self.device).then(&self.rotate);
                let corners = [
                    matrix.apply(0.0, 0.0),
                    matrix.apply(1.0, 0.0),
                    matrix.apply(0.0, 1.0),
                    matrix.apply(1.0, 1.0),
                ];
                let bbox = Quad {
                    ul: corners[2],
                    ur: corners[3],
                    ll: corners[0],
                    lr: corners[1],
                }
                .bounds();
                let dimension = |key: &[u8]| match stream.dict.get(key) {
                    Ok(Object::Integer(v)) => Some(*v),
                    _ => None,
                };
                self.close_block();
                self.events.push(TextEvent::Image(ImageBlock {
                    bbox,
                    matrix,
                    image: ImageRef {
                        name: String::from_utf8_lossy(name).into_owned(),
                        id,
                        width: dimension(b"Width"),
                        height: dimension(b"Height"),
                    },
                }));
            }
            Ok(Object::Name(subtype)) if subtype == b"Form" => {
                if depth >= MAX_FORM_DEPTH {
                    warn!(depth, "form XObject nesting too deep, skipping");
                    return Ok(());
                }
                let form_matrix = match stream.dict.get(b"Matrix").and_then(Object::as_array) {
                    Ok(values) => {
                        let v: Vec<f64> = values.iter().filter_map(number).collect();
                        if v.len() == 6 {
                            Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5])
                        } else {
                            Matrix::IDENTITY
                        }
                    }
                    Err(_) => Matrix::IDENTITY,
                };
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(graph, r).ok())
                    .and_then(|r| r.as_dict().ok())
                    .or(resources);
                let content = stream_bytes(stream)?;

                let mut inner = gs.clone();
                inner.ctm = form_matrix.then(&gs.ctm);
                self.run(&content, form_resources, inner, depth + 1)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn load_font(&self, resources: Option<&Dictionary>, name: &[u8]) -> FontMetrics {
        let graph = self.graph;
        resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|f| resolve(graph, f).ok())
            .and_then(|f| f.as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|f| resolve(graph, f).ok())
            .and_then(|f| f.as_dict().ok())
            .map(|dict| FontMetrics::from_dict(graph, name, dict))
            .unwrap_or_else(|| FontMetrics::fallback(name))
    }

    fn close_line(&mut self) {
        if self.line_open {
            self.events.push(TextEvent::EndLine);
            self.line_open = false;
        }
    }

    fn close_block(&mut self) {
        self.close_line();
        if self.block_open {
            self.events.push(TextEvent::EndTextBlock);
            self.block_open = false;
        }
        self.last_baseline = None;
    }
}

/// Concatenated, decoded bytes of a page's `/Contents`.
fn page_content(graph: &lopdf::Document, page: &Dictionary) -> Result<Vec<u8>, PdfGraftError> {
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    match resolve(graph, contents)? {
        Object::Stream(stream) => stream_bytes(stream),
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                let stream = resolve(graph, part)?.as_stream().map_err(|e| {
                    PdfGraftError::ParseError(format!("/Contents array item is not a stream: {}", e))
                })?;
                if !content.is_empty() {
                    content.push(b'\n');
                }
                content.extend_from_slice(&stream_bytes(stream)?);
            }
            Ok(content)
        }
        _ => Err(PdfGraftError::ParseError(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

fn stream_bytes(stream: &lopdf::Stream) -> Result<Vec<u8>, PdfGraftError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| PdfGraftError::ParseError(format!("failed to decompress stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        document_with_content, document_with_font, document_with_page_attributes, image_document,
    };
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    fn glyphs(text: &StructuredText) -> Vec<&Glyph> {
        text.events
            .iter()
            .filter_map(|e| match e {
                TextEvent::Char(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_options_parse() {
        let options: StextOptions = "preserve-whitespace, preserve-images".parse().unwrap();
        assert!(options.preserve_whitespace);
        assert!(options.preserve_images);

        let options: StextOptions = "preserve-images=no,dehyphenate".parse().unwrap();
        assert_eq!(options, StextOptions::default());
        assert!("preserve-images=maybe".parse::<StextOptions>().is_err());
    }

    #[test]
    fn test_glyph_geometry_is_device_space() {
        let doc = document_with_content(b"BT /F1 10 Tf 100 700 Td (AB) Tj ET");
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        let g = glyphs(&text);
        assert_eq!(g.len(), 2);

        assert_eq!(g[0].c, 'A');
        assert_eq!(g[0].font, "Helvetica");
        assert_eq!(g[0].size, 10.0);
        assert_eq!(g[0].origin, Point::new(100.0, 92.0));
        assert_eq!(g[0].quad.bounds(), Rect::new(100.0, 84.0, 105.0, 94.0));
        assert_eq!(g[1].quad.bounds(), Rect::new(105.0, 84.0, 110.0, 94.0));

        assert_eq!(
            &text.events[2..],
            &[TextEvent::EndLine, TextEvent::EndTextBlock]
        );
    }

    #[test]
    fn test_baseline_move_ends_line() {
        let doc = document_with_content(b"BT /F1 10 Tf 14 TL 100 700 Td (one) Tj T* (two) Tj ET");
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        assert_eq!(text.text(), "one\ntwo\n");
    }

    #[test]
    fn test_whitespace_collapses_unless_preserved() {
        let doc = document_with_content(b"BT /F1 10 Tf 100 700 Td (a   b) Tj ET");
        let page = doc.load_page(0).unwrap();

        let collapsed = page.structured_text(&StextOptions::default()).unwrap();
        assert_eq!(collapsed.text(), "a b\n");

        let preserved = page
            .structured_text(&"preserve-whitespace".parse().unwrap())
            .unwrap();
        assert_eq!(preserved.text(), "a   b\n");
    }

    #[test]
    fn test_tj_adjustment_moves_pen() {
        let doc = document_with_content(b"BT /F1 10 Tf 100 700 Td [(A) -1000 (B)] TJ ET");
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        let g = glyphs(&text);
        // 5pt advance for A plus a 10pt kern
        assert_eq!(g[1].origin.x, 115.0);
    }

    #[test]
    fn test_images_only_when_requested() {
        let doc = image_document();
        let page = doc.load_page(0).unwrap();

        let plain = page.structured_text(&StextOptions::default()).unwrap();
        assert!(plain
            .events
            .iter()
            .all(|e| !matches!(e, TextEvent::Image(_))));

        let with_images = page
            .structured_text(&"preserve-images".parse().unwrap())
            .unwrap();
        let images: Vec<_> = with_images
            .events
            .iter()
            .filter_map(|e| match e {
                TextEvent::Image(block) => Some(block),
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].bbox, Rect::new(50.0, 92.0, 250.0, 192.0));
        assert_eq!(images[0].image.name, "Im1");
        assert_eq!(images[0].image.width, Some(2));
        assert_eq!(images[0].image.height, Some(1));
    }

    #[test]
    fn test_form_xobject_text_is_visited() {
        let doc = crate::fixtures::form_document(b"BT /F1 10 Tf 0 0 Td (Hi) Tj ET");
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        let g = glyphs(&text);
        assert_eq!(text.text(), "Hi\n");
        // Form placed at (100, 700) by its /Matrix
        assert_eq!(g[0].origin, Point::new(100.0, 92.0));
    }

    #[test]
    fn test_widths_array_drives_advance() {
        let doc = crate::fixtures::document_with_widths(b"BT /F2 10 Tf 0 700 Td (AAB) Tj ET");
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        let xs: Vec<f64> = glyphs(&text).iter().map(|g| g.origin.x).collect();
        // A is 600 units wide, B is 700
        assert_eq!(xs, vec![0.0, 6.0, 12.0]);
        assert_eq!(glyphs(&text)[2].quad.bounds().x1, 19.0);
    }

    #[test]
    fn test_differences_array_maps_codes() {
        let doc = document_with_font(b"BT /F2 10 Tf 100 700 Td <0102> Tj ET", |_| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Subset",
                "Encoding" => dictionary! {
                    "Type" => "Encoding",
                    "Differences" => vec![1.into(), "H".into(), "i".into()],
                },
            }
        });
        let page = doc.load_page(0).unwrap();
        let words: Vec<String> = page.words().unwrap().into_iter().map(|w| w.text).collect();
        assert_eq!(words, vec!["Hi"]);
    }

    #[test]
    fn test_base_encodings_pick_quote_glyphs() {
        // F1 has no /Encoding and so reads StandardEncoding, where 0x27 is a right quote
        let doc = document_with_font(b"BT /F2 10 Tf 0 700 Td <93> Tj /F1 10 Tf (') Tj ET", |_| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "Arial",
                "Encoding" => "WinAnsiEncoding",
            }
        });
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        assert_eq!(text.text(), "\u{201C}\u{2019}\n");
    }

    #[test]
    fn test_to_unicode_drives_composite_font() {
        let cmap = b"begincmap
2 beginbfchar
<0001> <0066>
<0002> <00660069>
endbfchar
endcmap";
        let doc = document_with_font(b"BT /F2 10 Tf 0 700 Td <00010002> Tj ET", |doc| {
            let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "Subset-Identity",
                "Encoding" => "Identity-H",
                "ToUnicode" => to_unicode,
            }
        });
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        assert_eq!(text.text(), "ffi\n");

        // The ligature's 10pt advance is split across its two characters
        let xs: Vec<f64> = glyphs(&text).iter().map(|g| g.origin.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 15.0]);
        assert_eq!(glyphs(&text)[2].quad.bounds().x1, 20.0);
    }

    #[test]
    fn test_rotated_page_turns_glyph_boxes() {
        let doc = document_with_page_attributes(
            b"BT /F1 10 Tf 100 700 Td (A) Tj ET",
            dictionary! { "Rotate" => 90 },
        );
        let text = doc
            .load_page(0)
            .unwrap()
            .structured_text(&StextOptions::default())
            .unwrap();
        let g = glyphs(&text);
        // 792pt tall page: the top edge becomes the right edge
        assert_eq!(g[0].origin, Point::new(700.0, 100.0));
        assert_eq!(g[0].quad.bounds(), Rect::new(698.0, 100.0, 708.0, 105.0));
    }

    #[test]
    fn test_crop_box_sets_origin() {
        let doc = document_with_page_attributes(
            b"BT /F1 10 Tf 100 700 Td (A) Tj ET",
            dictionary! {
                "CropBox" => vec![50.into(), 50.into(), 550.into(), 742.into()],
            },
        );
        let page = doc.load_page(0).unwrap();
        assert_eq!(page.crop_box().unwrap(), Rect::new(50.0, 50.0, 550.0, 742.0));

        let text = page.structured_text(&StextOptions::default()).unwrap();
        assert_eq!(glyphs(&text)[0].origin, Point::new(50.0, 42.0));
    }
}
