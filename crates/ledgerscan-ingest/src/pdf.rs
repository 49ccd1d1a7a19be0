//! Positioned text extraction from PDF pages.
//!
//! Each page's content stream is interpreted with a small text-state machine
//! covering the text showing and positioning operators plus `q`/`Q`/`cm`.
//! Glyph boxes use the font size for height (0.8 ascent, 0.2 descent) and
//! the font's `/Widths` (or `/W` for composite fonts) for the advance.
//! Form XObjects are not followed.

use std::collections::HashMap;
use std::path::Path;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::cmap::ToUnicodeMap;
use crate::words::{group_chars_into_words, PositionedChar, Word, WordOptions};
use ledgerscan_core::{Error, Result};

/// US Letter, used when a page carries no MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_INHERITANCE_DEPTH: usize = 32;
const MAX_WIDTH_RANGE: u32 = 0x1_0000;
const ASCENT: f64 = 0.8;
const DESCENT: f64 = 0.2;

static FALLBACK_FONT: Lazy<FontInfo> = Lazy::new(FontInfo::fallback);

/// A loaded PDF ready for per-page text extraction.
pub struct PdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path)
            .map_err(|e| Error::Pdf(format!("failed to open {}: {}", path.display(), e)))?;
        Ok(Self::from_document(doc))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::Pdf(format!("failed to parse PDF: {}", e)))?;
        Ok(Self::from_document(doc))
    }

    fn from_document(doc: Document) -> Self {
        // get_pages is keyed by 1-based page number, already in order.
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Positioned glyphs of one page (0-based), in content-stream order.
    ///
    /// A page whose content cannot be decoded yields no glyphs.
    pub fn page_chars(&self, page_index: usize) -> Result<Vec<PositionedChar>> {
        let page_id = *self
            .pages
            .get(page_index)
            .ok_or_else(|| Error::InvalidInput(format!("page {} out of range", page_index)))?;
        let page = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::Pdf(format!("page {} is not a dictionary: {}", page_index, e)))?;

        let content = match self
            .doc
            .get_page_content(page_id)
            .map_err(|e| e.to_string())
            .and_then(|data| Content::decode(&data).map_err(|e| e.to_string()))
        {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping unreadable content on page {}: {}", page_index, e);
                return Ok(Vec::new());
            }
        };

        let fonts = load_fonts(&self.doc, page);
        let media_box = MediaBox::for_page(&self.doc, page);
        let mut interpreter = TextInterpreter::new(&fonts, media_box);
        for op in &content.operations {
            interpreter.apply(&op.operator, &op.operands);
        }

        debug!("Page {}: {} glyphs", page_index, interpreter.chars.len());
        Ok(interpreter.chars)
    }

    pub fn page_words(&self, page_index: usize, opts: &WordOptions) -> Result<Vec<Word>> {
        let chars = self.page_chars(page_index)?;
        Ok(group_chars_into_words(&chars, page_index, opts))
    }

    /// Words of every page, indexed by page.
    pub fn extract_page_words(&self, opts: &WordOptions) -> Result<Vec<Vec<Word>>> {
        (0..self.page_count()).map(|p| self.page_words(p, opts)).collect()
    }
}

/// Affine transform `[a b c d e f]` as used by PDF operators.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f64> = operands.iter().filter_map(number).collect();
        match v.as_slice() {
            [a, b, c, d, e, f] => Some(Self {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    /// `self × other`.
    fn multiply(&self, o: &Matrix) -> Matrix {
        Matrix {
            a: self.a * o.a + self.b * o.c,
            b: self.a * o.b + self.b * o.d,
            c: self.c * o.a + self.d * o.c,
            d: self.c * o.b + self.d * o.d,
            e: self.e * o.a + self.f * o.c + o.e,
            f: self.e * o.b + self.f * o.d + o.f,
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }
}

#[derive(Debug, Clone, Copy)]
struct MediaBox {
    left: f64,
    top: f64,
}

impl MediaBox {
    fn for_page(doc: &Document, page: &Dictionary) -> Self {
        let values: Vec<f64> = match inherited(doc, page, b"MediaBox") {
            Some(Object::Array(items)) => items.iter().filter_map(|o| number(resolve(doc, o))).collect(),
            _ => Vec::new(),
        };
        let [x0, y0, x1, y1] = match values.as_slice() {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => DEFAULT_MEDIA_BOX,
        };
        Self {
            left: x0.min(x1),
            top: y0.max(y1),
        }
    }
}

/// Width and decoding information for one font resource.
#[derive(Debug, Clone)]
struct FontInfo {
    widths: HashMap<u32, f64>,
    default_width: f64,
    two_byte: bool,
    to_unicode: Option<ToUnicodeMap>,
}

impl FontInfo {
    fn fallback() -> Self {
        Self {
            widths: HashMap::new(),
            default_width: 500.0,
            two_byte: false,
            to_unicode: None,
        }
    }

    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = name(font.get(b"Subtype").ok().map(|o| resolve(doc, o)));
        let base_font = name(font.get(b"BaseFont").ok().map(|o| resolve(doc, o))).unwrap_or_default();
        let to_unicode = match font.get(b"ToUnicode").ok().map(|o| resolve(doc, o)) {
            Some(Object::Stream(stream)) => {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                Some(ToUnicodeMap::parse(&data))
            }
            _ => None,
        };

        if subtype.as_deref() == Some("Type0") {
            let descendant = match font.get(b"DescendantFonts").ok().map(|o| resolve(doc, o)) {
                Some(Object::Array(items)) => items.first().map(|o| resolve(doc, o)),
                _ => None,
            };
            let (widths, default_width) = match descendant {
                Some(Object::Dictionary(cid_font)) => (
                    cid_widths(doc, cid_font),
                    cid_font
                        .get(b"DW")
                        .ok()
                        .and_then(|o| number(resolve(doc, o)))
                        .unwrap_or(1000.0),
                ),
                _ => (HashMap::new(), 1000.0),
            };
            return Self {
                widths,
                default_width,
                two_byte: true,
                to_unicode,
            };
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(0.0) as u32;
        let mut widths = HashMap::new();
        if let Some(Object::Array(items)) = font.get(b"Widths").ok().map(|o| resolve(doc, o)) {
            for (i, w) in items.iter().enumerate() {
                let code = u32::try_from(i).ok().and_then(|i| first_char.checked_add(i));
                if let (Some(code), Some(w)) = (code, number(resolve(doc, w))) {
                    widths.insert(code, w);
                }
            }
        }
        let default_width = if base_font.contains("Courier") { 600.0 } else { 500.0 };

        Self {
            widths,
            default_width,
            two_byte: false,
            to_unicode,
        }
    }

    fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
            return text.to_string();
        }
        if self.two_byte {
            char::from_u32(code).map(String::from).unwrap_or_default()
        } else {
            // Latin-1 for simple fonts without a ToUnicode map.
            char::from(code as u8).to_string()
        }
    }
}

/// `/W` array of a CIDFont: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let items = match cid_font.get(b"W").ok().map(|o| resolve(doc, o)) {
        Some(Object::Array(items)) => items,
        _ => return widths,
    };

    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        let first = first as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(ws)) => {
                for (k, w) in ws.iter().enumerate() {
                    let code = u32::try_from(k).ok().and_then(|k| first.checked_add(k));
                    if let (Some(code), Some(w)) = (code, number(resolve(doc, w))) {
                        widths.insert(code, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(last).map(|l| l as u32);
                let w = items.get(i + 2).and_then(|o| number(resolve(doc, o)));
                if let (Some(last), Some(w)) = (last, w) {
                    if last >= first && last - first < MAX_WIDTH_RANGE {
                        for code in first..=last {
                            widths.insert(code, w);
                        }
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn load_fonts(doc: &Document, page: &Dictionary) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let resources = match inherited(doc, page, b"Resources") {
        Some(Object::Dictionary(resources)) => resources,
        _ => return fonts,
    };
    let font_dict = match resources.get(b"Font").ok().map(|o| resolve(doc, o)) {
        Some(Object::Dictionary(d)) => d,
        _ => return fonts,
    };
    for (key, value) in font_dict.iter() {
        if let Object::Dictionary(font) = resolve(doc, value) {
            fonts.insert(key.clone(), FontInfo::from_dict(doc, font));
        }
    }
    fonts
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct TextInterpreter<'a> {
    fonts: &'a HashMap<Vec<u8>, FontInfo>,
    media_box: MediaBox,
    gs: GraphicsState,
    saved: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    chars: Vec<PositionedChar>,
}

impl<'a> TextInterpreter<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontInfo>, media_box: MediaBox) -> Self {
        Self {
            fonts,
            media_box,
            gs: GraphicsState::default(),
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            chars: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(number);
        match operator {
            "q" => self.saved.push(self.gs.clone()),
            "Q" => {
                if let Some(gs) = self.saved.pop() {
                    self.gs = gs;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.gs.ctm = m.multiply(&self.gs.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let (Some(Object::Name(font)), Some(size)) = (operands.first(), num(1)) {
                    self.gs.font = Some(font.clone());
                    self.gs.font_size = size;
                }
            }
            "Tc" => self.gs.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.gs.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.gs.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.gs.leading = num(0).unwrap_or(0.0),
            "Ts" => self.gs.rise = num(0).unwrap_or(0.0),
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.gs.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                    self.gs.word_spacing = aw;
                    self.gs.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * self.gs.font_size * self.gs.horizontal_scale;
                                    self.tm = Matrix::translation(tx, 0.0).multiply(&self.tm);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translation(tx, ty).multiply(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.gs.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let fonts = self.fonts;
        let font = self
            .gs
            .font
            .as_ref()
            .and_then(|name| fonts.get(name))
            .unwrap_or(&*FALLBACK_FONT);
        let step = if font.two_byte { 2 } else { 1 };
        let size = self.gs.font_size;
        let th = self.gs.horizontal_scale;

        for chunk in bytes.chunks(step) {
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
            let w0 = font.width(code) / 1000.0;
            self.emit_glyphs(&font.decode(code), w0 * size * th);

            let word_space = if step == 1 && code == 32 { self.gs.word_spacing } else { 0.0 };
            let tx = (w0 * size + self.gs.char_spacing + word_space) * th;
            self.tm = Matrix::translation(tx, 0.0).multiply(&self.tm);
        }
    }

    /// Place the decoded text of one glyph code, sharing its advance evenly
    /// when a code maps to several characters (ligatures).
    fn emit_glyphs(&mut self, text: &str, advance: f64) {
        let count = text.chars().count();
        if count == 0 {
            return;
        }
        let size = self.gs.font_size;
        let rise = self.gs.rise;
        let rm = self.tm.multiply(&self.gs.ctm);
        let share = advance / count as f64;

        for (k, ch) in text.chars().enumerate() {
            if ch.is_control() {
                continue;
            }
            let xa = share * k as f64;
            let xb = xa + share;
            let corners = [
                rm.apply(xa, rise - DESCENT * size),
                rm.apply(xb, rise - DESCENT * size),
                rm.apply(xa, rise + ASCENT * size),
                rm.apply(xb, rise + ASCENT * size),
            ];
            let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
            let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
            let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
            let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

            self.chars.push(PositionedChar {
                ch,
                x0: min_x - self.media_box.left,
                top: self.media_box.top - max_y,
                x1: max_x - self.media_box.left,
                bottom: self.media_box.top - min_y,
            });
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn name(obj: Option<&Object>) -> Option<String> {
    match obj {
        Some(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree through `/Parent`.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut dict = page;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        dict = match resolve(doc, dict.get(b"Parent").ok()?) {
            Object::Dictionary(parent) => parent,
            _ => return None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// One Courier page per entry, each a list of `(x, y, text)` placements.
    fn build_pdf(pages: &[Vec<(i64, i64, &str)>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for placements in pages {
            let mut operations = Vec::new();
            for (x, y, text) in placements {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
                operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_matrix_multiply_translation() {
        let m = Matrix::translation(10.0, 5.0).multiply(&Matrix::translation(1.0, 2.0));
        assert_eq!(m.apply(0.0, 0.0), (11.0, 7.0));
        let scaled = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        assert_eq!(Matrix::translation(3.0, 0.0).multiply(&scaled).apply(1.0, 1.0), (8.0, 2.0));
    }

    #[test]
    fn test_courier_glyph_boxes() {
        let pdf = build_pdf(&[vec![(100, 700, "AB")]]);
        let doc = PdfDocument::from_bytes(&pdf).unwrap();
        assert_eq!(doc.page_count(), 1);

        let chars = doc.page_chars(0).unwrap();
        assert_eq!(chars.len(), 2);
        // Courier advance is 600/1000 em at 10pt.
        assert!((chars[0].x0 - 100.0).abs() < 1e-6);
        assert!((chars[0].x1 - 106.0).abs() < 1e-6);
        assert!((chars[1].x0 - 106.0).abs() < 1e-6);
        // Baseline 700 from the bottom of a 792pt page, ascent 8pt.
        assert!((chars[0].top - 84.0).abs() < 1e-6);
        assert!((chars[0].bottom - 94.0).abs() < 1e-6);
    }

    #[test]
    fn test_page_words_split_on_spaces() {
        let pdf = build_pdf(&[vec![(50, 700, "Total 1 234,56"), (50, 680, "Next line")]]);
        let doc = PdfDocument::from_bytes(&pdf).unwrap();
        let words = doc.page_words(0, &WordOptions::default()).unwrap();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Total", "1", "234,56", "Next", "line"]);
        assert_eq!(words[0].x0, 50);
        assert_eq!(words[0].x1, 80);
    }

    #[test]
    fn test_multiple_pages_in_order() {
        let pdf = build_pdf(&[vec![(10, 700, "first")], vec![(10, 700, "second")]]);
        let doc = PdfDocument::from_bytes(&pdf).unwrap();
        let pages = doc.extract_page_words(&WordOptions::default()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1][0].text, "second");
        assert_eq!(pages[1][0].page, 1);
    }

    #[test]
    fn test_page_out_of_range() {
        let pdf = build_pdf(&[vec![]]);
        let doc = PdfDocument::from_bytes(&pdf).unwrap();
        assert!(doc.page_chars(0).unwrap().is_empty());
        assert!(matches!(doc.page_chars(3), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_garbage_is_pdf_error() {
        assert!(matches!(PdfDocument::from_bytes(b"not a pdf"), Err(Error::Pdf(_))));
    }

    #[test]
    fn test_widths_past_code_space_are_dropped() {
        let doc = Document::with_version("1.5");
        let simple = FontInfo::from_dict(
            &doc,
            &dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "FirstChar" => Object::Integer(u32::MAX as i64),
                "Widths" => vec![Object::Integer(700), Object::Integer(900)],
            },
        );
        assert_eq!(simple.widths.len(), 1);
        assert_eq!(simple.width(u32::MAX), 700.0);
        assert_eq!(simple.width(0), 500.0);

        let composite = FontInfo::from_dict(
            &doc,
            &dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "Identity",
                "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType2",
                    "W" => vec![
                        Object::Integer(u32::MAX as i64),
                        Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
                    ],
                })],
            },
        );
        assert!(composite.two_byte);
        assert_eq!(composite.widths.len(), 1);
        assert_eq!(composite.width(u32::MAX), 500.0);
    }

    #[test]
    fn test_to_unicode_two_byte_font() {
        let cmap = b"begincmap 1 begincodespacerange <0000> <FFFF> endcodespacerange \
            1 beginbfrange <0010> <0019> <0030> endbfrange endcmap";
        let map = ToUnicodeMap::parse(cmap);
        let font = FontInfo {
            widths: HashMap::new(),
            default_width: 1000.0,
            two_byte: true,
            to_unicode: Some(map),
        };
        let fonts: HashMap<Vec<u8>, FontInfo> = [(b"F2".to_vec(), font)].into_iter().collect();
        let mut interp = TextInterpreter::new(
            &fonts,
            MediaBox {
                left: 0.0,
                top: 100.0,
            },
        );
        interp.apply("BT", &[]);
        interp.apply("Tf", &[Object::Name(b"F2".to_vec()), 10.into()]);
        interp.apply("Td", &[0.into(), 50.into()]);
        interp.apply("Tj", &[Object::String(vec![0x00, 0x11, 0x00, 0x12], lopdf::StringFormat::Hexadecimal)]);

        let text: String = interp.chars.iter().map(|c| c.ch).collect();
        assert_eq!(text, "12");
        assert!((interp.chars[1].x0 - 10.0).abs() < 1e-6);
    }
}
