//! Character code to Unicode mapping for text extraction
//!
//! Simple fonts map one byte codes through a base encoding patched by an
//! `/Differences` array of glyph names. A `/ToUnicode` CMap, when present,
//! overrides both and is the only source of text for composite fonts.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Codes mapped by a `/ToUnicode` CMap
pub type ToUnicodeMap = HashMap<u32, String>;

/// Longest `bfrange` expanded; larger ranges are malformed.
const MAX_BFRANGE_SPAN: u32 = 0xFFFF;

lazy_static! {
    static ref BFCHAR_SECTION: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_SECTION: Regex = Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref BFCHAR_ENTRY: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref BFRANGE_ENTRY: Regex = Regex::new(
        r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[([^\]]*)\])"
    )
    .unwrap();
    static ref HEX_STRING: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// The predefined single-byte encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    PdfDoc,
}

impl BaseEncoding {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"StandardEncoding" => Some(BaseEncoding::Standard),
            b"WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            b"MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            b"PDFDocEncoding" => Some(BaseEncoding::PdfDoc),
            _ => None,
        }
    }

    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            BaseEncoding::Standard => standard_char(code),
            BaseEncoding::WinAnsi => win_ansi_char(code),
            BaseEncoding::MacRoman => mac_roman_char(code),
            BaseEncoding::PdfDoc => pdfdoc_char(code),
        }
    }
}

fn printable_ascii(code: u8) -> Option<char> {
    (0x20..=0x7E).contains(&code).then_some(code as char)
}

fn standard_char(code: u8) -> Option<char> {
    let c = match code {
        0x27 => '\u{2019}',
        0x60 => '\u{2018}',
        0x20..=0x7E => code as char,
        0xA1 => '¡',
        0xA2 => '¢',
        0xA3 => '£',
        0xA4 => '\u{2044}',
        0xA5 => '¥',
        0xA6 => 'ƒ',
        0xA7 => '§',
        0xA8 => '¤',
        0xA9 => '\'',
        0xAA => '\u{201C}',
        0xAB => '«',
        0xAC => '\u{2039}',
        0xAD => '\u{203A}',
        0xAE => '\u{FB01}',
        0xAF => '\u{FB02}',
        0xB1 => '\u{2013}',
        0xB2 => '\u{2020}',
        0xB3 => '\u{2021}',
        0xB4 => '·',
        0xB6 => '¶',
        0xB7 => '\u{2022}',
        0xB8 => '\u{201A}',
        0xB9 => '\u{201E}',
        0xBA => '\u{201D}',
        0xBB => '»',
        0xBC => '\u{2026}',
        0xBD => '\u{2030}',
        0xBF => '¿',
        0xC1 => '`',
        0xC2 => '´',
        0xC3 => '\u{02C6}',
        0xC4 => '\u{02DC}',
        0xC5 => '¯',
        0xC6 => '\u{02D8}',
        0xC7 => '\u{02D9}',
        0xC8 => '¨',
        0xCA => '\u{02DA}',
        0xCB => '¸',
        0xCD => '\u{02DD}',
        0xCE => '\u{02DB}',
        0xCF => '\u{02C7}',
        0xD0 => '\u{2014}',
        0xE1 => 'Æ',
        0xE3 => 'ª',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEB => 'º',
        0xF1 => 'æ',
        0xF5 => 'ı',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        _ => return None,
    };
    Some(c)
}

fn win_ansi_char(code: u8) -> Option<char> {
    let c = match code {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => 'ƒ',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => 'Š',
        0x8B => '\u{2039}',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => 'š',
        0x9B => '\u{203A}',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        0xA0..=0xFF => code as char,
        _ => return printable_ascii(code),
    };
    Some(c)
}

/// MacRomanEncoding as PDF defines it: Apple's table without the math
/// symbols, with the currency sign at 0xDB.
const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', //
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', //
    '\u{2020}', '°', '¢', '£', '§', '\u{2022}', '¶', 'ß', '®', '©', '\u{2122}', '´', '¨', '\0', 'Æ', 'Ø', //
    '\0', '±', '\0', '\0', '¥', 'µ', '\0', '\0', '\0', '\0', '\0', 'ª', 'º', '\0', 'æ', 'ø', //
    '¿', '¡', '¬', '\0', 'ƒ', '\0', '\0', '«', '»', '\u{2026}', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ', //
    '\u{2013}', '\u{2014}', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '÷', '\0', 'ÿ', 'Ÿ', '\u{2044}', '¤', '\u{2039}', '\u{203A}', '\u{FB01}', '\u{FB02}', //
    '\u{2021}', '·', '\u{201A}', '\u{201E}', '\u{2030}', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', //
    '\0', 'Ò', 'Ú', 'Û', 'Ù', 'ı', '\u{02C6}', '\u{02DC}', '¯', '\u{02D8}', '\u{02D9}', '\u{02DA}', '¸', '\u{02DD}', '\u{02DB}', '\u{02C7}', //
];

fn mac_roman_char(code: u8) -> Option<char> {
    if code < 0x80 {
        return printable_ascii(code);
    }
    Some(MAC_ROMAN_HIGH[usize::from(code - 0x80)]).filter(|&c| c != '\0')
}

/// PDFDocEncoding, used for text strings without a byte order mark
pub fn pdfdoc_char(code: u8) -> Option<char> {
    let c = match code {
        0x09 | 0x0A | 0x0D => code as char,
        0x18 => '\u{02D8}',
        0x19 => '\u{02C7}',
        0x1A => '\u{02C6}',
        0x1B => '\u{02D9}',
        0x1C => '\u{02DD}',
        0x1D => '\u{02DB}',
        0x1E => '\u{02DA}',
        0x1F => '\u{02DC}',
        0x20..=0x7E => code as char,
        0x80 => '\u{2022}',
        0x81 => '\u{2020}',
        0x82 => '\u{2021}',
        0x83 => '\u{2026}',
        0x84 => '\u{2014}',
        0x85 => '\u{2013}',
        0x86 => 'ƒ',
        0x87 => '\u{2044}',
        0x88 => '\u{2039}',
        0x89 => '\u{203A}',
        0x8A => '\u{2212}',
        0x8B => '\u{2030}',
        0x8C => '\u{201E}',
        0x8D => '\u{201C}',
        0x8E => '\u{201D}',
        0x8F => '\u{2018}',
        0x90 => '\u{2019}',
        0x91 => '\u{201A}',
        0x92 => '\u{2122}',
        0x93 => '\u{FB01}',
        0x94 => '\u{FB02}',
        0x95 => 'Ł',
        0x96 => 'Œ',
        0x97 => 'Š',
        0x98 => 'Ÿ',
        0x99 => 'Ž',
        0x9A => 'ı',
        0x9B => 'ł',
        0x9C => 'œ',
        0x9D => 'š',
        0x9E => 'ž',
        0xA0 => '\u{20AC}',
        0xA1..=0xAC | 0xAE..=0xFF => code as char,
        _ => return None,
    };
    Some(c)
}

/// Unicode for an Adobe glyph name: the common Latin names plus the
/// `uniXXXX` and `uXXXX[XX]` forms.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }

    if let Some(c) = named_glyph(name) {
        return Some(c);
    }

    let hex = name
        .strip_prefix("uni")
        .filter(|hex| hex.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|hex| (4..=6).contains(&hex.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

fn named_glyph(name: &str) -> Option<char> {
    let c = match name {
        "space" | "nbspace" | "nonbreakingspace" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "quotesinglbase" => '\u{201A}',
        "quotedblbase" => '\u{201E}',
        "guillemotleft" => '«',
        "guillemotright" => '»',
        "guilsinglleft" => '\u{2039}',
        "guilsinglright" => '\u{203A}',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "ellipsis" => '\u{2026}',
        "dagger" => '\u{2020}',
        "daggerdbl" => '\u{2021}',
        "perthousand" => '\u{2030}',
        "trademark" => '\u{2122}',
        "registered" => '®',
        "copyright" => '©',
        "degree" => '°',
        "section" => '§',
        "paragraph" => '¶',
        "periodcentered" => '·',
        "Euro" => '\u{20AC}',
        "sterling" => '£',
        "yen" => '¥',
        "cent" => '¢',
        "currency" => '¤',
        "florin" => 'ƒ',
        "fraction" => '\u{2044}',
        "exclamdown" => '¡',
        "questiondown" => '¿',
        "minus" => '\u{2212}',
        "multiply" => '×',
        "divide" => '÷',
        "plusminus" => '±',
        "mu" => 'µ',
        "ordfeminine" => 'ª',
        "ordmasculine" => 'º',
        "logicalnot" => '¬',
        "brokenbar" => '¦',
        "macron" => '¯',
        "acute" => '´',
        "cedilla" => '¸',
        "dieresis" => '¨',
        "circumflex" => '\u{02C6}',
        "tilde" => '\u{02DC}',
        "caron" => '\u{02C7}',
        "breve" => '\u{02D8}',
        "dotaccent" => '\u{02D9}',
        "ring" => '\u{02DA}',
        "ogonek" => '\u{02DB}',
        "hungarumlaut" => '\u{02DD}',
        "onequarter" => '¼',
        "onehalf" => '½',
        "threequarters" => '¾',
        "onesuperior" => '¹',
        "twosuperior" => '²',
        "threesuperior" => '³',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        "ff" => '\u{FB00}',
        "ffi" => '\u{FB03}',
        "ffl" => '\u{FB04}',
        "germandbls" => 'ß',
        "AE" => 'Æ',
        "ae" => 'æ',
        "OE" => 'Œ',
        "oe" => 'œ',
        "Oslash" => 'Ø',
        "oslash" => 'ø',
        "Lslash" => 'Ł',
        "lslash" => 'ł',
        "dotlessi" => 'ı',
        "Eth" => 'Ð',
        "eth" => 'ð',
        "Thorn" => 'Þ',
        "thorn" => 'þ',
        "Scaron" => 'Š',
        "scaron" => 'š',
        "Zcaron" => 'Ž',
        "zcaron" => 'ž',
        "Ydieresis" => 'Ÿ',
        _ => return accented_letter(name),
    };
    Some(c)
}

/// Latin-1 letters named as base letter plus accent, e.g. `eacute`
fn accented_letter(name: &str) -> Option<char> {
    const ACCENTED: [(&str, &str); 6] = [
        ("grave", "AÀEÈIÌOÒUÙaàeèiìoòuù"),
        ("acute", "AÁEÉIÍOÓUÚYÝaáeéiíoóuúyý"),
        ("circumflex", "AÂEÊIÎOÔUÛaâeêiîoôuû"),
        ("dieresis", "AÄEËIÏOÖUÜaäeëiïoöuüyÿ"),
        ("tilde", "AÃNÑOÕaãnñoõ"),
        ("ring", "AÅaå"),
    ];

    if let Some(base) = name.strip_suffix("cedilla") {
        return match base {
            "C" => Some('Ç'),
            "c" => Some('ç'),
            _ => None,
        };
    }
    ACCENTED.iter().find_map(|(accent, pairs)| {
        let base = name.strip_suffix(accent)?;
        let mut base_chars = base.chars();
        let letter = base_chars.next()?;
        if base_chars.next().is_some() {
            return None;
        }
        let pairs: Vec<char> = pairs.chars().collect();
        pairs
            .chunks_exact(2)
            .find(|pair| pair[0] == letter)
            .map(|pair| pair[1])
    })
}

/// Parse the `bfchar` and `bfrange` mappings of a ToUnicode CMap stream.
/// Entries that do not parse are skipped.
pub fn parse_to_unicode(data: &[u8]) -> ToUnicodeMap {
    let text = String::from_utf8_lossy(data);
    let mut map = ToUnicodeMap::new();

    for section in BFCHAR_SECTION.captures_iter(&text) {
        for entry in BFCHAR_ENTRY.captures_iter(&section[1]) {
            if let (Some(code), Some(unicode)) = (parse_code(&entry[1]), utf16_hex(&entry[2])) {
                map.insert(code, unicode);
            }
        }
    }

    for section in BFRANGE_SECTION.captures_iter(&text) {
        for entry in BFRANGE_ENTRY.captures_iter(&section[1]) {
            let (Some(lo), Some(hi)) = (parse_code(&entry[1]), parse_code(&entry[2])) else {
                continue;
            };
            if hi < lo || hi - lo > MAX_BFRANGE_SPAN {
                warn!(lo, hi, "ignoring malformed bfrange");
                continue;
            }

            if let Some(start) = entry.get(3) {
                let Some(units) = utf16_units(start.as_str()) else {
                    continue;
                };
                for offset in 0..=(hi - lo) {
                    let mut units = units.clone();
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(offset as u16);
                    }
                    map.insert(lo + offset, String::from_utf16_lossy(&units));
                }
            } else if let Some(array) = entry.get(4) {
                for (code, hex) in (lo..=hi).zip(HEX_STRING.captures_iter(array.as_str())) {
                    if let Some(unicode) = utf16_hex(&hex[1]) {
                        map.insert(code, unicode);
                    }
                }
            }
        }
    }

    debug!(mappings = map.len(), "parsed ToUnicode CMap");
    map
}

fn parse_code(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;
    if digits.is_empty() {
        return None;
    }
    let bytes: Vec<u8> = digits
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect();
    if bytes.len() == 1 {
        return Some(vec![u16::from(bytes[0])]);
    }
    Some(
        bytes
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect(),
    )
}

fn utf16_hex(hex: &str) -> Option<String> {
    utf16_units(hex).map(|units| String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_encodings_differ_where_expected() {
        assert_eq!(BaseEncoding::WinAnsi.decode(0x27), Some('\''));
        assert_eq!(BaseEncoding::Standard.decode(0x27), Some('\u{2019}'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x80), Some('€'));
        assert_eq!(BaseEncoding::MacRoman.decode(0x8E), Some('é'));
        assert_eq!(BaseEncoding::MacRoman.decode(0xAD), None);
        assert_eq!(BaseEncoding::Standard.decode(0xE1), Some('Æ'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x01), None);
        assert_eq!(BaseEncoding::from_name(b"MacRomanEncoding"), Some(BaseEncoding::MacRoman));
        assert_eq!(BaseEncoding::from_name(b"Identity-H"), None);
    }

    #[test]
    fn test_pdfdoc_upper_range() {
        assert_eq!(pdfdoc_char(b'A'), Some('A'));
        assert_eq!(pdfdoc_char(0x84), Some('—'));
        assert_eq!(pdfdoc_char(0x8D), Some('“'));
        assert_eq!(pdfdoc_char(0xA0), Some('€'));
        assert_eq!(pdfdoc_char(0xE9), Some('é'));
        assert_eq!(pdfdoc_char(0x9F), None);
        assert_eq!(pdfdoc_char(0xAD), None);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_char("H"), Some('H'));
        assert_eq!(glyph_name_to_char("space"), Some(' '));
        assert_eq!(glyph_name_to_char("seven"), Some('7'));
        assert_eq!(glyph_name_to_char("eacute"), Some('é'));
        assert_eq!(glyph_name_to_char("Ntilde"), Some('Ñ'));
        assert_eq!(glyph_name_to_char("ccedilla"), Some('ç'));
        assert_eq!(glyph_name_to_char("fi"), Some('ﬁ'));
        assert_eq!(glyph_name_to_char("uni20AC"), Some('€'));
        assert_eq!(glyph_name_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_name_to_char("g123"), None);
        assert_eq!(glyph_name_to_char("xacute"), None);
    }

    #[test]
    fn test_to_unicode_bfchar_and_ranges() {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange <0000> <FFFF> endcodespacerange
2 beginbfchar
<0003> <0020>
<0010> <00660069>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0078> <D83DDE00>]
endbfrange
endcmap";
        let map = parse_to_unicode(cmap);

        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x10).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x30).map(String::as_str), Some("x"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("😀"));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn test_oversized_range_is_ignored() {
        let map = parse_to_unicode(b"beginbfrange <00000000> <FFFFFFFF> <0041> endbfrange");
        assert!(map.is_empty());
    }
}
