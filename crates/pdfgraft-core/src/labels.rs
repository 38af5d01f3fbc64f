//! Page labels
//!
//! Label rules live in the catalog's `/PageLabels` number tree. Each rule
//! governs the pages from its `start_page` up to the next rule and renders
//! `prefix + number` in its style, counting from `first_page_num`.

use crate::document::{decode_text_string, encode_text_string, number, resolve, Document};
use crate::error::PdfGraftError;
use lopdf::{Dictionary, Object, StringFormat};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

const MAX_NUMBER_TREE_DEPTH: usize = 32;

/// Larger numbers render in decimal under the roman styles.
const MAX_ROMAN: i64 = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelStyle {
    #[serde(rename = "D")]
    Decimal,
    #[serde(rename = "R")]
    RomanUpper,
    #[serde(rename = "r")]
    RomanLower,
    #[serde(rename = "A")]
    AlphaUpper,
    #[serde(rename = "a")]
    AlphaLower,
    /// Prefix only
    #[default]
    #[serde(rename = "")]
    None,
}

impl LabelStyle {
    /// The one-letter code used in `/S` entries, empty for [`LabelStyle::None`]
    pub fn code(self) -> &'static str {
        match self {
            LabelStyle::Decimal => "D",
            LabelStyle::RomanUpper => "R",
            LabelStyle::RomanLower => "r",
            LabelStyle::AlphaUpper => "A",
            LabelStyle::AlphaLower => "a",
            LabelStyle::None => "",
        }
    }

    pub fn format(self, n: i64) -> String {
        match self {
            LabelStyle::Decimal => n.to_string(),
            LabelStyle::RomanUpper => to_roman(n),
            LabelStyle::RomanLower => to_roman(n).to_lowercase(),
            LabelStyle::AlphaUpper => to_alpha(n).to_uppercase(),
            LabelStyle::AlphaLower => to_alpha(n),
            LabelStyle::None => String::new(),
        }
    }
}

impl FromStr for LabelStyle {
    type Err = PdfGraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "D" => Ok(LabelStyle::Decimal),
            "R" => Ok(LabelStyle::RomanUpper),
            "r" => Ok(LabelStyle::RomanLower),
            "A" => Ok(LabelStyle::AlphaUpper),
            "a" => Ok(LabelStyle::AlphaLower),
            "" => Ok(LabelStyle::None),
            other => Err(PdfGraftError::MalformedLabel(format!(
                "unknown label style '{}'",
                other
            ))),
        }
    }
}

fn default_first_page_num() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLabelRule {
    pub start_page: usize,
    #[serde(default)]
    pub style: LabelStyle,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_first_page_num")]
    pub first_page_num: i64,
}

impl PageLabelRule {
    pub fn new(start_page: usize, style: LabelStyle, prefix: impl Into<String>) -> Self {
        Self {
            start_page,
            style,
            prefix: prefix.into(),
            first_page_num: 1,
        }
    }

    pub fn starting_at(mut self, first_page_num: i64) -> Self {
        self.first_page_num = first_page_num;
        self
    }

    /// Label of page `page`. Fails for pages before `start_page` and when the
    /// label number does not fit an `i64`.
    pub(crate) fn render(&self, page: usize) -> Result<String, PdfGraftError> {
        let n = page
            .checked_sub(self.start_page)
            .and_then(|offset| i64::try_from(offset).ok())
            .and_then(|offset| self.first_page_num.max(1).checked_add(offset))
            .ok_or_else(|| {
                PdfGraftError::MalformedLabel(format!(
                    "no label number for page {} under the rule starting at page {} with /St {}",
                    page, self.start_page, self.first_page_num
                ))
            })?;
        Ok(format!("{}{}", self.prefix, self.style.format(n)))
    }

    fn to_pdf(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        if self.style != LabelStyle::None {
            dict.set("S", Object::Name(self.style.code().as_bytes().to_vec()));
        }
        if !self.prefix.is_empty() {
            dict.set(
                "P",
                Object::String(encode_text_string(&self.prefix), StringFormat::Literal),
            );
        }
        if self.first_page_num > 1 {
            dict.set("St", Object::Integer(self.first_page_num));
        }
        dict
    }

    fn from_pdf(graph: &lopdf::Document, start: i64, dict: &Dictionary) -> Result<Self, PdfGraftError> {
        if start < 0 {
            return Err(PdfGraftError::MalformedLabel(format!(
                "negative start page {}",
                start
            )));
        }
        let style = match dict.get(b"S") {
            Ok(Object::Name(name)) => std::str::from_utf8(name)
                .map_err(|_| PdfGraftError::MalformedLabel("style is not ASCII".into()))?
                .parse()?,
            _ => LabelStyle::None,
        };
        let prefix = match dict.get(b"P").ok().map(|p| resolve(graph, p)).transpose()? {
            Some(Object::String(bytes, _)) => decode_text_string(bytes),
            _ => String::new(),
        };
        let first_page_num = match dict.get(b"St").ok().and_then(|st| resolve(graph, st).ok()) {
            Some(Object::Integer(st)) => (*st).max(1),
            Some(other) => number(other).map_or(1, |st| (st as i64).max(1)),
            None => 1,
        };
        Ok(Self {
            start_page: start as usize,
            style,
            prefix,
            first_page_num,
        })
    }
}

fn to_roman(mut n: i64) -> String {
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n > MAX_ROMAN {
        return n.to_string();
    }
    let mut out = String::new();
    for &(value, numeral) in &NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Bijective base-26: 1 = a, 26 = z, 27 = aa
fn to_alpha(mut n: i64) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

impl Document {
    /// Label rules ordered by start page.
    pub fn page_label_rules(&self) -> Result<Vec<PageLabelRule>, PdfGraftError> {
        let graph = self.live("page_label_rules")?;
        let catalog = self.catalog("page_label_rules")?;
        let Ok(tree) = catalog.get(b"PageLabels") else {
            return Ok(Vec::new());
        };
        let tree = resolve(graph, tree)?
            .as_dict()
            .map_err(|_| PdfGraftError::MalformedLabel("/PageLabels is not a dictionary".into()))?;

        let mut entries = Vec::new();
        collect_number_tree(graph, tree, &mut entries, 0)?;
        let mut rules = entries
            .into_iter()
            .map(|(start, dict)| PageLabelRule::from_pdf(graph, start, dict))
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by_key(|rule| rule.start_page);
        Ok(rules)
    }

    /// Replace every label rule. Rules are stored sorted by start page; two
    /// rules with the same start page are rejected.
    pub fn set_page_label_rules(&mut self, rules: &[PageLabelRule]) -> Result<(), PdfGraftError> {
        let mut rules = rules.to_vec();
        rules.sort_by_key(|rule| rule.start_page);
        if let Some(pair) = rules.windows(2).find(|w| w[0].start_page == w[1].start_page) {
            return Err(PdfGraftError::MalformedLabel(format!(
                "two rules start at page {}",
                pair[0].start_page
            )));
        }
        for rule in &mut rules {
            rule.first_page_num = rule.first_page_num.max(1);
        }

        self.atomically("set_page_label_rules", |doc| {
            let catalog = doc.catalog_mut("set_page_label_rules")?;
            if rules.is_empty() {
                catalog.remove(b"PageLabels");
            } else {
                let mut nums = Vec::with_capacity(rules.len() * 2);
                for rule in &rules {
                    nums.push(Object::Integer(rule.start_page as i64));
                    nums.push(Object::Dictionary(rule.to_pdf()));
                }
                let mut tree = Dictionary::new();
                tree.set("Nums", Object::Array(nums));
                catalog.set("PageLabels", Object::Dictionary(tree));
            }
            info!(doc = ?doc.id(), rules = rules.len(), "page labels replaced");
            Ok(())
        })
    }

    /// Add or replace the rule starting at page `index`.
    pub fn set_page_label(
        &mut self,
        index: usize,
        style: LabelStyle,
        prefix: &str,
        first_page_num: i64,
    ) -> Result<(), PdfGraftError> {
        let count = self.page_count()?;
        if index >= count {
            return Err(PdfGraftError::PageOutOfRange {
                operation: "set_page_label",
                index: index as i64,
                count,
            });
        }
        let mut rules = self.page_label_rules()?;
        rules.retain(|rule| rule.start_page != index);
        rules.push(PageLabelRule::new(index, style, prefix).starting_at(first_page_num));
        self.set_page_label_rules(&rules)
    }

    /// Remove the rule starting at page `index`, if there is one.
    pub fn delete_page_label(&mut self, index: usize) -> Result<(), PdfGraftError> {
        let mut rules = self.page_label_rules()?;
        let before = rules.len();
        rules.retain(|rule| rule.start_page != index);
        if rules.len() == before {
            debug!(index, "no page label rule to delete");
            return Ok(());
        }
        self.set_page_label_rules(&rules)
    }

    /// Rendered label of page `index`, or `None` if no rule governs it.
    pub fn page_label(&self, index: usize) -> Result<Option<String>, PdfGraftError> {
        let rules = self.page_label_rules()?;
        governing_rule(&rules, index)
            .map(|rule| rule.render(index))
            .transpose()
    }

    /// Zero-based indices of the pages whose label is exactly `label`.
    pub fn get_page_numbers(&self, label: &str, only_first: bool) -> Result<Vec<usize>, PdfGraftError> {
        let rules = self.page_label_rules()?;
        let count = self.page_count()?;

        let mut matches = Vec::new();
        for page in 0..=count {
            let Some(rule) = governing_rule(&rules, page) else {
                continue;
            };
            if rule.render(page)? == label {
                matches.push(page);
                if only_first {
                    break;
                }
            }
        }
        Ok(matches)
    }
}

/// The rule with the greatest start page not after `page`. `rules` must be
/// sorted by start page.
fn governing_rule(rules: &[PageLabelRule], page: usize) -> Option<&PageLabelRule> {
    rules.iter().rev().find(|rule| rule.start_page <= page)
}

fn collect_number_tree<'a>(
    graph: &'a lopdf::Document,
    node: &'a Dictionary,
    out: &mut Vec<(i64, &'a Dictionary)>,
    depth: usize,
) -> Result<(), PdfGraftError> {
    if depth > MAX_NUMBER_TREE_DEPTH {
        return Err(PdfGraftError::MalformedLabel("number tree too deep".into()));
    }

    if let Ok(nums) = node.get(b"Nums") {
        let nums = resolve(graph, nums)?
            .as_array()
            .map_err(|_| PdfGraftError::MalformedLabel("/Nums is not an array".into()))?;
        for pair in nums.chunks(2) {
            let [key, value] = pair else {
                return Err(PdfGraftError::MalformedLabel(
                    "/Nums has an odd number of entries".into(),
                ));
            };
            let start = match resolve(graph, key)? {
                Object::Integer(i) => *i,
                _ => {
                    return Err(PdfGraftError::MalformedLabel(
                        "number tree key is not an integer".into(),
                    ))
                }
            };
            let dict = resolve(graph, value)?
                .as_dict()
                .map_err(|_| PdfGraftError::MalformedLabel("label entry is not a dictionary".into()))?;
            out.push((start, dict));
        }
    }

    if let Ok(kids) = node.get(b"Kids") {
        let kids = resolve(graph, kids)?
            .as_array()
            .map_err(|_| PdfGraftError::MalformedLabel("/Kids is not an array".into()))?;
        for kid in kids {
            let kid = resolve(graph, kid)?
                .as_dict()
                .map_err(|_| PdfGraftError::MalformedLabel("number tree kid is not a dictionary".into()))?;
            collect_number_tree(graph, kid, out, depth + 1)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_document;
    use pretty_assertions::assert_eq;

    fn labelled(pages: usize) -> Document {
        let mut doc = sample_document(pages, "L");
        doc.set_page_label_rules(&[
            PageLabelRule::new(0, LabelStyle::RomanLower, "Cover-"),
            PageLabelRule::new(1, LabelStyle::Decimal, "Page-"),
            PageLabelRule::new(5, LabelStyle::AlphaUpper, "Appendix-"),
        ])
        .unwrap();
        doc
    }

    #[test]
    fn test_get_page_numbers_across_styles() {
        let doc = labelled(10);
        assert_eq!(doc.get_page_numbers("Cover-i", false).unwrap(), vec![0]);
        assert_eq!(doc.get_page_numbers("Page-1", false).unwrap(), vec![1]);
        assert_eq!(doc.get_page_numbers("Page-4", false).unwrap(), vec![4]);
        assert_eq!(doc.get_page_numbers("Appendix-A", false).unwrap(), vec![5]);
        assert_eq!(doc.get_page_numbers("Appendix-E", false).unwrap(), vec![9]);
        assert_eq!(doc.get_page_numbers("Page-5", false).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_duplicate_labels_and_only_first() {
        let mut doc = sample_document(10, "L");
        doc.set_page_label_rules(&[
            PageLabelRule::new(0, LabelStyle::Decimal, "Page-"),
            PageLabelRule::new(5, LabelStyle::Decimal, "Page-"),
        ])
        .unwrap();
        assert_eq!(doc.get_page_numbers("Page-1", true).unwrap(), vec![0]);
        assert_eq!(doc.get_page_numbers("Page-1", false).unwrap(), vec![0, 5]);
    }

    #[test]
    fn test_scan_includes_page_count() {
        let mut doc = sample_document(3, "L");
        doc.set_page_label_rules(&[PageLabelRule::new(0, LabelStyle::Decimal, "")])
            .unwrap();
        assert_eq!(doc.get_page_numbers("4", false).unwrap(), vec![3]);
    }

    #[test]
    fn test_no_rules_no_labels() {
        let doc = sample_document(3, "L");
        assert!(doc.page_label_rules().unwrap().is_empty());
        assert_eq!(doc.page_label(0).unwrap(), None);
        assert!(doc.get_page_numbers("1", false).unwrap().is_empty());
    }

    #[test]
    fn test_pages_before_first_rule_have_no_label() {
        let mut doc = sample_document(4, "L");
        doc.set_page_label_rules(&[PageLabelRule::new(2, LabelStyle::Decimal, "")])
            .unwrap();
        assert_eq!(doc.page_label(1).unwrap(), None);
        assert_eq!(doc.page_label(2).unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_rules_round_trip_sorted_with_defaults() {
        let mut doc = sample_document(12, "L");
        doc.set_page_label_rules(&[
            PageLabelRule::new(10, LabelStyle::None, "B-").starting_at(3),
            PageLabelRule::new(0, LabelStyle::Decimal, "A-").starting_at(2),
            PageLabelRule::new(5, LabelStyle::RomanUpper, "").starting_at(0),
        ])
        .unwrap();

        assert_eq!(
            doc.page_label_rules().unwrap(),
            vec![
                PageLabelRule::new(0, LabelStyle::Decimal, "A-").starting_at(2),
                PageLabelRule::new(5, LabelStyle::RomanUpper, ""),
                PageLabelRule::new(10, LabelStyle::None, "B-").starting_at(3),
            ]
        );
        assert_eq!(doc.page_label(0).unwrap().as_deref(), Some("A-2"));
        assert_eq!(doc.page_label(6).unwrap().as_deref(), Some("II"));
        assert_eq!(doc.page_label(11).unwrap().as_deref(), Some("B-"));
    }

    #[test]
    fn test_duplicate_start_page_rejected() {
        let mut doc = sample_document(3, "L");
        let err = doc
            .set_page_label_rules(&[
                PageLabelRule::new(1, LabelStyle::Decimal, ""),
                PageLabelRule::new(1, LabelStyle::RomanUpper, ""),
            ])
            .unwrap_err();
        assert!(matches!(err, PdfGraftError::MalformedLabel(_)));
        assert!(doc.page_label_rules().unwrap().is_empty());
    }

    #[test]
    fn test_set_and_delete_single_rule() {
        let mut doc = sample_document(6, "L");
        doc.set_page_label(0, LabelStyle::RomanLower, "", 1).unwrap();
        doc.set_page_label(3, LabelStyle::Decimal, "", 1).unwrap();
        assert_eq!(doc.page_label(2).unwrap().as_deref(), Some("iii"));
        assert_eq!(doc.page_label(4).unwrap().as_deref(), Some("2"));

        doc.set_page_label(3, LabelStyle::AlphaLower, "x", 1).unwrap();
        assert_eq!(doc.page_label(3).unwrap().as_deref(), Some("xa"));

        doc.delete_page_label(3).unwrap();
        assert_eq!(doc.page_label(4).unwrap().as_deref(), Some("v"));
        assert!(doc.set_page_label(6, LabelStyle::Decimal, "", 1).is_err());
    }

    #[test]
    fn test_labels_survive_save() {
        let mut doc = labelled(10);
        let bytes = doc.save_to_buffer("").unwrap();
        let reopened = Document::open(&bytes).unwrap();
        assert_eq!(reopened.get_page_numbers("Appendix-C", false).unwrap(), vec![7]);
    }

    #[test]
    fn test_number_tree_kids_are_read() {
        let mut doc = sample_document(4, "L");
        let graph = doc.graph_mut().unwrap();
        let leaf = graph.add_object(Dictionary::from_iter(vec![
            ("Limits", Object::Array(vec![0.into(), 2.into()])),
            (
                "Nums",
                Object::Array(vec![
                    0.into(),
                    Object::Dictionary(Dictionary::from_iter(vec![("S", Object::Name(b"r".to_vec()))])),
                    2.into(),
                    Object::Dictionary(Dictionary::from_iter(vec![("S", Object::Name(b"D".to_vec()))])),
                ]),
            ),
        ]));
        let catalog = doc.catalog_mut("test").unwrap();
        catalog.set(
            "PageLabels",
            Dictionary::from_iter(vec![("Kids", Object::Array(vec![Object::Reference(leaf)]))]),
        );

        assert_eq!(doc.page_label(1).unwrap().as_deref(), Some("ii"));
        assert_eq!(doc.page_label(3).unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(to_roman(1994), "MCMXCIV");
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_alpha(1), "a");
        assert_eq!(to_alpha(26), "z");
        assert_eq!(to_alpha(27), "aa");
        assert_eq!(to_alpha(28), "ab");
        assert_eq!(LabelStyle::AlphaUpper.format(53), "BA");
        assert_eq!(LabelStyle::None.format(7), "");
    }

    #[test]
    fn test_huge_start_number_is_an_error() {
        let mut doc = sample_document(2, "L");
        let rule = PageLabelRule::new(0, LabelStyle::Decimal, "").starting_at(i64::MAX);
        doc.set_page_label_rules(&[rule]).unwrap();
        assert_eq!(
            doc.page_label(0).unwrap().as_deref(),
            Some(i64::MAX.to_string().as_str())
        );
        assert!(matches!(doc.page_label(1), Err(PdfGraftError::MalformedLabel(_))));
        assert!(doc.get_page_numbers("1", false).is_err());
    }

    #[test]
    fn test_large_roman_numbers_fall_back_to_decimal() {
        assert_eq!(to_roman(3999), "MMMCMXCIX");
        assert_eq!(to_roman(MAX_ROMAN).len(), 100);
        assert_eq!(LabelStyle::RomanLower.format(MAX_ROMAN + 1), "100001");

        let mut doc = sample_document(2, "L");
        doc.set_page_label(0, LabelStyle::RomanUpper, "", 4_000_000_000_000)
            .unwrap();
        assert_eq!(doc.page_label(1).unwrap().as_deref(), Some("4000000000001"));
    }

    #[test]
    fn test_render_before_start_page_fails() {
        let rule = PageLabelRule::new(3, LabelStyle::Decimal, "");
        assert!(rule.render(2).is_err());
        assert_eq!(rule.render(4).unwrap(), "2");
    }

    #[test]
    fn test_style_codes() {
        assert_eq!("r".parse::<LabelStyle>().unwrap(), LabelStyle::RomanLower);
        assert_eq!("".parse::<LabelStyle>().unwrap(), LabelStyle::None);
        assert!("X".parse::<LabelStyle>().is_err());
        assert_eq!(serde_json::to_string(&LabelStyle::AlphaLower).unwrap(), "\"a\"");
    }
}
