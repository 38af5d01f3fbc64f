//! Document split
//!
//! Builds new documents from page intervals of an input document. The input
//! is only read; every output gets its own graft map.

use crate::document::Document;
use crate::error::PdfGraftError;
use crate::graft::GraftMap;
use std::ops::Range;
use tracing::{debug, info};

/// Split `doc` into several new documents.
///
/// Without boundaries (or with an empty list) every page becomes its own
/// document. Otherwise boundaries `r` describe the intervals
/// `[r[0], r[1]), [r[1], r[2]), ..., [r[last], page_count)`. Interval ends
/// beyond the document are clamped and intervals left empty are skipped.
pub fn split(doc: &Document, ranges: Option<&[i64]>) -> Result<Vec<Document>, PdfGraftError> {
    let page_count = doc.page_count()?;
    let intervals = page_intervals(page_count, ranges.unwrap_or(&[]))?;

    let mut outputs = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let mut out = Document::new();
        let mut map = GraftMap::new(&out);
        for page in interval.clone() {
            map.graft_page(&mut out, -1, doc, page)?;
        }
        debug!(pages = ?interval, "split interval");
        outputs.push(out);
    }

    info!(
        source = ?doc.id(),
        page_count,
        documents = outputs.len(),
        "split document"
    );
    Ok(outputs)
}

/// Resolve split boundaries into non-empty page index ranges.
pub fn page_intervals(page_count: usize, ranges: &[i64]) -> Result<Vec<Range<usize>>, PdfGraftError> {
    if let Some(bad) = ranges.iter().find(|&&r| r < 0) {
        return Err(PdfGraftError::InvalidRange(format!(
            "split boundary {} is negative",
            bad
        )));
    }

    if ranges.is_empty() {
        return Ok((0..page_count).map(|p| p..p + 1).collect());
    }

    let clamp = |r: i64| (r as usize).min(page_count);
    Ok(ranges
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = ranges.get(i + 1).map_or(page_count, |&next| clamp(next));
            clamp(start)..end
        })
        .filter(|interval| !interval.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{page_text, sample_document};
    use pretty_assertions::assert_eq;

    fn texts(docs: &[Document]) -> Vec<Vec<String>> {
        docs.iter()
            .map(|d| (0..d.page_count().unwrap()).map(|i| page_text(d, i)).collect())
            .collect()
    }

    #[test]
    fn test_split_without_ranges_gives_one_document_per_page() {
        let doc = sample_document(3, "S");
        let parts = split(&doc, None).unwrap();
        assert_eq!(
            texts(&parts),
            vec![vec!["S-Page-1"], vec!["S-Page-2"], vec!["S-Page-3"]]
        );

        let parts = split(&doc, Some(&[])).unwrap();
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_split_by_boundaries() {
        let doc = sample_document(5, "S");
        let parts = split(&doc, Some(&[0, 2, 3])).unwrap();
        assert_eq!(
            texts(&parts),
            vec![
                vec!["S-Page-1", "S-Page-2"],
                vec!["S-Page-3"],
                vec!["S-Page-4", "S-Page-5"],
            ]
        );
    }

    #[test]
    fn test_split_leaves_input_untouched() {
        let doc = sample_document(4, "S");
        let objects = doc.graph().unwrap().objects.len();
        split(&doc, Some(&[1])).unwrap();
        assert_eq!(doc.page_count().unwrap(), 4);
        assert_eq!(doc.graph().unwrap().objects.len(), objects);
    }

    #[test]
    fn test_split_negative_boundary_fails() {
        let doc = sample_document(3, "S");
        let err = split(&doc, Some(&[0, -1])).unwrap_err();
        assert!(matches!(err, PdfGraftError::InvalidRange(_)));
    }

    #[test]
    fn test_intervals_clamp_and_skip_empty() {
        assert_eq!(page_intervals(4, &[2, 10]).unwrap(), vec![2..4]);
        assert_eq!(page_intervals(4, &[3, 1]).unwrap(), vec![1..4]);
        assert_eq!(page_intervals(4, &[5]).unwrap(), Vec::<Range<usize>>::new());
        assert_eq!(page_intervals(0, &[]).unwrap(), Vec::<Range<usize>>::new());
    }

    #[test]
    fn test_outputs_share_font_within_document() {
        let doc = sample_document(3, "S");
        let parts = split(&doc, Some(&[0])).unwrap();
        assert_eq!(parts.len(), 1);
        let fonts = parts[0]
            .graph()
            .unwrap()
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| matches!(d.get(b"Type"), Ok(lopdf::Object::Name(n)) if n == b"Font"))
            .count();
        assert_eq!(fonts, 1);
    }
}
