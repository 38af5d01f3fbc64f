//! Page copy and merge
//!
//! Pages are grafted from a source document into a target. One [`GraftMap`]
//! is shared across a whole merge so resources shared between source pages
//! are copied into the target once. Link and markup annotations travel
//! through the same map.

use crate::document::{normalize_rotation, resolve, resolve_insert_index, Document};
use crate::error::PdfGraftError;
use crate::graft::GraftMap;
use lopdf::{Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Annotation keys that point back into the source page structure
const ANNOTATION_BACK_REFERENCES: [&[u8]; 4] = [b"P", b"Parent", b"Popup", b"IRT"];

/// Page range and placement for [`merge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// First source page (clamped into the source)
    pub from: i64,
    /// Last source page, inclusive; negative means the last page
    pub to: i64,
    /// Target insertion index; negative means append
    pub start_at: i64,
    /// Degrees added to each copied page's rotation
    pub rotate: i64,
    /// Copy link annotations that open a URI
    pub copy_links: bool,
    /// Copy every other annotation
    pub copy_annotations: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            from: 0,
            to: -1,
            start_at: -1,
            rotate: 0,
            copy_links: true,
            copy_annotations: true,
        }
    }
}

/// Copy one page of `src` into `dest`.
///
/// `from` must name an existing source page. `insert_at` of `-1` (or the
/// target's page count) appends. Without a map a fresh one is used, so
/// nothing is shared with earlier copies.
pub fn copy_single_page(
    dest: &mut Document,
    src: &Document,
    from: i64,
    insert_at: i64,
    map: Option<&mut GraftMap>,
) -> Result<ObjectId, PdfGraftError> {
    let count = src.page_count()?;
    if from < 0 || from >= count as i64 {
        return Err(PdfGraftError::PageOutOfRange {
            operation: "copy_single_page",
            index: from,
            count,
        });
    }
    resolve_insert_index("copy_single_page", insert_at, dest.page_count()?)?;

    match map {
        Some(map) => map.graft_page(dest, insert_at, src, from as usize),
        None => GraftMap::new(dest).graft_page(dest, insert_at, src, from as usize),
    }
}

/// Copy the page range `[from, to]` of `source` into `target`.
///
/// Out-of-range arguments are clamped rather than rejected, and a reversed
/// range is swapped; only a rotation that is not a multiple of 90 is an
/// error. Either every page is copied or the target is left as it was.
pub fn merge(
    target: &mut Document,
    source: &Document,
    options: MergeOptions,
) -> Result<(), PdfGraftError> {
    if options.rotate % 90 != 0 {
        return Err(PdfGraftError::InvalidRotation(options.rotate));
    }

    let source_count = source.page_count()? as i64;
    let target_count = target.page_count()? as i64;
    if source_count == 0 {
        info!(target = ?target.id(), "merge: source has no pages");
        return Ok(());
    }

    let mut from = options.from.clamp(0, source_count - 1);
    let mut to = if options.to < 0 {
        source_count - 1
    } else {
        options.to.min(source_count - 1)
    };
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }
    let start_at = if options.start_at < 0 {
        target_count
    } else {
        options.start_at.min(target_count)
    };

    target.atomically("merge", |target| {
        let mut map = GraftMap::new(target);
        for page in from..=to {
            let page_id = map.graft_page(target, start_at + page - from, source, page as usize)?;
            if options.copy_links || options.copy_annotations {
                copy_page_annotations(target, source, &mut map, page as usize, page_id, &options)?;
            }
            if options.rotate != 0 {
                rotate_page(target, page_id, options.rotate)?;
            }
        }
        info!(
            target = ?target.id(),
            source = ?source.id(),
            from,
            to,
            start_at,
            grafted_objects = map.len(),
            "merged pages"
        );
        Ok(())
    })
}

/// Merge several serialized documents, in order, into a new document.
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Document, PdfGraftError> {
    if documents.is_empty() {
        return Err(PdfGraftError::OperationError("No documents to merge".into()));
    }

    let mut merged = Document::new();
    for (i, bytes) in documents.iter().enumerate() {
        let source = Document::open(bytes).map_err(|e| {
            PdfGraftError::ParseError(format!("Failed to load document {}: {}", i, e))
        })?;
        merge(&mut merged, &source, MergeOptions::default())?;
    }
    Ok(merged)
}

/// Graft the annotations of source page `index` onto `page_id`, keeping
/// links only when they open a URI. Returns the number copied.
fn copy_page_annotations(
    target: &mut Document,
    source: &Document,
    map: &mut GraftMap,
    index: usize,
    page_id: ObjectId,
    options: &MergeOptions,
) -> Result<usize, PdfGraftError> {
    let page = source.load_page(index)?;
    let graph = source.live("merge")?;
    let Ok(annots) = page.dictionary()?.get(b"Annots") else {
        return Ok(0);
    };
    let Ok(annots) = resolve(graph, annots)?.as_array() else {
        return Ok(0);
    };

    let mut copied = Vec::new();
    for annot in annots {
        let Ok(dict) = resolve(graph, annot)?.as_dict() else {
            continue;
        };
        let is_link = matches!(dict.get(b"Subtype"), Ok(Object::Name(s)) if s == b"Link");
        if (is_link && !options.copy_links) || (!is_link && !options.copy_annotations) {
            continue;
        }

        let mut annotation = dict.clone();
        for key in ANNOTATION_BACK_REFERENCES {
            annotation.remove(key);
        }
        if is_link {
            // Destinations name source pages; only URI actions survive
            annotation.remove(b"Dest");
            let opens_uri = annotation
                .get(b"A")
                .ok()
                .and_then(|a| resolve(graph, a).ok())
                .and_then(|a| a.as_dict().ok())
                .is_some_and(|a| matches!(a.get(b"S"), Ok(Object::Name(s)) if s == b"URI"));
            if !opens_uri {
                debug!(page = index, "skipping internal link");
                continue;
            }
        }

        let Object::Dictionary(mut annotation) =
            map.graft_object(target, source, &Object::Dictionary(annotation))?
        else {
            continue;
        };
        annotation.set("P", Object::Reference(page_id));
        copied.push(Object::Reference(target.add_object(Object::Dictionary(annotation))?));
    }

    let count = copied.len();
    if count > 0 {
        let graph = target.live_mut("merge")?;
        graph
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfGraftError::OperationError(format!("page {:?}: {}", page_id, e)))?
            .set("Annots", Object::Array(copied));
    }
    Ok(count)
}

fn rotate_page(doc: &mut Document, page_id: ObjectId, degrees: i64) -> Result<(), PdfGraftError> {
    let graph = doc.live_mut("merge")?;
    let page = graph
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfGraftError::OperationError(format!("page {:?}: {}", page_id, e)))?;

    let current = match page.get(b"Rotate") {
        Ok(Object::Integer(r)) => Some(*r),
        Ok(Object::Real(r)) => Some(*r as i64),
        _ => None,
    };
    let rotated = normalize_rotation(current.unwrap_or(0) + degrees);
    if rotated == 0 && current.is_none() {
        return Ok(());
    }
    page.set("Rotate", Object::Integer(rotated));
    Ok(())
}
