//! Cross-document object copying
//!
//! A [`GraftMap`] remembers which source objects have already been copied
//! into one destination document, so objects shared by several grafted pages
//! (fonts, images, resource dictionaries) land in the destination once.

use crate::document::{inherited_attribute, resolve_insert_index, Document, DocumentId};
use crate::error::PdfGraftError;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::debug;

/// Page keys carried over when a page is grafted, looked up through
/// inheritance on the source page.
const GRAFTED_PAGE_KEYS: [&[u8]; 4] = [b"MediaBox", b"Rotate", b"Resources", b"Contents"];

#[derive(Debug, Clone)]
pub struct GraftMap {
    dest: DocumentId,
    map: HashMap<(DocumentId, ObjectId), ObjectId>,
}

impl GraftMap {
    pub fn new(dest: &Document) -> Self {
        Self {
            dest: dest.id(),
            map: HashMap::new(),
        }
    }

    pub fn destination(&self) -> DocumentId {
        self.dest
    }

    /// Number of source objects copied so far
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Destination id for a source object, if it has been grafted.
    pub fn get(&self, src: DocumentId, id: ObjectId) -> Option<ObjectId> {
        self.map.get(&(src, id)).copied()
    }

    /// Deep-copy `object` from `src` into `dest`, grafting every reference
    /// it reaches.
    pub fn graft_object(
        &mut self,
        dest: &mut Document,
        src: &Document,
        object: &Object,
    ) -> Result<Object, PdfGraftError> {
        self.check_destination(dest)?;
        let src_id = src.id();
        let src_graph = src.live("graft_object")?;
        let dest_graph = dest.live_mut("graft_object")?;
        self.copy(dest_graph, src_id, src_graph, object)
    }

    /// Copy page `index` of `src` into `dest` at `insert_at` (`-1` appends).
    /// Returns the new page's object id.
    pub fn graft_page(
        &mut self,
        dest: &mut Document,
        insert_at: i64,
        src: &Document,
        index: usize,
    ) -> Result<ObjectId, PdfGraftError> {
        self.check_destination(dest)?;

        let src_pages = src.page_ids()?;
        let src_page = *src_pages
            .get(index)
            .ok_or(PdfGraftError::PageOutOfRange {
                operation: "graft_page",
                index: index as i64,
                count: src_pages.len(),
            })?;
        let at = resolve_insert_index("graft_page", insert_at, dest.page_count()?)?;

        let src_id = src.id();
        let src_graph = src.live("graft_page")?;
        let dest_graph = dest.live_mut("graft_page")?;

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        for key in GRAFTED_PAGE_KEYS {
            let value = if key == b"Contents" {
                src_graph
                    .get_object(src_page)
                    .and_then(Object::as_dict)
                    .ok()
                    .and_then(|dict| dict.get(key).ok())
            } else {
                inherited_attribute(src_graph, src_page, key)?
            };
            if let Some(value) = value {
                let copied = self.copy(dest_graph, src_id, src_graph, value)?;
                page.set(key.to_vec(), copied);
            }
        }
        let page_id = dest_graph.add_object(page);

        dest.insert_page(at as i64, page_id)?;
        debug!(
            src_page = index,
            dest_page = at,
            grafted = self.map.len(),
            "grafted page"
        );
        Ok(page_id)
    }

    fn check_destination(&self, dest: &Document) -> Result<(), PdfGraftError> {
        if dest.id() == self.dest {
            Ok(())
        } else {
            Err(PdfGraftError::GraftMapMismatch)
        }
    }

    fn copy(
        &mut self,
        dest: &mut lopdf::Document,
        src_id: DocumentId,
        src: &lopdf::Document,
        object: &Object,
    ) -> Result<Object, PdfGraftError> {
        match object {
            Object::Reference(id) => {
                if let Some(&mapped) = self.map.get(&(src_id, *id)) {
                    return Ok(Object::Reference(mapped));
                }
                // Record the mapping before descending so cycles resolve to it
                let new_id = dest.new_object_id();
                self.map.insert((src_id, *id), new_id);
                let copied = match src.objects.get(id) {
                    Some(target) => self.copy(dest, src_id, src, target)?,
                    None => Object::Null,
                };
                dest.objects.insert(new_id, copied);
                Ok(Object::Reference(new_id))
            }
            Object::Array(items) => items
                .iter()
                .map(|item| self.copy(dest, src_id, src, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Object::Array),
            Object::Dictionary(dict) => {
                Ok(Object::Dictionary(self.copy_dictionary(dest, src_id, src, dict)?))
            }
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(dest, src_id, src, &stream.dict)?;
                Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
            }
            direct => Ok(direct.clone()),
        }
    }

    fn copy_dictionary(
        &mut self,
        dest: &mut lopdf::Document,
        src_id: DocumentId,
        src: &lopdf::Document,
        dict: &Dictionary,
    ) -> Result<Dictionary, PdfGraftError> {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy(dest, src_id, src, value)?);
        }
        Ok(copied)
    }
}
