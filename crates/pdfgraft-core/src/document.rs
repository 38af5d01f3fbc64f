//! Document model over the lopdf object graph
//!
//! A [`Document`] owns one `lopdf::Document` (the object arena), its undo
//! journal, and a process-unique [`DocumentId`] that graft maps use to tell
//! source graphs apart. Pages are borrowed views and cannot outlive it.

use crate::config::WriteOptions;
use crate::encoding::pdfdoc_char;
use crate::error::PdfGraftError;
use crate::geometry::Rect;
use crate::journal::{Journal, JournalView, Snapshot};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default page size for blank documents (A4 in points)
pub const DEFAULT_PAGE_WIDTH: f64 = 595.0;
pub const DEFAULT_PAGE_HEIGHT: f64 = 842.0;

/// Page attributes a page may inherit from its ancestors in the page tree
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 64;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Access rights encoded in the `/P` entry of the encryption dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Print,
    Edit,
    Copy,
    Annotate,
    FillForm,
    Accessibility,
    Assemble,
    PrintHighQuality,
}

impl Permission {
    fn bit(self) -> u32 {
        match self {
            Permission::Print => 1 << 2,
            Permission::Edit => 1 << 3,
            Permission::Copy => 1 << 4,
            Permission::Annotate => 1 << 5,
            Permission::FillForm => 1 << 8,
            Permission::Accessibility => 1 << 9,
            Permission::Assemble => 1 << 10,
            Permission::PrintHighQuality => 1 << 11,
        }
    }
}

pub struct Document {
    id: DocumentId,
    graph: Option<lopdf::Document>,
    journal: Journal<Snapshot>,
    /// State of the graph as of the last capture, cleared by any mutable access
    current: Option<Arc<Snapshot>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("destroyed", &self.graph.is_none())
            .field("journal", &self.journal.view())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document: a catalog and a page tree with no pages.
    pub fn new() -> Self {
        let mut graph = lopdf::Document::with_version("1.7");
        let pages_id = graph.new_object_id();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![])),
            ("Count", Object::Integer(0)),
        ]);
        graph.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = graph.add_object(catalog);
        graph.trailer.set("Root", Object::Reference(catalog_id));

        Self::from_lopdf(graph)
    }

    /// Create a document holding one blank page with a Helvetica font resource.
    pub fn create_blank(width: f64, height: f64) -> Result<Self, PdfGraftError> {
        let mut doc = Self::new();

        let helvetica = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("Name", Object::Name(b"Helv".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]);
        let mut fonts = Dictionary::new();
        fonts.set("Helv", Object::Dictionary(helvetica));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let page_id = doc.new_page(
            Rect::new(0.0, 0.0, width, height),
            0,
            resources,
            b"BT /Helv ET",
        )?;
        doc.insert_page(-1, page_id)?;
        Ok(doc)
    }

    /// Parse a document from PDF bytes.
    pub fn open(bytes: &[u8]) -> Result<Self, PdfGraftError> {
        let graph = lopdf::Document::load_mem(bytes)
            .map_err(|e| PdfGraftError::ParseError(e.to_string()))?;
        let doc = Self::from_lopdf(graph);
        debug!(id = ?doc.id, "opened document");
        Ok(doc)
    }

    pub fn from_lopdf(graph: lopdf::Document) -> Self {
        Self {
            id: DocumentId::next(),
            graph: Some(graph),
            journal: Journal::new(),
            current: None,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Release the object graph and journal. Every later call fails.
    pub fn destroy(&mut self) {
        if self.graph.take().is_some() {
            info!(id = ?self.id, "document destroyed");
        }
        self.journal = Journal::new();
        self.current = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.graph.is_none()
    }

    /// Read access to the underlying object graph
    pub fn graph(&self) -> Result<&lopdf::Document, PdfGraftError> {
        self.live("graph")
    }

    pub fn graph_mut(&mut self) -> Result<&mut lopdf::Document, PdfGraftError> {
        self.live_mut("graph_mut")
    }

    pub(crate) fn live(&self, operation: &'static str) -> Result<&lopdf::Document, PdfGraftError> {
        self.graph
            .as_ref()
            .ok_or(PdfGraftError::DocumentDestroyed { operation })
    }

    pub(crate) fn live_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut lopdf::Document, PdfGraftError> {
        self.current = None;
        self.graph
            .as_mut()
            .ok_or(PdfGraftError::DocumentDestroyed { operation })
    }

    /// Snapshot of the graph as it is now, reused while nothing has changed.
    fn state(&mut self, operation: &'static str) -> Result<Arc<Snapshot>, PdfGraftError> {
        if let Some(state) = &self.current {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(Snapshot::capture(self.live(operation)?));
        self.current = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Put the graph back to `state`.
    fn restore(&mut self, operation: &'static str, state: Arc<Snapshot>) -> Result<(), PdfGraftError> {
        state.restore(self.live_mut(operation)?);
        self.current = Some(state);
        Ok(())
    }

    /// Add an object to the graph and return its reference id.
    pub fn add_object(&mut self, object: Object) -> Result<ObjectId, PdfGraftError> {
        Ok(self.live_mut("add_object")?.add_object(object))
    }

    /// Run `f`; if it fails, put the graph back the way it was.
    pub(crate) fn atomically<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, PdfGraftError>,
    ) -> Result<T, PdfGraftError> {
        let before = self.state(operation)?;
        let result = f(self);
        if result.is_err() && !self.is_destroyed() {
            self.restore(operation, before)?;
            debug!(operation, "rolled back failed operation");
        }
        result
    }

    // ---- page tree ----

    pub fn page_count(&self) -> Result<usize, PdfGraftError> {
        Ok(self.page_ids()?.len())
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> Result<Vec<ObjectId>, PdfGraftError> {
        let graph = self.live("page_ids")?;
        Ok(graph.get_pages().values().copied().collect())
    }

    /// Load the page at a zero-based index.
    pub fn load_page(&self, index: usize) -> Result<Page<'_>, PdfGraftError> {
        let graph = self.live("load_page")?;
        let id = graph
            .get_pages()
            .values()
            .nth(index)
            .copied()
            .ok_or(PdfGraftError::InvalidPageNumber(index + 1))?;
        Ok(Page { graph, id, index })
    }

    /// Create (but do not insert) a page node.
    pub fn new_page(
        &mut self,
        media_box: Rect,
        rotate: i64,
        resources: Dictionary,
        contents: &[u8],
    ) -> Result<ObjectId, PdfGraftError> {
        if media_box.width() <= 0.0 || media_box.height() <= 0.0 {
            return Err(PdfGraftError::InvalidDimensions {
                width: media_box.width(),
                height: media_box.height(),
            });
        }
        if rotate % 90 != 0 {
            return Err(PdfGraftError::InvalidRotation(rotate));
        }

        let graph = self.live_mut("new_page")?;
        let contents_id = graph.add_object(lopdf::Stream::new(Dictionary::new(), contents.to_vec()));
        let resources_id = graph.add_object(resources);

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("MediaBox", rect_to_object(&media_box));
        if normalize_rotation(rotate) != 0 {
            page.set("Rotate", Object::Integer(normalize_rotation(rotate)));
        }
        page.set("Resources", Object::Reference(resources_id));
        page.set("Contents", Object::Reference(contents_id));
        Ok(graph.add_object(page))
    }

    /// Link a page node into the page tree. `-1` or `page_count` appends.
    pub fn insert_page(&mut self, at: i64, page_id: ObjectId) -> Result<(), PdfGraftError> {
        let mut ids = self.page_ids()?;
        let at = resolve_insert_index("insert_page", at, ids.len())?;
        ids.insert(at, page_id);
        self.set_page_list(&ids)
    }

    /// Unlink the page at `at` from the page tree. Its node stays in the graph.
    pub fn delete_page(&mut self, at: usize) -> Result<(), PdfGraftError> {
        let mut ids = self.page_ids()?;
        if at >= ids.len() {
            return Err(PdfGraftError::PageOutOfRange {
                operation: "delete_page",
                index: at as i64,
                count: ids.len(),
            });
        }
        ids.remove(at);
        self.set_page_list(&ids)
    }

    /// Rewrite the page tree as a single flat `Kids` array under the root
    /// `/Pages` node.
    pub(crate) fn set_page_list(&mut self, page_ids: &[ObjectId]) -> Result<(), PdfGraftError> {
        let graph = self.live_mut("set_page_list")?;
        let root_id = pages_root_id(graph)?;

        for &page_id in page_ids {
            let mut pushed_down = Vec::new();
            {
                let page = graph
                    .get_object(page_id)
                    .and_then(Object::as_dict)
                    .map_err(|e| PdfGraftError::OperationError(format!("page {:?}: {}", page_id, e)))?;
                for key in INHERITABLE_KEYS {
                    if page.has(key) {
                        continue;
                    }
                    if let Some(value) = inherited_attribute(graph, page_id, key)? {
                        pushed_down.push((key, value.clone()));
                    }
                }
            }

            let page = graph
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| PdfGraftError::OperationError(format!("page {:?}: {}", page_id, e)))?;
            for (key, value) in pushed_down {
                page.set(key.to_vec(), value);
            }
            page.set("Parent", Object::Reference(root_id));
        }

        let root = graph
            .get_object_mut(root_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfGraftError::OperationError("Invalid pages dictionary".into()))?;
        root.set(
            "Kids",
            Object::Array(page_ids.iter().map(|&id| Object::Reference(id)).collect()),
        );
        root.set("Count", Object::Integer(page_ids.len() as i64));
        Ok(())
    }

    // ---- catalog, metadata, permissions ----

    pub(crate) fn catalog(&self, operation: &'static str) -> Result<&Dictionary, PdfGraftError> {
        let graph = self.live(operation)?;
        let catalog_id = catalog_id(graph)?;
        graph
            .get_object(catalog_id)
            .and_then(Object::as_dict)
            .map_err(|_| PdfGraftError::OperationError("Invalid catalog".into()))
    }

    pub(crate) fn catalog_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut Dictionary, PdfGraftError> {
        let graph = self.live_mut(operation)?;
        let catalog_id = catalog_id(graph)?;
        graph
            .get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfGraftError::OperationError("Invalid catalog".into()))
    }

    /// Look up a metadata entry: `format`, `encryption` or `info:<Entry>`.
    pub fn metadata(&self, key: &str) -> Result<Option<String>, PdfGraftError> {
        let graph = self.live("metadata")?;
        match key {
            "format" => Ok(Some(format!("PDF {}", graph.version))),
            "encryption" => Ok(Some(match encrypt_dict(graph) {
                Some(dict) => match dict.get(b"Filter") {
                    Ok(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
                    _ => "Unknown".to_string(),
                },
                None => "None".to_string(),
            })),
            _ => {
                let Some(entry) = key.strip_prefix("info:") else {
                    return Ok(None);
                };
                let Some(info) = info_dict(graph) else {
                    return Ok(None);
                };
                let value = info.get(entry.as_bytes()).ok().map(|v| resolve(graph, v));
                Ok(match value {
                    Some(Ok(Object::String(bytes, _))) => Some(decode_text_string(bytes)),
                    Some(Ok(Object::Name(name))) => Some(String::from_utf8_lossy(name).into_owned()),
                    _ => None,
                })
            }
        }
    }

    /// Set an `info:<Entry>` metadata value, creating the Info dictionary if needed.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<(), PdfGraftError> {
        let entry = key
            .strip_prefix("info:")
            .ok_or_else(|| PdfGraftError::Unsupported(format!("metadata key '{}'", key)))?;
        let graph = self.live_mut("set_metadata")?;

        let info_id = match graph.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => *id,
            Ok(Object::Dictionary(direct)) => {
                let direct = direct.clone();
                let id = graph.add_object(direct);
                graph.trailer.set("Info", Object::Reference(id));
                id
            }
            _ => {
                let id = graph.add_object(Dictionary::new());
                graph.trailer.set("Info", Object::Reference(id));
                id
            }
        };

        let info = graph
            .get_object_mut(info_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfGraftError::OperationError("Invalid Info dictionary".into()))?;
        info.set(
            entry.as_bytes().to_vec(),
            Object::String(encode_text_string(value), StringFormat::Literal),
        );
        Ok(())
    }

    pub fn needs_password(&self) -> Result<bool, PdfGraftError> {
        Ok(self.live("needs_password")?.trailer.has(b"Encrypt"))
    }

    /// Test a permission bit. Unencrypted documents grant everything.
    pub fn has_permission(&self, permission: Permission) -> Result<bool, PdfGraftError> {
        let graph = self.live("has_permission")?;
        let Some(encrypt) = encrypt_dict(graph) else {
            return Ok(true);
        };
        let bits = match encrypt.get(b"P") {
            Ok(Object::Integer(p)) => *p as i32 as u32,
            _ => u32::MAX,
        };
        Ok(bits & permission.bit() != 0)
    }

    /// Serialize the document. `options` is a comma separated option string,
    /// see [`WriteOptions`]. The live graph is left untouched.
    pub fn save_to_buffer(&mut self, options: &str) -> Result<Vec<u8>, PdfGraftError> {
        let options: WriteOptions = options.parse()?;
        let mut copy = self.live("save_to_buffer")?.clone();
        options.apply(&mut copy)?;

        let mut buffer = Vec::new();
        copy.save_to(&mut buffer)
            .map_err(|e| PdfGraftError::OperationError(format!("Failed to save PDF: {}", e)))?;

        self.journal.mark_saved();
        info!(id = ?self.id, bytes = buffer.len(), "document saved");
        Ok(buffer)
    }

    // ---- journal ----

    pub fn begin_operation(&mut self, name: &str) -> Result<(), PdfGraftError> {
        let before = self.state("begin_operation")?;
        self.journal.begin(name, before)?;
        debug!(id = ?self.id, name, "operation started");
        Ok(())
    }

    pub fn end_operation(&mut self) -> Result<(), PdfGraftError> {
        let after = self.state("end_operation")?;
        self.journal.end(after)?;
        debug!(
            id = ?self.id,
            retained_states = self.journal.retained_states(),
            "operation committed"
        );
        Ok(())
    }

    /// Drop the open operation and restore the graph to its starting state.
    pub fn abandon_operation(&mut self) -> Result<(), PdfGraftError> {
        self.live("abandon_operation")?;
        let before = self.journal.abandon()?;
        self.restore("abandon_operation", before)
    }

    /// Run `f` as one named journal operation. A failing `f` leaves no record
    /// and no changes behind.
    pub fn operation<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, PdfGraftError>,
    ) -> Result<T, PdfGraftError> {
        self.begin_operation(name)?;
        match f(self) {
            Ok(value) => {
                self.end_operation()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abandon_err) = self.abandon_operation() {
                    warn!(name, error = %abandon_err, "could not abandon failed operation");
                }
                Err(e)
            }
        }
    }

    /// Revert the most recent applied operation. `Ok(false)` if there is none.
    pub fn undo(&mut self) -> Result<bool, PdfGraftError> {
        self.live("undo")?;
        match self.journal.undo()? {
            Some(state) => {
                self.restore("undo", state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reapply the next undone operation. `Ok(false)` if there is none.
    pub fn redo(&mut self) -> Result<bool, PdfGraftError> {
        self.live("redo")?;
        match self.journal.redo()? {
            Some(state) => {
                self.restore("redo", state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.journal.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.journal.can_redo()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.journal.has_unsaved_changes()
    }

    /// Tell the journal the current state has been persisted elsewhere.
    pub fn mark_saved(&mut self) {
        self.journal.mark_saved();
    }

    pub fn journal(&self) -> JournalView {
        self.journal.view()
    }

    /// Keep at most `limit` undo steps, dropping the oldest first.
    pub fn set_journal_limit(&mut self, limit: usize) {
        self.journal.set_limit(limit);
    }

    /// Distinct graph states held by the undo history
    pub fn retained_states(&self) -> usize {
        self.journal.retained_states()
    }
}

/// A page of a [`Document`], valid while the document is borrowed
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub(crate) graph: &'a lopdf::Document,
    pub(crate) id: ObjectId,
    pub(crate) index: usize,
}

impl<'a> Page<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    pub fn dictionary(&self) -> Result<&'a Dictionary, PdfGraftError> {
        self.graph
            .get_object(self.id)
            .and_then(Object::as_dict)
            .map_err(|e| PdfGraftError::OperationError(format!("page {}: {}", self.index, e)))
    }

    /// Media box, inherited if needed; US Letter if absent.
    pub fn media_box(&self) -> Result<Rect, PdfGraftError> {
        match inherited_attribute(self.graph, self.id, b"MediaBox")? {
            Some(obj) => rect_from_object(self.graph, obj),
            None => Ok(Rect::new(0.0, 0.0, 612.0, 792.0)),
        }
    }

    /// Visible region: the crop box clipped to the media box. Falls back to
    /// the media box when the crop box is absent or disjoint.
    pub fn crop_box(&self) -> Result<Rect, PdfGraftError> {
        let media_box = self.media_box()?;
        let Some(obj) = inherited_attribute(self.graph, self.id, b"CropBox")? else {
            return Ok(media_box);
        };
        Ok(rect_from_object(self.graph, obj)?
            .intersect(&media_box)
            .unwrap_or(media_box))
    }

    /// Rotation in degrees, normalised into `[0, 360)`
    pub fn rotation(&self) -> Result<i64, PdfGraftError> {
        match inherited_attribute(self.graph, self.id, b"Rotate")? {
            Some(obj) => match resolve(self.graph, obj)? {
                Object::Integer(r) => Ok(normalize_rotation(*r)),
                Object::Real(r) => Ok(normalize_rotation(*r as i64)),
                _ => Ok(0),
            },
            None => Ok(0),
        }
    }

    /// Resources dictionary, inherited if needed
    pub fn resources(&self) -> Result<Option<&'a Dictionary>, PdfGraftError> {
        match inherited_attribute(self.graph, self.id, b"Resources")? {
            Some(obj) => Ok(resolve(self.graph, obj)?.as_dict().ok()),
            None => Ok(None),
        }
    }
}

// ---- graph helpers ----

pub(crate) fn catalog_id(graph: &lopdf::Document) -> Result<ObjectId, PdfGraftError> {
    graph
        .trailer
        .get(b"Root")
        .map_err(|_| PdfGraftError::OperationError("No Root in trailer".into()))?
        .as_reference()
        .map_err(|_| PdfGraftError::OperationError("Root is not a reference".into()))
}

fn pages_root_id(graph: &lopdf::Document) -> Result<ObjectId, PdfGraftError> {
    let catalog = graph
        .get_object(catalog_id(graph)?)
        .and_then(Object::as_dict)
        .map_err(|_| PdfGraftError::OperationError("Invalid catalog".into()))?;
    catalog
        .get(b"Pages")
        .map_err(|_| PdfGraftError::OperationError("No Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| PdfGraftError::OperationError("Pages is not a reference".into()))
}

fn info_dict(graph: &lopdf::Document) -> Option<&Dictionary> {
    let info = graph.trailer.get(b"Info").ok()?;
    resolve(graph, info).ok()?.as_dict().ok()
}

fn encrypt_dict(graph: &lopdf::Document) -> Option<&Dictionary> {
    let encrypt = graph.trailer.get(b"Encrypt").ok()?;
    resolve(graph, encrypt).ok()?.as_dict().ok()
}

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(
    graph: &'a lopdf::Document,
    mut object: &'a Object,
) -> Result<&'a Object, PdfGraftError> {
    for _ in 0..MAX_TREE_DEPTH {
        match object {
            Object::Reference(id) => {
                object = graph.get_object(*id).map_err(|e| {
                    PdfGraftError::OperationError(format!("dangling reference {:?}: {}", id, e))
                })?;
            }
            direct => return Ok(direct),
        }
    }
    Err(PdfGraftError::OperationError("reference chain too deep".into()))
}

/// Look up `key` on a page node, walking up `/Parent` links if the page
/// itself does not carry it.
pub(crate) fn inherited_attribute<'a>(
    graph: &'a lopdf::Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, PdfGraftError> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = graph
            .get_object(current)
            .and_then(Object::as_dict)
            .map_err(|e| PdfGraftError::OperationError(format!("page tree node {:?}: {}", current, e)))?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Ok(None),
        }
    }
    Err(PdfGraftError::OperationError("page tree too deep".into()))
}

pub(crate) fn resolve_insert_index(
    operation: &'static str,
    at: i64,
    count: usize,
) -> Result<usize, PdfGraftError> {
    if at == -1 || at == count as i64 {
        Ok(count)
    } else if (0..count as i64).contains(&at) {
        Ok(at as usize)
    } else {
        Err(PdfGraftError::PageOutOfRange {
            operation,
            index: at,
            count,
        })
    }
}

pub(crate) fn normalize_rotation(degrees: i64) -> i64 {
    degrees.rem_euclid(360)
}

/// Convert a numeric object to f64.
pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

pub(crate) fn rect_from_object(graph: &lopdf::Document, object: &Object) -> Result<Rect, PdfGraftError> {
    let array = resolve(graph, object)?
        .as_array()
        .map_err(|_| PdfGraftError::OperationError("rectangle is not an array".into()))?;
    if array.len() != 4 {
        return Err(PdfGraftError::OperationError(format!(
            "expected 4-element rectangle, got {}",
            array.len()
        )));
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = number(resolve(graph, item)?)
            .ok_or_else(|| PdfGraftError::OperationError("rectangle entry is not a number".into()))?;
    }
    Ok(Rect::new(
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ))
}

pub(crate) fn rect_to_object(rect: &Rect) -> Object {
    Object::Array(vec![
        Object::Real(rect.x0 as f32),
        Object::Real(rect.y0 as f32),
        Object::Real(rect.x1 as f32),
        Object::Real(rect.y1 as f32),
    ])
}

/// Decode a PDF text string: UTF-16BE or UTF-8 behind a byte order mark,
/// otherwise PDFDocEncoding.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(utf8).into_owned()
    } else {
        bytes
            .iter()
            .map(|&b| pdfdoc_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

pub(crate) fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
        return text.as_bytes().to_vec();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}
