//! Undo/redo journal
//!
//! A linear history of named operations with a cursor. `position` counts the
//! records currently applied; records past the cursor are undone but kept
//! until a new operation is committed.
//!
//! States are held behind [`Arc`]: a record's `after` state is the same
//! allocation as the next record's `before` when nothing happened in between,
//! so a history of `n` steps retains about `n + 1` states. The oldest records
//! are dropped once the history exceeds its limit.

use crate::error::PdfGraftError;
use lopdf::{Dictionary, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Records kept before the oldest ones are discarded
pub const DEFAULT_JOURNAL_LIMIT: usize = 100;

/// Copy of an object graph's mutable state
#[derive(Debug, Clone)]
pub struct Snapshot {
    objects: BTreeMap<ObjectId, Object>,
    trailer: Dictionary,
    max_id: u32,
}

impl Snapshot {
    pub fn capture(graph: &lopdf::Document) -> Self {
        Self {
            objects: graph.objects.clone(),
            trailer: graph.trailer.clone(),
            max_id: graph.max_id,
        }
    }

    pub fn restore(&self, graph: &mut lopdf::Document) {
        graph.objects = self.objects.clone();
        graph.trailer = self.trailer.clone();
        graph.max_id = self.max_id;
    }
}

/// Serialized view of the journal: `{ position, steps }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalView {
    pub position: usize,
    pub steps: Vec<String>,
}

#[derive(Debug)]
struct Record<S> {
    name: String,
    before: Arc<S>,
    after: Arc<S>,
}

#[derive(Debug)]
struct PendingOperation<S> {
    name: String,
    before: Arc<S>,
}

#[derive(Debug)]
pub struct Journal<S = Snapshot> {
    records: Vec<Record<S>>,
    position: usize,
    /// `None` once the saved state has been discarded from history
    saved_position: Option<usize>,
    pending: Option<PendingOperation<S>>,
    limit: usize,
}

impl<S> Default for Journal<S> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            position: 0,
            saved_position: Some(0),
            pending: None,
            limit: DEFAULT_JOURNAL_LIMIT,
        }
    }
}

impl<S> Journal<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` records (at least one), dropping the oldest.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.trim();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Open a named operation; `before` is the state to return to on undo.
    pub fn begin(&mut self, name: &str, before: Arc<S>) -> Result<(), PdfGraftError> {
        if let Some(open) = &self.pending {
            return Err(PdfGraftError::Journal(format!(
                "cannot begin '{}' while '{}' is still open",
                name, open.name
            )));
        }
        self.pending = Some(PendingOperation {
            name: name.to_string(),
            before,
        });
        Ok(())
    }

    /// Commit the open operation, discarding any redo history.
    pub fn end(&mut self, after: Arc<S>) -> Result<(), PdfGraftError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| PdfGraftError::Journal("no operation in progress".into()))?;

        if self.position < self.records.len() {
            self.records.truncate(self.position);
            if matches!(self.saved_position, Some(saved) if saved > self.position) {
                self.saved_position = None;
            }
        }

        self.records.push(Record {
            name: pending.name,
            before: pending.before,
            after,
        });
        self.position = self.records.len();
        self.trim();
        Ok(())
    }

    /// Drop the open operation, handing back the state it started from.
    pub fn abandon(&mut self) -> Result<Arc<S>, PdfGraftError> {
        self.pending
            .take()
            .map(|pending| pending.before)
            .ok_or_else(|| PdfGraftError::Journal("no operation in progress".into()))
    }

    /// Step back one record. Returns the state to restore, or `None` at the
    /// start of history.
    pub fn undo(&mut self) -> Result<Option<Arc<S>>, PdfGraftError> {
        self.ensure_idle("undo")?;
        if self.position == 0 {
            return Ok(None);
        }
        self.position -= 1;
        Ok(Some(Arc::clone(&self.records[self.position].before)))
    }

    /// Step forward one record. Returns the state to restore, or `None` at
    /// the end of history.
    pub fn redo(&mut self) -> Result<Option<Arc<S>>, PdfGraftError> {
        self.ensure_idle("redo")?;
        if self.position == self.records.len() {
            return Ok(None);
        }
        self.position += 1;
        Ok(Some(Arc::clone(&self.records[self.position - 1].after)))
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.records.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn in_operation(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of distinct states the history keeps alive
    pub fn retained_states(&self) -> usize {
        let mut seen = HashSet::new();
        for record in &self.records {
            seen.insert(Arc::as_ptr(&record.before));
            seen.insert(Arc::as_ptr(&record.after));
        }
        if let Some(pending) = &self.pending {
            seen.insert(Arc::as_ptr(&pending.before));
        }
        seen.len()
    }

    pub fn mark_saved(&mut self) {
        self.saved_position = Some(self.position);
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.saved_position != Some(self.position)
    }

    pub fn view(&self) -> JournalView {
        JournalView {
            position: self.position,
            steps: self.records.iter().map(|r| r.name.clone()).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.view())
    }

    fn trim(&mut self) {
        if self.records.len() <= self.limit {
            return;
        }
        let excess = self.records.len() - self.limit;
        self.records.drain(..excess);
        self.position = self.position.saturating_sub(excess);
        self.saved_position = self
            .saved_position
            .and_then(|saved| saved.checked_sub(excess));
    }

    fn ensure_idle(&self, action: &str) -> Result<(), PdfGraftError> {
        match &self.pending {
            Some(open) => Err(PdfGraftError::Journal(format!(
                "cannot {} while '{}' is in progress",
                action, open.name
            ))),
            None => Ok(()),
        }
    }
}
