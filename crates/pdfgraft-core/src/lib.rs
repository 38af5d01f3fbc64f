//! Page-level PDF editing on top of the lopdf object graph
//!
//! - [`Document`]: an open document with its page tree and undo journal
//! - [`GraftMap`], [`merge`], [`split`], [`copy_single_page`]: cross-document
//!   page assembly that copies shared objects once
//! - [`rearrange_pages`]: reorder, drop or repeat pages in place
//! - [`Page::words`], [`Page::images`]: word and image geometry from the
//!   page's structured text
//! - [`Document::get_page_numbers`]: page label lookup

pub mod command;
pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod graft;
pub mod journal;
pub mod labels;
pub mod merge;
pub mod rearrange;
pub mod split;
pub mod stext;
pub mod words;

#[cfg(test)]
mod fixtures;

pub use command::{apply_command, apply_commands, parse_commands, Command, CommandResult, EditReport};
pub use config::{Garbage, WriteOptions};
pub use document::{Document, DocumentId, Page, Permission, DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH};
pub use error::PdfGraftError;
pub use geometry::{Matrix, Point, Quad, Rect};
pub use graft::GraftMap;
pub use journal::{Journal, JournalView, Snapshot};
pub use labels::{LabelStyle, PageLabelRule};
pub use merge::{copy_single_page, merge, merge_documents, MergeOptions};
pub use rearrange::rearrange_pages;
pub use split::{page_intervals, split};
pub use stext::{Glyph, ImageBlock, ImageRef, StextOptions, StructuredText, TextEvent};
pub use words::{collect_images, segment_words, PageImage, Word, WordSegmenter};

/// Parse PDF bytes and return the page count.
pub fn get_page_count(bytes: &[u8]) -> Result<usize, PdfGraftError> {
    Document::open(bytes)?.page_count()
}

/// Parse a list such as `"0, 3,7"` into indices.
pub fn parse_index_list(input: &str) -> Result<Vec<i64>, PdfGraftError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|_| PdfGraftError::InvalidRange(format!("Invalid index: {}", part)))
        })
        .collect()
}
