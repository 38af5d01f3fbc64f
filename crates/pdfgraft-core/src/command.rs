//! Serializable edit commands
//!
//! Each command runs as one named journal operation, so a host can replay a
//! JSON script against a document and still undo it step by step.

use crate::document::{Document, DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH};
use crate::error::PdfGraftError;
use crate::geometry::Rect;
use crate::journal::JournalView;
use crate::labels::PageLabelRule;
use crate::rearrange::rearrange_pages;
use lopdf::Dictionary;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

fn append() -> i64 {
    -1
}

fn default_width() -> f64 {
    DEFAULT_PAGE_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_PAGE_HEIGHT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    Rearrange {
        order: Vec<usize>,
    },
    DeletePage {
        index: usize,
    },
    InsertBlankPage {
        #[serde(default = "append")]
        at: i64,
        #[serde(default = "default_width")]
        width: f64,
        #[serde(default = "default_height")]
        height: f64,
    },
    SetPageLabels {
        rules: Vec<PageLabelRule>,
    },
    SetMetadata {
        key: String,
        value: String,
    },
    Undo,
    Redo,
}

impl Command {
    /// Journal step name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Rearrange { .. } => "rearrangePages",
            Command::DeletePage { .. } => "deletePage",
            Command::InsertBlankPage { .. } => "insertBlankPage",
            Command::SetPageLabels { .. } => "setPageLabels",
            Command::SetMetadata { .. } => "setMetadata",
            Command::Undo => "undo",
            Command::Redo => "redo",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub command: &'static str,
    pub success: bool,
    pub error: Option<String>,
    pub page_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditReport {
    pub results: Vec<CommandResult>,
    pub journal: JournalView,
}

/// Apply one command. Edits are recorded in the journal; `Undo` and `Redo`
/// move through it and are not recorded themselves.
pub fn apply_command(doc: &mut Document, command: &Command) -> Result<(), PdfGraftError> {
    debug!(command = command.name(), "applying command");
    match command {
        Command::Undo => {
            if !doc.undo()? {
                warn!("nothing to undo");
            }
            Ok(())
        }
        Command::Redo => {
            if !doc.redo()? {
                warn!("nothing to redo");
            }
            Ok(())
        }
        Command::Rearrange { order } => {
            doc.operation(command.name(), |doc| rearrange_pages(doc, order))
        }
        Command::DeletePage { index } => doc.operation(command.name(), |doc| doc.delete_page(*index)),
        Command::InsertBlankPage { at, width, height } => doc.operation(command.name(), |doc| {
            let page = doc.new_page(
                Rect::new(0.0, 0.0, *width, *height),
                0,
                Dictionary::new(),
                b"",
            )?;
            doc.insert_page(*at, page)
        }),
        Command::SetPageLabels { rules } => {
            doc.operation(command.name(), |doc| doc.set_page_label_rules(rules))
        }
        Command::SetMetadata { key, value } => {
            doc.operation(command.name(), |doc| doc.set_metadata(key, value))
        }
    }
}

/// Apply commands in order, stopping at the first failure.
pub fn apply_commands(doc: &mut Document, commands: &[Command]) -> Result<EditReport, PdfGraftError> {
    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        match apply_command(doc, command) {
            Ok(()) => results.push(CommandResult {
                command: command.name(),
                success: true,
                error: None,
                page_count: Some(doc.page_count()?),
            }),
            Err(e) => {
                warn!(command = command.name(), error = %e, "command failed");
                results.push(CommandResult {
                    command: command.name(),
                    success: false,
                    error: Some(e.to_string()),
                    page_count: None,
                });
                break;
            }
        }
    }
    Ok(EditReport {
        results,
        journal: doc.journal(),
    })
}

/// Parse a JSON array of commands.
pub fn parse_commands(json: &str) -> Result<Vec<Command>, PdfGraftError> {
    serde_json::from_str(json).map_err(|e| PdfGraftError::SerializationError(e.to_string()))
}
