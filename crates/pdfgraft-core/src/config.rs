//! Save options
//!
//! Parsed from comma separated option strings such as
//! `"compress=yes,garbage=compact"`. A bare key means `yes`.

use crate::error::PdfGraftError;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Garbage {
    #[default]
    Keep,
    /// Drop unreachable objects
    Collect,
    /// Drop unreachable objects and renumber the rest
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub compress: bool,
    pub decompress: bool,
    pub garbage: Garbage,
    pub incremental: bool,
}

impl FromStr for WriteOptions {
    type Err = PdfGraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = WriteOptions::default();
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (item, None),
            };
            match key {
                "compress" => options.compress = flag(key, value)?,
                "decompress" => options.decompress = flag(key, value)?,
                "incremental" => options.incremental = flag(key, value)?,
                "garbage" => {
                    options.garbage = match value {
                        Some("compact") => Garbage::Compact,
                        Some(other) => {
                            if parse_bool(key, other)? {
                                Garbage::Collect
                            } else {
                                Garbage::Keep
                            }
                        }
                        None => Garbage::Collect,
                    }
                }
                "encrypt" => {
                    if flag(key, value)? {
                        return Err(PdfGraftError::Unsupported("encrypt on save".into()));
                    }
                }
                other => warn!(option = other, "ignoring unknown write option"),
            }
        }
        if options.compress && options.decompress {
            return Err(PdfGraftError::Config(
                "compress and decompress are mutually exclusive".into(),
            ));
        }
        Ok(options)
    }
}

impl WriteOptions {
    /// Apply the options to a graph that is about to be serialized.
    pub fn apply(&self, graph: &mut lopdf::Document) -> Result<(), PdfGraftError> {
        if self.incremental {
            debug!("incremental save requested, writing a full document");
        }
        match self.garbage {
            Garbage::Keep => {}
            Garbage::Collect => {
                let removed = graph.prune_objects();
                debug!(removed = removed.len(), "pruned unreachable objects");
            }
            Garbage::Compact => {
                graph.prune_objects();
                graph.renumber_objects();
            }
        }
        if self.compress {
            graph.compress();
        }
        if self.decompress {
            graph.decompress();
        }
        Ok(())
    }
}

fn flag(key: &str, value: Option<&str>) -> Result<bool, PdfGraftError> {
    value.map_or(Ok(true), |value| parse_bool(key, value))
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, PdfGraftError> {
    match value {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => Err(PdfGraftError::Config(format!(
            "{}: expected yes or no, got '{}'",
            key, other
        ))),
    }
}
