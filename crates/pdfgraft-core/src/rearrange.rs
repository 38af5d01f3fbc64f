//! In-place page reordering

use crate::document::Document;
use crate::error::PdfGraftError;
use lopdf::Object;
use std::collections::HashSet;
use tracing::info;

/// Replace the page sequence with `new_order`: position `k` receives the page
/// formerly at `new_order[k]`. Pages may be repeated or dropped.
///
/// Repeated pages after the first occurrence become shallow copies of the
/// page dictionary, sharing resources and contents. Dropped page nodes stay
/// in the object graph until a garbage-collecting save.
pub fn rearrange_pages(doc: &mut Document, new_order: &[usize]) -> Result<(), PdfGraftError> {
    let current = doc.page_ids()?;
    let count = current.len();

    if new_order.len() > count {
        return Err(PdfGraftError::InvalidRange(format!(
            "new order lists {} pages but the document has {}",
            new_order.len(),
            count
        )));
    }
    if let Some(&bad) = new_order.iter().find(|&&i| i >= count) {
        return Err(PdfGraftError::PageOutOfRange {
            operation: "rearrange_pages",
            index: bad as i64,
            count,
        });
    }

    doc.atomically("rearrange_pages", |doc| {
        let mut seen = HashSet::new();
        let mut pages = Vec::with_capacity(new_order.len());
        for &index in new_order {
            let page_id = current[index];
            if seen.insert(page_id) {
                pages.push(page_id);
                continue;
            }
            let graph = doc.live_mut("rearrange_pages")?;
            let copy = graph
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| PdfGraftError::OperationError(format!("page {}: {}", index, e)))?
                .clone();
            pages.push(graph.add_object(copy));
        }
        doc.set_page_list(&pages)?;

        info!(doc = ?doc.id(), from = count, to = pages.len(), "rearranged pages");
        Ok(())
    })
}
