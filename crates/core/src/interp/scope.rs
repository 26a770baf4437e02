//! Layered resource dictionaries.

use crate::document::PDFDocument;
use crate::model::objects::{PDFDict, PDFObject};
use std::sync::Arc;

/// Stack of resource dictionaries, innermost last.
///
/// The page's `/Resources` is the bottom layer; each form XObject with its
/// own `/Resources` pushes a layer for the duration of its content.
#[derive(Debug, Clone, Default)]
pub struct ResourceScope {
    layers: Vec<Arc<PDFDict>>,
}

impl ResourceScope {
    pub fn new(page_resources: PDFDict) -> Self {
        Self {
            layers: vec![Arc::new(page_resources)],
        }
    }

    pub fn push(&mut self, resources: PDFDict) {
        self.layers.push(Arc::new(resources));
    }

    pub fn pop(&mut self) -> Option<Arc<PDFDict>> {
        self.layers.pop()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Look up `/<category>/<name>`, innermost layer first.
    ///
    /// Returns the entry as stored, possibly an indirect reference. A layer
    /// whose category dictionary cannot be resolved is skipped.
    pub fn lookup(&self, doc: &PDFDocument, category: &str, name: &str) -> Option<PDFObject> {
        self.layers.iter().rev().find_map(|layer| {
            let entry = layer.get(category)?;
            match entry {
                PDFObject::Dict(dict) => dict.get(name).cloned(),
                PDFObject::Ref(_) => match doc.resolve(entry) {
                    Ok(PDFObject::Dict(dict)) => dict.get(name).cloned(),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::debug!(category, error = %err, "unresolvable resource category");
                        None
                    }
                },
                _ => None,
            }
        })
    }
}
