//! Page tree walking and per-page attributes.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Attributes a page inherits from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A PDF page object.
#[derive(Debug, Clone)]
pub struct PDFPage {
    /// Page object ID
    pub pageid: u32,
    /// 1-based position in document order
    pub number: usize,
    /// Page attributes, inherited values filled in
    pub attrs: PDFDict,
    pub mediabox: Option<[f64; 4]>,
    pub cropbox: Option<[f64; 4]>,
    /// Rotation in degrees, normalized to 0..360
    pub rotate: i64,
    /// Resolved resource dictionary (empty when absent)
    pub resources: PDFDict,
}

impl PDFPage {
    pub(super) fn from_ref(doc: &PDFDocument, page_ref: &PageRef, number: usize) -> Result<Self> {
        let obj = doc.getobj(page_ref.objid)?;
        let dict = obj
            .as_dict()
            .map_err(|_| PdfError::SyntaxError(format!("page {number} is not a dictionary")))?;
        let mut attrs = dict.clone();
        if let Some(inherited) = &page_ref.inherited {
            inherited.apply_to(&mut attrs);
        }

        let mediabox = parse_box(doc, attrs.get("MediaBox"));
        let cropbox = parse_box(doc, attrs.get("CropBox")).or(mediabox);
        let rotate = attrs
            .get("Rotate")
            .and_then(|r| doc.resolve(r).ok())
            .and_then(|r| r.as_int().ok())
            .map_or(0, |r| r.rem_euclid(360));
        let resources = match attrs.get("Resources").map(|r| doc.resolve(r)) {
            Some(Ok(PDFObject::Dict(dict))) => dict,
            Some(Err(err)) => {
                tracing::debug!(page = number, error = %err, "unresolvable /Resources");
                PDFDict::new()
            }
            _ => PDFDict::new(),
        };

        Ok(Self {
            pageid: page_ref.objid,
            number,
            attrs,
            mediabox,
            cropbox,
            rotate,
            resources,
        })
    }

    /// Decoded page content.
    ///
    /// An array of content streams is concatenated with a newline between
    /// parts, so operators may span stream boundaries. Parts that fail to
    /// resolve or decode are skipped with a warning.
    pub fn contents(&self, doc: &PDFDocument) -> Vec<u8> {
        let Some(contents) = self.attrs.get("Contents") else {
            return Vec::new();
        };
        let resolved = match doc.resolve_shared(contents) {
            Ok(obj) => obj,
            Err(err) => {
                tracing::warn!(page = self.number, error = %err, "page contents unresolvable");
                return Vec::new();
            }
        };

        match resolved.as_ref() {
            PDFObject::Stream(stream) => self.decode_part(doc, stream),
            PDFObject::Array(parts) => {
                let mut data = Vec::new();
                for part in parts {
                    let Ok(obj) = doc.resolve_shared(part) else {
                        tracing::warn!(page = self.number, "content stream part unresolvable");
                        continue;
                    };
                    let Ok(stream) = obj.as_stream() else {
                        continue;
                    };
                    if !data.is_empty() {
                        data.push(b'\n');
                    }
                    data.extend(self.decode_part(doc, stream));
                }
                data
            }
            _ => Vec::new(),
        }
    }

    fn decode_part(&self, doc: &PDFDocument, stream: &crate::model::objects::PDFStream) -> Vec<u8> {
        doc.decode_stream(stream).unwrap_or_else(|err| {
            tracing::warn!(page = self.number, error = %err, "content stream undecodable");
            Vec::new()
        })
    }
}

fn parse_box(doc: &PDFDocument, obj: Option<&PDFObject>) -> Option<[f64; 4]> {
    let resolved = doc.resolve(obj?).ok()?;
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    Some([
        arr[0].as_num().ok()?,
        arr[1].as_num().ok()?,
        arr[2].as_num().ok()?,
        arr[3].as_num().ok()?,
    ])
}

#[derive(Debug)]
struct InheritedNode {
    parent: Option<Arc<InheritedNode>>,
    values: [Option<PDFObject>; 4],
}

impl InheritedNode {
    fn from_dict(parent: Option<Arc<Self>>, dict: &PDFDict) -> Arc<Self> {
        Arc::new(Self {
            parent,
            values: INHERITABLE.map(|key| dict.get(key).cloned()),
        })
    }

    fn lookup(&self, slot: usize) -> Option<&PDFObject> {
        self.values[slot]
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.lookup(slot)))
    }

    fn apply_to(&self, dest: &mut PDFDict) {
        for (slot, key) in INHERITABLE.iter().enumerate() {
            if !dest.contains_key(*key)
                && let Some(val) = self.lookup(slot)
            {
                dest.insert((*key).to_string(), val.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PageRef {
    objid: u32,
    inherited: Option<Arc<InheritedNode>>,
}

/// Leaf pages in document order.
#[derive(Debug, Default)]
pub(crate) struct PageIndex {
    pages: Vec<PageRef>,
}

impl PageIndex {
    pub(crate) fn new(doc: &PDFDocument) -> Self {
        let mut pages = Self::collect_from_page_tree(doc);
        if pages.is_empty() {
            pages = Self::collect_from_fallback(doc);
            if !pages.is_empty() {
                tracing::warn!(count = pages.len(), "page tree unusable, found pages by scan");
            }
        }
        Self { pages }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&PageRef> {
        self.pages.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }

    /// Depth-first walk of `/Pages`; kids are pushed in reverse so pages
    /// pop in document order. Revisited nodes are skipped.
    fn collect_from_page_tree(doc: &PDFDocument) -> Vec<PageRef> {
        let catalog = doc.catalog();
        let Some(PDFObject::Ref(root)) = catalog.get("Pages") else {
            return Vec::new();
        };
        let mut stack = vec![(root.objid, InheritedNode::from_dict(None, catalog))];
        let mut visited = FxHashSet::default();
        let mut pages = Vec::new();

        while let Some((objid, parent_inherited)) = stack.pop() {
            if !visited.insert(objid) {
                continue;
            }
            let Ok(obj) = doc.getobj(objid) else {
                continue;
            };
            let Ok(dict) = obj.as_dict() else {
                continue;
            };

            match dict.get("Type") {
                Some(PDFObject::Name(name)) if name == "Pages" => {
                    let inherited =
                        InheritedNode::from_dict(Some(Arc::clone(&parent_inherited)), dict);
                    if let Some(kids) = dict.get("Kids")
                        && let Ok(kids) = doc.resolve(kids)
                        && let Ok(kids) = kids.as_array()
                    {
                        for kid in kids.iter().rev() {
                            let kid_id = match kid {
                                PDFObject::Ref(r) => Some(r.objid),
                                PDFObject::Int(n) => u32::try_from(*n).ok(),
                                _ => None,
                            };
                            if let Some(kid_id) = kid_id {
                                stack.push((kid_id, Arc::clone(&inherited)));
                            }
                        }
                    }
                }
                Some(PDFObject::Name(name)) if name == "Page" => {
                    pages.push(PageRef {
                        objid,
                        inherited: Some(parent_inherited),
                    });
                }
                _ => {}
            }
        }

        pages
    }

    fn collect_from_fallback(doc: &PDFDocument) -> Vec<PageRef> {
        doc.get_objids()
            .into_iter()
            .filter(|&objid| {
                doc.getobj(objid).is_ok_and(|obj| {
                    matches!(
                        obj.as_dict().ok().and_then(|d| d.get("Type")),
                        Some(PDFObject::Name(name)) if name == "Page"
                    )
                })
            })
            .map(|objid| PageRef {
                objid,
                inherited: None,
            })
            .collect()
    }
}
