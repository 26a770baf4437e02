//! PDF Document - main entry point for reading a PDF.
//!
//! Handles:
//! - header and cross-reference loading (see `xref`)
//! - lazy, cached object resolution, including object streams
//! - encryption detection (documents are never decrypted)
//! - catalog lookup and the page index

use super::page::{PDFPage, PageIndex};
use super::xref::{XRef, XRefEntry};
use crate::error::{PdfError, Result};
use crate::filter::{self, DecodeLimits, FilterChain, MAX_IMAGE_DECODED_BYTES};
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::parser::pdf_parser::PDFParser;
use bytes::Bytes;
use indexmap::IndexMap;
use memmap2::Mmap;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
const OBJSTM_CACHE_CAPACITY: usize = 16;

/// Small LRU keyed by object id.
struct LruCache<K, V> {
    capacity: usize,
    map: IndexMap<K, V>,
}

impl<K: Hash + Eq, V: Clone> LruCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if self.capacity == 0 {
            return None;
        }
        let index = self.map.get_index_of(key)?;
        let value = self.map.get_index(index)?.1.clone();
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.map.shift_remove(&key);
        self.map.insert(key, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }
}

/// Decoded object stream: payload plus `(objid, offset)` header pairs.
struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    entries: Vec<(u32, usize)>,
}

/// Reader settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Parsed objects kept in the LRU cache.
    pub cache_capacity: usize,
    /// Rebuild the cross-reference data by scanning for `N G obj` headers
    /// when the declared xref is unusable.
    pub recover_xref: bool,
    /// Output bound for content, xref and object streams.
    pub max_decoded_bytes: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            recover_xref: false,
            max_decoded_bytes: MAX_IMAGE_DECODED_BYTES,
        }
    }
}

/// PDF Document - provides access to PDF objects and pages.
///
/// Owns its data via `Bytes`, so stream payloads are zero-copy slices and
/// the document can be shared across worker threads.
pub struct PDFDocument {
    data: Bytes,
    options: ReaderOptions,
    pub(super) xrefs: Vec<XRef>,
    catalog: PDFDict,
    encrypted: bool,
    cache: Mutex<LruCache<u32, Arc<PDFObject>>>,
    objstm_cache: Mutex<LruCache<u32, Arc<ObjectStream>>>,
    page_index: OnceLock<PageIndex>,
}

impl std::fmt::Debug for PDFDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PDFDocument")
            .field("len", &self.data.len())
            .field("xrefs", &self.xrefs.len())
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

impl PDFDocument {
    /// Open a document from a byte slice (copied once).
    pub fn new<D: AsRef<[u8]>>(data: D) -> Result<Self> {
        Self::with_options(Bytes::copy_from_slice(data.as_ref()), ReaderOptions::default())
    }

    /// Open a document from shared bytes (zero-copy).
    pub fn new_from_bytes(data: Bytes) -> Result<Self> {
        Self::with_options(data, ReaderOptions::default())
    }

    /// Open a memory-mapped document.
    pub fn new_from_mmap(mmap: Mmap, options: ReaderOptions) -> Result<Self> {
        Self::with_options(Bytes::from_owner(mmap), options)
    }

    /// Open a document with explicit reader settings.
    ///
    /// Any failure to make sense of the file structure is reported as
    /// [`PdfError::MalformedDocument`].
    pub fn with_options(data: Bytes, options: ReaderOptions) -> Result<Self> {
        let mut doc = Self {
            data,
            options,
            xrefs: Vec::new(),
            catalog: PDFDict::new(),
            encrypted: false,
            cache: Mutex::new(LruCache::new(options.cache_capacity)),
            objstm_cache: Mutex::new(LruCache::new(OBJSTM_CACHE_CAPACITY)),
            page_index: OnceLock::new(),
        };
        doc.parse().map_err(|err| match err {
            PdfError::MalformedDocument(_) => err,
            other => PdfError::MalformedDocument(other.to_string()),
        })?;
        Ok(doc)
    }

    /// Returns the raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub const fn options(&self) -> &ReaderOptions {
        &self.options
    }

    fn parse(&mut self) -> Result<()> {
        self.check_header()?;

        let declared = self
            .find_startxref()
            .and_then(|pos| self.load_xrefs(pos));
        if let Err(err) = declared {
            if !self.options.recover_xref {
                return Err(err);
            }
            tracing::warn!(error = %err, "cross-reference data unusable, scanning for objects");
            self.xrefs.clear();
            let xref = self.load_xref_fallback()?;
            self.xrefs.push(xref);
        }

        self.encrypted = self.xrefs.iter().any(|x| x.trailer.contains_key("Encrypt"));
        if self.encrypted {
            tracing::warn!("document is encrypted; content will not be decoded");
        }

        match self.find_catalog() {
            Ok(catalog) => self.catalog = catalog,
            // strings and object streams of an encrypted file are ciphertext
            Err(err) if self.encrypted => {
                tracing::debug!(error = %err, "catalog unreadable in encrypted document");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn check_header(&self) -> Result<()> {
        let head = &self.data[..self.data.len().min(1024)];
        if memfind(head, b"%PDF-").is_none() {
            return Err(PdfError::MalformedDocument("missing %PDF- header".into()));
        }
        Ok(())
    }

    fn find_catalog(&self) -> Result<PDFDict> {
        let root = self
            .xrefs
            .iter()
            .find_map(|xref| xref.trailer.get("Root"))
            .ok_or_else(|| PdfError::MalformedDocument("trailer has no /Root".into()))?;
        match self.resolve(root)? {
            PDFObject::Dict(dict) => Ok(dict),
            other => Err(PdfError::MalformedDocument(format!(
                "/Root is a {}, not a catalog dictionary",
                other.type_name()
            ))),
        }
    }

    /// Get document catalog.
    pub const fn catalog(&self) -> &PDFDict {
        &self.catalog
    }

    /// Whether any trailer carries `/Encrypt`.
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// All object ids known to the cross-reference data.
    pub fn get_objids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .xrefs
            .iter()
            .flat_map(|xref| xref.offsets.keys().copied())
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Get an object by ID.
    ///
    /// Objects are parsed on first access and kept in an LRU cache. Unknown
    /// ids fail with [`PdfError::ObjectNotFound`]; an object whose parse
    /// re-enters itself fails instead of recursing.
    pub fn getobj(&self, objid: u32) -> Result<Arc<PDFObject>> {
        if objid == 0 {
            return Err(PdfError::ObjectNotFound(0));
        }

        thread_local! {
            static RESOLVING: RefCell<FxHashSet<u32>> = RefCell::new(FxHashSet::default());
        }

        struct ResolvingGuard {
            objid: u32,
        }

        impl Drop for ResolvingGuard {
            fn drop(&mut self) {
                RESOLVING.with(|set| {
                    set.borrow_mut().remove(&self.objid);
                });
            }
        }

        if let Ok(mut cache) = self.cache.lock()
            && let Some(obj) = cache.get(&objid)
        {
            return Ok(obj);
        }

        let is_circular = RESOLVING.with(|set| !set.borrow_mut().insert(objid));
        if is_circular {
            return Err(PdfError::SyntaxError(format!(
                "circular reference detected for obj {objid}"
            )));
        }
        let _guard = ResolvingGuard { objid };

        // newest section first; a failed entry falls through to older ones
        for xref in &self.xrefs {
            let Some(entry) = xref.offsets.get(&objid) else {
                continue;
            };
            let parsed = match *entry {
                XRefEntry::InStream {
                    stream_objid,
                    index,
                } => self.parse_object_from_stream(stream_objid, index, objid),
                XRefEntry::Offset { offset } => {
                    self.parse_object_at(offset, objid, xref.is_fallback)
                }
            };
            match parsed {
                Ok(obj) => {
                    let obj = Arc::new(obj);
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(objid, Arc::clone(&obj));
                    }
                    return Ok(obj);
                }
                Err(err) => {
                    tracing::debug!(objid, error = %err, "xref entry unusable");
                }
            }
        }

        Err(PdfError::ObjectNotFound(objid))
    }

    /// Resolve a reference chain to its target object.
    pub fn resolve(&self, obj: &PDFObject) -> Result<PDFObject> {
        Ok((*self.resolve_shared(obj)?).clone())
    }

    /// Resolve a reference chain without cloning the cached target.
    pub fn resolve_shared(&self, obj: &PDFObject) -> Result<Arc<PDFObject>> {
        let PDFObject::Ref(first) = obj else {
            return Ok(Arc::new(obj.clone()));
        };
        let mut seen = FxHashSet::default();
        seen.insert(first.objid);
        let mut current = self.getobj(first.objid)?;
        while let PDFObject::Ref(r) = current.as_ref() {
            let next = r.objid;
            if !seen.insert(next) {
                return Err(PdfError::SyntaxError(format!(
                    "circular reference detected for obj {next}"
                )));
            }
            current = self.getobj(next)?;
        }
        Ok(current)
    }

    /// Fully decode a content, form, xref or object stream.
    ///
    /// Uses the lenient pipeline: a damaged Flate tail keeps the bytes that
    /// decoded, as viewers do.
    pub fn decode_stream(&self, stream: &PDFStream) -> Result<Vec<u8>> {
        let chain = FilterChain::from_stream(stream, self)?;
        if chain.is_empty() {
            return Ok(stream.rawdata().to_vec());
        }
        let limits = DecodeLimits::with_max_bytes(self.options.max_decoded_bytes).lenient();
        Ok(filter::decode(stream.rawdata(), &chain, &limits)?.data)
    }

    /// Number of pages in document order.
    pub fn page_count(&self) -> usize {
        self.page_index().len()
    }

    /// Page by 1-based number.
    pub fn page(&self, number: usize) -> Result<PDFPage> {
        let page_ref = number
            .checked_sub(1)
            .and_then(|idx| self.page_index().get(idx))
            .ok_or_else(|| PdfError::InvalidArgument(format!("no page {number}")))?;
        PDFPage::from_ref(self, page_ref, number)
    }

    /// Pages in document order.
    pub fn pages(&self) -> impl Iterator<Item = Result<PDFPage>> + '_ {
        (1..=self.page_count()).map(move |number| self.page(number))
    }

    /// The page index, built once on first use.
    pub(crate) fn page_index(&self) -> &PageIndex {
        self.page_index.get_or_init(|| PageIndex::new(self))
    }

    fn load_object_stream(&self, stream_objid: u32) -> Result<Arc<ObjectStream>> {
        if let Ok(mut cache) = self.objstm_cache.lock()
            && let Some(objstm) = cache.get(&stream_objid)
        {
            return Ok(objstm);
        }

        let stream_obj = self.getobj(stream_objid)?;
        let stream = stream_obj.as_stream()?;
        let data = self.decode_stream(stream)?;
        let n = stream
            .get("N")
            .ok_or_else(|| PdfError::SyntaxError("missing N in ObjStm".into()))?
            .as_int()?;
        let first = stream
            .get("First")
            .ok_or_else(|| PdfError::SyntaxError("missing First in ObjStm".into()))?
            .as_int()?;
        let first = usize::try_from(first)
            .ok()
            .filter(|&first| first <= data.len())
            .ok_or_else(|| {
                PdfError::SyntaxError(format!(
                    "ObjStm First {first} outside data length {}",
                    data.len()
                ))
            })?;
        // every header pair takes at least two bytes
        let n = usize::try_from(n)
            .ok()
            .filter(|&n| n <= first / 2)
            .ok_or_else(|| {
                PdfError::SyntaxError(format!("ObjStm N {n} does not fit a {first}-byte header"))
            })?;

        // header: objid1 offset1 objid2 offset2 ...
        let mut header = PDFParser::new(&data[..first]);
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let objid = header.parse_object()?.as_int()?;
            let offset = header.parse_object()?.as_int()?;
            let (Ok(objid), Ok(offset)) = (u32::try_from(objid), usize::try_from(offset)) else {
                return Err(PdfError::SyntaxError(format!(
                    "ObjStm header entry ({objid}, {offset}) out of range"
                )));
            };
            entries.push((objid, offset));
        }

        let objstm = Arc::new(ObjectStream {
            data,
            first,
            entries,
        });
        if let Ok(mut cache) = self.objstm_cache.lock() {
            cache.insert(stream_objid, Arc::clone(&objstm));
        }
        Ok(objstm)
    }

    /// Parse object number `index` of object stream `stream_objid`.
    fn parse_object_from_stream(
        &self,
        stream_objid: u32,
        index: usize,
        expected_objid: u32,
    ) -> Result<PDFObject> {
        let objstm = self.load_object_stream(stream_objid)?;
        // trust the header over the xref index when they disagree
        let (_, offset) = objstm
            .entries
            .get(index)
            .filter(|(objid, _)| *objid == expected_objid)
            .or_else(|| objstm.entries.iter().find(|(objid, _)| *objid == expected_objid))
            .copied()
            .ok_or(PdfError::ObjectNotFound(expected_objid))?;
        let body = objstm
            .first
            .checked_add(offset)
            .and_then(|start| objstm.data.get(start..))
            .ok_or_else(|| {
                PdfError::SyntaxError(format!("ObjStm offset {offset} beyond data"))
            })?;
        PDFParser::new(body).parse_object()
    }

    /// Parse the indirect object `objid gen obj ... endobj` at `offset`.
    ///
    /// Stream payloads trust a sane `/Length` and otherwise scan for
    /// `endstream`.
    pub(super) fn parse_object_at(
        &self,
        offset: usize,
        expected_objid: u32,
        fallback: bool,
    ) -> Result<PDFObject> {
        let data = self.data.as_ref();
        if offset >= data.len() {
            return Err(PdfError::SyntaxError(format!(
                "object offset {offset} exceeds file size {}",
                data.len()
            )));
        }

        let mut parser = PDFParser::new(&data[offset..]);
        let objid = parser.parse_object()?.as_int()?;
        let _genno = parser.parse_object()?.as_int()?;
        let rest = parser.remaining();
        let kw_start = rest.len() - rest.trim_ascii_start().len();
        if !rest[kw_start..].starts_with(b"obj") {
            return Err(PdfError::SyntaxError(format!(
                "expected 'obj' at offset {offset}"
            )));
        }
        if expected_objid != 0 && objid != i64::from(expected_objid) {
            return Err(PdfError::SyntaxError(format!(
                "offset {offset} holds object {objid}, not {expected_objid}"
            )));
        }

        let body_start = offset + (data.len() - offset - rest.len()) + kw_start + 3;
        let mut parser = PDFParser::new(&data[body_start..]);
        let obj = parser.parse_object()?;

        let PDFObject::Dict(dict) = obj else {
            return Ok(obj);
        };

        let after = parser.remaining();
        let skip = after.len() - after.trim_ascii_start().len();
        if !after[skip..].starts_with(b"stream") {
            return Ok(PDFObject::Dict(dict));
        }

        // "stream" is followed by CRLF or LF
        let mut stream_start = body_start + parser.tell() + skip + 6;
        if data.get(stream_start) == Some(&b'\r') {
            stream_start += 1;
        }
        if data.get(stream_start) == Some(&b'\n') {
            stream_start += 1;
        }
        let stream_start = stream_start.min(data.len());

        // xref and object streams are critical: prefer the endstream scan
        let force_scan = matches!(
            dict.get("Type"),
            Some(PDFObject::Name(name)) if name == "XRef" || name == "ObjStm"
        );
        let length = if fallback || force_scan {
            None
        } else {
            dict.get("Length")
                .and_then(|len| self.resolve(len).ok())
                .and_then(|len| len.as_int().ok())
                .and_then(|len| usize::try_from(len).ok())
        };

        let end = match length {
            Some(len) if stream_start + len <= data.len() => stream_start + len,
            _ => find_endstream(&data[stream_start..])
                .map_or(data.len(), |pos| stream_start + pos),
        };

        let stream =
            PDFStream::new(dict, self.data.slice(stream_start..end)).with_objid(expected_objid);
        Ok(PDFObject::Stream(Box::new(stream)))
    }
}

/// Offset of `endstream` with any preceding EOL trimmed.
fn find_endstream(data: &[u8]) -> Option<usize> {
    let pos = memfind(data, b"endstream")?;
    let mut end = pos;
    while end > 0 && matches!(data[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    Some(end)
}

pub(super) fn memfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

pub(super) fn memrfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).rposition(|w| w == needle)
}
