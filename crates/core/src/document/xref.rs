//! Cross-reference loading: classic tables, xref streams, hybrid files
//! and the recovery scan.

use super::catalog::{PDFDocument, memrfind};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};
use crate::parser::pdf_parser::PDFParser;
use regex::bytes::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum XRefEntry {
    /// Uncompressed object at a byte offset.
    Offset { offset: usize },
    /// Object `index` inside object stream `stream_objid`.
    InStream { stream_objid: u32, index: usize },
}

/// One cross-reference section with its trailer.
#[derive(Debug, Default)]
pub(crate) struct XRef {
    pub(crate) offsets: FxHashMap<u32, XRefEntry>,
    pub(crate) trailer: PDFDict,
    /// Built by scanning rather than read from the file.
    pub(crate) is_fallback: bool,
}

/// Trailer keys of an xref stream that describe the stream itself.
const XREF_STREAM_ONLY_KEYS: [&str; 5] = ["Length", "Filter", "DecodeParms", "W", "Index"];

static OBJECT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(\d+)\s+obj\b").expect("object header pattern"));

impl PDFDocument {
    /// Offset named by the last `startxref` in the final 1024 bytes.
    pub(super) fn find_startxref(&self) -> Result<usize> {
        let data = self.bytes();
        let tail_start = data.len().saturating_sub(1024);
        let tail = &data[tail_start..];
        let at = memrfind(tail, b"startxref")
            .ok_or_else(|| PdfError::MalformedDocument("no startxref".into()))?;
        let rest = tail[at + 9..].trim_ascii_start();
        let (offset, consumed) = read_uint(rest);
        if consumed == 0 {
            return Err(PdfError::MalformedDocument(
                "startxref not followed by an offset".into(),
            ));
        }
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o < data.len())
            .ok_or_else(|| {
                PdfError::MalformedDocument(format!("startxref offset {offset} beyond end of file"))
            })?;
        Ok(offset)
    }

    /// Follow the `/Prev` chain from `pos`, newest section first.
    ///
    /// A hybrid file's `/XRefStm` section is loaded right after the table
    /// that names it so it takes precedence over older sections.
    pub(super) fn load_xrefs(&mut self, mut pos: usize) -> Result<()> {
        let mut visited = FxHashSet::default();

        while visited.insert(pos) {
            let xref = match self.load_xref_at(pos) {
                Ok(xref) => xref,
                // a broken /Prev only loses older revisions
                Err(err) if !self.xrefs.is_empty() => {
                    tracing::warn!(offset = pos, error = %err, "previous xref section unreadable");
                    break;
                }
                Err(err) => return Err(err),
            };
            let xref_stm = trailer_offset(&xref.trailer, "XRefStm");
            let prev = trailer_offset(&xref.trailer, "Prev");
            self.xrefs.push(xref);

            if let Some(stm_pos) = xref_stm
                && visited.insert(stm_pos)
            {
                match self.load_xref_stream(stm_pos) {
                    Ok(stm) => self.xrefs.push(stm),
                    Err(err) => tracing::warn!(offset = stm_pos, error = %err, "XRefStm unreadable"),
                }
            }

            match prev {
                Some(prev_pos) if prev_pos < self.bytes().len() => pos = prev_pos,
                Some(prev_pos) => {
                    tracing::warn!(offset = prev_pos, "/Prev beyond end of file");
                    break;
                }
                None => break,
            }
        }

        if self.xrefs.is_empty() {
            return Err(PdfError::MalformedDocument("no cross-reference data".into()));
        }
        Ok(())
    }

    fn load_xref_at(&self, pos: usize) -> Result<XRef> {
        let data = self.bytes().get(pos..).unwrap_or_default();
        if data.trim_ascii_start().starts_with(b"xref") {
            self.load_traditional_xref(pos)
        } else {
            self.load_xref_stream(pos)
        }
    }

    fn load_traditional_xref(&self, pos: usize) -> Result<XRef> {
        let data = &self.bytes()[pos..];
        let mut cursor = Cursor::new(data);
        cursor.skip_ws();
        cursor.expect(b"xref")?;

        let mut xref = XRef::default();
        loop {
            cursor.skip_ws();
            if cursor.at_end() {
                return Err(PdfError::MalformedDocument(
                    "xref table has no trailer".into(),
                ));
            }
            if cursor.rest().starts_with(b"trailer") {
                cursor.advance(7);
                break;
            }

            let mut base = cursor.uint()?;
            cursor.skip_ws();
            let count = cursor.uint()?;

            for i in 0..count {
                cursor.skip_ws();
                let offset = cursor.uint()?;
                cursor.skip_spaces();
                let genno = cursor.uint()?;
                cursor.skip_spaces();
                let marker = cursor.next_byte().unwrap_or(b'f');

                // a subsection declared to start at 1 that still carries the
                // object 0 free entry is shifted down by one
                if i == 0 && base > 0 && marker == b'f' && offset == 0 && genno == 65535 {
                    base -= 1;
                }

                if marker == b'n'
                    && let Some(objid) = base.checked_add(i).and_then(|id| u32::try_from(id).ok())
                    && let Ok(offset) = usize::try_from(offset)
                {
                    xref.offsets.insert(objid, XRefEntry::Offset { offset });
                }
            }
        }

        let mut parser = PDFParser::new(cursor.rest());
        match parser.parse_object() {
            Ok(PDFObject::Dict(dict)) => xref.trailer = dict,
            _ => {
                return Err(PdfError::MalformedDocument(format!(
                    "unreadable trailer for xref at {pos}"
                )));
            }
        }
        Ok(xref)
    }

    fn load_xref_stream(&self, pos: usize) -> Result<XRef> {
        let obj = self.parse_object_at(pos, 0, false)?;
        let stream = obj.as_stream()?;
        if stream.name_attr("Type").is_some_and(|t| t != "XRef") {
            return Err(PdfError::MalformedDocument(format!(
                "object at {pos} is not an xref stream"
            )));
        }

        let widths = stream
            .get("W")
            .ok_or_else(|| PdfError::SyntaxError("missing W in xref stream".into()))?
            .as_array()?;
        if widths.len() != 3 {
            return Err(PdfError::SyntaxError("W must have 3 elements".into()));
        }
        let mut w = [0usize; 3];
        for (slot, width) in w.iter_mut().zip(widths) {
            *slot = usize::try_from(width.as_int()?)
                .ok()
                .filter(|&n| n <= 8)
                .ok_or_else(|| PdfError::SyntaxError("bad xref stream field width".into()))?;
        }
        let entry_size = w[0] + w[1] + w[2];
        if entry_size == 0 {
            return Err(PdfError::SyntaxError("xref stream entries are empty".into()));
        }

        let size = stream
            .get("Size")
            .ok_or_else(|| PdfError::SyntaxError("missing Size in xref stream".into()))?
            .as_int()?;
        let subsections: Vec<(i64, i64)> = match stream.get("Index") {
            Some(index) => index
                .as_array()?
                .chunks_exact(2)
                .map(|pair| Ok((pair[0].as_int()?, pair[1].as_int()?)))
                .collect::<Result<_>>()?,
            None => vec![(0, size)],
        };

        let data = self.decode_stream(stream)?;
        let mut xref = XRef::default();
        let mut rows = data.chunks_exact(entry_size);

        'sections: for (start, count) in subsections {
            for i in 0..count.max(0) {
                let Some(row) = rows.next() else {
                    break 'sections;
                };
                let kind = if w[0] == 0 { 1 } else { read_bytes_as_int(&row[..w[0]]) };
                let field1 = read_bytes_as_int(&row[w[0]..w[0] + w[1]]);
                let field2 = read_bytes_as_int(&row[w[0] + w[1]..]);
                let Some(objid) = start.checked_add(i).and_then(|id| u32::try_from(id).ok()) else {
                    continue;
                };
                let entry = match kind {
                    1 => XRefEntry::Offset {
                        offset: field1 as usize,
                    },
                    2 => XRefEntry::InStream {
                        stream_objid: field1 as u32,
                        index: field2 as usize,
                    },
                    _ => continue,
                };
                xref.offsets.insert(objid, entry);
            }
        }

        xref.trailer = stream
            .attrs
            .iter()
            .filter(|(key, _)| !XREF_STREAM_ONLY_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(xref)
    }

    /// Rebuild cross-reference data by scanning for `N G obj` headers.
    ///
    /// Members of scanned object streams are indexed too, and a missing
    /// trailer `/Root` is replaced by the first `/Type /Catalog` found.
    pub(super) fn load_xref_fallback(&mut self) -> Result<XRef> {
        let mut xref = XRef {
            is_fallback: true,
            ..XRef::default()
        };

        for cap in OBJECT_HEADER.captures_iter(self.bytes()) {
            let (Some(whole), Some(id), Some(gen_)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            let (objid, _) = read_uint(id.as_bytes());
            let (genno, _) = read_uint(gen_.as_bytes());
            if let Ok(objid) = u32::try_from(objid)
                && genno <= 65535
            {
                // later definitions win, as with incremental updates
                xref.offsets.insert(
                    objid,
                    XRefEntry::Offset {
                        offset: whole.start(),
                    },
                );
            }
        }
        if xref.offsets.is_empty() {
            return Err(PdfError::MalformedDocument(
                "no objects found while scanning".into(),
            ));
        }

        if let Some(at) = memrfind(self.bytes(), b"trailer") {
            let mut parser = PDFParser::new(&self.bytes()[at + 7..]);
            if let Ok(PDFObject::Dict(dict)) = parser.parse_object() {
                xref.trailer = dict;
            }
        }

        // objects are parsed through the scanned table from here on
        self.xrefs = vec![xref];
        let objids: Vec<u32> = self.xrefs[0].offsets.keys().copied().collect();
        let mut compressed = Vec::new();
        let mut catalog = None;
        for objid in objids {
            let Ok(obj) = self.getobj(objid) else {
                continue;
            };
            match obj.as_ref() {
                PDFObject::Stream(stream) if stream.name_attr("Type") == Some("ObjStm") => {
                    compressed.extend(self.object_stream_members(objid, stream));
                }
                PDFObject::Dict(dict)
                    if catalog.is_none()
                        && matches!(dict.get("Type"), Some(PDFObject::Name(t)) if t == "Catalog") =>
                {
                    catalog = Some(objid);
                }
                _ => {}
            }
        }

        let mut xref = self.xrefs.pop().unwrap_or_default();
        for (member, entry) in compressed {
            xref.offsets.entry(member).or_insert(entry);
        }
        if !xref.trailer.contains_key("Root")
            && let Some(objid) = catalog
        {
            xref.trailer
                .insert("Root".into(), PDFObject::Ref(PDFObjRef::new(objid, 0)));
        }
        tracing::info!(objects = xref.offsets.len(), "rebuilt cross-reference data");
        Ok(xref)
    }

    fn object_stream_members(
        &self,
        stream_objid: u32,
        stream: &crate::model::objects::PDFStream,
    ) -> Vec<(u32, XRefEntry)> {
        let Ok(data) = self.decode_stream(stream) else {
            return Vec::new();
        };
        let n = stream.get("N").and_then(|n| n.as_int().ok()).unwrap_or(0);
        let first = stream
            .get("First")
            .and_then(|f| f.as_int().ok())
            .and_then(|f| usize::try_from(f).ok())
            .unwrap_or(data.len())
            .min(data.len());
        let mut header = PDFParser::new(&data[..first]);
        let mut members = Vec::new();
        for index in 0..usize::try_from(n).unwrap_or(0) {
            let (Ok(objid), Ok(_offset)) = (header.parse_object(), header.parse_object()) else {
                break;
            };
            if let Ok(objid) = objid.as_int()
                && let Ok(objid) = u32::try_from(objid)
            {
                members.push((
                    objid,
                    XRefEntry::InStream {
                        stream_objid,
                        index,
                    },
                ));
            }
        }
        members
    }
}

fn trailer_offset(trailer: &PDFDict, key: &str) -> Option<usize> {
    trailer
        .get(key)
        .and_then(|p| p.as_int().ok())
        .and_then(|p| usize::try_from(p).ok())
}

fn read_bytes_as_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

/// Leading decimal digits as a number, with the count consumed.
fn read_uint(data: &[u8]) -> (u64, usize) {
    let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
    let value = data[..digits]
        .iter()
        .fold(0u64, |acc, &b| acc.saturating_mul(10).saturating_add(u64::from(b - b'0')));
    (value, digits)
}

/// Byte cursor over an xref table.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    const fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied();
        self.pos += 1;
        byte
    }

    fn skip_ws(&mut self) {
        while self
            .data
            .get(self.pos)
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\x00'))
        {
            self.pos += 1;
        }
    }

    fn skip_spaces(&mut self) {
        while self.data.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn expect(&mut self, word: &[u8]) -> Result<()> {
        if !self.rest().starts_with(word) {
            return Err(PdfError::MalformedDocument(format!(
                "expected '{}' in xref table",
                String::from_utf8_lossy(word)
            )));
        }
        self.pos += word.len();
        Ok(())
    }

    fn uint(&mut self) -> Result<u64> {
        let (value, consumed) = read_uint(self.rest());
        if consumed == 0 {
            return Err(PdfError::MalformedDocument(format!(
                "expected number in xref table at +{}",
                self.pos
            )));
        }
        self.pos += consumed;
        Ok(value)
    }
}
