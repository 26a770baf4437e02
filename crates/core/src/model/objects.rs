//! PDF object model.
//!
//! Objects are plain values; indirect references stay unresolved until the
//! document resolves them on demand.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// A PDF dictionary.
pub type PDFDict = HashMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Name object without the leading slash (e.g. `XObject`)
    Name(String),
    /// String bytes, literal or hex
    String(Vec<u8>),
    Array(Vec<Self>),
    Dict(PDFDict),
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Numeric value, integers coerced to f64.
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Dictionary view. A stream answers with its attribute dictionary.
    pub const fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_ref(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(self.type_error("ref")),
        }
    }

    /// Name of the value kind, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

impl fmt::Display for PDFObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Real(n) => write!(f, "{n}"),
            Self::Name(n) => write!(f, "/{n}"),
            Self::String(s) => write!(f, "({})", String::from_utf8_lossy(s)),
            Self::Array(arr) => write!(f, "[{} items]", arr.len()),
            Self::Dict(d) => write!(f, "<<{} keys>>", d.len()),
            Self::Stream(s) => write!(f, "stream({} bytes)", s.rawdata.len()),
            Self::Ref(r) => write!(f, "{} {} R", r.objid, r.genno),
        }
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFObjRef {
    pub objid: u32,
    pub genno: u32,
}

impl PDFObjRef {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// PDF stream: attribute dictionary plus the stored (still encoded) bytes.
///
/// `rawdata` is usually a zero-copy slice of the document buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    pub attrs: PDFDict,
    rawdata: Bytes,
    /// Object ID when the stream is an indirect object of a document
    pub objid: Option<u32>,
}

impl PDFStream {
    pub fn new(attrs: PDFDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
        }
    }

    pub fn with_objid(mut self, objid: u32) -> Self {
        self.objid = Some(objid);
        self
    }

    /// Stored bytes, before any filter is applied.
    pub fn rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Stored bytes as a cheap shared handle.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// Attribute lookup trying each name in turn (full key, then abbreviation).
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }

    /// Name-valued attribute, e.g. `/Subtype`.
    pub fn name_attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_name().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_report_type_mismatch() {
        let obj = PDFObject::Name("Image".into());
        assert_eq!(obj.as_name().unwrap(), "Image");
        let err = obj.as_int().unwrap_err();
        assert!(matches!(
            err,
            PdfError::TypeError {
                expected: "int",
                got: "name"
            }
        ));
    }

    #[test]
    fn as_num_coerces_ints() {
        assert_eq!(PDFObject::Int(7).as_num().unwrap(), 7.0);
        assert_eq!(PDFObject::Real(0.5).as_num().unwrap(), 0.5);
        assert!(PDFObject::Null.as_num().is_err());
    }

    #[test]
    fn stream_acts_as_dict() {
        let mut attrs = PDFDict::new();
        attrs.insert("Subtype".into(), PDFObject::Name("Image".into()));
        let obj = PDFObject::Stream(Box::new(PDFStream::new(attrs, b"abc".to_vec())));
        let dict = obj.as_dict().unwrap();
        assert!(dict.contains_key("Subtype"));
        assert_eq!(obj.as_stream().unwrap().name_attr("Subtype"), Some("Image"));
        assert_eq!(obj.as_stream().unwrap().rawdata(), b"abc");
    }

    #[test]
    fn get_any_prefers_first_name() {
        let mut attrs = PDFDict::new();
        attrs.insert("W".into(), PDFObject::Int(4));
        attrs.insert("Width".into(), PDFObject::Int(8));
        let stream = PDFStream::new(attrs, Vec::new());
        assert_eq!(stream.get_any(&["Width", "W"]), Some(&PDFObject::Int(8)));
        assert_eq!(stream.get_any(&["Height", "H"]), None);
    }
}
