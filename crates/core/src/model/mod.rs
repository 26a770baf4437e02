//! PDF model types.
//!
//! - `objects` - PDF object types (PDFObject, PDFStream, PDFObjRef)
//! - `colorspace` - colour space descriptors attached to images

pub mod colorspace;
pub mod objects;

pub use colorspace::ColorSpace;
pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
