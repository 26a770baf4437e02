//! pluck - extract embedded images from PDF documents.
//!
//! The engine walks each page's content stream, follows `Do` operators into
//! image and form XObjects (and picks up inline images), and hands every
//! image payload to an [`ImageSink`] in its native storable form: JPEG,
//! JPEG 2000, CCITT and JBIG2 data pass through untouched, everything else
//! is unfiltered to raw samples.

pub mod api;
pub mod codec;
pub mod document;
pub mod error;
pub mod filter;
pub mod image;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use api::{
    CancelToken, ExtractConfig, ExtractionReport, FsSink, ImageListing, ImageSink, MemorySink,
    PutOutcome,
    extract, extract_document, list_images,
};
pub use document::{PDFDocument, PDFPage, ReaderOptions};
pub use error::{PdfError, Result};
pub use filter::NativeType;
