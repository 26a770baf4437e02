//! Extraction driver.
//!
//! This module provides the main public API: walk a document's pages in
//! order, extract the images each page paints, and hand them to an
//! [`ImageSink`] under sequential identifiers.
//!
//! # Example
//!
//! ```ignore
//! use pluck_core::api::{ExtractConfig, FsSink, extract};
//!
//! let pdf_bytes = std::fs::read("document.pdf")?;
//! let config = ExtractConfig {
//!     prefix: ExtractConfig::prefix_from_path("document.pdf"),
//!     ..Default::default()
//! };
//! let mut sink = FsSink::new("out", config.overwrite)?;
//! let report = extract(&pdf_bytes, &config, &mut sink)?;
//! ```

pub mod config;
pub mod extract;
pub mod sink;
pub mod stream;

// Re-export for convenience
pub use config::{CancelToken, DEFAULT_PREFIX, ExtractConfig};
pub use extract::{
    ExtractionReport, ImageListing, extract, extract_document, list_document_images,
    list_images, open_document,
};
pub use sink::{FsSink, ImageSink, MemorySink, PutOutcome};
pub use stream::{PageImage, PageOutcome};
