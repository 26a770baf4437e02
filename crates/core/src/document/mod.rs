//! PDF Document module - document structure and pages.
//!
//! This module contains:
//! - `catalog` - PDF document parsing and object resolution (PDFDocument)
//! - `xref` - cross-reference tables, xref streams and recovery scanning
//! - `page` - page tree walking and page attributes (PDFPage)

pub mod catalog;
pub mod page;
mod xref;

pub use catalog::{DEFAULT_CACHE_CAPACITY, PDFDocument, ReaderOptions};
pub use page::PDFPage;
