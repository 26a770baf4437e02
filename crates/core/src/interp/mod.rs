//! Content stream interpretation.
//!
//! This module contains:
//! - `content`: content stream tokenizer (operands, operators, inline images)
//! - `interpreter`: per-page image event iterator
//! - `scope`: layered resource dictionaries
//! - `ops`: operator implementations by category

pub mod content;
pub mod interpreter;
mod ops;
pub mod scope;

pub use content::{ContentParser, ContentToken};
pub use interpreter::{
    DEFAULT_MAX_FORM_DEPTH, ImageEvent, InterpreterOptions, PageDiagnostics, PageImages,
    page_images,
};
pub use scope::ResourceScope;
