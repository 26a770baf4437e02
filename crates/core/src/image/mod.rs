//! Image resource resolution and payload extraction.
//!
//! - `resolver` - `/XObject` lookup, [`ImageObject`] construction, extraction
//! - `inline` - inline image dictionary expansion

pub mod inline;
pub mod resolver;

pub use inline::inline_stream;
pub use resolver::{ExtractedImage, FormXObject, ImageObject, XObject, extract, resolve, resolve_image};
