//! PDF and PostScript parsing modules.
//!
//! - `lexer`: PostScript-style tokenizer, inline image data reader
//! - `pdf_parser`: PDF object parser

pub mod lexer;
pub mod pdf_parser;

pub use lexer::{Keyword, PSBaseParser, PSToken, is_content_operator};
pub use pdf_parser::PDFParser;
