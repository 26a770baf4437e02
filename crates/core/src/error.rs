//! Error types for the pluck image extraction engine.

use thiserror::Error;

/// Primary error type for PDF reading and image extraction.
///
/// Only the structural variants (`MalformedDocument` and the parse-level
/// errors it wraps) ever reach the caller of the extraction driver. The
/// image- and operator-local variants are caught at the smallest enclosing
/// scope and summarised in the extraction report.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A reference to an object that the cross-reference data does not know.
    #[error("dangling reference: PDF object {0} not found")]
    ObjectNotFound(u32),

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    /// Unreadable document structure. Fatal for the whole extraction.
    #[error("malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("resource {0} is not an image")]
    NotAnImage(String),

    #[error("graphics state restore without matching save")]
    UnbalancedGraphicsState,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl PdfError {
    /// Whether this error describes the document as a whole rather than one
    /// object, image or operator inside it.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(_)
                | Self::TokenError { .. }
                | Self::UnexpectedEof
                | Self::SyntaxError(_)
                | Self::Io(_)
        )
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
