//! Extraction settings.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::document::{DEFAULT_CACHE_CAPACITY, ReaderOptions};
use crate::filter::{DecodeLimits, MAX_IMAGE_DECODED_BYTES};
use crate::interp::{DEFAULT_MAX_FORM_DEPTH, InterpreterOptions};

/// Prefix used when none is configured or derivable.
pub const DEFAULT_PREFIX: &str = "image";

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. The driver checks it between pages and the
/// interpreter between operators.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for image extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Leading part of every identifier: `{prefix}_{page}_{index}.{ext}`.
    pub prefix: String,
    /// Replace existing outputs. Applied by sinks that store to a namespace
    /// with prior contents, such as [`FsSink`](super::FsSink).
    pub overwrite: bool,
    /// Page workers. 1 is sequential, 0 means one per available CPU.
    pub threads: usize,
    pub max_form_depth: usize,
    /// Output bound for any one decoded stream.
    pub max_decoded_bytes: usize,
    /// Rebuild the cross-reference data when it is unusable.
    pub recover_xref: bool,
    /// First running index.
    pub start_index: usize,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            overwrite: false,
            threads: 1,
            max_form_depth: DEFAULT_MAX_FORM_DEPTH,
            max_decoded_bytes: MAX_IMAGE_DECODED_BYTES,
            recover_xref: false,
            start_index: 0,
            cancel: None,
        }
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CancelToken {}

impl ExtractConfig {
    /// Prefix derived from the stem of the source file name.
    ///
    /// Falls back to [`DEFAULT_PREFIX`] for paths without a usable stem.
    pub fn prefix_from_path(path: impl AsRef<Path>) -> String {
        path.as_ref()
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map_or_else(|| DEFAULT_PREFIX.to_string(), str::to_string)
    }

    /// Number of page workers to run; 1 means sequential.
    pub fn thread_count(&self) -> usize {
        match self.threads {
            0 => default_thread_count(),
            n => n,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            recover_xref: self.recover_xref,
            max_decoded_bytes: self.max_decoded_bytes,
        }
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits::with_max_bytes(self.max_decoded_bytes)
    }

    pub fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            max_form_depth: self.max_form_depth,
            cancel: self.cancel.clone(),
        }
    }
}
