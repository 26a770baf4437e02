//! Destinations for extracted images.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::Result;

/// What a sink did with one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// Declined by the overwrite policy
    Skipped,
    /// The sink tried to store the payload and could not
    Failed,
}

impl PutOutcome {
    pub const fn is_written(self) -> bool {
        matches!(self, Self::Written)
    }
}

impl From<bool> for PutOutcome {
    fn from(written: bool) -> Self {
        if written { Self::Written } else { Self::Skipped }
    }
}

/// Receives extracted image payloads in document order.
///
/// Every outcome counts the image as dispatched; only the report tells them
/// apart.
pub trait ImageSink {
    fn put(&mut self, identifier: &str, bytes: &[u8]) -> PutOutcome;
}

impl<S: ImageSink + ?Sized> ImageSink for &mut S {
    fn put(&mut self, identifier: &str, bytes: &[u8]) -> PutOutcome {
        (**self).put(identifier, bytes)
    }
}

/// Writes each image to `<dir>/<identifier>`.
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
    overwrite: bool,
}

impl FsSink {
    /// Create the sink, creating `dir` (and its parents) if missing.
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, overwrite })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(identifier)
    }
}

impl ImageSink for FsSink {
    fn put(&mut self, identifier: &str, bytes: &[u8]) -> PutOutcome {
        let path = self.path_for(identifier);
        if !self.overwrite && path.exists() {
            tracing::debug!(path = %path.display(), "keeping existing file");
            return PutOutcome::Skipped;
        }
        match std::fs::write(&path, bytes) {
            Ok(()) => PutOutcome::Written,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to write image");
                PutOutcome::Failed
            }
        }
    }
}

/// Keeps images in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    overwrite: bool,
    images: IndexMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new(overwrite: bool) -> Self {
        Self {
            overwrite,
            images: IndexMap::new(),
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&[u8]> {
        self.images.get(identifier).map(Vec::as_slice)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.images.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.images.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<u8>> {
        self.images
    }
}

impl ImageSink for MemorySink {
    fn put(&mut self, identifier: &str, bytes: &[u8]) -> PutOutcome {
        if !self.overwrite && self.images.contains_key(identifier) {
            return PutOutcome::Skipped;
        }
        self.images.insert(identifier.to_string(), bytes.to_vec());
        PutOutcome::Written
    }
}
