//! Document-level image extraction.
//!
//! # Example
//!
//! ```ignore
//! use pluck_core::api::{ExtractConfig, MemorySink, extract};
//!
//! let pdf_bytes = std::fs::read("document.pdf")?;
//! let mut sink = MemorySink::default();
//! let report = extract(&pdf_bytes, &ExtractConfig::default(), &mut sink)?;
//! assert_eq!(report.count, sink.len());
//! ```

use std::ops::ControlFlow;

use bytes::Bytes;
use serde::Serialize;

use crate::document::PDFDocument;
use crate::error::{PdfError, Result};
use crate::filter::NativeType;
use crate::image::{self, ExtractedImage};
use crate::interp::{PageDiagnostics, page_images};
use crate::utils::Rect;

use super::config::ExtractConfig;
use super::sink::{ImageSink, PutOutcome};
use super::stream::{PageOutcome, for_each_page};

/// Summary of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Images handed to the sink, stored or not
    pub count: usize,
    /// Sink calls that stored the payload
    pub written: usize,
    /// Sink calls that declined the payload
    pub skipped_existing: usize,
    /// Sink calls that failed to store the payload
    pub write_failed: usize,
    pub pages_visited: usize,
    /// Pages whose object could not be loaded
    pub pages_failed: usize,
    /// Images that could not be resolved or decoded
    pub images_failed: usize,
    pub operators_skipped: usize,
    pub unbalanced_restores: usize,
    /// Forms not entered because of the nesting bound or recursion
    pub depth_limited: usize,
    pub encrypted: bool,
    pub cancelled: bool,
}

/// Open `data` with the reader settings of `config`.
pub fn open_document(data: impl AsRef<[u8]>, config: &ExtractConfig) -> Result<PDFDocument> {
    PDFDocument::with_options(
        Bytes::copy_from_slice(data.as_ref()),
        config.reader_options(),
    )
}

/// Extract every image of the PDF in `data` into `sink`.
///
/// Only a structural failure to open the document is returned as an error;
/// in that case the sink is never called.
pub fn extract(
    data: impl AsRef<[u8]>,
    config: &ExtractConfig,
    sink: &mut dyn ImageSink,
) -> Result<ExtractionReport> {
    let doc = open_document(data, config)?;
    extract_document(&doc, config, sink)
}

/// Extract every image of an open document into `sink`.
///
/// Pages are visited in order; each image gets the identifier
/// `{prefix}_{page}_{index}.{ext}`, where the running index starts at
/// `config.start_index` and advances once per sink call.
pub fn extract_document(
    doc: &PDFDocument,
    config: &ExtractConfig,
    sink: &mut dyn ImageSink,
) -> Result<ExtractionReport> {
    if doc.is_encrypted() {
        tracing::warn!("document is encrypted, no images extracted");
        return Ok(ExtractionReport {
            encrypted: true,
            ..Default::default()
        });
    }

    let mut dispatch = Dispatcher::new(config, sink);
    let page_count = doc.page_count();
    let threads = config.thread_count();

    if threads > 1 && page_count > 1 {
        for_each_page(doc, config, threads, |number, result| {
            if config.is_cancelled() {
                return ControlFlow::Break(());
            }
            match result {
                Ok(outcome) => dispatch.page(outcome),
                Err(err) => dispatch.page_failed(number, &err),
            }
            ControlFlow::Continue(())
        })?;
    } else {
        let limits = config.decode_limits();
        for number in 1..=page_count {
            if config.is_cancelled() {
                break;
            }
            let page = match doc.page(number) {
                Ok(page) => page,
                Err(err) => {
                    dispatch.page_failed(number, &err);
                    continue;
                }
            };
            let mut events = page_images(doc, &page, config.interpreter_options());
            for event in events.by_ref() {
                let result = image::extract(&event.image, &limits);
                dispatch.image(number, event.name.as_deref(), result);
            }
            dispatch.page_done(number, events.diagnostics());
        }
    }

    let mut report = dispatch.finish();
    if config.is_cancelled() {
        report.cancelled = true;
    }
    tracing::info!(
        count = report.count,
        written = report.written,
        write_failed = report.write_failed,
        pages = report.pages_visited,
        failed = report.images_failed,
        cancelled = report.cancelled,
        "extraction finished"
    );
    Ok(report)
}

/// Merge step: assigns running indices and talks to the sink.
struct Dispatcher<'a> {
    prefix: &'a str,
    next_index: usize,
    sink: &'a mut dyn ImageSink,
    report: ExtractionReport,
}

impl<'a> Dispatcher<'a> {
    fn new(config: &'a ExtractConfig, sink: &'a mut dyn ImageSink) -> Self {
        Self {
            prefix: &config.prefix,
            next_index: config.start_index,
            sink,
            report: ExtractionReport::default(),
        }
    }

    fn image(&mut self, page: usize, name: Option<&str>, result: Result<ExtractedImage>) {
        let image = match result {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(
                    page,
                    name = name.unwrap_or("<inline>"),
                    error = %err,
                    "image not extracted"
                );
                self.report.images_failed += 1;
                return;
            }
        };

        let identifier = format!(
            "{}_{}_{}.{}",
            self.prefix,
            page,
            self.next_index,
            image.extension()
        );
        self.next_index += 1;
        self.report.count += 1;
        match self.sink.put(&identifier, &image.data) {
            PutOutcome::Written => self.report.written += 1,
            PutOutcome::Skipped => self.report.skipped_existing += 1,
            PutOutcome::Failed => self.report.write_failed += 1,
        }
        tracing::debug!(page, identifier, bytes = image.data.len(), "image dispatched");
    }

    fn page(&mut self, outcome: PageOutcome) {
        for image in outcome.images {
            self.image(outcome.page, image.name.as_deref(), image.result);
        }
        self.page_done(outcome.page, outcome.diagnostics);
    }

    fn page_done(&mut self, page: usize, diagnostics: PageDiagnostics) {
        let report = &mut self.report;
        report.pages_visited += 1;
        report.images_failed += diagnostics.images_skipped;
        report.operators_skipped += diagnostics.operators_skipped;
        report.unbalanced_restores += diagnostics.unbalanced_restores;
        report.depth_limited += diagnostics.depth_limited;
        report.cancelled |= diagnostics.cancelled;
        if diagnostics != PageDiagnostics::default() {
            tracing::debug!(page, ?diagnostics, "page diagnostics");
        }
    }

    fn page_failed(&mut self, page: usize, err: &PdfError) {
        tracing::warn!(page, error = %err, "page skipped");
        self.report.pages_failed += 1;
    }

    fn finish(self) -> ExtractionReport {
        self.report
    }
}

/// One row of an image listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageListing {
    pub page: usize,
    /// Running index the image would get from [`extract`] when every image
    /// before it extracts successfully
    pub index: usize,
    pub name: Option<String>,
    pub objid: Option<u32>,
    #[serde(rename = "type")]
    pub native: NativeType,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: Option<u32>,
    /// Colour space label (`gray`, `rgb`, `icc`, ...)
    pub color: Option<String>,
    pub components: Option<usize>,
    pub filters: Vec<String>,
    pub inline: bool,
    pub image_mask: bool,
    pub has_soft_mask: bool,
    /// Undecoded payload size in bytes
    pub raw_size: usize,
    /// Page-space bounds `(x0, y0, x1, y1)`
    pub bbox: Rect,
    pub form_depth: usize,
}

/// Enumerate the images of the PDF in `data` without decoding them.
pub fn list_images(data: impl AsRef<[u8]>, config: &ExtractConfig) -> Result<Vec<ImageListing>> {
    let doc = open_document(data, config)?;
    Ok(list_document_images(&doc, config))
}

/// Enumerate the images of an open document, in extraction order.
///
/// Encrypted documents list nothing.
pub fn list_document_images(doc: &PDFDocument, config: &ExtractConfig) -> Vec<ImageListing> {
    if doc.is_encrypted() {
        tracing::warn!("document is encrypted, no images listed");
        return Vec::new();
    }

    let mut listing = Vec::new();
    let mut index = config.start_index;
    for number in 1..=doc.page_count() {
        if config.is_cancelled() {
            break;
        }
        let page = match doc.page(number) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(page = number, error = %err, "page skipped");
                continue;
            }
        };
        for event in page_images(doc, &page, config.interpreter_options()) {
            let bbox = event.bbox();
            let image = &event.image;
            listing.push(ImageListing {
                page: number,
                index,
                objid: image.objid,
                native: image.native_type(),
                width: image.width,
                height: image.height,
                bits_per_component: image.bits_per_component,
                color: image.color_space.as_ref().map(|cs| cs.label().to_string()),
                components: image.color_space.as_ref().and_then(|cs| cs.components()),
                filters: image.filters.names().into_iter().map(str::to_string).collect(),
                inline: image.inline,
                image_mask: image.image_mask,
                has_soft_mask: image.has_soft_mask,
                raw_size: image.raw().len(),
                bbox,
                form_depth: event.form_depth,
                name: event.name,
            });
            index += 1;
        }
    }
    listing
}
