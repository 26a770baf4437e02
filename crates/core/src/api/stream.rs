//! Page-parallel interpretation.
//!
//! Workers pull page numbers from a shared counter, interpret and extract
//! each page independently, and send the outcome over a bounded channel. The
//! calling thread reorders outcomes by page number, so everything downstream
//! of the merge sees pages in document order.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, sync_channel};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::document::PDFDocument;
use crate::error::{PdfError, Result};
use crate::filter::DecodeLimits;
use crate::image::{self, ExtractedImage};
use crate::interp::{PageDiagnostics, page_images};

use super::config::{CancelToken, ExtractConfig};

pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 50;

/// An image found on a page, with its extraction result.
#[derive(Debug)]
pub struct PageImage {
    /// XObject resource name; `None` for inline images
    pub name: Option<String>,
    pub result: Result<ExtractedImage>,
}

/// Everything one page produced, without running indices.
#[derive(Debug)]
pub struct PageOutcome {
    pub page: usize,
    pub images: Vec<PageImage>,
    pub diagnostics: PageDiagnostics,
}

type StreamItem = (usize, Result<PageOutcome>);

/// Interpret page `number` and extract every image it paints.
pub(crate) fn process_page(
    doc: &PDFDocument,
    number: usize,
    config: &ExtractConfig,
    limits: &DecodeLimits,
) -> Result<PageOutcome> {
    let page = doc.page(number)?;
    let mut events = page_images(doc, &page, config.interpreter_options());
    let images = events
        .by_ref()
        .map(|event| PageImage {
            result: image::extract(&event.image, limits),
            name: event.name,
        })
        .collect();
    Ok(PageOutcome {
        page: number,
        images,
        diagnostics: events.diagnostics(),
    })
}

/// Receiver side: yields outcomes in page order.
struct OrderedPages {
    rx: Receiver<StreamItem>,
    next: usize,
    last: usize,
    buffer: BTreeMap<usize, Result<PageOutcome>>,
    done: bool,
    max_buffered: usize,
}

impl OrderedPages {
    fn new(rx: Receiver<StreamItem>, page_count: usize) -> Self {
        Self {
            rx,
            next: 1,
            last: page_count,
            buffer: BTreeMap::new(),
            done: false,
            max_buffered: 0,
        }
    }
}

impl Iterator for OrderedPages {
    type Item = StreamItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.next > self.last {
                return None;
            }

            let expected = self.next;
            if let Some(result) = self.buffer.remove(&expected) {
                self.next += 1;
                return Some((expected, result));
            }

            // workers stopped early; later pages cannot be released in order
            if self.done {
                return None;
            }

            match self.rx.recv() {
                Ok((number, result)) => {
                    self.buffer.insert(number, result);
                    self.max_buffered = self.max_buffered.max(self.buffer.len());
                }
                Err(_) => {
                    self.done = true;
                }
            }
        }
    }
}

impl Drop for OrderedPages {
    fn drop(&mut self) {
        if self.max_buffered > 0 {
            tracing::trace!(max_buffered = self.max_buffered, "page reorder buffer");
        }
    }
}

/// Process every page on a pool of `thread_count` workers and hand the
/// outcomes to `on_page` in page order, on the calling thread.
///
/// Returning `Break` from `on_page` stops the workers. Pages are not
/// scheduled after `config.cancel` fires.
pub(crate) fn for_each_page<F>(
    doc: &PDFDocument,
    config: &ExtractConfig,
    thread_count: usize,
    mut on_page: F,
) -> Result<()>
where
    F: FnMut(usize, Result<PageOutcome>) -> ControlFlow<()>,
{
    let page_count = doc.page_count();
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| PdfError::ThreadPool(e.to_string()))?;

    let (tx, rx) = sync_channel(DEFAULT_STREAM_BUFFER_CAPACITY);
    let stop = CancelToken::new();
    let worker_stop = stop.clone();
    let next_index = AtomicUsize::new(1);
    let next_index_worker = &next_index;
    let limits = config.decode_limits();

    tracing::debug!(threads = thread_count, pages = page_count, "parallel extraction");

    std::thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                (0..thread_count).into_par_iter().for_each(|_| {
                    loop {
                        if worker_stop.is_cancelled() || config.is_cancelled() {
                            return;
                        }
                        let number = next_index_worker.fetch_add(1, Ordering::Relaxed);
                        if number > page_count {
                            break;
                        }
                        let outcome = process_page(doc, number, config, &limits);
                        if tx.send((number, outcome)).is_err() {
                            worker_stop.cancel();
                            return;
                        }
                    }
                });
            });
        });

        for (number, result) in OrderedPages::new(rx, page_count) {
            if on_page(number, result).is_break() {
                stop.cancel();
                break;
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(page: usize) -> Result<PageOutcome> {
        Ok(PageOutcome {
            page,
            images: Vec::new(),
            diagnostics: PageDiagnostics::default(),
        })
    }

    #[test]
    fn ordered_pages_releases_in_page_order() {
        let (tx, rx) = sync_channel(8);
        for page in [3, 1, 4, 2] {
            tx.send((page, outcome(page))).unwrap();
        }
        drop(tx);
        let pages: Vec<usize> = OrderedPages::new(rx, 4).map(|(n, _)| n).collect();
        assert_eq!(pages, [1, 2, 3, 4]);
    }

    #[test]
    fn ordered_pages_stops_at_gap_when_workers_stop() {
        let (tx, rx) = sync_channel(8);
        for page in [1, 3, 4] {
            tx.send((page, outcome(page))).unwrap();
        }
        drop(tx);
        let pages: Vec<usize> = OrderedPages::new(rx, 4).map(|(n, _)| n).collect();
        assert_eq!(pages, [1]);
    }

    #[test]
    fn ordered_pages_passes_errors_through() {
        let (tx, rx) = sync_channel(8);
        tx.send((2, outcome(2))).unwrap();
        tx.send((1, Err(PdfError::ObjectNotFound(7)))).unwrap();
        drop(tx);
        let items: Vec<_> = OrderedPages::new(rx, 2).collect();
        assert!(matches!(items[0], (1, Err(PdfError::ObjectNotFound(7)))));
        assert!(matches!(items[1], (2, Ok(_))));
    }
}
