//! Page interpreter yielding image events.
//!
//! [`PageImages`] executes a page's content stream one operator at a time
//! and stops whenever an image is painted, so callers pull images lazily.
//! Form XObjects are entered by pushing a frame onto an explicit stack
//! rather than by recursion; the stack depth is the form nesting bound.

use super::content::{ContentParser, ContentToken};
use super::scope::ResourceScope;
use crate::api::config::CancelToken;
use crate::document::{PDFDocument, PDFPage};
use crate::image::ImageObject;
use crate::parser::lexer::{Keyword, PSToken, is_content_operator};
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, apply_matrix_rect};
use serde::Serialize;

/// Default bound on nested form XObjects.
pub const DEFAULT_MAX_FORM_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    pub max_form_depth: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_form_depth: DEFAULT_MAX_FORM_DEPTH,
            cancel: None,
        }
    }
}

/// An image painted by the page, in content order.
#[derive(Debug, Clone)]
pub struct ImageEvent {
    /// 1-based number of the page being interpreted, also for images
    /// painted inside forms
    pub page: usize,
    /// XObject resource name; `None` for inline images
    pub name: Option<String>,
    pub image: ImageObject,
    /// CTM at the paint operator
    pub ctm: Matrix,
    /// Number of enclosing form XObjects
    pub form_depth: usize,
}

impl ImageEvent {
    /// Page-space bounds of the image (the unit square under the CTM).
    pub fn bbox(&self) -> Rect {
        apply_matrix_rect(self.ctm, (0.0, 0.0, 1.0, 1.0))
    }

    pub const fn is_inline(&self) -> bool {
        self.name.is_none()
    }
}

/// Local failures seen while interpreting one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageDiagnostics {
    /// Image or form references that failed to resolve
    pub images_skipped: usize,
    /// Unknown operators, malformed operands, unknown XObject types
    pub operators_skipped: usize,
    pub unbalanced_restores: usize,
    /// Forms not entered because of the depth bound or recursion
    pub depth_limited: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GraphicsState {
    pub(crate) ctm: Matrix,
}

/// One content stream being executed: the page itself or a form.
pub(crate) struct Frame {
    pub(crate) parser: ContentParser,
    /// Object id of the form, for recursion detection
    pub(crate) form_id: Option<u32>,
    /// State at frame entry; an unbalanced `Q` resets to it
    pub(crate) entry_state: GraphicsState,
    /// `gstack` length at entry; `Q` never pops below it
    pub(crate) floor: usize,
    pub(crate) pushed_scope: bool,
}

/// Lazy iterator over the images of one page.
pub struct PageImages<'a> {
    pub(crate) doc: &'a PDFDocument,
    pub(crate) page: usize,
    pub(crate) scope: ResourceScope,
    pub(crate) gstack: Vec<GraphicsState>,
    pub(crate) frames: Vec<Frame>,
    operands: Vec<PSToken>,
    compat_depth: usize,
    pub(crate) options: InterpreterOptions,
    pub(crate) diagnostics: PageDiagnostics,
}

/// Start interpreting `page`. Each call starts over from the beginning.
pub fn page_images<'a>(
    doc: &'a PDFDocument,
    page: &PDFPage,
    options: InterpreterOptions,
) -> PageImages<'a> {
    let content = page.contents(doc);
    let base = GraphicsState {
        ctm: page_ctm(page),
    };
    PageImages {
        doc,
        page: page.number,
        scope: ResourceScope::new(page.resources.clone()),
        gstack: vec![base.clone()],
        frames: vec![Frame {
            parser: ContentParser::new(content),
            form_id: None,
            entry_state: base,
            floor: 1,
            pushed_scope: false,
        }],
        operands: Vec::new(),
        compat_depth: 0,
        options,
        diagnostics: PageDiagnostics::default(),
    }
}

/// Initial CTM mapping the page's visible box to an upright origin.
fn page_ctm(page: &PDFPage) -> Matrix {
    let Some([x0, y0, x1, y1]) = page.cropbox.or(page.mediabox) else {
        return MATRIX_IDENTITY;
    };
    match page.rotate {
        90 => (0.0, -1.0, 1.0, 0.0, -y0, x1),
        180 => (-1.0, 0.0, 0.0, -1.0, x1, y1),
        270 => (0.0, 1.0, -1.0, 0.0, y1, -x0),
        _ => (1.0, 0.0, 0.0, 1.0, -x0, -y0),
    }
}

impl PageImages<'_> {
    pub const fn diagnostics(&self) -> PageDiagnostics {
        self.diagnostics
    }

    pub const fn page_number(&self) -> usize {
        self.page
    }

    pub(crate) fn current_ctm(&self) -> Matrix {
        self.gstack.last().map_or(MATRIX_IDENTITY, |state| state.ctm)
    }

    /// Number of form frames above the page frame.
    pub(crate) fn form_depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub(crate) fn skip_operator(&mut self, op: &Keyword, reason: &str) {
        self.diagnostics.operators_skipped += 1;
        tracing::debug!(
            page = self.page,
            op = %String::from_utf8_lossy(op.as_bytes()),
            reason,
            "skipping operator"
        );
    }

    fn pop_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if !self.frames.is_empty() {
            // drop the form's state and anything it left saved
            self.gstack.truncate(frame.floor.saturating_sub(1).max(1));
            if frame.pushed_scope {
                self.scope.pop();
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    }

    fn execute(&mut self, op: Keyword, operands: &[PSToken]) -> Option<ImageEvent> {
        match op {
            Keyword::Qq => self.do_q(),
            Keyword::Q => self.do_Q(),
            Keyword::Cm => self.do_cm(operands),
            Keyword::Do => return self.do_Do(operands),
            Keyword::BX => self.compat_depth += 1,
            Keyword::EX => self.compat_depth = self.compat_depth.saturating_sub(1),
            ref other if is_content_operator(other) => {}
            // tolerated silently inside BX/EX
            _ if self.compat_depth > 0 => {}
            other => self.skip_operator(&other, "unknown operator"),
        }
        None
    }
}

impl Iterator for PageImages<'_> {
    type Item = ImageEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_cancelled() {
                if !self.frames.is_empty() {
                    tracing::info!(page = self.page, "interpretation cancelled");
                    self.diagnostics.cancelled = true;
                    self.frames.clear();
                }
                return None;
            }

            let frame = self.frames.last_mut()?;
            let Some(token) = frame.parser.next() else {
                self.operands.clear();
                self.pop_frame();
                continue;
            };

            match token {
                ContentToken::Operand(operand) => self.operands.push(operand),
                ContentToken::Operator(op) => {
                    let operands = std::mem::take(&mut self.operands);
                    if let Some(event) = self.execute(op, &operands) {
                        return Some(event);
                    }
                }
                ContentToken::InlineImage { dict, data } => {
                    self.operands.clear();
                    if let Some(event) = self.do_inline_image(dict, data) {
                        return Some(event);
                    }
                }
            }
        }
    }
}

/// Numeric operands, or `None` if any operand is not a number.
pub(crate) fn numeric_operands(operands: &[PSToken]) -> Option<Vec<f64>> {
    operands
        .iter()
        .map(|token| match token {
            PSToken::Int(n) => Some(*n as f64),
            PSToken::Real(n) => Some(*n),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_operands_rejects_names() {
        assert_eq!(
            numeric_operands(&[PSToken::Int(1), PSToken::Real(0.5)]),
            Some(vec![1.0, 0.5])
        );
        assert_eq!(
            numeric_operands(&[PSToken::Int(1), PSToken::Literal("x".into())]),
            None
        );
    }

    #[test]
    fn page_ctm_follows_rotation() {
        let mut page = PDFPage {
            pageid: 1,
            number: 1,
            attrs: Default::default(),
            mediabox: Some([0.0, 0.0, 200.0, 100.0]),
            cropbox: None,
            rotate: 0,
            resources: Default::default(),
        };
        assert_eq!(page_ctm(&page), MATRIX_IDENTITY);
        page.rotate = 90;
        assert_eq!(page_ctm(&page), (0.0, -1.0, 1.0, 0.0, 0.0, 200.0));
    }
}
