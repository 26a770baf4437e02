//! XObject operators.
//!
//! Handles: Do, and inline images (BI/ID/EI)
//!
//! - Do on an image yields an event
//! - Do on a form pushes a frame that runs the form's content with its own
//!   resource layer and matrix
//! - inline images are decoded from their dictionary, never looked up

use crate::image::{self, FormXObject, ImageObject, XObject, inline_stream};
use crate::interp::content::ContentParser;
use crate::interp::interpreter::{Frame, GraphicsState, ImageEvent, PageImages};
use crate::parser::lexer::{Keyword, PSToken};
use crate::utils::mult_matrix;
use std::collections::HashMap;

#[allow(non_snake_case)]
impl PageImages<'_> {
    /// Invoke a named XObject.
    ///
    /// PDF operator: `Do`
    pub(crate) fn do_Do(&mut self, operands: &[PSToken]) -> Option<ImageEvent> {
        let Some(PSToken::Literal(name)) = operands.last() else {
            self.skip_operator(&Keyword::Do, "expected a name operand");
            return None;
        };

        match image::resolve(self.doc, name, &self.scope) {
            Ok(XObject::Image(image)) => Some(self.image_event(Some(name.clone()), image)),
            Ok(XObject::Form(form)) => {
                self.enter_form(name, form);
                None
            }
            Ok(XObject::Unknown { subtype }) => {
                tracing::debug!(page = self.page, name, ?subtype, "skipping XObject");
                self.diagnostics.operators_skipped += 1;
                None
            }
            Err(err) => {
                tracing::warn!(page = self.page, name, error = %err, "skipping XObject");
                self.diagnostics.images_skipped += 1;
                None
            }
        }
    }

    /// Run a form's content as a nested frame.
    ///
    /// The CTM becomes `/Matrix` x CTM and is restored when the form ends.
    /// Forms nested deeper than the bound, or already being executed, are
    /// skipped.
    fn enter_form(&mut self, name: &str, form: FormXObject) {
        if self.form_depth() >= self.options.max_form_depth {
            tracing::warn!(
                page = self.page,
                name,
                max_depth = self.options.max_form_depth,
                "form nesting too deep"
            );
            self.diagnostics.depth_limited += 1;
            return;
        }
        if form.objid.is_some() && self.frames.iter().any(|f| f.form_id == form.objid) {
            tracing::warn!(page = self.page, name, objid = ?form.objid, "recursive form");
            self.diagnostics.depth_limited += 1;
            return;
        }

        let content = match form.content(self.doc) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(page = self.page, name, error = %err, "form content undecodable");
                self.diagnostics.images_skipped += 1;
                return;
            }
        };

        let entry = GraphicsState {
            ctm: mult_matrix(form.matrix, self.current_ctm()),
        };
        self.gstack.push(entry.clone());
        let pushed_scope = match form.resources {
            Some(resources) => {
                self.scope.push(resources);
                true
            }
            None => false,
        };
        self.frames.push(Frame {
            parser: ContentParser::new(content),
            form_id: form.objid,
            entry_state: entry,
            floor: self.gstack.len(),
            pushed_scope,
        });
    }

    /// Inline image.
    ///
    /// PDF operators: `BI` ... `ID` ... `EI`
    pub(crate) fn do_inline_image(
        &mut self,
        dict: HashMap<String, PSToken>,
        data: Vec<u8>,
    ) -> Option<ImageEvent> {
        let stream = inline_stream(dict, data);
        match ImageObject::from_inline(&stream, self.doc, &self.scope) {
            Ok(image) => Some(self.image_event(None, image)),
            Err(err) => {
                tracing::warn!(page = self.page, error = %err, "skipping inline image");
                self.diagnostics.images_skipped += 1;
                None
            }
        }
    }

    fn image_event(&self, name: Option<String>, image: ImageObject) -> ImageEvent {
        tracing::debug!(
            page = self.page,
            name = name.as_deref().unwrap_or("<inline>"),
            width = image.width,
            height = image.height,
            "image"
        );
        ImageEvent {
            page: self.page,
            name,
            image,
            ctm: self.current_ctm(),
            form_depth: self.form_depth(),
        }
    }
}
