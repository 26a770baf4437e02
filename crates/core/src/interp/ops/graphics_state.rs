//! Graphics state operators: q, Q, cm.

use crate::error::PdfError;
use crate::interp::interpreter::{GraphicsState, PageImages, numeric_operands};
use crate::parser::lexer::{Keyword, PSToken};
use crate::utils::{matrix_from_slice, mult_matrix};

#[allow(non_snake_case)]
impl PageImages<'_> {
    /// Saves the current graphics state to the stack.
    ///
    /// PDF operator: `q`
    pub(crate) fn do_q(&mut self) {
        let state = GraphicsState {
            ctm: self.current_ctm(),
        };
        self.gstack.push(state);
    }

    /// Restores the most recently saved graphics state.
    ///
    /// PDF operator: `Q`
    ///
    /// With nothing saved in the current content stream the state resets to
    /// the one the stream started with and interpretation continues.
    pub(crate) fn do_Q(&mut self) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        if self.gstack.len() > frame.floor {
            self.gstack.pop();
            return;
        }
        let entry = frame.entry_state.clone();
        self.diagnostics.unbalanced_restores += 1;
        tracing::warn!(
            page = self.page,
            error = %PdfError::UnbalancedGraphicsState,
            "resetting graphics state"
        );
        if let Some(current) = self.gstack.last_mut() {
            *current = entry;
        }
    }

    /// Concatenates a matrix to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub(crate) fn do_cm(&mut self, operands: &[PSToken]) {
        let Some(matrix) = numeric_operands(operands)
            .as_deref()
            .and_then(matrix_from_slice)
        else {
            self.skip_operator(&Keyword::Cm, "expected six numbers");
            return;
        };
        if let Some(current) = self.gstack.last_mut() {
            current.ctm = mult_matrix(matrix, current.ctm);
        }
    }
}
