//! Content stream tokenizer.
//!
//! Groups lexer tokens into operands, operators and inline images. Arrays,
//! dictionaries and procedures are assembled on a context stack so an
//! operator only ever sees complete operands.

use crate::model::objects::{PDFDict, PDFObject};
use crate::parser::lexer::{Keyword, PSBaseParser, PSToken};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};

/// Token types produced by [`ContentParser`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    /// An operand (number, string, array, dict, name)
    Operand(PSToken),
    /// An operator keyword (q, cm, Do, ...)
    Operator(Keyword),
    /// A complete `BI ... ID ... EI` inline image
    InlineImage {
        dict: HashMap<String, PSToken>,
        data: Vec<u8>,
    },
}

/// Context frame for tracking array/dict/proc construction
#[derive(Debug)]
enum Context {
    Array(Vec<PSToken>),
    Dict(Vec<PSToken>),
    Proc(Vec<PSToken>),
}

/// Parser for one page's (or one form's) content bytes.
pub struct ContentParser {
    data: Bytes,
    pos: usize,
    pending: VecDeque<ContentToken>,
    operand_stack: Vec<PSToken>,
    context_stack: Vec<Context>,
    in_inline_dict: bool,
}

impl ContentParser {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            pending: VecDeque::new(),
            operand_stack: Vec::new(),
            context_stack: Vec::new(),
            in_inline_dict: false,
        }
    }

    /// Byte offset of the next unread token.
    pub const fn tell(&self) -> usize {
        self.pos
    }

    fn next_token(&mut self) -> Option<PSToken> {
        loop {
            let mut lexer = PSBaseParser::new(&self.data);
            lexer.set_pos(self.pos);
            match lexer.next_token()? {
                Ok((_, token)) => {
                    self.pos = lexer.tell().max(self.pos + 1);
                    return Some(token);
                }
                Err(err) => {
                    tracing::trace!(pos = self.pos, error = %err, "skipping bad content token");
                    self.pos += 1;
                }
            }
        }
    }

    fn flush_operands(&mut self) {
        self.pending
            .extend(self.operand_stack.drain(..).map(ContentToken::Operand));
    }

    fn push_operand(&mut self, token: PSToken) {
        match self.context_stack.last_mut() {
            Some(Context::Array(items) | Context::Dict(items) | Context::Proc(items)) => {
                items.push(token);
            }
            None => self.operand_stack.push(token),
        }
    }

    fn close_context(&mut self, token: PSToken) {
        self.push_operand(token);
    }

    fn read_inline_image(&mut self) -> ContentToken {
        self.in_inline_dict = false;
        let dict = build_dict(std::mem::take(&mut self.operand_stack));
        let eos = inline_eos(&dict);
        let mut lexer = PSBaseParser::new(&self.data);
        lexer.set_pos(self.pos);
        let data = lexer.read_inline_data(eos);
        self.pos = lexer.tell();
        ContentToken::InlineImage { dict, data }
    }
}

impl Iterator for ContentParser {
    type Item = ContentToken;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(tok) = self.pending.pop_front() {
            return Some(tok);
        }

        loop {
            let Some(token) = self.next_token() else {
                // trailing operands without an operator
                self.context_stack.clear();
                self.flush_operands();
                return self.pending.pop_front();
            };

            let PSToken::Keyword(kw) = token else {
                self.push_operand(token);
                continue;
            };

            match kw {
                Keyword::ArrayStart => self.context_stack.push(Context::Array(Vec::new())),
                Keyword::DictStart => self.context_stack.push(Context::Dict(Vec::new())),
                Keyword::BraceOpen => self.context_stack.push(Context::Proc(Vec::new())),
                Keyword::ArrayEnd => {
                    if let Some(Context::Array(items)) = self.context_stack.pop() {
                        self.close_context(PSToken::Array(items));
                    }
                }
                Keyword::DictEnd => {
                    if let Some(Context::Dict(items)) = self.context_stack.pop() {
                        self.close_context(PSToken::Dict(build_dict(items)));
                    }
                }
                Keyword::BraceClose => {
                    if let Some(Context::Proc(items)) = self.context_stack.pop() {
                        self.close_context(PSToken::Array(items));
                    }
                }
                Keyword::BI => {
                    self.in_inline_dict = true;
                    self.context_stack.clear();
                    self.operand_stack.clear();
                }
                Keyword::ID if self.in_inline_dict => {
                    self.context_stack.clear();
                    return Some(self.read_inline_image());
                }
                // already consumed with the inline data
                Keyword::EI => {}
                Keyword::Null => self.push_operand(PSToken::Keyword(Keyword::Null)),
                kw if self.in_inline_dict || !self.context_stack.is_empty() => {
                    self.push_operand(PSToken::Keyword(kw));
                }
                kw => {
                    self.flush_operands();
                    self.pending.push_back(ContentToken::Operator(kw));
                    return self.pending.pop_front();
                }
            }
        }
    }
}

/// Pair up `/Key value` items; unpaired or non-name keys are dropped.
fn build_dict(items: Vec<PSToken>) -> HashMap<String, PSToken> {
    let mut dict = HashMap::new();
    let mut iter = items.into_iter();
    while let Some(key) = iter.next() {
        if let PSToken::Literal(name) = key
            && let Some(value) = iter.next()
        {
            dict.insert(name, value);
        }
    }
    dict
}

/// End marker for inline data: `~>` when the first filter is ASCII85.
fn inline_eos(dict: &HashMap<String, PSToken>) -> &'static [u8] {
    let first = match dict.get("F").or_else(|| dict.get("Filter")) {
        Some(PSToken::Array(filters)) => filters.first(),
        other => other,
    };
    match first {
        Some(PSToken::Literal(name)) if name == "A85" || name == "ASCII85Decode" => b"~>",
        _ => b"EI",
    }
}

/// Convert a content-stream operand into an object value.
pub fn token_to_object(token: PSToken) -> PDFObject {
    match token {
        PSToken::Int(n) => PDFObject::Int(n),
        PSToken::Real(n) => PDFObject::Real(n),
        PSToken::Bool(b) => PDFObject::Bool(b),
        PSToken::Literal(name) => PDFObject::Name(name),
        PSToken::String(s) => PDFObject::String(s),
        PSToken::Array(items) => PDFObject::Array(items.into_iter().map(token_to_object).collect()),
        PSToken::Dict(entries) => PDFObject::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k, token_to_object(v)))
                .filter(|(_, v)| !v.is_null())
                .collect::<PDFDict>(),
        ),
        PSToken::Keyword(_) => PDFObject::Null,
    }
}
