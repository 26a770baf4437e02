//! PostScript-style tokenizer shared by the object parser and the
//! content-stream parser.
//!
//! Only the keywords the engine acts on get their own variant. Every other
//! operator arrives as [`Keyword::Unknown`] with its raw bytes, and
//! [`is_content_operator`] tells the interpreter whether it is a real PDF
//! operator to consume silently or garbage to skip.

use crate::error::{PdfError, Result};
use std::collections::HashMap;

/// Keywords the reader and interpreter dispatch on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Structural
    ArrayStart, // [
    ArrayEnd,   // ]
    DictStart,  // <<
    DictEnd,    // >>
    BraceOpen,  // {
    BraceClose, // }

    // Primitives
    Null,

    // Object structure
    Obj,
    EndObj,
    R,
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,

    // Graphics state
    Qq, // save (lowercase q)
    Q,  // restore
    Cm, // concat matrix

    // XObject
    Do,

    // Inline image
    BI,
    ID,
    EI,

    // Compatibility section
    BX,
    EX,

    Unknown(Vec<u8>),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"[" => Self::ArrayStart,
            b"]" => Self::ArrayEnd,
            b"<<" => Self::DictStart,
            b">>" => Self::DictEnd,
            b"{" => Self::BraceOpen,
            b"}" => Self::BraceClose,
            b"null" => Self::Null,
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"R" => Self::R,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"xref" => Self::Xref,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXref,
            b"q" => Self::Qq,
            b"Q" => Self::Q,
            b"cm" => Self::Cm,
            b"Do" => Self::Do,
            b"BI" => Self::BI,
            b"ID" => Self::ID,
            b"EI" => Self::EI,
            b"BX" => Self::BX,
            b"EX" => Self::EX,
            other => Self::Unknown(other.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::ArrayStart => b"[",
            Self::ArrayEnd => b"]",
            Self::DictStart => b"<<",
            Self::DictEnd => b">>",
            Self::BraceOpen => b"{",
            Self::BraceClose => b"}",
            Self::Null => b"null",
            Self::Obj => b"obj",
            Self::EndObj => b"endobj",
            Self::R => b"R",
            Self::Stream => b"stream",
            Self::EndStream => b"endstream",
            Self::Xref => b"xref",
            Self::Trailer => b"trailer",
            Self::StartXref => b"startxref",
            Self::Qq => b"q",
            Self::Q => b"Q",
            Self::Cm => b"cm",
            Self::Do => b"Do",
            Self::BI => b"BI",
            Self::ID => b"ID",
            Self::EI => b"EI",
            Self::BX => b"BX",
            Self::EX => b"EX",
            Self::Unknown(bytes) => bytes.as_slice(),
        }
    }
}

/// Content-stream operators from the PDF operator summary (ISO 32000-1,
/// Annex A) that the engine accepts without acting on them.
const PASSIVE_OPERATORS: &[&[u8]] = &[
    b"b", b"B", b"b*", b"B*", b"BDC", b"BMC", b"BT", b"c", b"cs", b"CS", b"d", b"d0", b"d1",
    b"DP", b"EMC", b"ET", b"f", b"F", b"f*", b"G", b"g", b"gs", b"h", b"i", b"j", b"J", b"K",
    b"k", b"l", b"m", b"M", b"MP", b"n", b"re", b"RG", b"rg", b"ri", b"s", b"S", b"SC", b"sc",
    b"SCN", b"scn", b"sh", b"T*", b"Tc", b"Td", b"TD", b"Tf", b"Tj", b"TJ", b"TL", b"Tm",
    b"Tr", b"Ts", b"Tw", b"Tz", b"v", b"w", b"W", b"W*", b"y", b"'", b"\"",
];

/// Whether `op` names a PDF content-stream operator.
pub fn is_content_operator(op: &Keyword) -> bool {
    match op {
        Keyword::Unknown(bytes) => PASSIVE_OPERATORS.contains(&bytes.as_slice()),
        Keyword::Qq
        | Keyword::Q
        | Keyword::Cm
        | Keyword::Do
        | Keyword::BI
        | Keyword::ID
        | Keyword::EI
        | Keyword::BX
        | Keyword::EX => true,
        _ => false,
    }
}

/// PostScript token types
#[derive(Debug, Clone, PartialEq)]
pub enum PSToken {
    Int(i64),
    Real(f64),
    Bool(bool),
    /// Literal name (e.g., /Name)
    Literal(String),
    /// Keyword/operator (e.g., q, Do, obj)
    Keyword(Keyword),
    /// String (literal or hex)
    String(Vec<u8>),
    Array(Vec<PSToken>),
    Dict(HashMap<String, PSToken>),
}

/// PostScript base parser - performs tokenization over a borrowed buffer.
pub struct PSBaseParser<'a> {
    data: &'a [u8],
    pos: usize,
    /// Start of the most recent token
    token_pos: usize,
}

impl<'a> PSBaseParser<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            token_pos: 0,
        }
    }

    /// Current position in stream
    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub const fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
        self.token_pos = pos;
    }

    /// Remaining unparsed data
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                self.pos += 1;
                match find_line_end(&self.data[self.pos..]) {
                    Some(offset) => self.pos += offset + 1,
                    None => self.pos = self.data.len(),
                }
                continue;
            }
            if !is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    /// Parse a literal name (/Name), decoding `#xx` escapes.
    fn parse_literal(&mut self) -> Result<PSToken> {
        self.advance();
        let mut name = Vec::new();

        while let Some(b) = self.peek() {
            if is_keyword_end(b) {
                break;
            }
            if b == b'#' {
                if let (Some(h), Some(l)) = (
                    self.peek_at(1).and_then(hex_value),
                    self.peek_at(2).and_then(hex_value),
                ) {
                    self.pos += 3;
                    name.push((h << 4) | l);
                    continue;
                }
                // invalid escape: drop the '#', keep what follows
                self.pos += 1;
            } else {
                name.push(b);
                self.pos += 1;
            }
        }

        Ok(PSToken::Literal(name_from_bytes(&name)))
    }

    /// Parse a number (integer or real)
    fn parse_number(&mut self) -> Result<PSToken> {
        let start = self.pos;
        let mut has_dot = false;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else if b == b'.' && !has_dot {
                has_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        let s = std::str::from_utf8(&self.data[start..self.pos]).map_err(|_| {
            PdfError::TokenError {
                pos: start,
                msg: "invalid number".into(),
            }
        })?;

        if has_dot {
            // "5." and "-.5" are valid PDF reals
            let normalized = s.strip_suffix('.').unwrap_or(s);
            let val: f64 = match normalized {
                "" | "+" | "-" => 0.0,
                n => n.parse().map_err(|_| PdfError::TokenError {
                    pos: start,
                    msg: format!("invalid real: {s}"),
                })?,
            };
            Ok(PSToken::Real(val))
        } else {
            let val: i64 = s.parse().map_err(|_| PdfError::TokenError {
                pos: start,
                msg: format!("invalid int: {s}"),
            })?;
            Ok(PSToken::Int(val))
        }
    }

    /// Parse a literal string (...)
    fn parse_string(&mut self) -> Result<PSToken> {
        self.advance();
        let mut result = Vec::new();
        let mut depth = 1;

        while depth > 0 {
            match self.advance() {
                Some(b'(') => {
                    depth += 1;
                    result.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    if depth > 0 {
                        result.push(b')');
                    }
                }
                Some(b'\\') => match self.advance() {
                    Some(b'n') => result.push(b'\n'),
                    Some(b'r') => result.push(b'\r'),
                    Some(b't') => result.push(b'\t'),
                    Some(b'b') => result.push(0x08),
                    Some(b'f') => result.push(0x0c),
                    Some(b'\r') => {
                        // line continuation
                        if self.peek() == Some(b'\n') {
                            self.pos += 1;
                        }
                    }
                    Some(b'\n') => {}
                    Some(c @ b'0'..=b'7') => {
                        let mut octal = u32::from(c - b'0');
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d @ b'0'..=b'7') => {
                                    self.pos += 1;
                                    octal = octal * 8 + u32::from(d - b'0');
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    }
                    Some(c) => result.push(c),
                    None => return Err(PdfError::UnexpectedEof),
                },
                Some(c) => result.push(c),
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        Ok(PSToken::String(result))
    }

    /// Parse a hex string <...>
    fn parse_hex_string(&mut self) -> Result<PSToken> {
        self.advance();
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(c) if c.is_ascii_hexdigit() => {
                    self.pos += 1;
                    let nibble = hex_value(c).unwrap_or(0);
                    match pending.take() {
                        Some(high) => result.push((high << 4) | nibble),
                        None => pending = Some(nibble),
                    }
                }
                Some(c) if is_whitespace(c) => self.pos += 1,
                Some(_) => break,
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        // odd digit count: final nibble is the high half
        if let Some(nibble) = pending {
            result.push(nibble << 4);
        }

        Ok(PSToken::String(result))
    }

    fn parse_keyword(&mut self) -> Result<PSToken> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_keyword_end(b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // a lone delimiter such as ')' that starts no token
            self.pos += 1;
            return Err(PdfError::TokenError {
                pos: start,
                msg: format!("unexpected byte 0x{:02x}", self.data[start]),
            });
        }

        Ok(token_from_bytes(&self.data[start..self.pos]))
    }

    /// Get next token
    pub fn next_token(&mut self) -> Option<Result<(usize, PSToken)>> {
        self.skip_whitespace();
        if self.at_end() {
            return None;
        }

        self.token_pos = self.pos;
        let b = self.peek()?;

        let result = match b {
            b'/' => self.parse_literal(),
            b'(' => self.parse_string(),
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Ok(PSToken::Keyword(Keyword::DictStart))
            }
            b'<' => self.parse_hex_string(),
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Ok(PSToken::Keyword(Keyword::DictEnd))
            }
            b'[' | b']' | b'{' | b'}' | b'>' => {
                self.pos += 1;
                Ok(PSToken::Keyword(Keyword::from_bytes(&[b])))
            }
            b'+' | b'-' | b'.' => {
                if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') {
                    self.parse_number()
                } else {
                    self.parse_keyword()
                }
            }
            c if c.is_ascii_digit() => self.parse_number(),
            _ => self.parse_keyword(),
        };

        Some(result.map(|token| (self.token_pos, token)))
    }

    /// Read raw inline image bytes up to `target` (`EI` or `~>`).
    ///
    /// The marker only counts when followed by whitespace or end of data, so
    /// binary payloads containing the letters `EI` survive. The single
    /// whitespace byte after `ID` is not part of the data, nor is the
    /// separator (one whitespace byte or CRLF) before `EI`.
    pub fn read_inline_data(&mut self, target: &[u8]) -> Vec<u8> {
        if matches!(self.peek(), Some(b) if is_whitespace(b)) {
            self.pos += 1;
        }

        let start = self.pos;
        let mut end = self.data.len();
        let mut resume = self.data.len();
        let mut i = start;
        while i + target.len() <= self.data.len() {
            if &self.data[i..i + target.len()] == target {
                let after = self.data.get(i + target.len()).copied();
                // "~>" is self-delimiting; "EI" needs a following separator
                let delimited = target == b"~>" || after.is_none_or(is_keyword_end);
                if delimited {
                    end = i;
                    resume = i + target.len();
                    break;
                }
            }
            i += 1;
        }

        let mut data = self.data[start..end].to_vec();
        // the separator before "EI" is not data
        if target == b"EI" {
            if data.ends_with(b"\r\n") {
                data.truncate(data.len() - 2);
            } else if data.last().is_some_and(|&b| is_whitespace(b)) {
                data.pop();
            }
        }
        self.pos = resume;
        data
    }
}

/// Check if byte is PDF whitespace.
pub(crate) const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn is_keyword_end(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn find_line_end(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == b'\r' || b == b'\n')
}

fn token_from_bytes(bytes: &[u8]) -> PSToken {
    match bytes {
        b"true" => PSToken::Bool(true),
        b"false" => PSToken::Bool(false),
        _ => PSToken::Keyword(Keyword::from_bytes(bytes)),
    }
}

/// Names are byte strings; map each byte to one char so non-UTF-8 names
/// survive round trips through `String`.
pub(crate) fn name_from_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
