//! PDF object parser - builds [`PDFObject`]s from lexer tokens.

use super::lexer::{Keyword, PSBaseParser, PSToken};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};

/// PDF Parser - parses PDF object syntax
///
/// Uses PSBaseParser for tokenization and builds PDF objects,
/// handling indirect references (num num R) with a small lookahead.
pub struct PDFParser<'a> {
    data: &'a [u8],
    base: PSBaseParser<'a>,
    /// Tokens pushed back while probing for `n m R`, with their start offsets.
    /// The last element is the earliest token in the input.
    lookahead: Vec<(usize, PSToken)>,
}

impl<'a> PDFParser<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            base: PSBaseParser::new(data),
            lookahead: Vec::new(),
        }
    }

    /// Position just past the last consumed object.
    pub fn tell(&self) -> usize {
        self.lookahead
            .last()
            .map_or_else(|| self.base.tell(), |(pos, _)| *pos)
    }

    /// Unparsed data after the last consumed object.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.tell().min(self.data.len())..]
    }

    fn next_token(&mut self) -> Result<Option<(usize, PSToken)>> {
        if let Some(entry) = self.lookahead.pop() {
            return Ok(Some(entry));
        }
        self.base.next_token().transpose()
    }

    /// Parse next PDF object
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let (pos, token) = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
        self.token_to_object(pos, token)
    }

    fn token_to_object(&mut self, pos: usize, token: PSToken) -> Result<PDFObject> {
        match token {
            PSToken::Int(n) => Ok(self.int_or_ref(n)),
            PSToken::Real(n) => Ok(PDFObject::Real(n)),
            PSToken::Bool(b) => Ok(PDFObject::Bool(b)),
            PSToken::Literal(s) => Ok(PDFObject::Name(s)),
            PSToken::String(s) => Ok(PDFObject::String(s)),
            PSToken::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            PSToken::Keyword(Keyword::ArrayStart) => self.parse_array(),
            PSToken::Keyword(Keyword::DictStart) => self.parse_dict(),
            PSToken::Keyword(kw) => Err(PdfError::TokenError {
                pos,
                msg: format!(
                    "unexpected keyword: {}",
                    String::from_utf8_lossy(kw.as_bytes())
                ),
            }),
            PSToken::Array(_) | PSToken::Dict(_) => Err(PdfError::TokenError {
                pos,
                msg: "unexpected compound token".into(),
            }),
        }
    }

    /// `n` alone, or the start of an indirect reference `n m R`.
    fn int_or_ref(&mut self, n: i64) -> PDFObject {
        let Ok(Some((pos2, tok2))) = self.next_token() else {
            return PDFObject::Int(n);
        };
        if let PSToken::Int(m) = tok2 {
            if let Ok(Some((pos3, tok3))) = self.next_token() {
                if tok3 == PSToken::Keyword(Keyword::R)
                    && let (Ok(objid), Ok(genno)) = (u32::try_from(n), u32::try_from(m))
                {
                    return PDFObject::Ref(PDFObjRef::new(objid, genno));
                }
                self.lookahead.push((pos3, tok3));
            }
            self.lookahead.push((pos2, PSToken::Int(m)));
        } else {
            self.lookahead.push((pos2, tok2));
        }
        PDFObject::Int(n)
    }

    fn parse_array(&mut self) -> Result<PDFObject> {
        let mut arr = Vec::new();
        loop {
            let (pos, token) = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
            if token == PSToken::Keyword(Keyword::ArrayEnd) {
                break;
            }
            arr.push(self.token_to_object(pos, token)?);
        }
        Ok(PDFObject::Array(arr))
    }

    fn parse_dict(&mut self) -> Result<PDFObject> {
        let mut dict = PDFDict::new();
        loop {
            let (pos, token) = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
            let key = match token {
                PSToken::Keyword(Keyword::DictEnd) => break,
                PSToken::Literal(name) => name,
                _ => {
                    return Err(PdfError::TokenError {
                        pos,
                        msg: "expected name as dict key".into(),
                    });
                }
            };
            let value = self.parse_object()?;
            // a null value is equivalent to an absent key
            if !value.is_null() {
                dict.insert(key, value);
            }
        }
        Ok(PDFObject::Dict(dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_references_and_plain_ints() {
        let mut parser = PDFParser::new(b"[1 0 R 2 3 4 0 R]");
        let obj = parser.parse_object().unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[0], PDFObject::Ref(PDFObjRef::new(1, 0)));
        assert_eq!(arr[1], PDFObject::Int(2));
        assert_eq!(arr[2], PDFObject::Int(3));
        assert_eq!(arr[3], PDFObject::Ref(PDFObjRef::new(4, 0)));
    }

    #[test]
    fn dict_drops_null_values() {
        let mut parser = PDFParser::new(b"<< /Type /XObject /Mask null /W 4 >>");
        let obj = parser.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type"), Some(&PDFObject::Name("XObject".into())));
        assert!(!dict.contains_key("Mask"));
        assert_eq!(dict.get("W"), Some(&PDFObject::Int(4)));
    }

    #[test]
    fn tell_rewinds_over_lookahead() {
        let data = b"42 endobj";
        let mut parser = PDFParser::new(data);
        assert_eq!(parser.parse_object().unwrap(), PDFObject::Int(42));
        assert!(parser.remaining().starts_with(b"endobj"));
    }

    #[test]
    fn rejects_non_name_dict_key() {
        let mut parser = PDFParser::new(b"<< 1 2 >>");
        assert!(matches!(
            parser.parse_object(),
            Err(PdfError::TokenError { .. })
        ));
    }

    #[test]
    fn truncated_array_is_eof() {
        let mut parser = PDFParser::new(b"[1 2");
        assert!(matches!(parser.parse_object(), Err(PdfError::UnexpectedEof)));
    }
}
