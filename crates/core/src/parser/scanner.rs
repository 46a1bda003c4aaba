//! Seekable token scanner.
//!
//! Wraps the lexer and assembles composite values: arrays, dictionaries and
//! `N G R` references inside them. At top level numbers are never folded
//! into references, so `12 0 obj` reads as `Int Int Keyword`.

use super::lexer::{Keyword, LexToken, Lexer};
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, ObjectId, PDFObject};
use bytes::Bytes;

/// Deepest array/dictionary nesting accepted inside one value.
pub const MAX_NESTING: usize = 256;

/// A scanner token: either a value or a bare keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Object(PDFObject),
    Keyword(Keyword),
}

impl Token {
    pub const fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Self::Keyword(kw) => Some(kw),
            Self::Object(_) => None,
        }
    }

}

/// Conversion used by `TokenScanner::try_read_token`.
pub trait FromToken: Sized {
    fn from_token(token: &Token) -> Option<Self>;
}

impl FromToken for i64 {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Object(PDFObject::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

impl FromToken for f64 {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Object(obj) => obj.as_num().ok(),
            Token::Keyword(_) => None,
        }
    }
}

impl FromToken for Dictionary {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Object(PDFObject::Dict(dict)) => Some(dict.clone()),
            _ => None,
        }
    }
}

impl FromToken for Keyword {
    fn from_token(token: &Token) -> Option<Self> {
        token.as_keyword().cloned()
    }
}

impl FromToken for PDFObject {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Object(obj) => Some(obj.clone()),
            Token::Keyword(Keyword::Null) => Some(Self::Null),
            Token::Keyword(_) => None,
        }
    }
}

/// Tokenizer collaborator consumed by the xref parsers and the validator.
pub trait TokenScanner {
    /// Read the next token. Ok(false) at end of data.
    fn move_next(&mut self) -> Result<bool>;

    /// Token read by the last successful `move_next`.
    fn current_token(&self) -> Option<&Token>;

    /// Offset just past the current token.
    fn current_position(&self) -> u64;

    /// Start of the current token.
    fn current_token_start(&self) -> u64;

    /// Reposition; the current token is cleared.
    fn seek(&mut self, offset: u64);

    /// Read the next token as `T`; on mismatch the position is restored.
    fn try_read_token<T: FromToken>(&mut self) -> Option<T> {
        let start = self.current_position();
        if let Ok(true) = self.move_next()
            && let Some(value) = self.current_token().and_then(T::from_token)
        {
            return Some(value);
        }
        self.seek(start);
        None
    }
}

/// Scanner over in-memory PDF bytes.
#[derive(Debug, Clone)]
pub struct PdfScanner {
    lexer: Lexer,
    /// Lookahead used while folding `N G R` inside composites
    lookahead: Vec<(usize, LexToken)>,
    current: Option<Token>,
    token_start: usize,
}

impl PdfScanner {
    pub const fn new(data: Bytes) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
            current: None,
            token_start: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    pub fn len(&self) -> u64 {
        self.lexer.data().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.lexer.data().is_empty()
    }

    fn next_lex(&mut self) -> Result<Option<(usize, LexToken)>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        self.lexer.next_token().transpose()
    }

    fn expect_lex(&mut self) -> Result<(usize, LexToken)> {
        self.next_lex()?.ok_or(PdfError::UnexpectedEof)
    }

    /// Value inside an array or dictionary, folding `N G R`.
    fn read_value(&mut self, pos: usize, token: LexToken, depth: usize) -> Result<PDFObject> {
        match token {
            LexToken::Int(n) => {
                if let Some((pos2, second)) = self.next_lex()? {
                    if let LexToken::Int(m) = second {
                        if let Some((pos3, third)) = self.next_lex()? {
                            if third == LexToken::Keyword(Keyword::Ref) {
                                return Ok(reference(n, m)
                                    .map_or(PDFObject::Null, PDFObject::Ref));
                            }
                            self.lookahead.push((pos3, third));
                        }
                    }
                    self.lookahead.push((pos2, second));
                }
                Ok(PDFObject::Int(n))
            }
            LexToken::Real(n) => Ok(PDFObject::Real(n)),
            LexToken::Bool(b) => Ok(PDFObject::Bool(b)),
            LexToken::Name(name) => Ok(PDFObject::Name(name)),
            LexToken::String(s) => Ok(PDFObject::String(s)),
            LexToken::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            LexToken::Keyword(Keyword::ArrayStart) => self.read_array(pos, depth + 1),
            LexToken::Keyword(Keyword::DictStart) => self.read_dict(pos, depth + 1),
            LexToken::Keyword(kw) => Err(PdfError::TokenError {
                pos,
                msg: format!("unexpected keyword: {kw}"),
            }),
        }
    }

    fn read_array(&mut self, start: usize, depth: usize) -> Result<PDFObject> {
        check_nesting(start, depth)?;
        let mut items = Vec::new();
        loop {
            let (pos, token) = self.expect_lex()?;
            if token == LexToken::Keyword(Keyword::ArrayEnd) {
                return Ok(PDFObject::Array(items));
            }
            items.push(self.read_value(pos, token, depth)?);
        }
    }

    fn read_dict(&mut self, start: usize, depth: usize) -> Result<PDFObject> {
        check_nesting(start, depth)?;
        let mut dict = Dictionary::new();
        loop {
            let (pos, token) = self.expect_lex()?;
            let key = match token {
                LexToken::Keyword(Keyword::DictEnd) => return Ok(PDFObject::Dict(dict)),
                LexToken::Name(name) => name,
                other => {
                    return Err(PdfError::TokenError {
                        pos,
                        msg: format!("expected dictionary key, got {other:?}"),
                    });
                }
            };
            let (pos, token) = self.expect_lex()?;
            if token == LexToken::Keyword(Keyword::DictEnd) {
                // key without value
                dict.insert(key, PDFObject::Null);
                return Ok(PDFObject::Dict(dict));
            }
            let value = self.read_value(pos, token, depth)?;
            dict.insert(key, value);
        }
    }
}

fn check_nesting(pos: usize, depth: usize) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(PdfError::SyntaxError(format!(
            "objects nested deeper than {MAX_NESTING} levels at offset {pos}"
        )));
    }
    Ok(())
}

fn reference(objid: i64, genno: i64) -> Option<ObjectId> {
    Some(ObjectId::new(
        u32::try_from(objid).ok()?,
        u32::try_from(genno).ok()?,
    ))
}

impl TokenScanner for PdfScanner {
    fn move_next(&mut self) -> Result<bool> {
        self.lookahead.clear();
        self.current = None;
        let Some(next) = self.lexer.next_token() else {
            return Ok(false);
        };
        let (pos, token) = next?;
        self.token_start = pos;
        let token = match token {
            LexToken::Keyword(Keyword::ArrayStart) => {
                Token::Object(self.read_array(pos, 1).inspect_err(|_| self.lookahead.clear())?)
            }
            LexToken::Keyword(Keyword::DictStart) => {
                Token::Object(self.read_dict(pos, 1).inspect_err(|_| self.lookahead.clear())?)
            }
            LexToken::Keyword(kw) => Token::Keyword(kw),
            LexToken::Int(n) => Token::Object(PDFObject::Int(n)),
            LexToken::Real(n) => Token::Object(PDFObject::Real(n)),
            LexToken::Bool(b) => Token::Object(PDFObject::Bool(b)),
            LexToken::Name(name) => Token::Object(PDFObject::Name(name)),
            LexToken::String(s) => Token::Object(PDFObject::String(s)),
        };
        self.current = Some(token);
        Ok(true)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    fn current_position(&self) -> u64 {
        self.lexer.tell() as u64
    }

    fn current_token_start(&self) -> u64 {
        self.token_start as u64
    }

    fn seek(&mut self, offset: u64) {
        self.lookahead.clear();
        self.current = None;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.lexer.set_pos(offset);
        self.token_start = self.lexer.tell();
    }
}
