//! Primitive PDF tokenizer.
//!
//! Turns bytes into numbers, names, strings and keywords. Composite values
//! (arrays, dictionaries, references) are assembled by `scanner`.

use crate::error::{PdfError, Result};
use bytes::Bytes;

/// Keywords the object-location layer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Obj,
    EndObj,
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,
    /// `R` in `N G R`
    Ref,
    /// `n` marker of an in-use xref table entry
    InUse,
    /// `f` marker of a free xref table entry
    Free,
    Null,
    DictStart,
    DictEnd,
    ArrayStart,
    ArrayEnd,
    Unknown(Vec<u8>),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"xref" => Self::Xref,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXref,
            b"R" => Self::Ref,
            b"n" => Self::InUse,
            b"f" => Self::Free,
            b"null" => Self::Null,
            b"<<" => Self::DictStart,
            b">>" => Self::DictEnd,
            b"[" => Self::ArrayStart,
            b"]" => Self::ArrayEnd,
            _ => Self::Unknown(b.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Obj => b"obj",
            Self::EndObj => b"endobj",
            Self::Stream => b"stream",
            Self::EndStream => b"endstream",
            Self::Xref => b"xref",
            Self::Trailer => b"trailer",
            Self::StartXref => b"startxref",
            Self::Ref => b"R",
            Self::InUse => b"n",
            Self::Free => b"f",
            Self::Null => b"null",
            Self::DictStart => b"<<",
            Self::DictEnd => b">>",
            Self::ArrayStart => b"[",
            Self::ArrayEnd => b"]",
            Self::Unknown(bytes) => bytes.as_slice(),
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Primitive token types
#[derive(Debug, Clone, PartialEq)]
pub enum LexToken {
    Int(i64),
    Real(f64),
    Bool(bool),
    /// Name without the leading slash, `#xx` escapes decoded
    Name(String),
    /// Literal or hex string
    String(Vec<u8>),
    Keyword(Keyword),
}

/// Byte-level tokenizer over shared bytes.
#[derive(Debug, Clone)]
pub struct Lexer {
    data: Bytes,
    pos: usize,
}

impl Lexer {
    pub const fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position in the data
    pub const fn tell(&self) -> usize {
        self.pos
    }

    /// Set current position; clamps to the end of data.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub const fn data(&self) -> &Bytes {
        &self.data
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

    pub const fn is_whitespace(b: u8) -> bool {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
    }

    pub const fn is_delimiter(b: u8) -> bool {
        matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                while let Some(c) = self.advance() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                }
                continue;
            }
            if !Self::is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    fn parse_name(&mut self) -> LexToken {
        self.advance(); // '/'
        let mut name = Vec::new();
        while let Some(b) = self.peek() {
            if Self::is_whitespace(b) || Self::is_delimiter(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                if let (Some(h1), Some(h2)) = (self.peek(), self.peek_at(1))
                    && let (Some(hi), Some(lo)) = (hex_value(h1), hex_value(h2))
                {
                    self.pos += 2;
                    name.push((hi << 4) | lo);
                }
                continue;
            }
            name.push(b);
        }
        LexToken::Name(String::from_utf8_lossy(&name).into_owned())
    }

    fn parse_number(&mut self) -> Result<LexToken> {
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

        let text = std::str::from_utf8(&self.data[start..self.pos]).map_err(|_| {
            PdfError::TokenError {
                pos: start,
                msg: "invalid number".into(),
            }
        })?;

        if has_dot {
            let value = text.parse::<f64>().map_err(|_| PdfError::TokenError {
                pos: start,
                msg: format!("invalid real: {text}"),
            })?;
            Ok(LexToken::Real(value))
        } else {
            let value = text.parse::<i64>().map_err(|_| PdfError::TokenError {
                pos: start,
                msg: format!("invalid int: {text}"),
            })?;
            Ok(LexToken::Int(value))
        }
    }

    fn parse_string(&mut self) -> Result<LexToken> {
        self.advance(); // '('
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
                        result.push((octal & 0xff) as u8);
                    }
                    Some(c) => result.push(c),
                    None => return Err(PdfError::UnexpectedEof),
                },
                Some(c) => result.push(c),
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        Ok(LexToken::String(result))
    }

    fn parse_hex_string(&mut self) -> Result<LexToken> {
        self.advance(); // '<'
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            match self.advance() {
                Some(b'>') => break,
                Some(c) if Self::is_whitespace(c) => {}
                Some(c) => {
                    let Some(nibble) = hex_value(c) else {
                        return Err(PdfError::TokenError {
                            pos: self.pos - 1,
                            msg: format!("invalid hex digit {:?}", c as char),
                        });
                    };
                    match pending.take() {
                        Some(high) => result.push((high << 4) | nibble),
                        None => pending = Some(nibble),
                    }
                }
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        if let Some(high) = pending {
            result.push(high << 4);
        }
        Ok(LexToken::String(result))
    }

    fn parse_keyword(&mut self) -> LexToken {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if Self::is_whitespace(b) || Self::is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // lone delimiter such as ')' or '}'
            self.pos += 1;
        }
        match &self.data[start..self.pos] {
            b"true" => LexToken::Bool(true),
            b"false" => LexToken::Bool(false),
            bytes => LexToken::Keyword(Keyword::from_bytes(bytes)),
        }
    }

    /// Get next token with the offset it starts at.
    pub fn next_token(&mut self) -> Option<Result<(usize, LexToken)>> {
        self.skip_whitespace();
        let token_pos = self.pos;
        let b = self.peek()?;

        let result = match b {
            b'/' => Ok(self.parse_name()),
            b'(' => self.parse_string(),
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Ok(LexToken::Keyword(Keyword::DictStart))
            }
            b'<' => self.parse_hex_string(),
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Ok(LexToken::Keyword(Keyword::DictEnd))
            }
            b'[' => {
                self.pos += 1;
                Ok(LexToken::Keyword(Keyword::ArrayStart))
            }
            b']' => {
                self.pos += 1;
                Ok(LexToken::Keyword(Keyword::ArrayEnd))
            }
            b'+' | b'-' | b'.' => {
                if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') {
                    self.parse_number()
                } else {
                    Ok(self.parse_keyword())
                }
            }
            c if c.is_ascii_digit() => self.parse_number(),
            _ => Ok(self.parse_keyword()),
        };

        Some(result.map(|token| (token_pos, token)))
    }
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
