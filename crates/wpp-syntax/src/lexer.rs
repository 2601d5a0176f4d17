//! Hand-written, mode-parameterised lexer for Wot++ source.
//!
//! The parser chooses a [`Mode`] at every [`Lexer::peek`]/[`Lexer::advance`]
//! call. A peek caches one token together with the cursor state that follows
//! it; peeking again in the same mode is free, while peeking in a different
//! mode re-lexes from the cached token's start position. Whitespace skipped
//! by a normal-mode peek therefore stays skipped when the parser switches to
//! string mode at a quote.

use wpp_ast::{FileId, IntrinsicKind, Position};
use wpp_diag::{Category, Diagnostic};

use crate::source_location;
use crate::token::{Mode, Token, TokenKind};

/// Byte offset plus the line/column derived from it. Tab width is one.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    offset: usize,
    line: u32,
    column: u32,
}

#[derive(Clone, Copy)]
struct Cached<'src> {
    mode: Mode,
    token: Token<'src>,
    start: Cursor,
    end: Cursor,
}

/// Single-token-lookahead lexer over a byte buffer.
pub struct Lexer<'src> {
    source: &'src [u8],
    file: FileId,
    cursor: Cursor,
    cached: Option<Cached<'src>>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src [u8], file: FileId) -> Self {
        Self {
            source,
            file,
            cursor: Cursor {
                offset: 0,
                line: 1,
                column: 1,
            },
            cached: None,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// The position of the next unconsumed byte.
    pub fn position(&self) -> Position {
        position_at(self.file, self.cursor)
    }

    /// Look at the next token without consuming it. Idempotent per mode.
    pub fn peek(&mut self, mode: Mode) -> Result<Token<'src>, Diagnostic> {
        if let Some(cached) = &self.cached
            && cached.mode == mode
        {
            return Ok(cached.token);
        }
        // Re-lex from the pending token's start so a committed whitespace
        // skip is not replayed as string content.
        let from = self.cached.as_ref().map_or(self.cursor, |c| c.start);
        let (token, start, end) = self.lex_from(from, mode)?;
        self.cached = Some(Cached {
            mode,
            token,
            start,
            end,
        });
        Ok(token)
    }

    /// Consume and return the next token.
    pub fn advance(&mut self, mode: Mode) -> Result<Token<'src>, Diagnostic> {
        let token = self.peek(mode)?;
        if let Some(cached) = self.cached.take() {
            self.cursor = cached.end;
        }
        Ok(token)
    }

    fn lex_from(
        &self,
        from: Cursor,
        mode: Mode,
    ) -> Result<(Token<'src>, Cursor, Cursor), Diagnostic> {
        let mut scan = Scan {
            source: self.source,
            file: self.file,
            cur: from,
        };
        let start = match mode {
            Mode::Normal => {
                scan.skip_trivia()?;
                scan.cur
            }
            Mode::String | Mode::Character => scan.cur,
        };
        let token = match mode {
            Mode::Normal => scan.normal_token()?,
            Mode::String => scan.string_token()?,
            Mode::Character => scan.character_token(),
        };
        Ok((token, start, scan.cur))
    }
}

fn position_at(file: FileId, cursor: Cursor) -> Position {
    Position {
        file,
        line: cursor.line,
        column: cursor.column,
        offset: u32::try_from(cursor.offset).unwrap_or(u32::MAX),
    }
}

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'/'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'/'
}

/// Bytes allowed in a smart string delimiter: printable, but not quotes and
/// not identifier bytes (so `prefix` stays an identifier and `c#"` opens a
/// smart string).
fn is_smart_delimiter(byte: u8) -> bool {
    byte.is_ascii_graphic() && !is_ident_continue(byte) && byte != b'"' && byte != b'\''
}

/// A throwaway scanning head; committed back to the lexer only on advance.
struct Scan<'src> {
    source: &'src [u8],
    file: FileId,
    cur: Cursor,
}

impl<'src> Scan<'src> {
    fn is_at_end(&self) -> bool {
        self.cur.offset >= self.source.len()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.cur.offset).copied()
    }

    fn peek_byte_at(&self, ahead: usize) -> Option<u8> {
        self.source.get(self.cur.offset + ahead).copied()
    }

    fn bump(&mut self) -> u8 {
        let byte = self.source[self.cur.offset];
        self.cur.offset += 1;
        if byte == b'\n' {
            self.cur.line += 1;
            self.cur.column = 1;
        } else {
            self.cur.column += 1;
        }
        byte
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.peek_byte() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn position(&self) -> Position {
        position_at(self.file, self.cur)
    }

    fn token(&self, kind: TokenKind, start: Cursor) -> Token<'src> {
        Token {
            kind,
            text: &self.source[start.offset..self.cur.offset],
            pos: position_at(self.file, start),
        }
    }

    fn error(&self, at: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(Category::Lex, message).at(source_location(at))
    }

    // -- Normal mode --

    /// Skip whitespace and balanced `#[ ... ]` comments.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            while self.peek_byte().is_some_and(is_whitespace) {
                self.bump();
            }
            if self.peek_byte() == Some(b'#') && self.peek_byte_at(1) == Some(b'[') {
                let open = self.position();
                self.bump();
                self.bump();
                let mut depth = 1u32;
                while depth > 0 {
                    if self.is_at_end() {
                        return Err(self.error(open, "unterminated comment"));
                    }
                    let byte = self.bump();
                    if byte == b'#' && self.peek_byte() == Some(b'[') {
                        self.bump();
                        depth += 1;
                    } else if byte == b']' {
                        depth -= 1;
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn normal_token(&mut self) -> Result<Token<'src>, Diagnostic> {
        let start = self.cur;
        let Some(byte) = self.peek_byte() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        match byte {
            b'(' => {
                self.bump();
                Ok(self.token(TokenKind::LParen, start))
            }
            b')' => {
                self.bump();
                Ok(self.token(TokenKind::RParen, start))
            }
            b'{' => {
                self.bump();
                Ok(self.token(TokenKind::LBrace, start))
            }
            b'}' => {
                self.bump();
                Ok(self.token(TokenKind::RBrace, start))
            }
            b',' => {
                self.bump();
                Ok(self.token(TokenKind::Comma, start))
            }
            b'=' => {
                self.bump();
                Ok(self.token(TokenKind::Equal, start))
            }
            b'*' => {
                self.bump();
                Ok(self.token(TokenKind::Star, start))
            }
            b'!' => {
                self.bump();
                Ok(self.token(TokenKind::Exclaim, start))
            }
            b'\'' => {
                self.bump();
                Ok(self.token(TokenKind::Quote, start))
            }
            b'"' => {
                self.bump();
                Ok(self.token(TokenKind::DoubleQuote, start))
            }
            b'.' => {
                let at = self.position();
                self.bump();
                if self.match_byte(b'.') {
                    Ok(self.token(TokenKind::Cat, start))
                } else {
                    Err(self.error(at, "unexpected character '.'; expected '..'"))
                }
            }
            b'-' => {
                let at = self.position();
                self.bump();
                if self.match_byte(b'>') {
                    Ok(self.token(TokenKind::Arrow, start))
                } else {
                    Err(self.error(at, "unexpected character '-'; expected '->'"))
                }
            }
            b'0' => self.number_token(start),
            byte if is_ident_start(byte) => Ok(self.ident_token(start)),
            byte => {
                let at = self.position();
                Err(self.error(at, format!("unexpected character {}", printable(byte))))
            }
        }
    }

    /// `0x` hex and `0b` binary literals. The token text is the digit run.
    fn number_token(&mut self, start: Cursor) -> Result<Token<'src>, Diagnostic> {
        let at = self.position();
        self.bump(); // `0`
        if self.match_byte(b'x') {
            let digits = self.cur;
            while self
                .peek_byte()
                .is_some_and(|b| b.is_ascii_hexdigit() || b == b'_')
            {
                self.bump();
            }
            if self.cur.offset == digits.offset {
                return Err(self.error(self.position(), "expected hexadecimal digits after '0x'"));
            }
            if let Some(byte) = self.peek_byte()
                && is_ident_continue(byte)
            {
                return Err(self.error(
                    self.position(),
                    format!("invalid hexadecimal digit {}", printable(byte)),
                ));
            }
            let mut token = self.token(TokenKind::Hex, digits);
            token.pos = position_at(self.file, start);
            Ok(token)
        } else if self.match_byte(b'b') {
            let digits = self.cur;
            while self
                .peek_byte()
                .is_some_and(|b| matches!(b, b'0' | b'1' | b'_'))
            {
                self.bump();
            }
            if self.cur.offset == digits.offset {
                return Err(self.error(self.position(), "expected binary digits after '0b'"));
            }
            if let Some(byte) = self.peek_byte()
                && is_ident_continue(byte)
            {
                return Err(self.error(
                    self.position(),
                    format!("invalid binary digit {}", printable(byte)),
                ));
            }
            let mut token = self.token(TokenKind::Bin, digits);
            token.pos = position_at(self.file, start);
            Ok(token)
        } else {
            Err(self.error(at, "unexpected character '0'; expected '0x' or '0b'"))
        }
    }

    /// Identifiers, keywords, intrinsic names, and smart string openers.
    fn ident_token(&mut self, start: Cursor) -> Token<'src> {
        let byte = self.source[self.cur.offset];
        if matches!(byte, b'r' | b'p' | b'c')
            && let Some(token) = self.smart_opener(start)
        {
            return token;
        }

        while self.peek_byte().is_some_and(is_ident_continue) {
            self.bump();
        }
        let text = &self.source[start.offset..self.cur.offset];
        let kind = match text {
            b"let" => TokenKind::Let,
            b"var" => TokenKind::Var,
            b"drop" => TokenKind::Drop,
            b"prefix" => TokenKind::Prefix,
            b"map" => TokenKind::Map,
            _ => match std::str::from_utf8(text).ok().and_then(IntrinsicKind::from_name) {
                Some(intrinsic) => TokenKind::Intrinsic(intrinsic),
                None => TokenKind::Ident,
            },
        };
        self.token(kind, start)
    }

    /// A type letter in `{r, p, c}` followed by one or more delimiter bytes
    /// and a quote opens a smart string; the token carries the letter and
    /// the delimiter, and the quote is left for string mode.
    fn smart_opener(&mut self, start: Cursor) -> Option<Token<'src>> {
        let mut ahead = 1;
        while self.peek_byte_at(ahead).is_some_and(is_smart_delimiter) {
            ahead += 1;
        }
        if ahead < 2 || !matches!(self.peek_byte_at(ahead), Some(b'"') | Some(b'\'')) {
            return None;
        }
        for _ in 0..ahead {
            self.bump();
        }
        Some(self.token(TokenKind::Smart, start))
    }

    // -- String mode --

    fn string_token(&mut self) -> Result<Token<'src>, Diagnostic> {
        let start = self.cur;
        let Some(byte) = self.peek_byte() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        match byte {
            b'\'' => {
                self.bump();
                Ok(self.token(TokenKind::Quote, start))
            }
            b'"' => {
                self.bump();
                Ok(self.token(TokenKind::DoubleQuote, start))
            }
            b'\\' => self.escape_token(start),
            _ => {
                while self
                    .peek_byte()
                    .is_some_and(|b| !matches!(b, b'\\' | b'\'' | b'"'))
                {
                    self.bump();
                }
                Ok(self.token(TokenKind::Chunk, start))
            }
        }
    }

    fn escape_token(&mut self, start: Cursor) -> Result<Token<'src>, Diagnostic> {
        let at = self.position();
        self.bump(); // backslash
        let Some(byte) = self.peek_byte() else {
            return Err(self.error(at, "incomplete escape sequence at end of input"));
        };
        self.bump();
        let kind = match byte {
            b'\'' => TokenKind::EscapeQuote,
            b'"' => TokenKind::EscapeDoubleQuote,
            b'\\' => TokenKind::EscapeBackslash,
            b'n' => TokenKind::EscapeNewline,
            b't' => TokenKind::EscapeTab,
            b'r' => TokenKind::EscapeCarriageReturn,
            b'x' => {
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(b) if b.is_ascii_hexdigit() => {
                            self.bump();
                        }
                        Some(b) => {
                            return Err(self.error(
                                self.position(),
                                format!("invalid hexadecimal digit {} in '\\x' escape", printable(b)),
                            ));
                        }
                        None => {
                            return Err(
                                self.error(at, "incomplete '\\x' escape at end of input")
                            );
                        }
                    }
                }
                TokenKind::EscapeHex
            }
            b'b' => {
                for _ in 0..8 {
                    match self.peek_byte() {
                        Some(b'0' | b'1') => {
                            self.bump();
                        }
                        Some(b) => {
                            return Err(self.error(
                                self.position(),
                                format!("invalid binary digit {} in '\\b' escape", printable(b)),
                            ));
                        }
                        None => {
                            return Err(
                                self.error(at, "incomplete '\\b' escape at end of input")
                            );
                        }
                    }
                }
                TokenKind::EscapeBin
            }
            other => {
                return Err(self.error(
                    at,
                    format!("unknown escape sequence '\\{}'", printable_char(other)),
                ));
            }
        };
        Ok(self.token(kind, start))
    }

    // -- Character mode --

    fn character_token(&mut self) -> Token<'src> {
        let start = self.cur;
        if self.is_at_end() {
            return self.token(TokenKind::Eof, start);
        }
        self.bump();
        self.token(TokenKind::Byte, start)
    }
}

fn printable(byte: u8) -> String {
    if byte.is_ascii_graphic() || byte == b' ' {
        format!("'{}'", byte as char)
    } else {
        format!("'\\x{byte:02x}'")
    }
}

fn printable_char(byte: u8) -> String {
    if byte.is_ascii_graphic() || byte == b' ' {
        (byte as char).to_string()
    } else {
        format!("\\x{byte:02x}")
    }
}
