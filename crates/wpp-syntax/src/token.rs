//! Token types produced by the Wot++ lexer.

use wpp_ast::{IntrinsicKind, Position};

/// The tokenisation mode, selected by the parser at every peek/advance.
///
/// Normal mode skips whitespace and comments; string mode emits literal
/// chunks, escapes, and quotes verbatim; character mode emits one raw byte
/// and is used to inspect the user delimiter of a smart string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    String,
    Character,
}

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // -- Punctuation --
    LParen,  // (
    RParen,  // )
    LBrace,  // {
    RBrace,  // }
    Comma,   // ,
    Cat,     // ..
    Arrow,   // ->
    Equal,   // =
    Star,    // *
    Exclaim, // !

    // -- Keywords --
    Let,
    Var,
    Drop,
    Prefix,
    Map,

    // -- Names --
    Ident,
    /// An identifier that names a built-in operation.
    Intrinsic(IntrinsicKind),

    // -- String openers --
    Quote,       // '
    DoubleQuote, // "
    /// Smart string opener; the text is the type letter plus the delimiter.
    Smart,
    /// Hex literal; the text is the digit run after `0x`.
    Hex,
    /// Binary literal; the text is the digit run after `0b`.
    Bin,

    // -- String mode --
    /// A literal run of bytes up to the next escape, quote, or end of input.
    Chunk,
    EscapeQuote,          // \'
    EscapeDoubleQuote,    // \"
    EscapeBackslash,      // \\
    EscapeNewline,        // \n
    EscapeTab,            // \t
    EscapeCarriageReturn, // \r
    /// `\xHH`; the text is the full four-byte escape.
    EscapeHex,
    /// `\b` plus eight binary digits; the text is the full escape.
    EscapeBin,

    // -- Character mode --
    /// Exactly one raw byte.
    Byte,

    Eof,
}

/// A token: kind, view into the source bytes, and start position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src [u8],
    pub pos: Position,
}
