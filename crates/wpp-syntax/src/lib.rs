//! Lexer and recursive descent parser for Wot++ source.
//!
//! This crate takes source bytes and produces nodes in a `wpp-ast` store.
//! The lexer is parameterised by a mode at every peek/advance (normal,
//! string, or character) and the parser drives the mode switches around
//! string literals. Both are re-entrant services: meta-evaluation parses
//! additional buffers into the same store mid-run.

pub mod lexer;
pub mod parser;
pub mod strings;
pub mod token;

use wpp_ast::Position;
use wpp_diag::SourceLocation;

pub use lexer::Lexer;
pub use parser::parse_document;
pub use token::{Mode, Token, TokenKind};

/// Convert an AST position into a diagnostic location.
pub fn source_location(pos: Position) -> SourceLocation {
    SourceLocation {
        file_id: pos.file.0,
        line: pos.line,
        column: pos.column,
        offset: pos.offset,
    }
}
