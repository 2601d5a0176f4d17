//! Recursive descent parser for Wot++, one function per production.
//!
//! Nodes are reserved in the store before their children are parsed and the
//! edges are written back by index afterwards, so growth of the store while
//! a production is in flight never invalidates the handle it is filling in.
//! A call whose callee names an intrinsic is rewritten in place once the
//! argument list is complete.

use wpp_ast::{Ast, FileId, NodeId, NodeKind, Position};
use wpp_diag::{Category, Diagnostic};

use crate::lexer::Lexer;
use crate::source_location;
use crate::strings;
use crate::token::{Mode, Token, TokenKind};

/// Parse a source buffer into a document node appended to `ast`.
///
/// The store is shared across parses: meta-evaluated fragments append to the
/// same arena as the document that produced them.
pub fn parse_document(source: &[u8], file: FileId, ast: &mut Ast) -> Result<NodeId, Diagnostic> {
    let mut parser = Parser {
        lex: Lexer::new(source, file),
        ast,
    };
    parser.document()
}

fn is_call_start(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Ident | TokenKind::Intrinsic(_))
}

fn is_string_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Quote
            | TokenKind::DoubleQuote
            | TokenKind::Smart
            | TokenKind::Hex
            | TokenKind::Bin
            | TokenKind::Exclaim
    )
}

fn is_expr_start(kind: TokenKind) -> bool {
    is_call_start(kind)
        || is_string_start(kind)
        || matches!(kind, TokenKind::LBrace | TokenKind::Map | TokenKind::Equal)
}

fn is_stmt_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Let | TokenKind::Var | TokenKind::Drop | TokenKind::Prefix
    ) || is_expr_start(kind)
}

/// Keywords and intrinsic names may not be used as parameter names.
fn is_reserved(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Let
            | TokenKind::Var
            | TokenKind::Drop
            | TokenKind::Prefix
            | TokenKind::Map
            | TokenKind::Intrinsic(_)
    )
}

fn ident_text(token: &Token<'_>) -> String {
    String::from_utf8_lossy(token.text).into_owned()
}

struct Parser<'src, 'ast> {
    lex: Lexer<'src>,
    ast: &'ast mut Ast,
}

impl<'src> Parser<'src, '_> {
    fn peek(&mut self) -> Result<Token<'src>, Diagnostic> {
        self.lex.peek(Mode::Normal)
    }

    fn bump(&mut self) -> Result<Token<'src>, Diagnostic> {
        self.lex.advance(Mode::Normal)
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<(), Diagnostic> {
        let token = self.peek()?;
        if token.kind == kind {
            self.bump()?;
            Ok(())
        } else {
            Err(self.error_at(token.pos, message))
        }
    }

    fn error_at(&self, pos: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(Category::Parse, message).at(source_location(pos))
    }

    /// End of input inside a string literal is a lex-category failure even
    /// though the parser drives the string loop.
    fn string_eof_error(&self) -> Diagnostic {
        Diagnostic::error(Category::Lex, "reached end of input while parsing a string")
            .at(source_location(self.lex.position()))
    }

    // -- Productions --

    /// A document is a series of zero or more statements.
    fn document(&mut self) -> Result<NodeId, Diagnostic> {
        let node = self
            .ast
            .add(self.lex.position(), NodeKind::Document { stmts: Vec::new() });
        let mut stmts = Vec::new();
        while self.peek()?.kind != TokenKind::Eof {
            stmts.push(self.statement()?);
        }
        self.ast.replace(node, NodeKind::Document { stmts });
        Ok(node)
    }

    fn statement(&mut self) -> Result<NodeId, Diagnostic> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Let => self.let_stmt(),
            TokenKind::Var => self.var_stmt(),
            TokenKind::Drop => self.drop_stmt(),
            TokenKind::Prefix => self.prefix_stmt(),
            kind if is_expr_start(kind) => self.expression(),
            _ => Err(self.error_at(token.pos, "expected a statement")),
        }
    }

    fn expression(&mut self) -> Result<NodeId, Diagnostic> {
        let token = self.peek()?;
        let lhs = match token.kind {
            kind if is_call_start(kind) => self.fninvoke()?,
            kind if is_string_start(kind) => self.string()?,
            TokenKind::LBrace => self.block()?,
            TokenKind::Map => self.map_expr()?,
            TokenKind::Equal => self.codeify()?,
            _ => return Err(self.error_at(token.pos, "expected an expression")),
        };

        // `..` is right-associative: a single recursive call parses the
        // whole right-hand side.
        if self.peek()?.kind == TokenKind::Cat {
            let cat = self.bump()?;
            let node = self.ast.add(
                cat.pos,
                NodeKind::Concat {
                    lhs,
                    rhs: NodeId::EMPTY,
                },
            );
            let rhs = self.expression()?;
            self.ast.replace(node, NodeKind::Concat { lhs, rhs });
            return Ok(node);
        }

        Ok(lhs)
    }

    fn let_stmt(&mut self) -> Result<NodeId, Diagnostic> {
        let keyword = self.bump()?;
        let node = self.ast.add(
            keyword.pos,
            NodeKind::Fn {
                name: String::new(),
                params: Vec::new(),
                body: NodeId::EMPTY,
            },
        );

        let name_token = self.peek()?;
        if name_token.kind != TokenKind::Ident {
            return Err(self.error_at(name_token.pos, "function definition is missing a name"));
        }
        let name = ident_text(&name_token);
        self.bump()?;

        let mut params = Vec::new();
        if self.peek()?.kind == TokenKind::LParen {
            self.bump()?;
            while self.peek()?.kind == TokenKind::Ident {
                let param_token = self.bump()?;
                let param = ident_text(&param_token);
                if params.contains(&param) {
                    return Err(self.error_at(
                        param_token.pos,
                        format!("duplicate parameter name '{param}'"),
                    ));
                }
                params.push(param);

                let next = self.peek()?;
                if next.kind == TokenKind::Comma {
                    self.bump()?;
                } else if next.kind != TokenKind::RParen {
                    return Err(
                        self.error_at(next.pos, "expected ',' or ')' after a parameter name")
                    );
                }
            }
            // The loop stops on anything that is not an identifier, so a
            // keyword in parameter position is diagnosed here.
            let next = self.peek()?;
            if is_reserved(next.kind) {
                return Err(self.error_at(
                    next.pos,
                    format!(
                        "parameter name '{}' conflicts with a keyword",
                        ident_text(&next)
                    ),
                ));
            }
            self.expect(TokenKind::RParen, "expected ')' to close the parameter list")?;
        }

        let body = self.expression()?;
        self.ast.replace(node, NodeKind::Fn { name, params, body });
        Ok(node)
    }

    fn var_stmt(&mut self) -> Result<NodeId, Diagnostic> {
        let keyword = self.bump()?;
        let node = self.ast.add(
            keyword.pos,
            NodeKind::Var {
                name: String::new(),
                body: NodeId::EMPTY,
            },
        );

        let name_token = self.peek()?;
        if name_token.kind != TokenKind::Ident {
            return Err(self.error_at(name_token.pos, "variable definition is missing a name"));
        }
        let name = ident_text(&name_token);
        self.bump()?;

        let body = self.expression()?;
        self.ast.replace(node, NodeKind::Var { name, body });
        Ok(node)
    }

    fn drop_stmt(&mut self) -> Result<NodeId, Diagnostic> {
        let keyword = self.bump()?;
        let node = self.ast.add(
            keyword.pos,
            NodeKind::Drop {
                target: NodeId::EMPTY,
            },
        );

        let next = self.peek()?;
        if !is_call_start(next.kind) {
            return Err(self.error_at(next.pos, "expected a function reference to follow 'drop'"));
        }
        let target = self.fninvoke()?;
        self.ast.replace(node, NodeKind::Drop { target });
        Ok(node)
    }

    fn prefix_stmt(&mut self) -> Result<NodeId, Diagnostic> {
        let keyword = self.bump()?;
        let node = self.ast.add(
            keyword.pos,
            NodeKind::Prefix {
                exprs: Vec::new(),
                stmts: Vec::new(),
            },
        );

        let next = self.peek()?;
        if !is_expr_start(next.kind) {
            return Err(self.error_at(next.pos, "prefix is missing a name expression"));
        }
        let exprs = vec![self.expression()?];

        self.expect(TokenKind::LBrace, "expected '{' to follow the prefix name")?;

        let mut stmts = Vec::new();
        if self.peek()?.kind != TokenKind::RBrace {
            loop {
                stmts.push(self.statement()?);
                if !is_stmt_start(self.peek()?.kind) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RBrace, "prefix block is unterminated")?;
        self.ast.replace(node, NodeKind::Prefix { exprs, stmts });
        Ok(node)
    }

    /// A block collects statements, then pops the last one into the block
    /// value, provided it is an expression and the next token does not
    /// begin another one.
    fn block(&mut self) -> Result<NodeId, Diagnostic> {
        let open = self.bump()?;
        let node = self.ast.add(
            open.pos,
            NodeKind::Block {
                stmts: Vec::new(),
                expr: NodeId::EMPTY,
            },
        );

        let mut stmts = Vec::new();
        let mut last_is_expr = false;
        if is_stmt_start(self.peek()?.kind) {
            loop {
                last_is_expr = is_expr_start(self.peek()?.kind);
                stmts.push(self.statement()?);
                if !is_stmt_start(self.peek()?.kind) {
                    break;
                }
            }
        }

        let next = self.peek()?;
        if !last_is_expr || is_expr_start(next.kind) {
            return Err(self.error_at(
                next.pos,
                "expected a trailing expression at the end of the block",
            ));
        }
        let expr = stmts.pop().expect("a trailing expression was just parsed");

        if next.kind == TokenKind::Arrow {
            return Err(self.error_at(open.pos, "map is missing its test expression"));
        }
        if next.kind != TokenKind::RBrace {
            return Err(self.error_at(next.pos, "block is unterminated"));
        }
        self.bump()?;

        self.ast.replace(node, NodeKind::Block { stmts, expr });
        Ok(node)
    }

    fn map_expr(&mut self) -> Result<NodeId, Diagnostic> {
        let keyword = self.bump()?;
        let node = self.ast.add(
            keyword.pos,
            NodeKind::Map {
                scrutinee: NodeId::EMPTY,
                arms: Vec::new(),
                default_arm: None,
            },
        );

        let next = self.peek()?;
        if !is_expr_start(next.kind) {
            return Err(self.error_at(next.pos, "expected an expression to follow 'map'"));
        }
        let scrutinee = self.expression()?;

        self.expect(TokenKind::LBrace, "expected '{' to open the map body")?;

        let mut arms = Vec::new();
        while is_expr_start(self.peek()?.kind) {
            let pattern = self.expression()?;
            self.expect(TokenKind::Arrow, "expected '->' after a map pattern")?;
            let next = self.peek()?;
            if !is_expr_start(next.kind) {
                return Err(self.error_at(next.pos, "expected an expression for the map arm"));
            }
            let arm = self.expression()?;
            arms.push((pattern, arm));
        }

        let default_arm = if self.peek()?.kind == TokenKind::Star {
            self.bump()?;
            self.expect(TokenKind::Arrow, "expected '->' after '*'")?;
            let next = self.peek()?;
            if !is_expr_start(next.kind) {
                return Err(self.error_at(next.pos, "expected an expression for the default arm"));
            }
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(TokenKind::RBrace, "expected '}' to close the map body")?;
        self.ast.replace(
            node,
            NodeKind::Map {
                scrutinee,
                arms,
                default_arm,
            },
        );
        Ok(node)
    }

    fn codeify(&mut self) -> Result<NodeId, Diagnostic> {
        let equal = self.bump()?;
        let next = self.peek()?;
        if !is_expr_start(next.kind) {
            return Err(self.error_at(next.pos, "expected an expression to follow '='"));
        }

        let node = self
            .ast
            .add(equal.pos, NodeKind::Codeify { expr: NodeId::EMPTY });
        let expr = self.expression()?;
        self.ast.replace(node, NodeKind::Codeify { expr });
        Ok(node)
    }

    /// A call: identifier plus an optional argument list. If the callee
    /// names an intrinsic, the node is rewritten in place.
    fn fninvoke(&mut self) -> Result<NodeId, Diagnostic> {
        let fn_token = self.bump()?;
        let node = self.ast.add(
            fn_token.pos,
            NodeKind::Call {
                name: String::new(),
                args: Vec::new(),
            },
        );

        let mut args = Vec::new();
        if self.peek()?.kind == TokenKind::LParen {
            self.bump()?;
            while is_expr_start(self.peek()?.kind) {
                args.push(self.expression()?);
                let next = self.peek()?;
                if next.kind == TokenKind::Comma {
                    self.bump()?;
                } else if next.kind != TokenKind::RParen {
                    return Err(self.error_at(next.pos, "expected ',' or ')' in the argument list"));
                }
            }
            self.expect(TokenKind::RParen, "expected ')' to close the argument list")?;
        }

        let name = ident_text(&fn_token);
        match fn_token.kind {
            TokenKind::Intrinsic(kind) => {
                self.ast
                    .replace(node, NodeKind::Intrinsic { kind, name, args });
            }
            _ => {
                self.ast.replace(node, NodeKind::Call { name, args });
            }
        }
        Ok(node)
    }

    // -- String literals --

    fn string(&mut self) -> Result<NodeId, Diagnostic> {
        let opener = self.peek()?;
        let node = self
            .ast
            .add(opener.pos, NodeKind::String { bytes: Vec::new() });

        let mut literal = Vec::new();
        match opener.kind {
            TokenKind::Hex => {
                let token = self.bump()?;
                literal = strings::decode_hex(token.text);
            }
            TokenKind::Bin => {
                let token = self.bump()?;
                literal = strings::decode_bin(token.text);
            }
            TokenKind::Smart => self.smart_string(&mut literal)?,
            TokenKind::Exclaim => self.stringify_string(&mut literal)?,
            TokenKind::Quote | TokenKind::DoubleQuote => self.normal_string(&mut literal)?,
            _ => return Err(self.error_at(opener.pos, "expected a string")),
        }

        self.ast.replace(node, NodeKind::String { bytes: literal });
        Ok(node)
    }

    fn normal_string(&mut self, literal: &mut Vec<u8>) -> Result<(), Diagnostic> {
        let delim = self.lex.advance(Mode::String)?;
        loop {
            let part = self.lex.peek(Mode::String)?;
            if part.kind == delim.kind {
                break;
            }
            if part.kind == TokenKind::Eof {
                return Err(self.string_eof_error());
            }
            let part = self.lex.advance(Mode::String)?;
            strings::accumulate(literal, &part, true);
        }
        self.lex.advance(Mode::String)?; // closing quote
        Ok(())
    }

    /// `!ident`: the value is the identifier itself.
    fn stringify_string(&mut self, literal: &mut Vec<u8>) -> Result<(), Diagnostic> {
        self.bump()?; // `!`
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(self.error_at(token.pos, "expected an identifier to follow '!'"));
        }
        let token = self.bump()?;
        literal.extend_from_slice(token.text);
        Ok(())
    }

    /// A smart string ends at the first closing quote that is immediately
    /// followed by the user delimiter; any other quote is content.
    fn smart_string(&mut self, literal: &mut Vec<u8>) -> Result<(), Diagnostic> {
        let opener = self.bump()?;
        let str_type = opener.text[0]; // 'r', 'p' or 'c'
        let delim = &opener.text[1..];
        let handle_escapes = str_type != b'r';

        let quote = self.lex.advance(Mode::String)?; // ' or "

        loop {
            let part = self.lex.peek(Mode::String)?;
            if part.kind == TokenKind::Eof {
                return Err(self.string_eof_error());
            }

            if part.kind == quote.kind {
                // Consume the quote; it may be content rather than the
                // terminator, which only the delimiter decides.
                let part = self.lex.advance(Mode::String)?;
                strings::accumulate(literal, &part, handle_escapes);
                if self.match_delimiter(delim, literal)? {
                    literal.pop(); // remove the terminating quote
                    break;
                }
            } else {
                let part = self.lex.advance(Mode::String)?;
                strings::accumulate(literal, &part, handle_escapes);
            }
        }

        match str_type {
            b'c' => strings::code(literal),
            b'p' => strings::paragraph(literal),
            _ => {}
        }
        Ok(())
    }

    /// Consume the user delimiter byte by byte. On a mismatch the bytes
    /// already consumed are string content and are appended to the literal.
    fn match_delimiter(&mut self, delim: &[u8], literal: &mut Vec<u8>) -> Result<bool, Diagnostic> {
        for (matched, &expected) in delim.iter().enumerate() {
            let next = self.lex.peek(Mode::Character)?;
            if next.kind != TokenKind::Byte || next.text[0] != expected {
                literal.extend_from_slice(&delim[..matched]);
                return Ok(false);
            }
            self.lex.advance(Mode::Character)?;
        }
        Ok(true)
    }
}
