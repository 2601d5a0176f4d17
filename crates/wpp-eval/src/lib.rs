//! Tree-walking evaluator for Wot++.
//!
//! The evaluator owns the AST store and drives the lexer and parser as
//! re-entrant services: `source`, `eval`, and codeify parse additional
//! buffers into the same store mid-run and evaluate them against the
//! current environment, so definitions made by meta-evaluated fragments
//! persist. Evaluation is single-threaded and synchronous; subprocess and
//! file intrinsics block until completion.

pub mod env;
mod intrinsics;

use std::path::PathBuf;

use wpp_ast::{Ast, FileId, NodeId, NodeKind, Position};
use wpp_diag::{Category, Diagnostic};
use wpp_syntax::{parse_document, source_location};

pub use env::Env;

/// Host configuration for an evaluation.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Allow the `run` and `pipe` intrinsics to spawn subprocesses.
    pub enable_exec: bool,
    /// Root for `file` reads and subprocess working directories.
    pub search_root: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            enable_exec: true,
            search_root: PathBuf::from("."),
        }
    }
}

/// Evaluates documents against a persistent environment.
///
/// The AST store is append-only and lives as long as the evaluator, so node
/// indices taken by definitions stay valid across later parses.
pub struct Evaluator {
    pub(crate) ast: Ast,
    pub(crate) env: Env,
    pub(crate) prefixes: Vec<Vec<u8>>,
    pub(crate) files: Vec<String>,
    pub(crate) config: EvalConfig,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            ast: Ast::new(),
            env: Env::new(),
            prefixes: Vec::new(),
            files: Vec::new(),
            config,
        }
    }

    /// Parse and evaluate one source buffer as a document.
    ///
    /// On failure no output is produced; bytes accumulated before the error
    /// are discarded with it. Definitions made before the error do persist,
    /// which is what the REPL's snapshot/restore pair is for.
    pub fn eval_source(&mut self, name: &str, source: &[u8]) -> Result<Vec<u8>, Diagnostic> {
        let file = self.add_file(name);
        let document = parse_document(source, file, &mut self.ast)?;
        self.eval(document)
    }

    /// The name registered for a file id, for diagnostic rendering.
    pub fn file_name(&self, file: FileId) -> &str {
        self.files
            .get(file.0 as usize)
            .map_or("<unknown>", String::as_str)
    }

    /// Snapshot the environment so a failed input can be rolled back.
    pub fn snapshot(&self) -> Env {
        self.env.clone()
    }

    pub fn restore(&mut self, env: Env) {
        self.env = env;
    }

    /// Evaluate one node to bytes.
    pub fn eval(&mut self, id: NodeId) -> Result<Vec<u8>, Diagnostic> {
        let node = self.ast.get(id).clone();
        match node.kind {
            NodeKind::String { bytes } => Ok(bytes),

            NodeKind::Concat { lhs, rhs } => {
                let mut out = self.eval(lhs)?;
                out.extend(self.eval(rhs)?);
                Ok(out)
            }

            NodeKind::Document { stmts } => self.eval_sequence(&stmts),

            NodeKind::Block { stmts, expr } => {
                self.env.push_frame();
                let result = self.eval_block_body(&stmts, expr);
                self.env.pop_frame();
                result
            }

            NodeKind::Fn { name, params, .. } => {
                let qualified = self.qualify(name.as_bytes());
                self.env.define_fn(qualified, params.len(), id);
                Ok(Vec::new())
            }

            NodeKind::Var { name, body } => {
                let value = self.eval(body)?;
                let qualified = self.qualify(name.as_bytes());
                self.env.define_var(qualified, value);
                Ok(Vec::new())
            }

            NodeKind::Drop { target } => {
                self.eval_drop(target, node.pos)?;
                Ok(Vec::new())
            }

            NodeKind::Prefix { exprs, stmts } => {
                let mut segment = Vec::new();
                for expr in exprs {
                    segment.extend(self.eval(expr)?);
                }
                self.prefixes.push(segment);
                let result = self.eval_sequence(&stmts);
                self.prefixes.pop();
                result
            }

            NodeKind::Map {
                scrutinee,
                arms,
                default_arm,
            } => {
                let value = self.eval(scrutinee)?;
                for (pattern, arm) in arms {
                    if self.eval(pattern)? == value {
                        return self.eval(arm);
                    }
                }
                match default_arm {
                    Some(arm) => self.eval(arm),
                    None => Ok(Vec::new()),
                }
            }

            NodeKind::Codeify { expr } => {
                let source = self.eval(expr)?;
                self.eval_fragment("<codeify>", &source)
            }

            NodeKind::Call { name, args } => self.eval_call(&name, &args, node.pos),

            NodeKind::Intrinsic { kind, name, args } => {
                self.eval_intrinsic(kind, &name, &args, node.pos)
            }
        }
    }

    /// Evaluate statements in order, concatenating their values. Documents
    /// and prefix bodies share this shape; definitions yield empty bytes.
    fn eval_sequence(&mut self, stmts: &[NodeId]) -> Result<Vec<u8>, Diagnostic> {
        let mut out = Vec::new();
        for &stmt in stmts {
            out.extend(self.eval(stmt)?);
        }
        Ok(out)
    }

    /// Inner statements run for their effects only; the trailing expression
    /// is the block's value.
    fn eval_block_body(&mut self, stmts: &[NodeId], expr: NodeId) -> Result<Vec<u8>, Diagnostic> {
        for &stmt in stmts {
            self.eval(stmt)?;
        }
        self.eval(expr)
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[NodeId],
        pos: Position,
    ) -> Result<Vec<u8>, Diagnostic> {
        // Arguments are eager, left to right, in the caller's environment.
        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push(self.eval(arg)?);
        }

        let mut target = None;
        for key in self.candidates(name.as_bytes()) {
            if let Some(fn_node) = self.env.lookup_fn(&key, args.len()) {
                target = Some(fn_node);
                break;
            }
            if args.is_empty()
                && let Some(value) = self.env.lookup_var(&key)
            {
                return Ok(value.to_vec());
            }
        }

        let Some(fn_node) = target else {
            let message = if args.is_empty() {
                format!("`{name}` is not defined as a function or variable")
            } else {
                format!("function `{name}` of arity {} is not defined", args.len())
            };
            return Err(self.runtime_error(pos, message));
        };

        let NodeKind::Fn { params, body, .. } = self.ast.get(fn_node).kind.clone() else {
            unreachable!("the function table only stores fn nodes")
        };

        // Parameters bind as unqualified locals; the body is lazy and sees
        // the environment as it is now.
        self.env.push_frame();
        for (param, value) in params.into_iter().zip(values) {
            self.env.define_var(param.into_bytes(), value);
        }
        let result = self.eval(body);
        self.env.pop_frame();
        result
    }

    fn eval_drop(&mut self, target: NodeId, pos: Position) -> Result<(), Diagnostic> {
        let target_node = self.ast.get(target).clone();
        let (name, arity) = match &target_node.kind {
            NodeKind::Call { name, args } => (name.clone(), args.len()),
            NodeKind::Intrinsic { name, .. } => {
                return Err(self.runtime_error(
                    target_node.pos,
                    format!("cannot drop intrinsic `{name}`"),
                ));
            }
            _ => unreachable!("a drop target is always parsed as a call"),
        };

        for key in self.candidates(name.as_bytes()) {
            if self.env.drop_fn(&key, arity) {
                return Ok(());
            }
        }
        Err(self.runtime_error(
            pos,
            format!("cannot drop `{name}` of arity {arity}; it is not defined"),
        ))
    }

    /// Parse and evaluate another buffer against the current environment;
    /// definitions it makes persist after it returns.
    pub(crate) fn eval_fragment(
        &mut self,
        name: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, Diagnostic> {
        let file = self.add_file(name);
        let document = parse_document(source, file, &mut self.ast)?;
        self.eval(document)
    }

    /// The qualified form of a name for definition: every prefix segment in
    /// stack order, then the name.
    fn qualify(&self, name: &[u8]) -> Vec<u8> {
        let mut qualified = Vec::new();
        for segment in &self.prefixes {
            qualified.extend_from_slice(segment);
        }
        qualified.extend_from_slice(name);
        qualified
    }

    /// Candidate keys for a lookup, deepest qualification first down to the
    /// bare name. A name containing `/` is already qualified and skips the
    /// walk.
    fn candidates(&self, name: &[u8]) -> Vec<Vec<u8>> {
        if name.contains(&b'/') {
            return vec![name.to_vec()];
        }
        let mut keys = Vec::with_capacity(self.prefixes.len() + 1);
        for depth in (0..=self.prefixes.len()).rev() {
            let mut key = Vec::new();
            for segment in &self.prefixes[..depth] {
                key.extend_from_slice(segment);
            }
            key.extend_from_slice(name);
            keys.push(key);
        }
        keys
    }

    fn add_file(&mut self, name: &str) -> FileId {
        let id = FileId(u32::try_from(self.files.len()).unwrap_or(u32::MAX));
        self.files.push(name.to_string());
        id
    }

    pub(crate) fn runtime_error(&self, pos: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(Category::Eval, message).at(source_location(pos))
    }
}
