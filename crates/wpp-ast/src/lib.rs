//! AST node definitions, source positions, and the indexed node store for Wot++.
//!
//! The parser appends nodes to an [`Ast`] and records parent-to-child edges as
//! [`NodeId`] indices, never as references into the store. The store is
//! append-only for the lifetime of a compilation: an index obtained before a
//! later `add` keeps addressing the same node, so callers resolve an index
//! first, add children, and write edges back by index afterwards.

/// Identifies a source buffer (file, REPL input, or meta-evaluated fragment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A source location: one-based line and column plus the byte offset.
///
/// Columns count bytes; a tab advances the column by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    /// The position of the first byte of a buffer.
    pub fn start(file: FileId) -> Self {
        Self {
            file,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// A position for nodes that have no source of their own.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

/// Index of a node in the [`Ast`] store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Placeholder for an edge that has not been written back yet.
    ///
    /// The parser reserves a node, parses its children, then overwrites the
    /// placeholder edges. Finished trees never contain `EMPTY`.
    pub const EMPTY: NodeId = NodeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Intrinsics
// ---------------------------------------------------------------------------

/// Built-in operations evaluated by the host rather than by user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    /// Re-parse argument bytes and evaluate them in the current environment.
    Source,
    /// Alias of [`IntrinsicKind::Source`].
    Eval,
    /// Read a file relative to the search root.
    File,
    /// Raise a runtime error unless both arguments are byte-equal.
    Assert,
    /// Raise a runtime error carrying the argument.
    Error,
    /// Run a command with the second argument on stdin; yield stdout.
    Pipe,
    /// Run a command; yield stdout.
    Run,
    /// Byte substring: value, start index (may be negative), length.
    Slice,
    /// Decimal index of the needle in the haystack, `-1` if absent.
    Find,
    /// Decimal byte length.
    Length,
    /// Write the argument to the diagnostic stream; yield nothing.
    Log,
    /// Escape non-printable bytes into printable form.
    Escape,
}

impl IntrinsicKind {
    pub const ALL: [IntrinsicKind; 12] = [
        IntrinsicKind::Source,
        IntrinsicKind::Eval,
        IntrinsicKind::File,
        IntrinsicKind::Assert,
        IntrinsicKind::Error,
        IntrinsicKind::Pipe,
        IntrinsicKind::Run,
        IntrinsicKind::Slice,
        IntrinsicKind::Find,
        IntrinsicKind::Length,
        IntrinsicKind::Log,
        IntrinsicKind::Escape,
    ];

    /// Map a source identifier to an intrinsic, if it names one.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "source" => IntrinsicKind::Source,
            "eval" => IntrinsicKind::Eval,
            "file" => IntrinsicKind::File,
            "assert" => IntrinsicKind::Assert,
            "error" => IntrinsicKind::Error,
            "pipe" => IntrinsicKind::Pipe,
            "run" => IntrinsicKind::Run,
            "slice" => IntrinsicKind::Slice,
            "find" => IntrinsicKind::Find,
            "length" => IntrinsicKind::Length,
            "log" => IntrinsicKind::Log,
            "escape" => IntrinsicKind::Escape,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntrinsicKind::Source => "source",
            IntrinsicKind::Eval => "eval",
            IntrinsicKind::File => "file",
            IntrinsicKind::Assert => "assert",
            IntrinsicKind::Error => "error",
            IntrinsicKind::Pipe => "pipe",
            IntrinsicKind::Run => "run",
            IntrinsicKind::Slice => "slice",
            IntrinsicKind::Find => "find",
            IntrinsicKind::Length => "length",
            IntrinsicKind::Log => "log",
            IntrinsicKind::Escape => "escape",
        }
    }

    /// The number of arguments the intrinsic requires.
    pub fn arity(self) -> usize {
        match self {
            IntrinsicKind::Assert | IntrinsicKind::Pipe | IntrinsicKind::Find => 2,
            IntrinsicKind::Slice => 3,
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A node: variant payload plus the source position it was parsed at.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
}

/// One variant per syntactic form. Child edges are [`NodeId`] indices.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A whole source buffer: the ordered top-level statements.
    Document { stmts: Vec<NodeId> },

    /// `let name(params) body`: a function definition with a lazy body.
    Fn {
        name: String,
        params: Vec<String>,
        body: NodeId,
    },

    /// `var name body`: a variable whose body is evaluated at definition.
    Var { name: String, body: NodeId },

    /// `drop target`: removes the newest matching function definition.
    /// The target is stored structurally as a [`NodeKind::Call`].
    Drop { target: NodeId },

    /// `prefix expr { stmts }`: qualifies names defined and looked up inside.
    Prefix {
        exprs: Vec<NodeId>,
        stmts: Vec<NodeId>,
    },

    /// `{ stmts expr }`: statements scoped to a fresh frame, then the value.
    Block { stmts: Vec<NodeId>, expr: NodeId },

    /// `map expr { pattern -> arm … * -> default }`.
    Map {
        scrutinee: NodeId,
        arms: Vec<(NodeId, NodeId)>,
        default_arm: Option<NodeId>,
    },

    /// `name(args)` or a bare `name` (an arity-zero call).
    Call { name: String, args: Vec<NodeId> },

    /// A call whose callee named a built-in; rewritten in place from `Call`.
    Intrinsic {
        kind: IntrinsicKind,
        name: String,
        args: Vec<NodeId>,
    },

    /// `=expr`: the value is re-parsed as source and evaluated.
    Codeify { expr: NodeId },

    /// A fully decoded string literal.
    String { bytes: Vec<u8> },

    /// `lhs .. rhs`: byte concatenation, right-associative.
    Concat { lhs: NodeId, rhs: NodeId },
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Append-only, index-addressed node store.
///
/// Nodes are never removed; [`Ast::replace`] swaps a node's payload in place
/// (the parser uses it to turn a call into an intrinsic once the callee is
/// known). Because edges are indices, growth of the backing buffer never
/// invalidates a handle.
#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index.
    pub fn add(&mut self, pos: Position, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node store exceeds u32 indices"));
        self.nodes.push(Node { kind, pos });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Swap the payload of an existing node, keeping its position.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
