//! Concrete syntax tree produced by the grammar.
//!
//! Nodes keep every token offset the builder needs to position ids. Layers
//! that merely wrap a single child in the grammar are not materialized, so
//! a node exists only where the surface syntax branches.

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

use cel_lexer::Span;

pub type NodeId = Idx<Node>;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Uint,
    Double,
    String,
    Bytes,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListElement {
    pub optional: bool,
    /// Offset of the `?` marker, or of the value when not optional.
    pub start: u32,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapInit {
    pub optional: bool,
    pub key_start: u32,
    pub key: NodeId,
    pub colon: u32,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub optional: bool,
    pub start: u32,
    pub field: SmolStr,
    pub colon: u32,
    pub value: NodeId,
}

/// Offsets below are byte offsets of the named token.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `cond ? then : otherwise`
    Conditional {
        cond: NodeId,
        question: u32,
        then: NodeId,
        otherwise: NodeId,
    },
    /// `terms[0] || terms[1] || ...`; `ops` holds the operator offsets.
    Or { terms: Vec<NodeId>, ops: Vec<u32> },
    And { terms: Vec<NodeId>, ops: Vec<u32> },
    /// Relations and arithmetic.
    Binary {
        function: &'static str,
        op: u32,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// A run of `!` with one offset per operator, outermost first.
    Not { ops: Vec<u32>, operand: NodeId },
    Negate { ops: Vec<u32>, operand: NodeId },
    Select {
        operand: NodeId,
        dot: u32,
        optional: bool,
        field: SmolStr,
        field_offset: u32,
    },
    MemberCall {
        operand: NodeId,
        function: SmolStr,
        open: u32,
        args: Vec<NodeId>,
    },
    Index {
        operand: NodeId,
        open: u32,
        optional: bool,
        index: NodeId,
    },
    Ident {
        leading_dot: bool,
        name: SmolStr,
        name_offset: u32,
    },
    GlobalCall {
        leading_dot: bool,
        name: SmolStr,
        open: u32,
        args: Vec<NodeId>,
    },
    /// Parenthesized expression.
    Nested(NodeId),
    CreateList {
        open: u32,
        elements: Vec<ListElement>,
    },
    CreateMap {
        open: u32,
        entries: Vec<MapInit>,
    },
    CreateMessage {
        leading_dot: bool,
        name: Vec<SmolStr>,
        open: u32,
        fields: Vec<FieldInit>,
    },
    /// Literal text including a leading `-` for signed numbers.
    Literal(LiteralKind, SmolStr),
    /// Placeholder for input the grammar could not recognize.
    Error,
}

#[derive(Debug, Clone)]
pub struct Cst {
    pub nodes: Arena<Node>,
    pub root: NodeId,
}

impl Cst {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}
