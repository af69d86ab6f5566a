pub mod adorned;
pub mod errors;
pub mod operators;
pub mod source;

use smol_str::SmolStr;

pub use errors::{Diagnostic, ErrorKind, Errors};
pub use source::{Location, Source, SourceInfo};

/// Expression ids start at 1 and are unique within one tree.
pub type ExprId = u64;

/// Name of the accumulator variable introduced by comprehension macros.
pub const ACCUMULATOR_VAR: &str = "__result__";

/// Text of the placeholder constant standing in for an unparseable subtree.
pub const ERROR_PLACEHOLDER: &str = "<<error>>";

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Const(Constant),
    Ident(SmolStr),
    /// Field access. `test_only` marks a presence test produced by `has()`.
    Select {
        operand: Box<Expr>,
        field: SmolStr,
        test_only: bool,
    },
    /// Function application; `target` is set for receiver-style calls.
    Call {
        function: SmolStr,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    CreateList {
        elements: Vec<Expr>,
        optional_indices: Vec<usize>,
    },
    /// Map literal when `message_name` is empty, message construction otherwise.
    CreateStruct {
        message_name: SmolStr,
        entries: Vec<Entry>,
    },
    Comprehension(Box<Comprehension>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: ExprId,
    pub key: EntryKey,
    pub value: Expr,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKey {
    Field(SmolStr),
    Map(Expr),
}

/// A bounded fold over a list or map.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub iter_var: SmolStr,
    pub iter_range: Expr,
    pub accu_var: SmolStr,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(SmolStr),
    Bytes(Vec<u8>),
    Duration { seconds: i64, nanos: i32 },
    Timestamp { seconds: i64, nanos: i32 },
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    pub fn ident(id: ExprId, name: impl Into<SmolStr>) -> Self {
        Self::new(id, ExprKind::Ident(name.into()))
    }

    pub fn constant(id: ExprId, value: Constant) -> Self {
        Self::new(id, ExprKind::Const(value))
    }

    pub fn call(id: ExprId, function: impl Into<SmolStr>, args: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::Call {
                function: function.into(),
                target: None,
                args,
            },
        )
    }

    pub fn member_call(
        id: ExprId,
        function: impl Into<SmolStr>,
        target: Expr,
        args: Vec<Expr>,
    ) -> Self {
        Self::new(
            id,
            ExprKind::Call {
                function: function.into(),
                target: Some(Box::new(target)),
                args,
            },
        )
    }

    pub fn select(id: ExprId, operand: Expr, field: impl Into<SmolStr>, test_only: bool) -> Self {
        Self::new(
            id,
            ExprKind::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only,
            },
        )
    }

    pub fn list(id: ExprId, elements: Vec<Expr>, optional_indices: Vec<usize>) -> Self {
        Self::new(
            id,
            ExprKind::CreateList {
                elements,
                optional_indices,
            },
        )
    }

    /// The `<<error>>` placeholder used where a subtree could not be built.
    pub fn error_placeholder(id: ExprId) -> Self {
        Self::constant(id, Constant::String(ERROR_PLACEHOLDER.into()))
    }

    pub fn as_ident(&self) -> Option<&SmolStr> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Visit this node and all of its descendants in pre-order.
    ///
    /// Struct entry ids are reported alongside the node ids.
    pub fn for_each_id(&self, f: &mut impl FnMut(ExprId)) {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            f(expr.id);
            match &expr.kind {
                ExprKind::Const(_) | ExprKind::Ident(_) => {}
                ExprKind::Select { operand, .. } => stack.push(operand.as_ref()),
                ExprKind::Call { target, args, .. } => {
                    stack.extend(args.iter().rev());
                    if let Some(target) = target {
                        stack.push(target.as_ref());
                    }
                }
                ExprKind::CreateList { elements, .. } => stack.extend(elements.iter().rev()),
                ExprKind::CreateStruct { entries, .. } => {
                    for entry in entries.iter().rev() {
                        f(entry.id);
                        stack.push(&entry.value);
                        if let EntryKey::Map(key) = &entry.key {
                            stack.push(key);
                        }
                    }
                }
                ExprKind::Comprehension(c) => {
                    stack.push(&c.result);
                    stack.push(&c.loop_step);
                    stack.push(&c.loop_condition);
                    stack.push(&c.accu_init);
                    stack.push(&c.iter_range);
                }
            }
        }
    }

    /// Visit every expression node in pre-order. Struct entries are not
    /// nodes; their keys and values are.
    pub fn for_each_node<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            f(expr);
            match &expr.kind {
                ExprKind::Const(_) | ExprKind::Ident(_) => {}
                ExprKind::Select { operand, .. } => stack.push(operand.as_ref()),
                ExprKind::Call { target, args, .. } => {
                    stack.extend(args.iter().rev());
                    if let Some(target) = target {
                        stack.push(target.as_ref());
                    }
                }
                ExprKind::CreateList { elements, .. } => stack.extend(elements.iter().rev()),
                ExprKind::CreateStruct { entries, .. } => {
                    for entry in entries.iter().rev() {
                        stack.push(&entry.value);
                        if let EntryKey::Map(key) = &entry.key {
                            stack.push(key);
                        }
                    }
                }
                ExprKind::Comprehension(c) => {
                    stack.push(&c.result);
                    stack.push(&c.loop_step);
                    stack.push(&c.loop_condition);
                    stack.push(&c.accu_init);
                    stack.push(&c.iter_range);
                }
            }
        }
    }

    /// Ids of the expression nodes, without struct entry ids.
    pub fn node_ids(&self) -> Vec<ExprId> {
        let mut ids = Vec::new();
        self.for_each_node(&mut |expr| ids.push(expr.id));
        ids
    }

    /// Every id in the tree, including struct entry ids.
    pub fn ids(&self) -> Vec<ExprId> {
        let mut ids = Vec::new();
        self.for_each_id(&mut |id| ids.push(id));
        ids
    }
}

/// Output of a parse: the expression tree plus its source metadata.
#[derive(Debug, Clone)]
pub struct ParsedExpr {
    pub expr: Expr,
    pub source_info: SourceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_cover_entries() {
        let expr = Expr::new(
            1,
            ExprKind::CreateStruct {
                message_name: SmolStr::default(),
                entries: vec![Entry {
                    id: 2,
                    key: EntryKey::Map(Expr::ident(3, "a")),
                    value: Expr::ident(4, "b"),
                    optional: false,
                }],
            },
        );
        let mut ids = expr.ids();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let mut nodes = expr.node_ids();
        nodes.sort();
        assert_eq!(nodes, vec![1, 3, 4]);
    }

    #[test]
    fn test_error_placeholder() {
        let expr = Expr::error_placeholder(7);
        assert_eq!(
            expr.kind,
            ExprKind::Const(Constant::String(ERROR_PLACEHOLDER.into()))
        );
    }
}
