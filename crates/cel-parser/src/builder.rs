//! Lowering of the concrete syntax tree into the expression AST.
//!
//! Ids are handed out in visit order. For a binary form the operator's id
//! is taken between the two operands, for containers the container's id
//! is taken before any element. Every id records the offset it was
//! allocated at.

use cel_ast::operators;
use cel_ast::{
    Constant, Entry, EntryKey, ErrorKind, Errors, Expr, ExprId, ExprKind, SourceInfo,
};
use cel_lexer::{decode_bytes, decode_double, decode_int, decode_string, decode_uint, LiteralError};
use cel_macros::find_macro;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::cst::{Cst, LiteralKind, Node, NodeId, NodeKind};
use crate::helper::{IdAllocator, MacroIds};
use crate::logic::LogicManager;
use crate::ParserOptions;

/// Identifiers the language keeps for future use.
const RESERVED_IDS: &[&str] = &[
    "as",
    "break",
    "const",
    "continue",
    "else",
    "false",
    "for",
    "function",
    "if",
    "import",
    "in",
    "let",
    "loop",
    "package",
    "namespace",
    "null",
    "return",
    "true",
    "var",
    "void",
    "while",
];

pub(crate) struct AstBuilder<'a> {
    cst: &'a Cst,
    options: &'a ParserOptions,
    errors: &'a mut Errors,
    ids: IdAllocator,
    macro_calls: IndexMap<ExprId, Expr>,
    depth: usize,
}

impl<'a> AstBuilder<'a> {
    pub fn new(cst: &'a Cst, options: &'a ParserOptions, errors: &'a mut Errors) -> Self {
        Self {
            cst,
            options,
            errors,
            ids: IdAllocator::default(),
            macro_calls: IndexMap::new(),
            depth: 0,
        }
    }

    /// Build the tree, recording id offsets and macro calls in `info`.
    pub fn build(mut self, info: &mut SourceInfo) -> Expr {
        let expr = self.visit(self.cst.root);
        info.positions = self.ids.into_positions();
        info.macro_calls = self.macro_calls;
        expr
    }

    fn report(&mut self, offset: u32, kind: ErrorKind, message: impl Into<String>) -> Expr {
        let id = self.ids.id(offset);
        self.errors.report_at(id, offset, kind, message);
        Expr::error_placeholder(id)
    }

    fn recursion_limit(&mut self, offset: u32) -> Expr {
        tracing::debug!(max = self.options.max_recursion_depth, "builder recursion limit exceeded");
        self.errors.report_internal(
            ErrorKind::RecursionLimitExceeded,
            "max recursion depth exceeded",
        );
        Expr::error_placeholder(self.ids.id(offset))
    }

    fn visit(&mut self, id: NodeId) -> Expr {
        let cst = self.cst;
        let node = cst.node(id);
        let guarded = matches!(
            node.kind,
            NodeKind::Conditional { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Select { .. }
                | NodeKind::MemberCall { .. }
                | NodeKind::Index { .. }
        );
        if !guarded {
            return self.visit_node(node);
        }
        self.depth += 1;
        let expr = if self.depth > self.options.max_recursion_depth {
            self.recursion_limit(node.span.start)
        } else {
            self.visit_node(node)
        };
        self.depth -= 1;
        expr
    }

    fn visit_all(&mut self, nodes: &[NodeId]) -> Vec<Expr> {
        nodes.iter().map(|&n| self.visit(n)).collect()
    }

    fn visit_node(&mut self, node: &'a Node) -> Expr {
        match &node.kind {
            NodeKind::Conditional {
                cond,
                question,
                then,
                otherwise,
            } => {
                let cond = self.visit(*cond);
                let id = self.ids.id(*question);
                let then = self.visit(*then);
                let otherwise = self.visit(*otherwise);
                self.call_or_macro(id, operators::CONDITIONAL, None, vec![cond, then, otherwise])
            }
            NodeKind::Or { terms, ops } => self.visit_logic(operators::LOGICAL_OR, terms, ops),
            NodeKind::And { terms, ops } => self.visit_logic(operators::LOGICAL_AND, terms, ops),
            NodeKind::Binary {
                function,
                op,
                lhs,
                rhs,
            } => {
                let lhs = self.visit(*lhs);
                let id = self.ids.id(*op);
                let rhs = self.visit(*rhs);
                self.call_or_macro(id, function, None, vec![lhs, rhs])
            }
            NodeKind::Not { ops, operand } => {
                self.visit_unary(operators::LOGICAL_NOT, ops, *operand)
            }
            NodeKind::Negate { ops, operand } => {
                self.visit_unary(operators::NEGATE, ops, *operand)
            }
            NodeKind::Select {
                operand,
                dot,
                optional,
                field,
                field_offset,
            } => {
                let operand = self.visit(*operand);
                if !*optional {
                    return Expr::select(self.ids.id(*dot), operand, field.clone(), false);
                }
                if !self.options.enable_optional_syntax {
                    return self.report(*dot, ErrorKind::UnsupportedSyntax, "unsupported syntax '.?'");
                }
                let field = Expr::constant(
                    self.ids.id(*field_offset),
                    Constant::String(field.clone()),
                );
                let id = self.ids.id(*dot);
                self.call_or_macro(id, operators::OPT_SELECT, None, vec![operand, field])
            }
            NodeKind::MemberCall {
                operand,
                function,
                open,
                args,
            } => {
                let operand = self.visit(*operand);
                let id = self.ids.id(*open);
                let args = self.visit_all(args);
                self.call_or_macro(id, function, Some(operand), args)
            }
            NodeKind::Index {
                operand,
                open,
                optional,
                index,
            } => {
                let operand = self.visit(*operand);
                let id = self.ids.id(*open);
                let index = self.visit(*index);
                let function = if *optional {
                    if !self.options.enable_optional_syntax {
                        return self.report(*open, ErrorKind::UnsupportedSyntax, "unsupported syntax '[?'");
                    }
                    operators::OPT_INDEX
                } else {
                    operators::INDEX
                };
                self.call_or_macro(id, function, None, vec![operand, index])
            }
            NodeKind::Ident {
                leading_dot,
                name,
                name_offset,
            } => {
                if let Some(reserved) = self.reserved(node, name) {
                    return reserved;
                }
                Expr::ident(self.ids.id(*name_offset), qualified(*leading_dot, name))
            }
            NodeKind::GlobalCall {
                leading_dot,
                name,
                open,
                args,
            } => {
                if let Some(reserved) = self.reserved(node, name) {
                    return reserved;
                }
                let id = self.ids.id(*open);
                let args = self.visit_all(args);
                self.call_or_macro(id, &qualified(*leading_dot, name), None, args)
            }
            NodeKind::Nested(inner) => self.visit(*inner),
            NodeKind::CreateList { open, elements } => {
                let id = self.ids.id(*open);
                let mut values = Vec::with_capacity(elements.len());
                let mut optional_indices = Vec::new();
                for (idx, element) in elements.iter().enumerate() {
                    let value = self.visit(element.value);
                    if element.optional {
                        if self.options.enable_optional_syntax {
                            optional_indices.push(idx);
                        } else {
                            self.report(element.start, ErrorKind::UnsupportedSyntax, "unsupported syntax '?'");
                        }
                    }
                    values.push(value);
                }
                Expr::list(id, values, optional_indices)
            }
            NodeKind::CreateMap { open, entries } => {
                let id = self.ids.id(*open);
                let mut out = Vec::with_capacity(entries.len());
                for entry in entries {
                    let entry_id = self.ids.id(entry.colon);
                    if entry.optional && !self.options.enable_optional_syntax {
                        self.report(entry.key_start, ErrorKind::UnsupportedSyntax, "unsupported syntax '?'");
                        continue;
                    }
                    let key = self.visit(entry.key);
                    let value = self.visit(entry.value);
                    out.push(Entry {
                        id: entry_id,
                        key: EntryKey::Map(key),
                        value,
                        optional: entry.optional,
                    });
                }
                if let Some(first) = entries.first() {
                    self.ids.id(first.key_start);
                }
                Expr::new(
                    id,
                    ExprKind::CreateStruct {
                        message_name: SmolStr::default(),
                        entries: out,
                    },
                )
            }
            NodeKind::CreateMessage {
                leading_dot,
                name,
                open,
                fields,
            } => {
                let message_name = qualified(*leading_dot, &name.join("."));
                let id = self.ids.id(*open);
                let mut out = Vec::with_capacity(fields.len());
                for field in fields {
                    let entry_id = self.ids.id(field.colon);
                    if field.optional && !self.options.enable_optional_syntax {
                        self.report(field.start, ErrorKind::UnsupportedSyntax, "unsupported syntax '?'");
                        continue;
                    }
                    let value = self.visit(field.value);
                    out.push(Entry {
                        id: entry_id,
                        key: EntryKey::Field(field.field.clone()),
                        value,
                        optional: field.optional,
                    });
                }
                if let Some(first) = fields.first() {
                    self.ids.id(first.start);
                }
                Expr::new(
                    id,
                    ExprKind::CreateStruct {
                        message_name,
                        entries: out,
                    },
                )
            }
            NodeKind::Literal(kind, text) => self.visit_literal(*kind, text, node.span.start),
            NodeKind::Error => Expr::error_placeholder(self.ids.id(node.span.start)),
        }
    }

    fn visit_logic(&mut self, function: &str, terms: &[NodeId], ops: &[u32]) -> Expr {
        let Some((first, rest)) = terms.split_first() else {
            return Expr::error_placeholder(self.ids.id(0));
        };
        let first = self.visit(*first);
        let mut manager = LogicManager::balancing(function, first);
        for (term, op) in rest.iter().zip(ops) {
            let term = self.visit(*term);
            manager.add_term(self.ids.id(*op), term);
        }
        manager.into_expr()
    }

    /// A run of `!` or `-`. Pairs cancel unless repeated operators are
    /// retained, in which case every operator becomes a call.
    fn visit_unary(&mut self, function: &str, ops: &[u32], operand: NodeId) -> Expr {
        if self.options.retain_repeated_unary_operators {
            if self.depth + ops.len() > self.options.max_recursion_depth {
                let offset = ops.first().copied().unwrap_or_default();
                return self.recursion_limit(offset);
            }
            let ids: Vec<ExprId> = ops.iter().map(|&op| self.ids.id(op)).collect();
            let mut expr = self.visit(operand);
            for id in ids.into_iter().rev() {
                expr = self.call_or_macro(id, function, None, vec![expr]);
            }
            return expr;
        }
        if ops.len() % 2 == 0 {
            return self.visit(operand);
        }
        let id = self.ids.id(ops[0]);
        let operand = self.visit(operand);
        self.call_or_macro(id, function, None, vec![operand])
    }

    fn visit_literal(&mut self, kind: LiteralKind, text: &str, start: u32) -> Expr {
        let id = self.ids.id(start);
        let value = match kind {
            LiteralKind::Int => decode_int(text).map(Constant::Int),
            LiteralKind::Uint => decode_uint(text).map(Constant::Uint),
            LiteralKind::Double => decode_double(text).map(Constant::Double),
            LiteralKind::String => decode_string(text).map(|s| Constant::String(s.into())),
            LiteralKind::Bytes => decode_bytes(text).map(Constant::Bytes),
            LiteralKind::True => Ok(Constant::Bool(true)),
            LiteralKind::False => Ok(Constant::Bool(false)),
            LiteralKind::Null => Ok(Constant::Null),
        };
        match value {
            Ok(value) => Expr::constant(id, value),
            Err(err) => {
                let kind = match err {
                    LiteralError::MissingQuotes { .. }
                    | LiteralError::MissingTerminatingQuote { .. }
                    | LiteralError::UnescapedTerminatingQuote { .. } => {
                        ErrorKind::UnterminatedOrUnescapedQuote
                    }
                    _ => ErrorKind::MalformedLiteral,
                };
                let offset = start + err.offset() as u32;
                self.errors.report_at(id, offset, kind, err.to_string());
                Expr::error_placeholder(id)
            }
        }
    }

    fn reserved(&mut self, node: &Node, name: &str) -> Option<Expr> {
        if !RESERVED_IDS.contains(&name) {
            return None;
        }
        Some(self.report(
            node.span.start,
            ErrorKind::ReservedIdentifier,
            format!("reserved identifier: {name}"),
        ))
    }

    /// Emit a call, or its macro expansion when one matches.
    fn call_or_macro(
        &mut self,
        id: ExprId,
        function: &str,
        target: Option<Expr>,
        args: Vec<Expr>,
    ) -> Expr {
        let options = self.options;
        let Some(found) = find_macro(&options.macros, function, args.len(), target.is_some())
        else {
            return match target {
                Some(target) => Expr::member_call(id, function, target, args),
                None => Expr::call(id, function, args),
            };
        };
        let call = options.populate_macro_calls.then(|| match &target {
            Some(target) => Expr::member_call(id, function, target.clone(), args.clone()),
            None => Expr::call(id, function, args.clone()),
        });
        let offset = self.ids.offset(id).unwrap_or_default();
        let mut helper = MacroIds {
            ids: &mut self.ids,
            offset,
        };
        match found.expand(&mut helper, target, args) {
            Ok(expr) => {
                if let Some(call) = call {
                    self.macro_calls.insert(expr.id, call);
                }
                expr
            }
            Err(err) => {
                let at = self.ids.offset(err.arg_id).unwrap_or(offset);
                self.report(at, ErrorKind::MacroArgumentShape, err.message)
            }
        }
    }
}

fn qualified(leading_dot: bool, name: &str) -> SmolStr {
    if leading_dot {
        SmolStr::from(format!(".{name}"))
    } else {
        SmolStr::from(name)
    }
}
