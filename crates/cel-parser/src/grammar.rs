//! Recursive-descent recognizer producing the [`Cst`].
//!
//! Recognition stops at the first syntax error it cannot repair. A single
//! unexpected token followed by an acceptable one is reported as extraneous
//! and skipped.

use cel_ast::operators;
use cel_ast::{ErrorKind, Errors};
use cel_lexer::{lex, Span, Token};
use la_arena::Arena;
use smol_str::SmolStr;

use crate::cst::{Cst, FieldInit, ListElement, LiteralKind, MapInit, Node, NodeId, NodeKind};

/// Token names in the order syntax errors list them.
const TOKEN_ORDER: &[&str] = &[
    "'=='", "'!='", "'in'", "'<'", "'<='", "'>='", "'>'", "'&&'", "'||'", "'['", "']'", "'{'",
    "'}'", "'('", "')'", "'.'", "','", "'-'", "'!'", "'?'", "':'", "'+'", "'*'", "'/'", "'%'",
    "'true'", "'false'", "'null'", "NUM_FLOAT", "NUM_INT", "NUM_UINT", "STRING", "BYTES",
    "IDENTIFIER",
];

const EXPR_START: &[&str] = &[
    "'['", "'{'", "'('", "'.'", "'-'", "'!'", "'true'", "'false'", "'null'", "NUM_FLOAT",
    "NUM_INT", "NUM_UINT", "STRING", "BYTES", "IDENTIFIER",
];

fn expecting(names: &[&str]) -> String {
    if let [single] = names {
        return single.to_string();
    }
    let ordered: Vec<&str> = TOKEN_ORDER
        .iter()
        .copied()
        .filter(|name| names.contains(name))
        .collect();
    format!("{{{}}}", ordered.join(", "))
}

fn with_expr_start(extra: &[&'static str]) -> Vec<&'static str> {
    let mut names = EXPR_START.to_vec();
    names.extend_from_slice(extra);
    names
}

fn is_expr_start(token: &Token) -> bool {
    matches!(
        token,
        Token::LBracket
            | Token::LBrace
            | Token::LParen
            | Token::Dot
            | Token::Minus
            | Token::Bang
            | Token::True
            | Token::False
            | Token::Null
            | Token::Double(_)
            | Token::Int(_)
            | Token::Uint(_)
            | Token::Str(_)
            | Token::Bytes(_)
            | Token::Ident(_)
    )
}

fn relation_function(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::Lt => operators::LESS,
        Token::LtEq => operators::LESS_EQUALS,
        Token::GtEq => operators::GREATER_EQUALS,
        Token::Gt => operators::GREATER,
        Token::EqEq => operators::EQUALS,
        Token::NotEq => operators::NOT_EQUALS,
        Token::In => operators::IN,
        _ => return None,
    })
}

/// Recognize `source`, reporting lexical and syntax errors into `errors`.
pub fn recognize(source: &str, errors: &mut Errors, max_depth: usize) -> Cst {
    let (tokens, lex_errors) = lex(source);
    for span in lex_errors {
        let text = source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default();
        errors.report_syntax(span.start, format!("token recognition error at: '{text}'"));
    }
    let mut grammar = Grammar::new(source, tokens, errors, max_depth);
    let root = grammar.parse_expr();
    grammar.expect_end();
    Cst {
        nodes: grammar.nodes,
        root,
    }
}

struct Grammar<'a> {
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    nodes: Arena<Node>,
    errors: &'a mut Errors,
    depth: usize,
    max_depth: usize,
    halted: bool,
}

impl<'a> Grammar<'a> {
    fn new(
        source: &'a str,
        tokens: Vec<(Token, Span)>,
        errors: &'a mut Errors,
        max_depth: usize,
    ) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            nodes: Arena::new(),
            errors,
            depth: 0,
            max_depth,
            halted: false,
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                let end = self.source.len() as u32;
                Span::new(end, end)
            })
    }

    fn prev_end(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|(_, s)| s.end)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    /// Consume `expected` and return its offset.
    fn eat(&mut self, expected: &Token) -> Option<u32> {
        if self.check(expected) {
            self.advance().map(|(_, span)| span.start)
        } else {
            None
        }
    }

    fn text_at(&self, idx: usize) -> String {
        match self.tokens.get(idx) {
            Some((_, span)) => format!(
                "'{}'",
                self.source
                    .get(span.start as usize..span.end as usize)
                    .unwrap_or_default()
            ),
            None => "'<EOF>'".to_string(),
        }
    }

    /// Consume `expected`, skipping one extraneous token if that repairs
    /// the input. Otherwise report a mismatch and halt.
    fn expect(&mut self, expected: &Token, names: &[&str]) -> Option<u32> {
        if self.halted {
            return None;
        }
        if let Some(offset) = self.eat(expected) {
            return Some(offset);
        }
        if !self.at_end() && self.peek_nth(1) == Some(expected) {
            self.extraneous(names);
            return self.eat(expected);
        }
        self.mismatched(names);
        None
    }

    fn expect_ident(&mut self, names: &[&str]) -> Option<(SmolStr, u32)> {
        if self.halted {
            return None;
        }
        if let Some(Token::Ident(_)) = self.peek() {
            if let Some((Token::Ident(name), span)) = self.advance() {
                return Some((name, span.start));
            }
        }
        self.mismatched(names);
        None
    }

    fn extraneous(&mut self, names: &[&str]) {
        let message = format!(
            "extraneous input {} expecting {}",
            self.text_at(self.pos),
            expecting(names)
        );
        self.errors.report_syntax(self.peek_span().start, message);
        self.pos += 1;
    }

    fn mismatched(&mut self, names: &[&str]) {
        let message = format!(
            "mismatched input {} expecting {}",
            self.text_at(self.pos),
            expecting(names)
        );
        self.errors.report_syntax(self.peek_span().start, message);
        self.halted = true;
    }

    fn no_viable_alternative(&mut self, from: u32) {
        let span = self.peek_span();
        let text = self
            .source
            .get(from as usize..span.end as usize)
            .unwrap_or_default();
        self.errors
            .report_syntax(span.start, format!("no viable alternative at input '{text}'"));
        self.halted = true;
    }

    /// Skip one token when it sits in front of an acceptable one.
    fn skip_extraneous(&mut self, acceptable: impl Fn(&Token) -> bool, names: &[&str]) {
        if self.halted {
            return;
        }
        let current_ok = self.peek().map(&acceptable).unwrap_or(false);
        let next_ok = self.peek_nth(1).map(&acceptable).unwrap_or(false);
        if !current_ok && next_ok {
            self.extraneous(names);
        }
    }

    fn expect_end(&mut self) {
        if self.halted || self.at_end() {
            return;
        }
        if self.pos + 1 == self.tokens.len() {
            self.extraneous(&["<EOF>"]);
        } else {
            self.mismatched(&["<EOF>"]);
        }
    }

    // ── Node helpers ──────────────────────────────────────────────

    fn alloc(&mut self, kind: NodeKind, start: u32) -> NodeId {
        let end = self.prev_end().max(start);
        self.nodes.alloc(Node {
            kind,
            span: Span::new(start, end),
        })
    }

    fn error_node(&mut self) -> NodeId {
        let start = self.peek_span().start;
        self.nodes.alloc(Node {
            kind: NodeKind::Error,
            span: Span::new(start, start),
        })
    }

    // ── Expressions ───────────────────────────────────────────────

    pub(crate) fn parse_expr(&mut self) -> NodeId {
        if self.halted {
            return self.error_node();
        }
        self.depth += 1;
        if self.depth > self.max_depth {
            tracing::debug!(max = self.max_depth, "grammar recursion limit exceeded");
            self.errors.report_internal(
                ErrorKind::RecursionLimitExceeded,
                format!("expression recursion limit exceeded: {}", self.max_depth),
            );
            self.halted = true;
            self.depth -= 1;
            return self.error_node();
        }
        let node = self.parse_conditional();
        self.depth -= 1;
        node
    }

    fn parse_conditional(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let cond = self.parse_or();
        let Some(question) = self.eat(&Token::Question) else {
            return cond;
        };
        let then = self.parse_or();
        self.expect(&Token::Colon, &["':'"]);
        let otherwise = self.parse_expr();
        self.alloc(
            NodeKind::Conditional {
                cond,
                question,
                then,
                otherwise,
            },
            start,
        )
    }

    fn parse_or(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let first = self.parse_and();
        let mut terms = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = self.eat(&Token::OrOr) {
            ops.push(op);
            terms.push(self.parse_and());
        }
        if ops.is_empty() {
            return first;
        }
        self.alloc(NodeKind::Or { terms, ops }, start)
    }

    fn parse_and(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let first = self.parse_relation();
        let mut terms = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = self.eat(&Token::AndAnd) {
            ops.push(op);
            terms.push(self.parse_relation());
        }
        if ops.is_empty() {
            return first;
        }
        self.alloc(NodeKind::And { terms, ops }, start)
    }

    fn parse_relation(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let mut lhs = self.parse_additive();
        while let Some(function) = self.peek().and_then(relation_function) {
            let op = self.peek_span().start;
            self.advance();
            let rhs = self.parse_additive();
            lhs = self.alloc(
                NodeKind::Binary {
                    function,
                    op,
                    lhs,
                    rhs,
                },
                start,
            );
        }
        lhs
    }

    fn parse_additive(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let mut lhs = self.parse_multiplicative();
        loop {
            let function = match self.peek() {
                Some(Token::Plus) => operators::ADD,
                Some(Token::Minus) => operators::SUBTRACT,
                _ => break,
            };
            let op = self.peek_span().start;
            self.advance();
            let rhs = self.parse_multiplicative();
            lhs = self.alloc(
                NodeKind::Binary {
                    function,
                    op,
                    lhs,
                    rhs,
                },
                start,
            );
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let mut lhs = self.parse_unary();
        loop {
            let function = match self.peek() {
                Some(Token::Star) => operators::MULTIPLY,
                Some(Token::Slash) => operators::DIVIDE,
                Some(Token::Percent) => operators::MODULO,
                _ => break,
            };
            let op = self.peek_span().start;
            self.advance();
            let rhs = self.parse_unary();
            lhs = self.alloc(
                NodeKind::Binary {
                    function,
                    op,
                    lhs,
                    rhs,
                },
                start,
            );
        }
        lhs
    }

    fn parse_unary(&mut self) -> NodeId {
        if self.halted {
            return self.error_node();
        }
        let start = self.peek_span().start;
        match self.peek() {
            Some(Token::Bang) => {
                let ops = self.eat_run(&Token::Bang);
                let operand = self.parse_member();
                self.alloc(NodeKind::Not { ops, operand }, start)
            }
            // A lone `-` in front of a number is the literal's sign.
            Some(Token::Minus)
                if !matches!(self.peek_nth(1), Some(Token::Int(_) | Token::Double(_))) =>
            {
                let ops = self.eat_run(&Token::Minus);
                let operand = self.parse_member();
                self.alloc(NodeKind::Negate { ops, operand }, start)
            }
            _ => self.parse_member(),
        }
    }

    fn eat_run(&mut self, token: &Token) -> Vec<u32> {
        let mut ops = Vec::new();
        while let Some(op) = self.eat(token) {
            ops.push(op);
        }
        ops
    }

    fn parse_member(&mut self) -> NodeId {
        let start = self.peek_span().start;
        let mut operand = self.parse_primary();
        while !self.halted {
            match self.peek() {
                Some(Token::Dot) => operand = self.parse_member_access(operand, start),
                Some(Token::LBracket) => {
                    let Some(open) = self.eat(&Token::LBracket) else {
                        break;
                    };
                    let optional = self.eat(&Token::Question).is_some();
                    let index = self.parse_expr();
                    self.expect(&Token::RBracket, &["']'"]);
                    operand = self.alloc(
                        NodeKind::Index {
                            operand,
                            open,
                            optional,
                            index,
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        operand
    }

    /// `.field`, `.?field` or `.method(args)` after `operand`.
    fn parse_member_access(&mut self, operand: NodeId, start: u32) -> NodeId {
        let dot = self.peek_span().start;
        self.advance();
        let optional = self.check(&Token::Question)
            && matches!(self.peek_nth(1), Some(Token::Ident(_)));
        if optional {
            self.advance();
        }
        let Some(Token::Ident(_)) = self.peek() else {
            self.no_viable_alternative(dot);
            return self.error_node();
        };
        let Some((Token::Ident(field), field_span)) = self.advance() else {
            return self.error_node();
        };
        if !optional {
            if let Some(open) = self.eat(&Token::LParen) {
                let args = self.parse_args();
                return self.alloc(
                    NodeKind::MemberCall {
                        operand,
                        function: field,
                        open,
                        args,
                    },
                    start,
                );
            }
        }
        self.alloc(
            NodeKind::Select {
                operand,
                dot,
                optional,
                field,
                field_offset: field_span.start,
            },
            start,
        )
    }

    /// Arguments after `(`, consuming the closing `)`.
    fn parse_args(&mut self) -> Vec<NodeId> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen).is_some() {
            return args;
        }
        self.skip_extraneous(is_expr_start, &with_expr_start(&["')'"]));
        args.push(self.parse_expr());
        while !self.halted && self.eat(&Token::Comma).is_some() {
            args.push(self.parse_expr());
        }
        self.expect(&Token::RParen, &["')'", "','"]);
        args
    }

    // ── Primaries ─────────────────────────────────────────────────

    fn parse_primary(&mut self) -> NodeId {
        if self.halted {
            return self.error_node();
        }
        self.skip_extraneous(is_expr_start, EXPR_START);
        let start = self.peek_span().start;
        match self.peek() {
            Some(Token::Dot) => {
                self.advance();
                if !matches!(self.peek(), Some(Token::Ident(_))) {
                    self.no_viable_alternative(start);
                    return self.error_node();
                }
                self.parse_identifier_form(true, start)
            }
            Some(Token::Ident(_)) => self.parse_identifier_form(false, start),
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&Token::RParen, &["')'"]);
                self.alloc(NodeKind::Nested(inner), start)
            }
            Some(Token::LBracket) => self.parse_list(start),
            Some(Token::LBrace) => self.parse_map(start),
            Some(Token::Minus) => self.parse_signed_literal(start),
            Some(_) => self.parse_literal(),
            None => {
                self.mismatched(EXPR_START);
                self.error_node()
            }
        }
    }

    /// True when the tokens ahead spell `IDENT ('.' IDENT)* '{'`.
    fn at_message_name(&self) -> bool {
        let mut idx = self.pos;
        loop {
            if !matches!(self.tokens.get(idx), Some((Token::Ident(_), _))) {
                return false;
            }
            match self.tokens.get(idx + 1) {
                Some((Token::LBrace, _)) => return true,
                Some((Token::Dot, _)) => idx += 2,
                _ => return false,
            }
        }
    }

    fn parse_identifier_form(&mut self, leading_dot: bool, start: u32) -> NodeId {
        if self.at_message_name() {
            return self.parse_message(leading_dot, start);
        }
        let Some((Token::Ident(name), span)) = self.advance() else {
            return self.error_node();
        };
        if let Some(open) = self.eat(&Token::LParen) {
            let args = self.parse_args();
            return self.alloc(
                NodeKind::GlobalCall {
                    leading_dot,
                    name,
                    open,
                    args,
                },
                start,
            );
        }
        self.alloc(
            NodeKind::Ident {
                leading_dot,
                name,
                name_offset: span.start,
            },
            start,
        )
    }

    fn parse_literal(&mut self) -> NodeId {
        let Some((token, span)) = self.tokens.get(self.pos).cloned() else {
            return self.error_node();
        };
        let (kind, text) = match token {
            Token::Int(text) => (LiteralKind::Int, text),
            Token::Uint(text) => (LiteralKind::Uint, text),
            Token::Double(text) => (LiteralKind::Double, text),
            Token::Str(text) => (LiteralKind::String, text),
            Token::Bytes(text) => (LiteralKind::Bytes, text),
            Token::True => (LiteralKind::True, SmolStr::new_inline("true")),
            Token::False => (LiteralKind::False, SmolStr::new_inline("false")),
            Token::Null => (LiteralKind::Null, SmolStr::new_inline("null")),
            _ => {
                self.mismatched(EXPR_START);
                return self.error_node();
            }
        };
        self.advance();
        self.alloc(NodeKind::Literal(kind, text), span.start)
    }

    fn parse_signed_literal(&mut self, start: u32) -> NodeId {
        self.advance();
        let (kind, digits) = match self.peek() {
            Some(Token::Int(text)) => (LiteralKind::Int, text.clone()),
            Some(Token::Double(text)) => (LiteralKind::Double, text.clone()),
            _ => {
                self.mismatched(&["NUM_FLOAT", "NUM_INT"]);
                return self.error_node();
            }
        };
        self.advance();
        let text = SmolStr::from(format!("-{digits}"));
        self.alloc(NodeKind::Literal(kind, text), start)
    }

    fn parse_list(&mut self, start: u32) -> NodeId {
        let open = start;
        self.advance();
        let mut elements = Vec::new();
        if self.eat(&Token::RBracket).is_some() {
            return self.alloc(NodeKind::CreateList { open, elements }, start);
        }
        let first = with_expr_start(&["']'", "','", "'?'"]);
        self.skip_extraneous(
            |t| is_expr_start(t) || matches!(t, Token::Question | Token::Comma),
            &first,
        );
        if self.eat(&Token::Comma).is_none() {
            if self.at_end() {
                self.mismatched(&first);
            }
            elements.push(self.parse_list_element());
            while !self.halted && self.eat(&Token::Comma).is_some() {
                if self.check(&Token::RBracket) {
                    break;
                }
                elements.push(self.parse_list_element());
            }
        }
        self.expect(&Token::RBracket, &["']'", "','"]);
        self.alloc(NodeKind::CreateList { open, elements }, start)
    }

    fn parse_list_element(&mut self) -> ListElement {
        let start = self.peek_span().start;
        let optional = self.eat(&Token::Question).is_some();
        let value = self.parse_expr();
        ListElement {
            optional,
            start,
            value,
        }
    }

    fn parse_map(&mut self, start: u32) -> NodeId {
        let open = start;
        self.advance();
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace).is_some() {
            return self.alloc(NodeKind::CreateMap { open, entries }, start);
        }
        let first = with_expr_start(&["'}'", "','", "'?'"]);
        self.skip_extraneous(
            |t| is_expr_start(t) || matches!(t, Token::Question | Token::Comma),
            &first,
        );
        if self.eat(&Token::Comma).is_none() {
            if self.at_end() {
                self.mismatched(&first);
            }
            entries.push(self.parse_map_entry());
            while !self.halted && self.eat(&Token::Comma).is_some() {
                if self.check(&Token::RBrace) {
                    break;
                }
                entries.push(self.parse_map_entry());
            }
        }
        self.expect(&Token::RBrace, &["'}'", "','"]);
        self.alloc(NodeKind::CreateMap { open, entries }, start)
    }

    fn parse_map_entry(&mut self) -> MapInit {
        let key_start = self.peek_span().start;
        let optional = self.eat(&Token::Question).is_some();
        let key = self.parse_expr();
        let colon = self.expect(&Token::Colon, &["':'"]).unwrap_or(key_start);
        let value = self.parse_expr();
        MapInit {
            optional,
            key_start,
            key,
            colon,
            value,
        }
    }

    fn parse_message(&mut self, leading_dot: bool, start: u32) -> NodeId {
        let mut name = Vec::new();
        let open = loop {
            let Some((Token::Ident(segment), _)) = self.advance() else {
                return self.error_node();
            };
            name.push(segment);
            if let Some(open) = self.eat(&Token::LBrace) {
                break open;
            }
            self.advance();
        };

        let first = ["'}'", "','", "'?'", "IDENTIFIER"];
        let mut fields = Vec::new();
        if self.eat(&Token::RBrace).is_some() {
            return self.alloc(
                NodeKind::CreateMessage {
                    leading_dot,
                    name,
                    open,
                    fields,
                },
                start,
            );
        }
        self.skip_extraneous(
            |t| matches!(t, Token::Ident(_) | Token::Question | Token::Comma),
            &first,
        );
        if self.eat(&Token::Comma).is_none() {
            if let Some(field) = self.parse_field_init(&first) {
                fields.push(field);
            }
            while !self.halted && self.eat(&Token::Comma).is_some() {
                if self.check(&Token::RBrace) {
                    break;
                }
                if let Some(field) = self.parse_field_init(&["'?'", "IDENTIFIER"]) {
                    fields.push(field);
                }
            }
        }
        self.expect(&Token::RBrace, &["'}'", "','"]);
        self.alloc(
            NodeKind::CreateMessage {
                leading_dot,
                name,
                open,
                fields,
            },
            start,
        )
    }

    fn parse_field_init(&mut self, names: &[&str]) -> Option<FieldInit> {
        let start = self.peek_span().start;
        let optional = self.eat(&Token::Question).is_some();
        let (field, _) = self.expect_ident(names)?;
        let colon = self.expect(&Token::Colon, &["':'"])?;
        let value = self.parse_expr();
        Some(FieldInit {
            optional,
            start,
            field,
            colon,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use cel_ast::Source;

    use super::*;

    fn errors_for(source: &str) -> Vec<String> {
        let mut errors = Errors::new(Source::new(source));
        recognize(source, &mut errors, 100);
        errors
            .diagnostics()
            .iter()
            .map(|d| format!("{}:{}: {}", d.location.line, d.location.column + 1, d.message))
            .collect()
    }

    fn check_ok(source: &str) {
        let errors = errors_for(source);
        assert!(errors.is_empty(), "unexpected errors for {source:?}: {errors:?}");
    }

    fn check_err(source: &str, expected: &[&str]) {
        assert_eq!(errors_for(source), expected, "errors for {source:?}");
    }

    #[test]
    fn test_accepts_expressions() {
        check_ok("a ? b : c");
        check_ok("a || b && c == d + e * f");
        check_ok("!!x.y[0].z(1, 2)");
        check_ok("-x.?y[?0]");
        check_ok(".a.b{c: 1, ?d: 2,}");
        check_ok("{1: 2, 3: 4,}");
        check_ok("[1, ?2, 3,]");
        check_ok("[,]");
        check_ok("{,}");
        check_ok("-1.foo()");
        check_ok("x in [1u, 2.5, 'a', b\"c\", null, true, false]");
        check_ok("// comment\n a");
    }

    #[test]
    fn test_expected_set_ordering() {
        assert_eq!(
            expecting(EXPR_START),
            "{'[', '{', '(', '.', '-', '!', 'true', 'false', 'null', \
             NUM_FLOAT, NUM_INT, NUM_UINT, STRING, BYTES, IDENTIFIER}"
        );
        assert_eq!(expecting(&["':'"]), "':'");
    }

    #[test]
    fn test_mismatched_at_eof() {
        check_err(
            "1 + ",
            &["1:5: Syntax error: mismatched input '<EOF>' expecting {'[', '{', '(', '.', '-', '!', \
               'true', 'false', 'null', NUM_FLOAT, NUM_INT, NUM_UINT, STRING, BYTES, IDENTIFIER}"],
        );
    }

    #[test]
    fn test_token_recognition_error() {
        let errors = errors_for("1 + $");
        assert_eq!(errors[0], "1:5: Syntax error: token recognition error at: '$'");
        assert!(errors[1].starts_with("1:6: Syntax error: mismatched input '<EOF>' expecting {"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_trailing_input() {
        check_err("a b", &["1:3: Syntax error: extraneous input 'b' expecting <EOF>"]);
        check_err(
            "TestAllTypes(){}",
            &["1:15: Syntax error: mismatched input '{' expecting <EOF>"],
        );
        check_err(
            "1 + 2\n3 +",
            &["2:1: Syntax error: mismatched input '3' expecting <EOF>"],
        );
    }

    #[test]
    fn test_missing_colon() {
        check_err("{a}", &["1:3: Syntax error: mismatched input '}' expecting ':'"]);
        check_err("ind[a{b}]", &["1:8: Syntax error: mismatched input '}' expecting ':'"]);
    }

    #[test]
    fn test_extraneous_token_is_skipped() {
        check_err(
            "{:a}",
            &[
                "1:2: Syntax error: extraneous input ':' expecting {'[', '{', '}', '(', '.', ',', \
                 '-', '!', '?', 'true', 'false', 'null', NUM_FLOAT, NUM_INT, NUM_UINT, STRING, \
                 BYTES, IDENTIFIER}",
                "1:4: Syntax error: mismatched input '}' expecting ':'",
            ],
        );
        check_err(
            "msg{:a}",
            &[
                "1:5: Syntax error: extraneous input ':' expecting {'}', ',', '?', IDENTIFIER}",
                "1:7: Syntax error: mismatched input '}' expecting ':'",
            ],
        );
    }

    #[test]
    fn test_no_viable_alternative() {
        check_err(
            "{\"a\": 1}.\"a\"",
            &["1:10: Syntax error: no viable alternative at input '.\"a\"'"],
        );
    }

    #[test]
    fn test_expression_nesting_limit() {
        let source = format!("{}1{}", "[".repeat(32), "]".repeat(32));
        let mut errors = Errors::new(Source::new(source.as_str()));
        recognize(&source, &mut errors, 32);
        assert_eq!(errors.len(), 1);
        let diagnostic = &errors.diagnostics()[0];
        assert_eq!(diagnostic.kind, ErrorKind::RecursionLimitExceeded);
        assert_eq!(diagnostic.message, "expression recursion limit exceeded: 32");
        assert_eq!(diagnostic.location, cel_ast::Location::NONE);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let source = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let mut errors = Errors::new(Source::new(source.as_str()));
        recognize(&source, &mut errors, 100);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_signed_literals() {
        let source = "-1 - -2.5";
        let mut errors = Errors::new(Source::new(source));
        let cst = recognize(source, &mut errors, 100);
        let NodeKind::Binary { lhs, rhs, .. } = &cst.node(cst.root).kind else {
            panic!("expected binary node");
        };
        assert_eq!(
            cst.node(*lhs).kind,
            NodeKind::Literal(LiteralKind::Int, "-1".into())
        );
        assert_eq!(
            cst.node(*rhs).kind,
            NodeKind::Literal(LiteralKind::Double, "-2.5".into())
        );
    }

    #[test]
    fn test_negation_run_is_greedy() {
        let source = "--1";
        let mut errors = Errors::new(Source::new(source));
        let cst = recognize(source, &mut errors, 100);
        let NodeKind::Negate { ops, operand } = &cst.node(cst.root).kind else {
            panic!("expected negation");
        };
        assert_eq!(ops, &[0, 1]);
        assert_eq!(
            cst.node(*operand).kind,
            NodeKind::Literal(LiteralKind::Int, "1".into())
        );
    }
}
