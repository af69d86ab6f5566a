//! Rendering of a parsed expression back to CEL source text.
//!
//! Parentheses are only emitted where operator precedence needs them, so
//! the output parses back to a tree of the same shape. Comprehensions can
//! only be printed through the macro call recorded for them in
//! [`SourceInfo::macro_calls`]; see [`ParserOptions::populate_macro_calls`].
//!
//! [`ParserOptions::populate_macro_calls`]: crate::ParserOptions::populate_macro_calls

use std::fmt::Write;

use cel_ast::operators::{self, arity, binary_display_name, display_name, precedence};
use cel_ast::{Constant, Entry, EntryKey, Expr, ExprId, ExprKind, ParsedExpr, SourceInfo};
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnparseError {
    #[error("wrap column must be at least 1, got {0}")]
    InvalidWrapColumn(usize),
    #[error("cannot wrap on unsupported operator '{0}'")]
    UnsupportedWrapOperator(SmolStr),
    #[error("cannot wrap on unary operator '{0}'")]
    UnaryWrapOperator(SmolStr),
    #[error("comprehension #{0} has no recorded macro call")]
    Comprehension(ExprId),
    #[error("call to '{function}' at #{id} has the wrong number of arguments")]
    MalformedCall { function: SmolStr, id: ExprId },
}

/// Line wrapping for [`unparse`].
///
/// Once the current line plus an operator reaches `wrap_on_column`
/// characters, a newline is written after that operator (or before it,
/// when `wrap_after_column_limit` is off). Only the operators listed in
/// `operators_to_wrap_on` break lines, `&&` and `||` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparserOptions {
    pub wrap_on_column: usize,
    pub operators_to_wrap_on: Vec<SmolStr>,
    pub wrap_after_column_limit: bool,
}

impl Default for UnparserOptions {
    fn default() -> Self {
        Self {
            wrap_on_column: 80,
            operators_to_wrap_on: vec![
                operators::LOGICAL_AND.into(),
                operators::LOGICAL_OR.into(),
            ],
            wrap_after_column_limit: true,
        }
    }
}

impl UnparserOptions {
    pub fn wrap_on_column(mut self, column: usize) -> Self {
        self.wrap_on_column = column;
        self
    }

    /// Replace the wrapping operators. Takes function names such as
    /// [`operators::ADD`].
    pub fn wrap_on_operators<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.operators_to_wrap_on = functions.into_iter().map(Into::into).collect();
        self
    }

    pub fn wrap_after_column_limit(mut self, after: bool) -> Self {
        self.wrap_after_column_limit = after;
        self
    }

    pub fn validate(&self) -> Result<(), UnparseError> {
        if self.wrap_on_column < 1 {
            return Err(UnparseError::InvalidWrapColumn(self.wrap_on_column));
        }
        for function in &self.operators_to_wrap_on {
            if display_name(function).is_none() && function != operators::CONDITIONAL {
                return Err(UnparseError::UnsupportedWrapOperator(function.clone()));
            }
            if arity(function).unwrap_or_default() < 2 {
                return Err(UnparseError::UnaryWrapOperator(function.clone()));
            }
        }
        Ok(())
    }

    fn wraps_on(&self, function: &str) -> bool {
        self.operators_to_wrap_on.iter().any(|op| op == function)
    }
}

/// Print `parsed` as CEL source.
pub fn unparse(parsed: &ParsedExpr, options: &UnparserOptions) -> Result<String, UnparseError> {
    options.validate()?;
    let mut unparser = Unparser {
        info: &parsed.source_info,
        options,
        out: String::new(),
        last_wrapped: 0,
        expanding: Vec::new(),
    };
    unparser.visit(&parsed.expr)?;
    Ok(unparser.out)
}

struct Unparser<'a> {
    info: &'a SourceInfo,
    options: &'a UnparserOptions,
    out: String,
    /// Length of `out` at the most recent line break.
    last_wrapped: usize,
    /// Expansions currently being printed through their macro call.
    expanding: Vec<ExprId>,
}

impl Unparser<'_> {
    fn visit(&mut self, expr: &Expr) -> Result<(), UnparseError> {
        let info = self.info;
        if let Some(call) = info.macro_call(expr.id) {
            if !self.expanding.contains(&expr.id) {
                self.expanding.push(expr.id);
                let result = self.visit(call);
                self.expanding.pop();
                return result;
            }
        }

        match &expr.kind {
            ExprKind::Const(value) => write_constant(&mut self.out, value),
            ExprKind::Ident(name) => self.out.push_str(name),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                if *test_only {
                    self.out.push_str("has(");
                }
                self.select(operand, ".", field, *test_only)?;
                if *test_only {
                    self.out.push(')');
                }
            }
            ExprKind::Call {
                function,
                target,
                args,
            } => self.call(expr.id, function, target.as_deref(), args)?,
            ExprKind::CreateList {
                elements,
                optional_indices,
            } => {
                self.out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if optional_indices.contains(&i) {
                        self.out.push('?');
                    }
                    self.visit(element)?;
                }
                self.out.push(']');
            }
            ExprKind::CreateStruct {
                message_name,
                entries,
            } => self.create_struct(message_name, entries)?,
            ExprKind::Comprehension(_) => return Err(UnparseError::Comprehension(expr.id)),
        }
        Ok(())
    }

    fn visit_nested(&mut self, expr: &Expr, nested: bool) -> Result<(), UnparseError> {
        if nested {
            self.out.push('(');
        }
        self.visit(expr)?;
        if nested {
            self.out.push(')');
        }
        Ok(())
    }

    fn select(
        &mut self,
        operand: &Expr,
        op: &str,
        field: &str,
        test_only: bool,
    ) -> Result<(), UnparseError> {
        let nested = !test_only && needs_member_parens(operand);
        self.visit_nested(operand, nested)?;
        self.out.push_str(op);
        write_field(&mut self.out, field);
        Ok(())
    }

    fn call(
        &mut self,
        id: ExprId,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Result<(), UnparseError> {
        let malformed = || UnparseError::MalformedCall {
            function: function.into(),
            id,
        };

        match (function, target, args) {
            (operators::CONDITIONAL, None, [cond, then, otherwise]) => {
                for (i, arg) in [cond, then, otherwise].into_iter().enumerate() {
                    match i {
                        1 => self.write_operator(operators::CONDITIONAL, "?"),
                        2 => self.out.push_str(" : "),
                        _ => {}
                    }
                    let nested = is_same_precedence(operators::CONDITIONAL, arg)
                        || is_complex_operator(arg);
                    self.visit_nested(arg, nested)?;
                }
                Ok(())
            }
            (operators::INDEX | operators::OPT_INDEX, None, [operand, index]) => {
                self.visit_nested(operand, needs_member_parens(operand))?;
                self.out.push_str(if function == operators::INDEX { "[" } else { "[?" });
                self.visit(index)?;
                self.out.push(']');
                Ok(())
            }
            (operators::OPT_SELECT, None, [operand, field]) => match &field.kind {
                ExprKind::Const(Constant::String(field)) => {
                    self.select(operand, ".?", field, false)
                }
                _ => Err(malformed()),
            },
            (operators::LOGICAL_NOT | operators::NEGATE, None, [operand]) => {
                self.out.push_str(display_name(function).ok_or_else(malformed)?);
                let nested = is_complex_operator(operand)
                    || is_same_precedence(function, operand)
                    || (function == operators::NEGATE && is_negative_literal(operand));
                self.visit_nested(operand, nested)
            }
            (operators::CONDITIONAL | operators::INDEX | operators::OPT_INDEX, ..)
            | (operators::OPT_SELECT | operators::LOGICAL_NOT | operators::NEGATE, ..) => {
                Err(malformed())
            }
            (_, None, _) if binary_display_name(function).is_some() => {
                let [lhs, rhs] = args else {
                    return Err(malformed());
                };
                let display = binary_display_name(function).ok_or_else(malformed)?;
                let lhs_nested = is_complex_operator_with_respect_to(function, lhs);
                let rhs_nested = is_complex_operator_with_respect_to(function, rhs)
                    || (is_left_recursive(function) && is_same_precedence(function, rhs));
                self.visit_nested(lhs, lhs_nested)?;
                self.write_operator(function, display);
                self.visit_nested(rhs, rhs_nested)
            }
            _ => {
                if let Some(target) = target {
                    self.visit_nested(target, needs_member_parens(target))?;
                    self.out.push('.');
                }
                self.out.push_str(function);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.visit(arg)?;
                }
                self.out.push(')');
                Ok(())
            }
        }
    }

    fn create_struct(&mut self, message_name: &str, entries: &[Entry]) -> Result<(), UnparseError> {
        self.out.push_str(message_name);
        self.out.push('{');
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if entry.optional {
                self.out.push('?');
            }
            match &entry.key {
                EntryKey::Field(name) => write_field(&mut self.out, name),
                EntryKey::Map(key) => self.visit(key)?,
            }
            self.out.push_str(": ");
            self.visit(&entry.value)?;
        }
        self.out.push('}');
        Ok(())
    }

    /// Write ` op ` or break the line around it. The measured width counts
    /// the operator's function name rather than its spelling.
    fn write_operator(&mut self, function: &str, display: &str) {
        let line_length = self.out.len() - self.last_wrapped + function.len();
        if self.options.wraps_on(function) && line_length >= self.options.wrap_on_column {
            self.last_wrapped = self.out.len();
            if self.options.wrap_after_column_limit {
                let _ = writeln!(self.out, " {display}");
            } else {
                let _ = write!(self.out, "\n{display} ");
            }
        } else {
            let _ = write!(self.out, " {display} ");
        }
    }
}

// ── Precedence ────────────────────────────────────────────────────

fn call_function(expr: &Expr) -> Option<(&str, usize)> {
    match &expr.kind {
        ExprKind::Call { function, args, .. } => Some((function.as_str(), args.len())),
        _ => None,
    }
}

/// `&&` and `||` chains are built balanced, every other operator from the
/// left.
fn is_left_recursive(function: &str) -> bool {
    function != operators::LOGICAL_AND && function != operators::LOGICAL_OR
}

fn is_same_precedence(function: &str, expr: &Expr) -> bool {
    call_function(expr).is_some_and(|(inner, _)| precedence(function) == precedence(inner))
}

/// A call taking two or more arguments.
fn is_complex_operator(expr: &Expr) -> bool {
    call_function(expr).is_some_and(|(_, args)| args >= 2)
}

/// A call taking two or more arguments that binds looser than `function`.
fn is_complex_operator_with_respect_to(function: &str, expr: &Expr) -> bool {
    call_function(expr)
        .is_some_and(|(inner, args)| args >= 2 && precedence(function) < precedence(inner))
}

/// Operands of `.`, `[` and receiver calls that bind looser than them.
fn needs_member_parens(expr: &Expr) -> bool {
    is_binary_or_ternary_operator(expr)
        || call_function(expr).is_some_and(|(inner, args)| {
            args == 1 && (inner == operators::LOGICAL_NOT || inner == operators::NEGATE)
        })
}

/// A literal the lexer would read together with a preceding `-`.
fn is_negative_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Const(Constant::Int(i)) => *i < 0,
        ExprKind::Const(Constant::Double(d)) => d.is_sign_negative(),
        _ => false,
    }
}

fn is_binary_or_ternary_operator(expr: &Expr) -> bool {
    call_function(expr).is_some_and(|(inner, args)| {
        args >= 2
            && (binary_display_name(inner).is_some()
                || precedence(inner) == precedence(operators::CONDITIONAL))
    })
}

// ── Literals ──────────────────────────────────────────────────────

fn write_field(out: &mut String, field: &str) {
    let mut chars = field.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && field != "in";
    if simple {
        out.push_str(field);
    } else {
        let _ = write!(out, "`{field}`");
    }
}

fn write_constant(out: &mut String, value: &Constant) {
    match value {
        Constant::Null => out.push_str("null"),
        Constant::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Constant::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Constant::Uint(u) => {
            let _ = write!(out, "{u}u");
        }
        Constant::Double(d) => write_double(out, *d),
        Constant::String(s) => write_string(out, s),
        Constant::Bytes(bytes) => {
            out.push_str("b\"");
            for b in bytes {
                let _ = write!(out, "\\{b:03o}");
            }
            out.push('"');
        }
        Constant::Duration { seconds, nanos } => {
            let sign = if *seconds < 0 || *nanos < 0 { "-" } else { "" };
            let _ = write!(
                out,
                "duration(\"{sign}{}{}s\")",
                seconds.unsigned_abs(),
                fraction(nanos.unsigned_abs())
            );
        }
        Constant::Timestamp { seconds, nanos } => {
            let (year, month, day) = civil_from_days(seconds.div_euclid(86_400));
            let secs = seconds.rem_euclid(86_400);
            let _ = write!(
                out,
                "timestamp(\"{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}{}Z\")",
                secs / 3600,
                secs / 60 % 60,
                secs % 60,
                fraction(nanos.unsigned_abs())
            );
        }
    }
}

fn write_double(out: &mut String, d: f64) {
    if d.is_nan() {
        out.push_str("double(\"NaN\")");
    } else if d.is_infinite() {
        let sign = if d < 0.0 { "-" } else { "" };
        let _ = write!(out, "double(\"{sign}Infinity\")");
    } else if d.fract() == 0.0 {
        let _ = write!(out, "{d}.0");
    } else {
        let _ = write!(out, "{d}");
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Fractional seconds with 0, 3, 6 or 9 digits.
fn fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

/// Proleptic Gregorian date of a day count relative to 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, ParserOptions};
    use cel_ast::adorned::adorned;
    use cel_ast::Source;

    fn parser_options() -> ParserOptions {
        ParserOptions::new(100)
            .enable_optional_syntax(true)
            .populate_macro_calls(true)
    }

    /// The tree with its `^#id` suffixes removed.
    fn shape(expr: &Expr) -> String {
        let text = adorned(expr);
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '^' && chars.peek() == Some(&'#') {
                chars.next();
                while chars.peek().is_some_and(char::is_ascii_digit) {
                    chars.next();
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn check_with(source: &str, options: &UnparserOptions, expected: &str) {
        let (parsed, errors) = parse(source, &parser_options());
        assert!(errors.is_empty(), "unexpected errors for {source:?}:\n{errors}");
        let text = unparse(&parsed, options).unwrap();
        assert_eq!(text, expected, "source: {source:?}");

        let (reparsed, errors) = parse(&text, &parser_options());
        assert!(errors.is_empty(), "output of {source:?} does not parse:\n{errors}");
        assert_eq!(shape(&reparsed.expr), shape(&parsed.expr), "source: {source:?}");
    }

    fn check_ok(source: &str, expected: &str) {
        check_with(source, &UnparserOptions::default(), expected);
    }

    fn check_same(source: &str) {
        check_ok(source, source);
    }

    fn unparse_expr(expr: Expr) -> Result<String, UnparseError> {
        let parsed = ParsedExpr {
            expr,
            source_info: SourceInfo::new(Source::new("")),
        };
        unparse(&parsed, &UnparserOptions::default())
    }

    fn wrapping(column: usize, functions: &[&str]) -> UnparserOptions {
        UnparserOptions::default()
            .wrap_on_column(column)
            .wrap_on_operators(functions.iter().copied())
    }

    // ── Operators ─────────────────────────────────────────────────

    #[test]
    fn test_binary_operators() {
        for source in [
            "a + b - c",
            "a && b && c && d && e",
            "a || b && (c || d) && e",
            "a || b || c || d || e",
            "a * (b / c) % 0",
            "a + b * c",
            "(a + b) * c / (d - e)",
            "a * b / c % 0",
            "1 - (2 == -1)",
            "(1 + 2) * 3",
            "1 + 2 * 3",
            "x != \"a\"",
            "a in b",
            "false && !true || false",
            "false && (!true || false)",
        ] {
            check_same(source);
        }
    }

    #[test]
    fn test_redundant_parentheses_are_dropped() {
        check_ok("a+b-c", "a + b - c");
        check_ok("(false && !true) || false", "false && !true || false");
        check_ok("a + (b + c)", "a + (b + c)");
        check_ok("((a))", "a");
    }

    #[test]
    fn test_unary_operators() {
        check_same("!true");
        check_same("-num");
        check_same("-(1 * 2)");
        check_same("-(1 + 2)");
        check_ok("!!true", "true");
        check_same("-(-1)");
        check_same("-(-x)");
        check_same("!(!a)");
        check_same("-(-2.5)");
    }

    #[test]
    fn test_conditional() {
        check_same("a ? b : c");
        check_same("a ? (c ? d : e) : b");
        check_ok("a ? b : c ? d : e", "a ? b : (c ? d : e)");
        check_ok("a ? b          : c", "a ? b : c");
        check_same("(x > 5) ? (x - 5) : 0");
        check_same("-((x > 5) ? (x - 5) : 0)");
        check_same("-x ? (x - 5) : 0");
        check_same("size(a ? (b ? c : d) : e)");
        check_same("(a1 && a2) ? b : c");
        check_same("a ? (b1 || b2) : (c1 && c2)");
        check_same("(false && !true || false) ? 2 : 3");
        check_same("(x < 5) ? x : 5");
        check_same("(x > 5) ? ((x > 10) ? (x - 10) : 5) : 0");
    }

    #[test]
    fn test_member_access() {
        check_same("a.b.c");
        check_ok("a . b . c", "a.b.c");
        check_same("a[1][\"b\"]");
        check_ok("a[  1  ][\"b\"]", "a[1][\"b\"]");
        check_same("x[\"a\"].single_int32 == 23");
        check_same("a[b][c].name");
        check_same("(a + b).name");
        check_same("(a ? b : c).name");
        check_same("(a ? b : c)[0]");
        check_ok("(a || b ? c : d).e", "((a || b) ? c : d).e");
        check_same("(-x).f");
        check_same("(!a)[0]");
        check_same("(-x).size()");
        check_same("-x.f");
    }

    #[test]
    fn test_calls() {
        check_same("a.hello(\"world\")");
        check_same("zero()");
        check_same("one(\"a\")");
        check_same("and(d, 32u)");
        check_same("max(a, b, 100)");
        check_same("(a ? b : c).method(d)");
        check_same("(a + b).size()");
    }

    // ── Literals ──────────────────────────────────────────────────

    #[test]
    fn test_literals() {
        for source in [
            "[]",
            "[1]",
            "[1, 2, 3]",
            "[1.0, 2.0, 3.0]",
            "[1.1, 2.1, 3.1]",
            "[1u, 2u, 3u]",
            "[1, 2.0, 3u]",
            "[\"hello, world\", \"goodbye, world\", \"sure, why not?\"]",
            "-42.101",
            "false",
            "-405069",
            "null",
            "true",
            "42u",
            "my_ident",
        ] {
            check_same(source);
        }
    }

    #[test]
    fn test_string_escapes() {
        check_same(r#""hello:\t'world'""#);
        check_ok(r#"'say "hi"\n'"#, r#""say \"hi\"\n""#);
        check_ok(r"r'\d+'", r#""\\d+""#);
        check_ok("'\\x01'", r#""\u0001""#);
        check_same("\"é\"");
    }

    #[test]
    fn test_bytes_are_octal_escaped() {
        check_ok("b'ab'", r#"b"\141\142""#);
        check_ok("b'\\xff\\x00'", r#"b"\377\000""#);
        check_ok("b''", r#"b"""#);
    }

    #[test]
    fn test_aggregates() {
        check_same("{}");
        check_same("{a: a, b: a.b, c: a.b.c, a ? b : c: false, a || b: true}");
        check_same("v1alpha1.Expr{}");
        check_same("v1alpha1.Expr{id: 1, call_expr: v1alpha1.Call_Expr{function: \"name\"}}");
    }

    #[test]
    fn test_optional_syntax() {
        check_same("a.?b");
        check_same("a[?b]");
        check_same("[?a, ?b, c]");
        check_same("{?a: b, c: d}");
        check_same("v1alpha1.Expr{?id: id, call_expr: v1alpha1.Call_Expr{function: \"name\"}}");
    }

    #[test]
    fn test_non_finite_doubles() {
        let text = unparse_expr(Expr::constant(1, Constant::Double(f64::NAN))).unwrap();
        assert_eq!(text, "double(\"NaN\")");
        let text = unparse_expr(Expr::constant(1, Constant::Double(f64::NEG_INFINITY))).unwrap();
        assert_eq!(text, "double(\"-Infinity\")");
    }

    #[test]
    fn test_durations_and_timestamps() {
        let duration = |seconds, nanos| {
            unparse_expr(Expr::constant(1, Constant::Duration { seconds, nanos })).unwrap()
        };
        assert_eq!(duration(300, 0), "duration(\"300s\")");
        assert_eq!(duration(1, 500_000_000), "duration(\"1.500s\")");
        assert_eq!(duration(-1, -5_000), "duration(\"-1.000005s\")");

        let timestamp = |seconds, nanos| {
            unparse_expr(Expr::constant(1, Constant::Timestamp { seconds, nanos })).unwrap()
        };
        assert_eq!(timestamp(0, 0), "timestamp(\"1970-01-01T00:00:00Z\")");
        assert_eq!(
            timestamp(951_827_696, 1),
            "timestamp(\"2000-02-29T12:34:56.000000001Z\")"
        );
        assert_eq!(timestamp(-1, 0), "timestamp(\"1969-12-31T23:59:59Z\")");
    }

    #[test]
    fn test_unusual_field_names_are_quoted() {
        let select = |field: &str| {
            unparse_expr(Expr::select(2, Expr::ident(1, "a"), field, false)).unwrap()
        };
        assert_eq!(select("b_2"), "a.b_2");
        assert_eq!(select("in"), "a.`in`");
        assert_eq!(select("content-type"), "a.`content-type`");
    }

    // ── Macros ────────────────────────────────────────────────────

    #[test]
    fn test_has_prints_without_macro_calls() {
        let (parsed, _) = parse("has(hello.world)", &ParserOptions::new(100));
        assert!(parsed.source_info.macro_calls.is_empty());
        let text = unparse(&parsed, &UnparserOptions::default()).unwrap();
        assert_eq!(text, "has(hello.world)");
    }

    #[test]
    fn test_macros_print_from_recorded_calls() {
        check_same("has(hello.world)");
        check_same("a.all(x, x > 0)");
        check_same("[1, 2].exists_one(x, x == 2)");
        check_same("m.map(k, k + 1)");
        check_same("m.map(k, k > 0, k + 1)");
        check_same("m.filter(k, k > 0) == []");
        check_same("has(a.b) && a.b.exists(c, c)");
    }

    #[test]
    fn test_nested_macros() {
        check_same("[1, 2].map(x, x * 2).exists(y, y > 2)");
        check_same("a.all(x, x.exists(y, y == x))");
        check_same("(a + b).all(x, x)");
    }

    #[test]
    fn test_comprehension_needs_macro_call() {
        let (parsed, errors) = parse("a.all(x, x)", &ParserOptions::new(100));
        assert!(errors.is_empty());
        assert_eq!(
            unparse(&parsed, &UnparserOptions::default()),
            Err(UnparseError::Comprehension(parsed.expr.id))
        );
    }

    #[test]
    fn test_malformed_calls_are_errors() {
        let index = Expr::call(2, operators::INDEX, vec![Expr::ident(1, "a")]);
        assert_eq!(
            unparse_expr(index),
            Err(UnparseError::MalformedCall {
                function: operators::INDEX.into(),
                id: 2,
            })
        );
        let select = Expr::call(
            3,
            operators::OPT_SELECT,
            vec![Expr::ident(1, "a"), Expr::ident(2, "b")],
        );
        assert!(matches!(
            unparse_expr(select),
            Err(UnparseError::MalformedCall { id: 3, .. })
        ));
    }

    // ── Wrapping ──────────────────────────────────────────────────

    #[test]
    fn test_short_lines_are_not_wrapped() {
        let source = "a + b + c + d";
        check_with(source, &UnparserOptions::default().wrap_on_column(3), source);
        check_with(source, &wrapping(1000, &[operators::ADD]), source);
        check_with(source, &wrapping(13, &[operators::ADD]), source);
    }

    #[test]
    fn test_wrap_after_operator() {
        check_with("a + b - d * e", &wrapping(3, &[operators::ADD]), "a +\nb - d * e");
        check_with(
            "a * b + c - d * e",
            &wrapping(3, &[operators::ADD, operators::SUBTRACT]),
            "a * b +\nc -\nd * e",
        );
        check_with("a && b", &wrapping(3, &[operators::LOGICAL_AND]), "a &&\nb");
        check_with(
            "a ? b : c ? d : e",
            &wrapping(3, &[operators::CONDITIONAL]),
            "a ?\nb : (c ?\nd : e)",
        );
        check_with(
            "longVariableA && longVariableB && longVariableC",
            &wrapping(3, &[operators::LOGICAL_AND]),
            "longVariableA &&\nlongVariableB &&\nlongVariableC",
        );
    }

    #[test]
    fn test_wrap_every_binary_operator() {
        for (function, op) in [
            (operators::LOGICAL_AND, "&&"),
            (operators::LOGICAL_OR, "||"),
            (operators::EQUALS, "=="),
            (operators::NOT_EQUALS, "!="),
            (operators::GREATER, ">"),
            (operators::GREATER_EQUALS, ">="),
            (operators::LESS, "<"),
            (operators::LESS_EQUALS, "<="),
            (operators::IN, "in"),
            (operators::DIVIDE, "/"),
            (operators::MODULO, "%"),
            (operators::MULTIPLY, "*"),
        ] {
            let source = format!("a {op} b {op} c {op} d {op} e");
            let expected = format!("a {op}\nb {op}\nc {op}\nd {op}\ne");
            check_with(&source, &wrapping(3, &[function]), &expected);
        }
    }

    #[test]
    fn test_wrap_before_operator() {
        let before = |functions: &[&str]| wrapping(3, functions).wrap_after_column_limit(false);
        check_with("a + b - d * e", &before(&[operators::ADD]), "a\n+ b - d * e");
        check_with(
            "a * b + c - d * e",
            &before(&[operators::ADD, operators::SUBTRACT]),
            "a * b\n+ c\n- d * e",
        );
        check_with(
            "longVariableA && longVariableB && longVariableC",
            &before(&[operators::LOGICAL_AND]),
            "longVariableA\n&& longVariableB\n&& longVariableC",
        );
    }

    #[test]
    fn test_wrap_long_input() {
        let source = r#""my-principal-group" in request.auth.claims && request.auth.claims.iat > now - duration("5m")"#;
        check_with(
            source,
            &wrapping(40, &[operators::LOGICAL_AND]),
            "\"my-principal-group\" in request.auth.claims &&\nrequest.auth.claims.iat > now - duration(\"5m\")",
        );
        check_with(
            source,
            &wrapping(40, &[operators::LOGICAL_AND]).wrap_after_column_limit(false),
            "\"my-principal-group\" in request.auth.claims\n&& request.auth.claims.iat > now - duration(\"5m\")",
        );
    }

    #[test]
    fn test_default_operators_wrap() {
        check_with(
            "longVariableA && longVariableB || longVariableC + longVariableD - longVariableE",
            &UnparserOptions::default().wrap_on_column(3),
            "longVariableA &&\nlongVariableB ||\nlongVariableC + longVariableD - longVariableE",
        );
    }

    #[test]
    fn test_wrap_inside_macro_calls() {
        check_with(
            "[1, 2, 3].map(x, x >= 2, x * 4).filter(x, x <= 10)",
            &wrapping(3, &[operators::GREATER_EQUALS, operators::LESS_EQUALS]),
            "[1, 2, 3].map(x, x >=\n2, x * 4).filter(x, x <=\n10)",
        );
    }

    #[test]
    fn test_invalid_options() {
        let (parsed, _) = parse("a", &parser_options());
        let unparse_with = |options: UnparserOptions| unparse(&parsed, &options);

        assert_eq!(
            unparse_with(UnparserOptions::default().wrap_on_column(0)),
            Err(UnparseError::InvalidWrapColumn(0))
        );
        assert_eq!(
            unparse_with(UnparserOptions::default().wrap_on_operators(["bogus"])),
            Err(UnparseError::UnsupportedWrapOperator("bogus".into()))
        );
        assert_eq!(
            unparse_with(UnparserOptions::default().wrap_on_operators([operators::INDEX])),
            Err(UnparseError::UnsupportedWrapOperator(operators::INDEX.into()))
        );
        assert_eq!(
            unparse_with(UnparserOptions::default().wrap_on_operators([operators::NEGATE])),
            Err(UnparseError::UnaryWrapOperator(operators::NEGATE.into()))
        );
        assert_eq!(unparse_with(UnparserOptions::default()), Ok("a".to_string()));
    }
}
