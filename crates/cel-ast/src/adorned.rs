//! Compact rendering of an expression tree with every node suffixed by its
//! id, e.g. `_+_(a^#1, 1^#3)^#2`.

use std::fmt::Write;

use crate::{Constant, EntryKey, Expr, ExprKind};

pub fn adorned(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

pub fn constant_text(value: &Constant) -> String {
    match value {
        Constant::Null => "null".to_string(),
        Constant::Bool(b) => b.to_string(),
        Constant::Int(i) => i.to_string(),
        Constant::Uint(u) => format!("{u}u"),
        Constant::Double(d) => format!("{d:?}"),
        Constant::String(s) => format!("{s:?}"),
        Constant::Bytes(bytes) => format!("b\"{}\"", bytes.escape_ascii()),
        Constant::Duration { seconds, nanos } => format!("duration(\"{seconds}.{nanos:09}s\")"),
        Constant::Timestamp { seconds, nanos } => format!("timestamp({seconds}.{nanos:09})"),
    }
}

fn write_list(out: &mut String, exprs: &[Expr]) {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, e);
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Const(value) => out.push_str(&constant_text(value)),
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::Select {
            operand,
            field,
            test_only,
        } => {
            write_expr(out, operand);
            out.push('.');
            out.push_str(field);
            if *test_only {
                out.push_str("~test-only~");
            }
        }
        ExprKind::Call {
            function,
            target,
            args,
        } => {
            if let Some(target) = target {
                write_expr(out, target);
                out.push('.');
            }
            out.push_str(function);
            out.push('(');
            write_list(out, args);
            out.push(')');
        }
        ExprKind::CreateList {
            elements,
            optional_indices,
        } => {
            out.push('[');
            for (i, e) in elements.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if optional_indices.contains(&i) {
                    out.push('?');
                }
                write_expr(out, e);
            }
            out.push(']');
        }
        ExprKind::CreateStruct {
            message_name,
            entries,
        } => {
            out.push_str(message_name);
            out.push('{');
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if entry.optional {
                    out.push('?');
                }
                match &entry.key {
                    EntryKey::Field(name) => out.push_str(name),
                    EntryKey::Map(key) => write_expr(out, key),
                }
                out.push(':');
                write_expr(out, &entry.value);
                let _ = write!(out, "^#{}", entry.id);
            }
            out.push('}');
        }
        ExprKind::Comprehension(c) => {
            out.push_str("__comprehension__(");
            out.push_str(&c.iter_var);
            out.push_str(", ");
            write_expr(out, &c.iter_range);
            out.push_str(", ");
            out.push_str(&c.accu_var);
            out.push_str(", ");
            write_expr(out, &c.accu_init);
            for part in [&c.loop_condition, &c.loop_step, &c.result] {
                out.push_str(", ");
                write_expr(out, part);
            }
            out.push(')');
        }
    }
    let _ = write!(out, "^#{}", expr.id);
}
