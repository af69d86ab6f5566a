use cel_ast::operators;
use cel_ast::{Comprehension, Constant, Expr, ExprKind, ACCUMULATOR_VAR};
use smol_str::SmolStr;

use crate::{ExprHelper, Macro, MacroError};

pub const HAS: Macro = Macro::global("has", 1, expand_has);
pub const ALL: Macro = Macro::receiver("all", 2, expand_all);
pub const EXISTS: Macro = Macro::receiver("exists", 2, expand_exists);
pub const EXISTS_ONE: Macro = Macro::receiver("exists_one", 2, expand_exists_one);
pub const EXISTS_ONE_CAMEL: Macro = Macro::receiver("existsOne", 2, expand_exists_one);
pub const MAP: Macro = Macro::receiver("map", 2, expand_map);
pub const MAP_FILTER: Macro = Macro::receiver("map", 3, expand_map);
pub const FILTER: Macro = Macro::receiver("filter", 2, expand_filter);

pub const STANDARD_MACROS: &[Macro] = &[
    HAS,
    ALL,
    EXISTS,
    EXISTS_ONE,
    EXISTS_ONE_CAMEL,
    MAP,
    MAP_FILTER,
    FILTER,
];

#[derive(Clone, Copy)]
enum Quantifier {
    All,
    Exists,
    ExistsOne,
}

// ── Node helpers ──────────────────────────────────────────────────

fn accu(eh: &mut dyn ExprHelper) -> Expr {
    Expr::ident(eh.next_id(), ACCUMULATOR_VAR)
}

fn literal(eh: &mut dyn ExprHelper, value: Constant) -> Expr {
    Expr::constant(eh.next_id(), value)
}

fn call(eh: &mut dyn ExprHelper, function: &str, args: Vec<Expr>) -> Expr {
    Expr::call(eh.next_id(), function, args)
}

fn list(eh: &mut dyn ExprHelper, elements: Vec<Expr>) -> Expr {
    Expr::list(eh.next_id(), elements, Vec::new())
}

fn fold(
    eh: &mut dyn ExprHelper,
    range: Expr,
    iter_var: SmolStr,
    accu_init: Expr,
    loop_condition: Expr,
    loop_step: Expr,
    result: Expr,
) -> Expr {
    Expr::new(
        eh.next_id(),
        ExprKind::Comprehension(Box::new(Comprehension {
            iter_var,
            iter_range: range,
            accu_var: ACCUMULATOR_VAR.into(),
            accu_init,
            loop_condition,
            loop_step,
            result,
        })),
    )
}

/// The iteration variable named by the first argument.
fn iter_var(target: Option<&Expr>, args: &[Expr], not_ident: &str) -> Result<SmolStr, MacroError> {
    let arg = args.first().ok_or_else(|| MacroError {
        message: not_ident.to_string(),
        arg_id: target.map(|t| t.id).unwrap_or_default(),
    })?;
    let name = arg.as_ident().ok_or_else(|| MacroError {
        message: not_ident.to_string(),
        arg_id: arg.id,
    })?;
    if name == ACCUMULATOR_VAR {
        return Err(MacroError {
            message: "iteration variable overwrites accumulator variable".into(),
            arg_id: arg.id,
        });
    }
    Ok(name.clone())
}

fn receiver(target: Option<Expr>, args: &[Expr]) -> Result<Expr, MacroError> {
    target.ok_or_else(|| MacroError {
        message: "macro requires a receiver".into(),
        arg_id: args.first().map(|a| a.id).unwrap_or_default(),
    })
}

// ── Expansions ────────────────────────────────────────────────────

/// `has(m.f)` becomes the presence test `m.f~test-only~`.
fn expand_has(
    eh: &mut dyn ExprHelper,
    _target: Option<Expr>,
    mut args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    let arg = args.pop().ok_or(MacroError {
        message: "invalid argument to has() macro".into(),
        arg_id: 0,
    })?;
    match arg.kind {
        ExprKind::Select { operand, field, .. } => {
            Ok(Expr::select(eh.next_id(), *operand, field, true))
        }
        _ => Err(MacroError {
            message: "invalid argument to has() macro".into(),
            arg_id: arg.id,
        }),
    }
}

fn expand_all(
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    expand_quantifier(Quantifier::All, eh, target, args)
}

fn expand_exists(
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    expand_quantifier(Quantifier::Exists, eh, target, args)
}

fn expand_exists_one(
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    expand_quantifier(Quantifier::ExistsOne, eh, target, args)
}

fn expand_quantifier(
    kind: Quantifier,
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    let var = iter_var(target.as_ref(), &args, "argument must be a simple name")?;
    let range = receiver(target, &args)?;
    let Some(predicate) = args.into_iter().nth(1) else {
        return Err(MacroError {
            message: "argument must be a simple name".into(),
            arg_id: range.id,
        });
    };

    let (init, condition, step, result) = match kind {
        Quantifier::All => {
            let init = literal(eh, Constant::Bool(true));
            let acc = accu(eh);
            let condition = call(eh, operators::NOT_STRICTLY_FALSE, vec![acc]);
            let acc = accu(eh);
            let step = call(eh, operators::LOGICAL_AND, vec![acc, predicate]);
            let result = accu(eh);
            (init, condition, step, result)
        }
        Quantifier::Exists => {
            let init = literal(eh, Constant::Bool(false));
            let acc = accu(eh);
            let not = call(eh, operators::LOGICAL_NOT, vec![acc]);
            let condition = call(eh, operators::NOT_STRICTLY_FALSE, vec![not]);
            let acc = accu(eh);
            let step = call(eh, operators::LOGICAL_OR, vec![acc, predicate]);
            let result = accu(eh);
            (init, condition, step, result)
        }
        Quantifier::ExistsOne => {
            let init = literal(eh, Constant::Int(0));
            let condition = literal(eh, Constant::Bool(true));
            let acc = accu(eh);
            let one = literal(eh, Constant::Int(1));
            let add = call(eh, operators::ADD, vec![acc, one]);
            let acc = accu(eh);
            let step = call(eh, operators::CONDITIONAL, vec![predicate, add, acc]);
            let acc = accu(eh);
            let one = literal(eh, Constant::Int(1));
            let result = call(eh, operators::EQUALS, vec![acc, one]);
            (init, condition, step, result)
        }
    };
    Ok(fold(eh, range, var, init, condition, step, result))
}

/// `r.map(v, t)` and `r.map(v, p, t)`.
fn expand_map(
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    let var = iter_var(target.as_ref(), &args, "argument is not an identifier")?;
    let range = receiver(target, &args)?;
    let mut rest = args.into_iter().skip(1);
    let (filter, transform) = match (rest.next(), rest.next()) {
        (Some(filter), Some(transform)) => (Some(filter), transform),
        (Some(transform), None) => (None, transform),
        _ => {
            return Err(MacroError {
                message: "argument is not an identifier".into(),
                arg_id: range.id,
            })
        }
    };

    let init = list(eh, Vec::new());
    let condition = literal(eh, Constant::Bool(true));
    let acc = accu(eh);
    let appended = list(eh, vec![transform]);
    let mut step = call(eh, operators::ADD, vec![acc, appended]);
    if let Some(filter) = filter {
        let acc = accu(eh);
        step = call(eh, operators::CONDITIONAL, vec![filter, step, acc]);
    }
    let result = accu(eh);
    Ok(fold(eh, range, var, init, condition, step, result))
}

/// `r.filter(v, p)` keeps the elements for which `p` holds.
fn expand_filter(
    eh: &mut dyn ExprHelper,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> Result<Expr, MacroError> {
    let var = iter_var(target.as_ref(), &args, "argument is not an identifier")?;
    let range = receiver(target, &args)?;
    let mut args = args.into_iter();
    let (Some(element), Some(predicate)) = (args.next(), args.next()) else {
        return Err(MacroError {
            message: "argument is not an identifier".into(),
            arg_id: range.id,
        });
    };

    let init = list(eh, Vec::new());
    let condition = literal(eh, Constant::Bool(true));
    let acc = accu(eh);
    let appended = list(eh, vec![element]);
    let step = call(eh, operators::ADD, vec![acc, appended]);
    let acc = accu(eh);
    let step = call(eh, operators::CONDITIONAL, vec![predicate, step, acc]);
    let result = accu(eh);
    Ok(fold(eh, range, var, init, condition, step, result))
}
