//! Static type checking of parsed expressions against an environment of
//! declarations.
//!
//! [`check`] walks the tree produced by the parser, resolving identifiers,
//! functions and message names through an [`Env`] and unifying types with
//! the operations in [`unify`]. Problems are reported as diagnostics; every
//! node id is typed even when checking fails.

mod checked;
mod checker;
pub mod container;
pub mod decls;
pub mod env;
pub mod error;
pub mod provider;
pub mod stdlib;
pub mod types;
pub mod unify;

use cel_ast::{Errors, ParsedExpr};
use tracing::instrument;

pub use checked::{CheckedExpr, Reference};
pub use container::Container;
pub use decls::{Decl, FunctionDecl, IdentDecl, Overload};
pub use env::Env;
pub use error::{ContainerError, EnvError, InvariantViolation, TypeSyntaxError};
pub use provider::{MessageRegistry, TypeProvider};
pub use types::{parse_type, Primitive, Type, WellKnown};

use checker::TypeChecker;

/// Checker configuration. The nesting limit has no default.
#[derive(Debug, Clone)]
pub struct CheckerOptions {
    pub max_recursion_depth: usize,
    /// Type mixed list and map literals as `dyn` instead of reporting a
    /// mismatch.
    pub heterogeneous_aggregate_literals: bool,
    /// Consider ordering overloads across numeric types, e.g. `1 < 2.0`.
    pub cross_type_numeric_comparisons: bool,
}

impl CheckerOptions {
    pub fn new(max_recursion_depth: usize) -> Self {
        Self {
            max_recursion_depth,
            heterogeneous_aggregate_literals: true,
            cross_type_numeric_comparisons: false,
        }
    }

    pub fn heterogeneous_aggregate_literals(mut self, enabled: bool) -> Self {
        self.heterogeneous_aggregate_literals = enabled;
        self
    }

    pub fn cross_type_numeric_comparisons(mut self, enabled: bool) -> Self {
        self.cross_type_numeric_comparisons = enabled;
        self
    }
}

/// Type check `parsed` against `env`.
///
/// Identifier lookups may declare message types in `env`. Returns `Err` only
/// when the tree itself is malformed; user errors are in the returned
/// [`Errors`].
#[instrument(skip_all, fields(root = parsed.expr.id))]
pub fn check(
    parsed: &ParsedExpr,
    env: &mut Env,
    options: &CheckerOptions,
) -> Result<(CheckedExpr, Errors), InvariantViolation> {
    let mut expr = parsed.expr.clone();
    let mut checker = TypeChecker::new(env, options, &parsed.source_info);
    checker.check_expr(&mut expr);
    checker.finalize();
    if let Some(violation) = checker.violation.take() {
        return Err(violation);
    }
    tracing::debug!(
        typed = checker.types.len(),
        errors = checker.errors.total(),
        "checked expression"
    );

    let checked = CheckedExpr {
        expr,
        source_info: parsed.source_info.clone(),
        type_map: checker.types,
        reference_map: checker.references,
    };
    Ok((checked, checker.errors))
}

#[cfg(test)]
mod tests;
