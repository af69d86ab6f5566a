use cel_ast::{Expr, ExprId};
use smol_str::SmolStr;

/// Builds the call tree for a chain of one logical operator.
///
/// Balancing mode splits the chain at its midpoint so `n` terms nest only
/// `log n` deep. Variadic mode emits a single call holding every term.
#[derive(Debug)]
pub struct LogicManager {
    function: SmolStr,
    terms: Vec<Expr>,
    ops: Vec<ExprId>,
    variadic: bool,
}

impl LogicManager {
    pub fn balancing(function: &str, term: Expr) -> Self {
        Self::new(function, term, false)
    }

    pub fn variadic(function: &str, term: Expr) -> Self {
        Self::new(function, term, true)
    }

    fn new(function: &str, term: Expr, variadic: bool) -> Self {
        Self {
            function: function.into(),
            terms: vec![term],
            ops: Vec::new(),
            variadic,
        }
    }

    /// Append `op term`, where `op` is the id allocated at the operator.
    pub fn add_term(&mut self, op: ExprId, term: Expr) {
        self.terms.push(term);
        self.ops.push(op);
    }

    pub fn into_expr(mut self) -> Expr {
        if self.ops.is_empty() {
            return self.terms.swap_remove(0);
        }
        if self.variadic {
            return Expr::call(self.ops[0], self.function, self.terms);
        }
        let hi = self.ops.len() - 1;
        let mut terms: Vec<Option<Expr>> = self.terms.into_iter().map(Some).collect();
        balanced(&self.function, &self.ops, &mut terms, 0, hi)
    }
}

fn balanced(
    function: &SmolStr,
    ops: &[ExprId],
    terms: &mut [Option<Expr>],
    lo: usize,
    hi: usize,
) -> Expr {
    let mid = (lo + hi + 1) / 2;
    let left = if mid == lo {
        take(terms, mid)
    } else {
        balanced(function, ops, terms, lo, mid - 1)
    };
    let right = if mid == hi {
        take(terms, mid + 1)
    } else {
        balanced(function, ops, terms, mid + 1, hi)
    };
    Expr::call(ops[mid], function.clone(), vec![left, right])
}

// Every term is consumed exactly once by the split above.
fn take(terms: &mut [Option<Expr>], idx: usize) -> Expr {
    terms[idx]
        .take()
        .unwrap_or_else(|| Expr::error_placeholder(0))
}
