use cel_ast::{Constant, Expr, ExprId, SourceInfo};
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::decls::IdentDecl;
use crate::types::Type;

/// What an identifier, message name or call resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum Reference {
    Ident {
        name: SmolStr,
        value: Option<Constant>,
    },
    /// Every overload whose signature accepted the arguments.
    Function { overload_ids: Vec<SmolStr> },
}

impl Reference {
    pub fn ident(decl: &IdentDecl) -> Self {
        Reference::Ident {
            name: decl.name.clone(),
            value: decl.value.clone(),
        }
    }

    pub fn function(overload_ids: Vec<SmolStr>) -> Self {
        Reference::Function { overload_ids }
    }
}

static ERROR: Type = Type::Error;

/// A type-checked expression.
///
/// `expr` has identifier, function and message names rewritten to their
/// resolved, fully qualified forms. Both maps are keyed by node id.
#[derive(Clone, Debug)]
pub struct CheckedExpr {
    pub expr: Expr,
    pub source_info: SourceInfo,
    pub type_map: IndexMap<ExprId, Type>,
    pub reference_map: IndexMap<ExprId, Reference>,
}

impl CheckedExpr {
    pub fn root_type(&self) -> &Type {
        self.type_of(self.expr.id).unwrap_or(&ERROR)
    }

    pub fn type_of(&self, id: ExprId) -> Option<&Type> {
        self.type_map.get(&id)
    }

    pub fn reference(&self, id: ExprId) -> Option<&Reference> {
        self.reference_map.get(&id)
    }
}
