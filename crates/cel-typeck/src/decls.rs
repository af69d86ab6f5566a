use cel_ast::Constant;
use smol_str::SmolStr;

use crate::error::EnvError;
use crate::types::Type;
use crate::unify::is_assignable_type;

// ── Declarations ─────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Ident(IdentDecl),
    Function(FunctionDecl),
}

impl Decl {
    pub fn name(&self) -> &SmolStr {
        match self {
            Decl::Ident(ident) => &ident.name,
            Decl::Function(function) => &function.name,
        }
    }
}

/// A variable or constant.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentDecl {
    pub name: SmolStr,
    pub ty: Type,
    /// Known value for constants, e.g. enum values
    pub value: Option<Constant>,
}

impl IdentDecl {
    pub fn new(name: impl Into<SmolStr>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Constant) -> Self {
        self.value = Some(value);
        self
    }
}

/// One signature of a function.
///
/// For receiver-style overloads the receiver is the first entry of
/// `params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overload {
    pub id: SmolStr,
    pub params: Vec<Type>,
    pub result: Type,
    pub type_params: Vec<SmolStr>,
    pub is_instance: bool,
}

impl Overload {
    pub fn global(id: impl Into<SmolStr>, params: Vec<Type>, result: Type) -> Self {
        Self {
            id: id.into(),
            params,
            result,
            type_params: Vec::new(),
            is_instance: false,
        }
    }

    pub fn instance(id: impl Into<SmolStr>, params: Vec<Type>, result: Type) -> Self {
        Self {
            is_instance: true,
            ..Self::global(id, params, result)
        }
    }

    pub fn with_type_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.type_params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Number of arguments at the call site, not counting the receiver.
    pub fn arg_count(&self) -> usize {
        if self.is_instance {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    fn signature_equals(&self, other: &Overload) -> bool {
        self.id == other.id
            && self.is_instance == other.is_instance
            && self.params == other.params
            && self.result == other.result
    }

    /// Distinct signatures that could both accept the same arguments.
    fn signature_overlaps(&self, other: &Overload) -> bool {
        self.is_instance == other.is_instance
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| is_assignable_type(a, b) || is_assignable_type(b, a))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: SmolStr,
    overloads: Vec<Overload>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// A declaration whose overloads are validated only once it is added
    /// to an [`Env`](crate::Env).
    pub fn with_overloads(name: impl Into<SmolStr>, overloads: Vec<Overload>) -> Self {
        Self {
            name: name.into(),
            overloads,
        }
    }

    /// Builder form of [`FunctionDecl::add_overload`].
    pub fn overload(mut self, overload: Overload) -> Result<Self, EnvError> {
        self.add_overload(overload)?;
        Ok(self)
    }

    /// Overloads in declaration order.
    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    /// Add a signature. Re-adding an identical signature is a no-op.
    pub fn add_overload(&mut self, overload: Overload) -> Result<(), EnvError> {
        for existing in &self.overloads {
            if existing.id != overload.id && existing.signature_overlaps(&overload) {
                return Err(EnvError::SignatureCollision {
                    function: self.name.clone(),
                    existing: existing.id.clone(),
                    added: overload.id,
                });
            }
            if existing.id == overload.id {
                if existing.signature_equals(&overload) {
                    return Ok(());
                }
                return Err(EnvError::Redefinition {
                    function: self.name.clone(),
                    overload: overload.id,
                });
            }
        }
        self.overloads.push(overload);
        Ok(())
    }

    /// Add every overload of `other`, which must share this name.
    pub fn merge(&mut self, other: FunctionDecl) -> Result<(), EnvError> {
        for overload in other.overloads {
            self.add_overload(overload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_count_skips_receiver() {
        let o = Overload::instance("string_size", vec![Type::STRING], Type::INT);
        assert_eq!(o.arg_count(), 0);
        let o = Overload::global("size_string", vec![Type::STRING], Type::INT);
        assert_eq!(o.arg_count(), 1);
    }

    #[test]
    fn test_identical_overload_is_idempotent() {
        let o = Overload::global("f_int", vec![Type::INT], Type::INT);
        let f = FunctionDecl::new("f")
            .overload(o.clone())
            .and_then(|f| f.overload(o))
            .unwrap();
        assert_eq!(f.overloads().len(), 1);
    }

    #[test]
    fn test_signature_collision() {
        let err = FunctionDecl::new("f")
            .overload(Overload::global("f_dyn", vec![Type::Dyn], Type::INT))
            .and_then(|f| f.overload(Overload::global("f_int", vec![Type::INT], Type::INT)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "overload signature collision in function f: f_dyn collides with f_int"
        );
    }

    #[test]
    fn test_redefinition() {
        let err = FunctionDecl::new("f")
            .overload(Overload::global("f_x", vec![Type::INT], Type::INT))
            .and_then(|f| f.overload(Overload::global("f_x", vec![Type::STRING], Type::INT)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "overload redefinition in function. f: f_x has multiple definitions"
        );
    }

    #[test]
    fn test_call_styles_do_not_overlap() {
        let f = FunctionDecl::new("matches")
            .overload(Overload::global(
                "matches",
                vec![Type::STRING, Type::STRING],
                Type::BOOL,
            ))
            .and_then(|f| {
                f.overload(Overload::instance(
                    "matches_string",
                    vec![Type::STRING, Type::STRING],
                    Type::BOOL,
                ))
            })
            .unwrap();
        assert_eq!(f.overloads().len(), 2);
    }

    #[test]
    fn test_merge() {
        let mut f = FunctionDecl::new("g")
            .overload(Overload::global("g_int", vec![Type::INT], Type::INT))
            .unwrap();
        let other = FunctionDecl::new("g")
            .overload(Overload::global("g_string", vec![Type::STRING], Type::STRING))
            .unwrap();
        f.merge(other).unwrap();
        let ids: Vec<_> = f.overloads().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["g_int", "g_string"]);
    }
}
