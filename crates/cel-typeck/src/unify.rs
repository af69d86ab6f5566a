//! Substitution, assignability and generalization over [`Type`] values.
//!
//! Type parameters are bound through a [`Substitutions`] map keyed by
//! parameter name. Every operation here is pure: assignability returns a new
//! map on success and leaves the input untouched on failure.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::types::{checked_well_known, Type};

pub type Substitutions = IndexMap<SmolStr, Type>;

// ── Substitution ─────────────────────────────────────────────────

/// Replace bound type parameters, recursively. Unbound parameters become
/// `Dyn` when `unbound_to_dyn` is set and are kept otherwise.
pub fn substitute(mapping: &Substitutions, ty: &Type, unbound_to_dyn: bool) -> Type {
    let sub = |t: &Type| substitute(mapping, t, unbound_to_dyn);
    match ty {
        Type::Param(name) => match mapping.get(name) {
            Some(bound) => sub(bound),
            None if unbound_to_dyn => Type::Dyn,
            None => ty.clone(),
        },
        Type::List(elem) => Type::list(sub(elem.as_ref())),
        Type::Map(k, v) => Type::map(sub(k.as_ref()), sub(v.as_ref())),
        Type::Function { result, args } => {
            Type::function(sub(result.as_ref()), args.iter().map(sub).collect())
        }
        Type::Abstract { name, params } => Type::Abstract {
            name: name.clone(),
            params: params.iter().map(sub).collect(),
        },
        Type::Optional(inner) => Type::optional(sub(inner.as_ref())),
        Type::Type(Some(inner)) => Type::type_of(sub(inner.as_ref())),
        _ => ty.clone(),
    }
}

// ── Equality ─────────────────────────────────────────────────────

/// Structural equality. Type parameters match only by name and are never
/// looked up in a substitution map.
pub fn is_exact(t1: &Type, t2: &Type) -> bool {
    match (t1, t2) {
        (Type::List(e1), Type::List(e2)) | (Type::Optional(e1), Type::Optional(e2)) => {
            is_exact(e1, e2)
        }
        (Type::Map(k1, v1), Type::Map(k2, v2)) => is_exact(k1, k2) && is_exact(v1, v2),
        (
            Type::Function { result: r1, args: a1 },
            Type::Function { result: r2, args: a2 },
        ) => is_exact(r1, r2) && is_exact_list(a1, a2),
        (
            Type::Abstract { name: n1, params: p1 },
            Type::Abstract { name: n2, params: p2 },
        ) => n1 == n2 && is_exact_list(p1, p2),
        (Type::Type(Some(i1)), Type::Type(Some(i2))) => is_exact(i1, i2),
        (Type::Type(None), Type::Type(None)) => true,
        (Type::Primitive(p1), Type::Primitive(p2)) | (Type::Wrapper(p1), Type::Wrapper(p2)) => {
            p1 == p2
        }
        (Type::WellKnown(w1), Type::WellKnown(w2)) => w1 == w2,
        (Type::Message(n1), Type::Message(n2)) | (Type::Param(n1), Type::Param(n2)) => n1 == n2,
        (Type::Dyn, Type::Dyn) | (Type::Null, Type::Null) | (Type::Error, Type::Error) => true,
        _ => false,
    }
}

pub fn is_exact_list(l1: &[Type], l2: &[Type]) -> bool {
    l1.len() == l2.len() && l1.iter().zip(l2).all(|(a, b)| is_exact(a, b))
}

/// Whether `t1` is `Dyn`, a type parameter, or matches `t2` with some of
/// its positions replaced by those.
pub fn is_equal_or_less_specific(t1: &Type, t2: &Type) -> bool {
    if matches!(t1, Type::Dyn | Type::Param(_)) {
        return true;
    }
    if matches!(t2, Type::Dyn | Type::Param(_)) {
        return false;
    }
    fn all(a: &[Type], b: &[Type]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| is_equal_or_less_specific(x, y))
    }
    match (t1, t2) {
        (
            Type::Abstract { name: n1, params: p1 },
            Type::Abstract { name: n2, params: p2 },
        ) => n1 == n2 && all(p1, p2),
        (
            Type::Function { result: r1, args: a1 },
            Type::Function { result: r2, args: a2 },
        ) => is_equal_or_less_specific(r1, r2) && all(a1, a2),
        (Type::List(e1), Type::List(e2)) | (Type::Optional(e1), Type::Optional(e2)) => {
            is_equal_or_less_specific(e1, e2)
        }
        (Type::Map(k1, v1), Type::Map(k2, v2)) => {
            is_equal_or_less_specific(k1, k2) && is_equal_or_less_specific(v1, v2)
        }
        (Type::Type(_), Type::Type(_)) => true,
        _ => t1 == t2,
    }
}

/// The more general of two types already known to unify.
pub fn most_general(t1: &Type, t2: &Type) -> Type {
    if is_equal_or_less_specific(t1, t2) {
        t1.clone()
    } else {
        t2.clone()
    }
}

// ── Assignability ────────────────────────────────────────────────

/// Unify `t1` with `t2`, returning the extended substitutions on success.
///
/// `Dyn` and `Error` on either side always succeed. An unbound parameter is
/// bound to the other side; a bound one must accept it and is generalized
/// toward the less specific of the two.
pub fn is_assignable(mapping: &Substitutions, t1: &Type, t2: &Type) -> Option<Substitutions> {
    let mut copy = mapping.clone();
    assignable(&mut copy, t1, t2).then_some(copy)
}

/// Pairwise [`is_assignable`] over two lists of equal length.
pub fn is_assignable_list(
    mapping: &Substitutions,
    l1: &[Type],
    l2: &[Type],
) -> Option<Substitutions> {
    let mut copy = mapping.clone();
    assignable_list(&mut copy, l1, l2).then_some(copy)
}

fn assignable(m: &mut Substitutions, t1: &Type, t2: &Type) -> bool {
    if t1 == t2 {
        return true;
    }

    if let Type::Param(name) = t2 {
        if let Some(bound) = m.get(name).cloned() {
            if !assignable(m, t1, &bound) {
                return false;
            }
            rebind(m, name, t2, most_general(t1, &bound));
            return true;
        }
        if not_referenced_in(m, t2, t1) {
            m.insert(name.clone(), t1.clone());
            return true;
        }
    }
    if let Type::Param(name) = t1 {
        if let Some(bound) = m.get(name).cloned() {
            if !assignable(m, &bound, t2) {
                return false;
            }
            rebind(m, name, t1, most_general(&bound, t2));
            return true;
        }
        if not_referenced_in(m, t1, t2) {
            m.insert(name.clone(), t2.clone());
            return true;
        }
    }

    if t1.is_dyn_or_error() || t2.is_dyn_or_error() {
        return true;
    }

    match (t1, t2) {
        (Type::Null, _) => t2.is_nullable(),
        (_, Type::Null) => t1.is_nullable(),
        (Type::Primitive(p), Type::Primitive(q) | Type::Wrapper(q)) => p == q,
        (Type::Primitive(_), _) => false,
        (Type::Wrapper(p), _) => assignable(m, &Type::Primitive(*p), t2),
        (
            Type::Abstract { name: n1, params: p1 },
            Type::Abstract { name: n2, params: p2 },
        ) => n1 == n2 && assignable_list(m, p1, p2),
        (
            Type::Function { result: r1, args: a1 },
            Type::Function { result: r2, args: a2 },
        ) => assignable_list(m, a1, a2) && assignable(m, r1, r2),
        (Type::List(e1), Type::List(e2)) | (Type::Optional(e1), Type::Optional(e2)) => {
            assignable(m, e1, e2)
        }
        (Type::Map(k1, v1), Type::Map(k2, v2)) => assignable(m, k1, k2) && assignable(m, v1, v2),
        (Type::Message(a), Type::Message(b)) => a == b,
        (Type::WellKnown(a), Type::WellKnown(b)) => a == b,
        // Parameterization of a type value never affects assignability.
        (Type::Type(_), Type::Type(_)) => true,
        _ => false,
    }
}

fn assignable_list(m: &mut Substitutions, l1: &[Type], l2: &[Type]) -> bool {
    l1.len() == l2.len() && l1.iter().zip(l2).all(|(a, b)| assignable(m, a, b))
}

/// Update a binding unless the new value would make the map cyclic.
fn rebind(m: &mut Substitutions, name: &SmolStr, param: &Type, ty: Type) {
    if not_referenced_in(m, param, &ty) {
        m.insert(name.clone(), ty);
    }
}

/// The occurs check: whether `param` appears in `within`, directly or
/// through the bindings in `m`.
pub fn not_referenced_in(m: &Substitutions, param: &Type, within: &Type) -> bool {
    if param == within {
        return false;
    }
    match within {
        Type::Param(name) => match m.get(name) {
            Some(bound) => not_referenced_in(m, param, bound),
            None => true,
        },
        Type::Abstract { params, .. } => params.iter().all(|p| not_referenced_in(m, param, p)),
        Type::Function { result, args } => {
            not_referenced_in(m, param, result) && args.iter().all(|a| not_referenced_in(m, param, a))
        }
        Type::List(inner) | Type::Optional(inner) => not_referenced_in(m, param, inner),
        Type::Type(Some(inner)) => not_referenced_in(m, param, inner),
        Type::Map(k, v) => not_referenced_in(m, param, k) && not_referenced_in(m, param, v),
        _ => true,
    }
}

// ── Declaration overlap ──────────────────────────────────────────

/// Declaration-time assignability, without substitutions: whether a value
/// of type `from` could be passed where `current` is declared. Type
/// parameters in `current` accept anything.
pub fn is_assignable_type(current: &Type, from: &Type) -> bool {
    if current == from {
        return true;
    }
    match current {
        Type::Dyn | Type::Param(_) | Type::Error => true,
        Type::Primitive(_) | Type::Wrapper(_) | Type::WellKnown(_) | Type::Null => current == from,
        Type::Message(name) => match checked_well_known(name) {
            Some(checked) => is_assignable_type(&checked, from),
            None => current == from,
        },
        Type::Type(_) => matches!(from, Type::Type(_)),
        Type::Abstract { name, params } => match from {
            Type::Abstract {
                name: other,
                params: other_params,
            } => {
                name == other
                    && params.len() == other_params.len()
                    && params
                        .iter()
                        .zip(other_params)
                        .all(|(a, b)| is_assignable_type(a, b))
            }
            _ => false,
        },
        Type::Optional(inner) => match from {
            Type::Optional(other) => is_assignable_type(inner, other),
            _ => false,
        },
        Type::List(elem) => match from {
            Type::List(other) => is_assignable_type(elem, other),
            _ => false,
        },
        Type::Map(k, v) => match from {
            Type::Map(ok, ov) => is_assignable_type(k, ok) && is_assignable_type(v, ov),
            _ => false,
        },
        Type::Function { .. } => true,
    }
}
