use cel_ast::{
    operators, Comprehension, Constant, Entry, EntryKey, ErrorKind, Errors, Expr, ExprId,
    ExprKind, SourceInfo,
};
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::checked::Reference;
use crate::decls::{FunctionDecl, IdentDecl};
use crate::env::Env;
use crate::error::InvariantViolation;
use crate::stdlib::is_cross_type_numeric_comparison;
use crate::types::{checked_well_known, format_signature, Type};
use crate::unify::{
    is_assignable, is_assignable_list, is_exact, most_general, substitute, Substitutions,
};
use crate::CheckerOptions;

const SELECT_OPTIONAL_FIELD: &str = "select_optional_field";

pub(crate) struct TypeChecker<'a> {
    env: &'a mut Env,
    options: &'a CheckerOptions,
    source_info: &'a SourceInfo,
    pub(crate) errors: Errors,
    mapping: Substitutions,
    pub(crate) types: IndexMap<ExprId, Type>,
    pub(crate) references: IndexMap<ExprId, Reference>,
    next_var: usize,
    depth: usize,
    pub(crate) violation: Option<InvariantViolation>,
}

impl<'a> TypeChecker<'a> {
    pub(crate) fn new(
        env: &'a mut Env,
        options: &'a CheckerOptions,
        source_info: &'a SourceInfo,
    ) -> Self {
        Self {
            env,
            options,
            source_info,
            errors: Errors::new(source_info.source.clone()),
            mapping: Substitutions::new(),
            types: IndexMap::new(),
            references: IndexMap::new(),
            next_var: 0,
            depth: 0,
            violation: None,
        }
    }

    /// Replace every recorded type by its substitution, turning unbound
    /// type parameters into `dyn`.
    pub(crate) fn finalize(&mut self) {
        for ty in self.types.values_mut() {
            *ty = substitute(&self.mapping, ty, true);
        }
    }

    // ── Bookkeeping ──────────────────────────────────────────────────

    fn fresh_type_var(&mut self) -> Type {
        let var = Type::param(format!("_var{}", self.next_var));
        self.next_var += 1;
        var
    }

    fn set_type(&mut self, id: ExprId, ty: Type) {
        if let Some(previous) = self.types.insert(id, ty) {
            if !is_exact(&previous, &self.types[&id]) {
                tracing::debug!(id, %previous, "expression retyped");
            }
        }
    }

    fn get_type(&mut self, id: ExprId) -> Type {
        match self.types.get(&id) {
            Some(ty) => ty.clone(),
            None => {
                self.violation.get_or_insert(InvariantViolation::MissingType(id));
                Type::Error
            }
        }
    }

    fn set_reference(&mut self, id: ExprId, reference: Reference) {
        self.references.insert(id, reference);
    }

    fn report(&mut self, id: ExprId, kind: ErrorKind, message: impl Into<String>) {
        let location = self.source_info.location(id);
        self.errors.report(id, location, kind, message);
    }

    fn report_undeclared(&mut self, id: ExprId, name: &str) {
        let message = format!(
            "undeclared reference to '{name}' (in container '{}')",
            self.env.container().name()
        );
        self.report(id, ErrorKind::UndeclaredReference, message);
    }

    fn report_mismatch(&mut self, id: ExprId, expected: &Type, actual: &Type) {
        self.report(
            id,
            ErrorKind::TypeMismatch,
            format!("expected type '{expected}' but found '{actual}'"),
        );
    }

    /// Unify into the shared substitutions, keeping them only on success.
    fn assignable(&mut self, t1: &Type, t2: &Type) -> bool {
        match is_assignable(&self.mapping, t1, t2) {
            Some(mapping) => {
                self.mapping = mapping;
                true
            }
            None => false,
        }
    }

    fn assert_type(&mut self, id: ExprId, expected: &Type) {
        let actual = self.get_type(id);
        if !self.assignable(expected, &actual) {
            self.report_mismatch(id, expected, &actual);
        }
    }

    // ── Traversal ────────────────────────────────────────────────────

    pub(crate) fn check_expr(&mut self, e: &mut Expr) {
        if self.depth >= self.options.max_recursion_depth {
            tracing::debug!(
                limit = self.options.max_recursion_depth,
                id = e.id,
                "checker recursion limit exceeded"
            );
            self.errors
                .report_internal(ErrorKind::RecursionLimitExceeded, "max recursion depth exceeded");
            let types = &mut self.types;
            e.for_each_node(&mut |node| {
                types.insert(node.id, Type::Error);
            });
            return;
        }
        self.depth += 1;
        self.visit(e);
        self.depth -= 1;
    }

    fn visit(&mut self, e: &mut Expr) {
        let id = e.id;
        match e.kind {
            ExprKind::Const(ref value) => self.set_type(id, constant_type(value)),
            ExprKind::Ident(ref mut name) => self.check_ident(id, name),
            ExprKind::Select { .. } => self.check_select(id, &mut e.kind),
            ExprKind::Call { .. } => self.check_call(id, &mut e.kind),
            ExprKind::CreateList {
                ref mut elements,
                ref optional_indices,
            } => self.check_list(id, elements, optional_indices),
            ExprKind::CreateStruct {
                ref message_name,
                ref mut entries,
            } if message_name.is_empty() => self.check_map(id, entries),
            ExprKind::CreateStruct {
                ref mut message_name,
                ref mut entries,
            } => self.check_message(id, message_name, entries),
            ExprKind::Comprehension(ref mut comprehension) => {
                self.check_comprehension(id, comprehension)
            }
        }
    }

    fn resolve_ident(&mut self, id: ExprId, decl: &IdentDecl) {
        self.set_type(id, decl.ty.clone());
        self.set_reference(id, Reference::ident(decl));
    }

    fn check_ident(&mut self, id: ExprId, name: &mut SmolStr) {
        match self.env.lookup_ident(name) {
            Some(decl) => {
                self.resolve_ident(id, &decl);
                *name = decl.name;
            }
            None => {
                self.report_undeclared(id, name);
                self.set_type(id, Type::Error);
            }
        }
    }

    fn check_select(&mut self, id: ExprId, kind: &mut ExprKind) {
        // `a.b.c` may name a qualified identifier rather than field accesses
        if let Some(qualified) = qualified_name(kind) {
            if let Some(decl) = self.env.lookup_ident(&qualified) {
                self.resolve_ident(id, &decl);
                *kind = ExprKind::Ident(decl.name);
                return;
            }
        }
        let ExprKind::Select {
            operand,
            field,
            test_only,
        } = kind
        else {
            return;
        };
        self.check_expr(operand);
        let result = self.check_select_field(id, operand.id, field, false);
        let ty = if *test_only {
            Type::BOOL
        } else {
            substitute(&self.mapping, &result, false)
        };
        self.set_type(id, ty);
    }

    /// Type of selecting `field` from the node `operand`. Optional operands
    /// are looked through and make the result optional.
    fn check_select_field(
        &mut self,
        id: ExprId,
        operand: ExprId,
        field: &str,
        optional: bool,
    ) -> Type {
        let operand_ty = self.get_type(operand);
        let operand_ty = substitute(&self.mapping, &operand_ty, false);
        let (target, was_optional) = match operand_ty {
            Type::Optional(inner) => (*inner, true),
            other => (other, false),
        };
        let result = match &target {
            Type::Map(_, value) => value.as_ref().clone(),
            Type::Message(message) => self.lookup_field_type(id, message, field),
            Type::WellKnown(_) => target.clone(),
            Type::Param(_) => {
                self.assignable(&Type::Dyn, &target);
                Type::Dyn
            }
            _ => {
                if !target.is_dyn_or_error() {
                    self.report(
                        id,
                        ErrorKind::FieldSelectionNotSupported,
                        format!("type '{target}' does not support field selection"),
                    );
                }
                Type::Dyn
            }
        };
        if was_optional || optional {
            Type::optional(result)
        } else {
            result
        }
    }

    fn lookup_field_type(&mut self, id: ExprId, message: &str, field: &str) -> Type {
        if let Some(ty) = self.env.lookup_field_type(message, field) {
            return ty;
        }
        if self.env.has_message(message) {
            self.report(id, ErrorKind::UndefinedField, format!("undefined field '{field}'"));
        } else {
            self.report(
                id,
                ErrorKind::UndefinedField,
                format!("unexpected failed resolution of '{message}'"),
            );
        }
        Type::Error
    }

    fn check_call(&mut self, id: ExprId, kind: &mut ExprKind) {
        let ExprKind::Call {
            function,
            target,
            args,
        } = kind
        else {
            return;
        };
        if function.as_str() == operators::OPT_SELECT {
            self.check_opt_select(id, args);
            return;
        }
        for arg in args.iter_mut() {
            self.check_expr(arg);
        }

        if target.is_none() {
            match self.env.lookup_function(function).cloned() {
                Some(decl) => {
                    *function = decl.name.clone();
                    self.resolve_overload(id, &decl, None, args);
                }
                None => {
                    self.report_undeclared(id, function);
                    self.set_type(id, Type::Error);
                }
            }
            return;
        }

        // `a.b.f(x)` is a global call when `a.b.f` names a function
        let namespaced = target
            .as_deref()
            .and_then(|t| qualified_name(&t.kind))
            .and_then(|prefix| self.env.lookup_function(&format!("{prefix}.{function}")).cloned());
        if let Some(decl) = namespaced {
            *function = decl.name.clone();
            *target = None;
            self.resolve_overload(id, &decl, None, args);
            return;
        }

        if let Some(receiver) = target.as_deref_mut() {
            self.check_expr(receiver);
        }
        match self.env.lookup_function(function).cloned() {
            Some(decl) => self.resolve_overload(id, &decl, target.as_deref(), args),
            None => {
                self.report_undeclared(id, function);
                self.set_type(id, Type::Error);
            }
        }
    }

    /// Pick the overloads of `decl` that accept the argument types. The
    /// first match fixes the result type; a later match with a different
    /// result widens it to `dyn`.
    fn resolve_overload(
        &mut self,
        id: ExprId,
        decl: &FunctionDecl,
        target: Option<&Expr>,
        args: &[Expr],
    ) {
        let mut arg_types = Vec::with_capacity(args.len() + 1);
        for e in target.into_iter().chain(args) {
            arg_types.push(self.get_type(e.id));
        }

        let mut result: Option<Type> = None;
        let mut overload_ids = Vec::new();
        for overload in decl.overloads() {
            if overload.is_instance != target.is_some() {
                continue;
            }
            if !self.options.cross_type_numeric_comparisons
                && is_cross_type_numeric_comparison(&overload.id)
            {
                continue;
            }
            let (params, overload_result) = if overload.type_params.is_empty() {
                (overload.params.clone(), overload.result.clone())
            } else {
                let mut fresh = Substitutions::new();
                for name in &overload.type_params {
                    let var = self.fresh_type_var();
                    fresh.insert(name.clone(), var);
                }
                (
                    overload.params.iter().map(|p| substitute(&fresh, p, false)).collect(),
                    substitute(&fresh, &overload.result, false),
                )
            };
            let Some(mapping) = is_assignable_list(&self.mapping, &arg_types, &params) else {
                continue;
            };
            self.mapping = mapping;
            overload_ids.push(overload.id.clone());
            let resolved = substitute(&self.mapping, &overload_result, false);
            result = match result {
                None => Some(resolved),
                Some(current) if !current.is_dyn() && !is_exact(&current, &resolved) => {
                    Some(Type::Dyn)
                }
                current => current,
            };
        }

        match result {
            Some(ty) => {
                tracing::debug!(
                    function = %decl.name,
                    overloads = ?overload_ids,
                    result = %ty,
                    "resolved overload"
                );
                self.set_type(id, ty);
                self.set_reference(id, Reference::function(overload_ids));
            }
            None => {
                let arg_types: Vec<Type> = arg_types
                    .iter()
                    .map(|t| substitute(&self.mapping, t, true))
                    .collect();
                let signature = format_signature(&arg_types, target.is_some());
                self.report(
                    id,
                    ErrorKind::NoMatchingOverload,
                    format!(
                        "found no matching overload for '{}' applied to '{signature}'",
                        decl.name
                    ),
                );
                self.set_type(id, Type::Error);
            }
        }
    }

    fn check_opt_select(&mut self, id: ExprId, args: &mut [Expr]) {
        if args.len() != 2 {
            self.violation
                .get_or_insert(InvariantViolation::OptionalSelectArity {
                    id,
                    found: args.len(),
                });
            for arg in args.iter_mut() {
                self.check_expr(arg);
            }
            self.set_type(id, Type::Error);
            return;
        }
        let field = match &args[1].kind {
            ExprKind::Const(Constant::String(field)) => field.clone(),
            _ => {
                self.report(
                    id,
                    ErrorKind::UnsupportedSyntax,
                    "unsupported optional field selection",
                );
                for arg in args.iter_mut() {
                    self.check_expr(arg);
                }
                self.set_type(id, Type::Error);
                return;
            }
        };
        self.check_expr(&mut args[0]);
        self.set_type(args[1].id, Type::STRING);
        let result = self.check_select_field(id, args[0].id, &field, true);
        let ty = substitute(&self.mapping, &result, false);
        self.set_type(id, ty);
        self.set_reference(id, Reference::function(vec![SELECT_OPTIONAL_FIELD.into()]));
    }

    // ── Aggregates ───────────────────────────────────────────────────

    /// Fold `current` into the running element type of a literal. Sets
    /// `failed` when the types conflict and mixed literals are disallowed.
    fn join_types(
        &mut self,
        id: ExprId,
        previous: Option<Type>,
        current: Type,
        failed: &mut bool,
    ) -> Type {
        let Some(previous) = previous else {
            return current;
        };
        if self.assignable(&previous, &current) {
            return most_general(&previous, &current);
        }
        if self.options.heterogeneous_aggregate_literals {
            return Type::Dyn;
        }
        self.report_mismatch(id, &previous, &current);
        *failed = true;
        Type::Error
    }

    /// The value type of an optional entry, which must itself be optional.
    fn unwrap_optional_entry(&mut self, id: ExprId, ty: Type) -> Type {
        match ty {
            Type::Optional(inner) => *inner,
            other => {
                if !other.is_dyn() {
                    self.report_mismatch(id, &Type::optional(other.clone()), &other);
                }
                other
            }
        }
    }

    fn check_list(&mut self, id: ExprId, elements: &mut [Expr], optional_indices: &[usize]) {
        let mut elem_ty = None;
        let mut failed = false;
        for (i, element) in elements.iter_mut().enumerate() {
            self.check_expr(element);
            let mut ty = self.get_type(element.id);
            if optional_indices.contains(&i) {
                ty = self.unwrap_optional_entry(element.id, ty);
            }
            elem_ty = Some(self.join_types(element.id, elem_ty, ty, &mut failed));
        }
        let ty = if failed {
            Type::Error
        } else {
            let elem_ty = match elem_ty {
                Some(ty) => ty,
                None => self.fresh_type_var(),
            };
            Type::list(elem_ty)
        };
        self.set_type(id, ty);
    }

    fn check_map(&mut self, id: ExprId, entries: &mut [Entry]) {
        let mut key_ty = None;
        let mut value_ty = None;
        let mut failed = false;
        for entry in entries.iter_mut() {
            if let EntryKey::Map(key) = &mut entry.key {
                self.check_expr(key);
                let ty = self.get_type(key.id);
                key_ty = Some(self.join_types(key.id, key_ty, ty, &mut failed));
            }
            self.check_expr(&mut entry.value);
            let mut ty = self.get_type(entry.value.id);
            if entry.optional {
                ty = self.unwrap_optional_entry(entry.value.id, ty);
            }
            value_ty = Some(self.join_types(entry.value.id, value_ty, ty, &mut failed));
        }
        let ty = if failed {
            Type::Error
        } else {
            match (key_ty, value_ty) {
                (Some(k), Some(v)) => Type::map(k, v),
                _ => {
                    let k = self.fresh_type_var();
                    let v = self.fresh_type_var();
                    Type::map(k, v)
                }
            }
        };
        self.set_type(id, ty);
    }

    fn check_message(&mut self, id: ExprId, message_name: &mut SmolStr, entries: &mut [Entry]) {
        let Some(decl) = self.env.lookup_ident(message_name) else {
            self.report_undeclared(id, message_name);
            self.set_type(id, Type::Error);
            for entry in entries.iter_mut() {
                self.check_expr(&mut entry.value);
            }
            return;
        };
        *message_name = decl.name.clone();
        self.set_reference(id, Reference::ident(&decl));

        let (message_ty, type_name) = match &decl.ty {
            Type::Error => (Type::Error, decl.name.clone()),
            Type::Type(Some(inner)) => match inner.as_ref() {
                Type::Message(name) => (inner.as_ref().clone(), name.clone()),
                other => {
                    self.report(
                        id,
                        ErrorKind::NotAMessageType,
                        format!("'{other}' is not a message type"),
                    );
                    (Type::Error, decl.name.clone())
                }
            },
            Type::Message(name) => (decl.ty.clone(), name.clone()),
            _ => {
                self.report(id, ErrorKind::NotAType, format!("'{}' is not a type", decl.name));
                (Type::Error, decl.name.clone())
            }
        };
        let node_ty = checked_well_known(&type_name)
            .filter(|_| !message_ty.is_error())
            .unwrap_or_else(|| message_ty.clone());
        self.set_type(id, node_ty);

        for entry in entries.iter_mut() {
            if let EntryKey::Map(key) = &mut entry.key {
                self.check_expr(key);
            }
            self.check_expr(&mut entry.value);
            let EntryKey::Field(field) = &entry.key else {
                continue;
            };
            let mut value_ty = self.get_type(entry.value.id);
            if entry.optional {
                value_ty = self.unwrap_optional_entry(entry.value.id, value_ty);
            }
            if message_ty.is_error() {
                continue;
            }
            let field_ty = self.lookup_field_type(entry.id, &type_name, field);
            if !self.assignable(&field_ty, &value_ty) {
                self.report(
                    entry.id,
                    ErrorKind::FieldTypeMismatch,
                    format!(
                        "expected type of field '{field}' is '{field_ty}' but provided type is '{value_ty}'"
                    ),
                );
            }
        }
    }

    // ── Comprehensions ───────────────────────────────────────────────

    fn check_comprehension(&mut self, id: ExprId, c: &mut Comprehension) {
        self.check_expr(&mut c.iter_range);
        self.check_expr(&mut c.accu_init);
        let accu_ty = self.get_type(c.accu_init.id);
        let range_ty = self.get_type(c.iter_range.id);
        let range_ty = substitute(&self.mapping, &range_ty, false);
        let var_ty = match &range_ty {
            Type::List(elem) => elem.as_ref().clone(),
            Type::Map(key, _) => key.as_ref().clone(),
            Type::Dyn | Type::Error | Type::Param(_) => {
                self.assignable(&Type::Dyn, &range_ty);
                Type::Dyn
            }
            _ => {
                self.report(
                    c.iter_range.id,
                    ErrorKind::NotAComprehensionRange,
                    format!(
                        "expression of type '{range_ty}' cannot be range of a comprehension \
                         (must be list, map, or dynamic)"
                    ),
                );
                Type::Error
            }
        };

        self.env.enter_scope();
        self.env.bind_local(&c.accu_var, accu_ty.clone());
        self.env.enter_scope();
        self.env.bind_local(&c.iter_var, var_ty);
        self.check_expr(&mut c.loop_condition);
        self.assert_type(c.loop_condition.id, &Type::BOOL);
        self.check_expr(&mut c.loop_step);
        self.assert_type(c.loop_step.id, &accu_ty);
        self.env.exit_scope();
        self.check_expr(&mut c.result);
        self.env.exit_scope();

        let result_ty = self.get_type(c.result.id);
        let ty = substitute(&self.mapping, &result_ty, false);
        self.set_type(id, ty);
    }
}

fn constant_type(value: &Constant) -> Type {
    match value {
        Constant::Null => Type::Null,
        Constant::Bool(_) => Type::BOOL,
        Constant::Int(_) => Type::INT,
        Constant::Uint(_) => Type::UINT,
        Constant::Double(_) => Type::DOUBLE,
        Constant::String(_) => Type::STRING,
        Constant::Bytes(_) => Type::BYTES,
        Constant::Duration { .. } => Type::DURATION,
        Constant::Timestamp { .. } => Type::TIMESTAMP,
    }
}

/// The dotted name spelled by an identifier or a chain of non-test
/// selects ending in one.
fn qualified_name(kind: &ExprKind) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = kind;
    loop {
        match current {
            ExprKind::Ident(name) => {
                segments.push(name.as_str());
                break;
            }
            ExprKind::Select {
                operand,
                field,
                test_only: false,
            } => {
                segments.push(field.as_str());
                current = &operand.kind;
            }
            _ => return None,
        }
    }
    segments.reverse();
    Some(segments.join("."))
}
