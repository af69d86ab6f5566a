use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

use cel_macros::STANDARD_MACROS;

use crate::container::Container;
use crate::decls::{Decl, FunctionDecl, IdentDecl};
use crate::error::EnvError;
use crate::provider::{MessageRegistry, TypeProvider};
use crate::stdlib;
use crate::types::{checked_well_known, Type};

// ── Scopes ───────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
struct Group {
    idents: IndexMap<SmolStr, IdentDecl>,
    functions: IndexMap<SmolStr, FunctionDecl>,
}

/// Nested declaration groups. Inner groups shadow outer ones.
#[derive(Clone, Debug)]
pub struct Scopes {
    groups: Vec<Group>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self {
            groups: vec![Group::default()],
        }
    }
}

impl Scopes {
    pub fn push(&mut self) {
        self.groups.push(Group::default());
    }

    /// Drop the innermost group. The outermost group is never removed.
    pub fn pop(&mut self) {
        if self.groups.len() > 1 {
            self.groups.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    /// Add to the innermost group, replacing any declaration of that name
    /// there. Well-known message types are replaced by their checked types.
    pub fn add_ident(&mut self, decl: IdentDecl) {
        let decl = sanitize(decl);
        if let Some(group) = self.groups.last_mut() {
            group.idents.insert(decl.name.clone(), decl);
        }
    }

    fn add_global_ident(&mut self, decl: IdentDecl) {
        let decl = sanitize(decl);
        if let Some(group) = self.groups.first_mut() {
            group.idents.insert(decl.name.clone(), decl);
        }
    }

    pub fn find_ident(&self, name: &str) -> Option<&IdentDecl> {
        self.groups.iter().rev().find_map(|g| g.idents.get(name))
    }

    pub fn find_ident_in_scope(&self, name: &str) -> Option<&IdentDecl> {
        self.groups.last()?.idents.get(name)
    }

    pub fn set_function(&mut self, decl: FunctionDecl) {
        if let Some(group) = self.groups.last_mut() {
            group.functions.insert(decl.name.clone(), decl);
        }
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.groups.iter().rev().find_map(|g| g.functions.get(name))
    }
}

fn sanitize(mut decl: IdentDecl) -> IdentDecl {
    if let Type::Message(name) = &decl.ty {
        if let Some(checked) = checked_well_known(name) {
            decl.ty = checked;
        }
    }
    decl
}

// ── Environment ──────────────────────────────────────────────────

/// Declarations, container and type provider used by the checker.
///
/// Identifier lookups that resolve to a message type through the provider
/// are memoized as global declarations, so a check needs the `Env`
/// mutably. Share the provider across environments, not the `Env`.
#[derive(Clone)]
pub struct Env {
    container: Container,
    provider: Arc<dyn TypeProvider>,
    scopes: Scopes,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("container", &self.container)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new(Container::default(), Arc::new(MessageRegistry::new()))
    }
}

impl Env {
    /// An environment with no declarations.
    pub fn new(container: Container, provider: Arc<dyn TypeProvider>) -> Self {
        Self {
            container,
            provider,
            scopes: Scopes::default(),
        }
    }

    /// An environment holding the standard declarations.
    pub fn standard(container: Container, provider: Arc<dyn TypeProvider>) -> Result<Self, EnvError> {
        let mut env = Self::new(container, provider);
        env.add_decls(stdlib::declarations())?;
        Ok(env)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn provider(&self) -> &dyn TypeProvider {
        self.provider.as_ref()
    }

    pub fn add_decls(&mut self, decls: impl IntoIterator<Item = Decl>) -> Result<(), EnvError> {
        for decl in decls {
            match decl {
                Decl::Ident(ident) => self.add_ident(ident)?,
                Decl::Function(function) => self.add_function(function)?,
            }
        }
        Ok(())
    }

    /// Declare an identifier in the innermost scope. Redeclaring an
    /// identical declaration is accepted.
    pub fn add_ident(&mut self, decl: IdentDecl) -> Result<(), EnvError> {
        if let Some(current) = self.scopes.find_ident_in_scope(&decl.name) {
            if *current == sanitize(decl.clone()) {
                return Ok(());
            }
            return Err(EnvError::OverlappingIdentifier(decl.name));
        }
        self.scopes.add_ident(decl);
        Ok(())
    }

    /// Declare a function, merging with any existing overloads of the same
    /// name.
    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<(), EnvError> {
        let mut merged = self
            .scopes
            .find_function(&decl.name)
            .cloned()
            .unwrap_or_else(|| FunctionDecl::new(decl.name.clone()));
        merged.merge(decl)?;
        for overload in merged.overloads() {
            let shadows_macro = STANDARD_MACROS.iter().any(|m| {
                m.matches(&merged.name, overload.arg_count(), overload.is_instance)
            });
            if shadows_macro {
                return Err(EnvError::OverlappingMacro {
                    name: merged.name.clone(),
                    args: overload.arg_count(),
                });
            }
        }
        self.scopes.set_function(merged);
        Ok(())
    }

    /// Resolve an identifier through the container.
    ///
    /// A candidate naming a message known to the provider is declared as a
    /// global `type(Message)` identifier on first use.
    pub fn lookup_ident(&mut self, name: &str) -> Option<IdentDecl> {
        for candidate in self.container.resolve_candidate_names(name) {
            if let Some(ident) = self.scopes.find_ident(&candidate) {
                return Some(ident.clone());
            }
            if let Some(ty) = self.provider.find_type(&candidate) {
                tracing::debug!(name = %candidate, "memoized message type identifier");
                let decl = IdentDecl::new(candidate, ty);
                self.scopes.add_global_ident(decl.clone());
                return Some(decl);
            }
        }
        None
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.container
            .resolve_candidate_names(name)
            .iter()
            .find_map(|candidate| self.scopes.find_function(candidate))
    }

    pub fn lookup_field_type(&self, message: &str, field: &str) -> Option<Type> {
        self.provider.find_field_type(message, field)
    }

    pub fn has_message(&self, name: &str) -> bool {
        self.provider.has_message(name)
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push();
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a local, shadowing any outer declaration of the same name.
    pub(crate) fn bind_local(&mut self, name: &str, ty: Type) {
        self.scopes.add_ident(IdentDecl::new(name, ty));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::Overload;
    use crate::types::Primitive;

    fn registry() -> Arc<dyn TypeProvider> {
        let mut registry = MessageRegistry::new();
        registry.add_message("acme.v1.Order", [("id", Type::INT)]);
        Arc::new(registry)
    }

    #[test]
    fn test_add_ident_overlap() {
        let mut env = Env::default();
        env.add_ident(IdentDecl::new("x", Type::INT)).unwrap();
        env.add_ident(IdentDecl::new("x", Type::INT)).unwrap();
        assert_eq!(
            env.add_ident(IdentDecl::new("x", Type::STRING)),
            Err(EnvError::OverlappingIdentifier("x".into()))
        );
    }

    #[test]
    fn test_well_known_idents_are_sanitized() {
        let mut env = Env::default();
        env.add_ident(IdentDecl::new("w", Type::message("google.protobuf.Int64Value")))
            .unwrap();
        assert_eq!(
            env.lookup_ident("w").map(|d| d.ty),
            Some(Type::Wrapper(Primitive::Int64))
        );
    }

    #[test]
    fn test_lookup_through_container() {
        let mut env = Env::new(Container::new("acme.v1"), registry());
        env.add_ident(IdentDecl::new("acme.limit", Type::INT)).unwrap();
        let decl = env.lookup_ident("limit").unwrap();
        assert_eq!(decl.name, "acme.limit");
        assert!(env.lookup_ident("missing").is_none());
    }

    #[test]
    fn test_message_identifiers_are_memoized() {
        let mut env = Env::new(Container::new("acme.v1"), registry());
        assert!(env.scopes.find_ident("acme.v1.Order").is_none());
        let decl = env.lookup_ident("Order").unwrap();
        assert_eq!(decl.ty, Type::type_of(Type::message("acme.v1.Order")));
        assert!(env.scopes.find_ident("acme.v1.Order").is_some());
    }

    #[test]
    fn test_scopes_shadow_and_unwind() {
        let mut env = Env::default();
        env.add_ident(IdentDecl::new("x", Type::INT)).unwrap();
        env.enter_scope();
        env.bind_local("x", Type::STRING);
        assert_eq!(env.lookup_ident("x").map(|d| d.ty), Some(Type::STRING));
        env.exit_scope();
        assert_eq!(env.lookup_ident("x").map(|d| d.ty), Some(Type::INT));
        env.exit_scope();
        assert_eq!(env.scopes.depth(), 1);
    }

    #[test]
    fn test_functions_merge() {
        let mut env = Env::default();
        let f = |id: &str, t: Type| {
            FunctionDecl::new("f")
                .overload(Overload::global(id, vec![t.clone()], t))
                .unwrap()
        };
        env.add_function(f("f_int", Type::INT)).unwrap();
        env.add_function(f("f_string", Type::STRING)).unwrap();
        assert_eq!(env.lookup_function("f").map(|d| d.overloads().len()), Some(2));
        assert!(env.add_function(f("f_dyn", Type::Dyn)).is_err());
    }

    #[test]
    fn test_macro_overlap() {
        let mut env = Env::default();
        let decl = FunctionDecl::new("has")
            .overload(Overload::global("has_dyn", vec![Type::Dyn], Type::BOOL))
            .unwrap();
        assert_eq!(
            env.add_function(decl).unwrap_err().to_string(),
            "overlapping macro for name 'has' with 1 args"
        );
        let decl = FunctionDecl::new("all")
            .overload(Overload::global("all_two", vec![Type::Dyn, Type::Dyn], Type::BOOL))
            .unwrap();
        env.add_function(decl).unwrap();
    }

    #[test]
    fn test_standard_env_builds() {
        let mut env = Env::standard(Container::default(), registry()).unwrap();
        assert!(env.lookup_function("_+_").is_some());
        assert_eq!(
            env.lookup_ident("int").map(|d| d.ty),
            Some(Type::type_of(Type::INT))
        );
    }
}
