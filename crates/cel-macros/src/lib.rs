mod builtins;

use cel_ast::{Expr, ExprId};

pub use builtins::{
    ALL, EXISTS, EXISTS_ONE, EXISTS_ONE_CAMEL, FILTER, HAS, MAP, MAP_FILTER, STANDARD_MACROS,
};

/// A macro argument had the wrong shape. The error is reported at the
/// position of the offending argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroError {
    pub message: String,
    pub arg_id: ExprId,
}

impl std::fmt::Display for MacroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{}] {}", self.arg_id, self.message)
    }
}

/// Id allocation for nodes synthesized by an expansion.
///
/// Implementors record every id at the position of the macro call.
pub trait ExprHelper {
    fn next_id(&mut self) -> ExprId;
}

pub type Expander = fn(&mut dyn ExprHelper, Option<Expr>, Vec<Expr>) -> Result<Expr, MacroError>;

/// A call form rewritten at parse time. Matching is on name, argument
/// count and whether the call has a receiver.
#[derive(Clone, Copy)]
pub struct Macro {
    pub name: &'static str,
    pub arg_count: usize,
    pub receiver_style: bool,
    expander: Expander,
}

impl Macro {
    pub const fn global(name: &'static str, arg_count: usize, expander: Expander) -> Self {
        Self {
            name,
            arg_count,
            receiver_style: false,
            expander,
        }
    }

    pub const fn receiver(name: &'static str, arg_count: usize, expander: Expander) -> Self {
        Self {
            name,
            arg_count,
            receiver_style: true,
            expander,
        }
    }

    /// `name:args:receiver`, unique per macro.
    pub fn key(&self) -> String {
        macro_key(self.name, self.arg_count, self.receiver_style)
    }

    pub fn matches(&self, name: &str, arg_count: usize, receiver_style: bool) -> bool {
        self.name == name && self.arg_count == arg_count && self.receiver_style == receiver_style
    }

    pub fn expand(
        &self,
        helper: &mut dyn ExprHelper,
        target: Option<Expr>,
        args: Vec<Expr>,
    ) -> Result<Expr, MacroError> {
        let expanded = (self.expander)(helper, target, args)?;
        tracing::trace!(name = self.name, args = self.arg_count, id = expanded.id, "expanded macro");
        Ok(expanded)
    }
}

impl std::fmt::Debug for Macro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Macro").field("key", &self.key()).finish()
    }
}

impl PartialEq for Macro {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.name, other.arg_count, other.receiver_style)
    }
}

pub fn macro_key(name: &str, arg_count: usize, receiver_style: bool) -> String {
    format!("{name}:{arg_count}:{receiver_style}")
}

/// Look up a macro for a call of the given shape.
pub fn find_macro<'a>(
    macros: &'a [Macro],
    name: &str,
    arg_count: usize,
    receiver_style: bool,
) -> Option<&'a Macro> {
    macros
        .iter()
        .find(|m| m.matches(name, arg_count, receiver_style))
}
