mod builder;
pub mod cst;
mod grammar;
mod helper;
mod logic;
pub mod unparser;

use cel_ast::{Errors, ParsedExpr, Source, SourceInfo};
use cel_macros::{Macro, STANDARD_MACROS};
use tracing::instrument;

pub use grammar::recognize;
pub use logic::LogicManager;
pub use unparser::{unparse, UnparseError, UnparserOptions};

use builder::AstBuilder;

/// Parser configuration. The nesting limit has no default.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub max_recursion_depth: usize,
    /// Accept `.?field`, `[?index]` and `?` entries in aggregate literals.
    pub enable_optional_syntax: bool,
    /// Keep `!!x` and `--x` as nested calls instead of cancelling pairs.
    pub retain_repeated_unary_operators: bool,
    /// Record the call each macro expansion replaced in
    /// [`SourceInfo::macro_calls`].
    pub populate_macro_calls: bool,
    pub macros: Vec<Macro>,
}

impl ParserOptions {
    pub fn new(max_recursion_depth: usize) -> Self {
        Self {
            max_recursion_depth,
            enable_optional_syntax: false,
            retain_repeated_unary_operators: false,
            populate_macro_calls: false,
            macros: STANDARD_MACROS.to_vec(),
        }
    }

    pub fn enable_optional_syntax(mut self, enabled: bool) -> Self {
        self.enable_optional_syntax = enabled;
        self
    }

    pub fn retain_repeated_unary_operators(mut self, retain: bool) -> Self {
        self.retain_repeated_unary_operators = retain;
        self
    }

    pub fn populate_macro_calls(mut self, populate: bool) -> Self {
        self.populate_macro_calls = populate;
        self
    }

    pub fn macros(mut self, macros: impl Into<Vec<Macro>>) -> Self {
        self.macros = macros.into();
        self
    }
}

/// Parse `source` into an expression tree with source positions.
///
/// Parsing always produces a tree; problems are reported through the
/// returned [`Errors`] and leave `<<error>>` placeholders behind.
pub fn parse(source: &str, options: &ParserOptions) -> (ParsedExpr, Errors) {
    parse_source(Source::new(source), options)
}

#[instrument(skip_all, fields(source = source.description(), len = source.content().len()))]
pub fn parse_source(source: Source, options: &ParserOptions) -> (ParsedExpr, Errors) {
    let mut errors = Errors::new(source.clone());
    let cst = recognize(source.content(), &mut errors, options.max_recursion_depth);
    let mut source_info = SourceInfo::new(source);
    let expr = AstBuilder::new(&cst, options, &mut errors).build(&mut source_info);
    tracing::debug!(root = expr.id, errors = errors.total(), "parsed expression");
    (ParsedExpr { expr, source_info }, errors)
}
