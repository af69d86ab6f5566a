use cel_ast::ExprId;
use smol_str::SmolStr;
use thiserror::Error;

/// A declaration could not be added to an [`Env`](crate::Env).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("overlapping identifier for name '{0}'")]
    OverlappingIdentifier(SmolStr),
    #[error("overload signature collision in function {function}: {existing} collides with {added}")]
    SignatureCollision {
        function: SmolStr,
        existing: SmolStr,
        added: SmolStr,
    },
    #[error("overload redefinition in function. {function}: {overload} has multiple definitions")]
    Redefinition { function: SmolStr, overload: SmolStr },
    #[error("overlapping macro for name '{name}' with {args} args")]
    OverlappingMacro { name: SmolStr, args: usize },
}

/// An alias or abbreviation was rejected by a [`Container`](crate::Container).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("invalid qualified name: {0}, wanted name of the form 'qualified.name'")]
    InvalidQualifiedName(String),
    #[error("{kind} must be non-empty and simple (not qualified): {kind}={alias}")]
    NotSimple { kind: &'static str, alias: String },
    #[error("qualified name must not begin with a leading '.': {0}")]
    LeadingDot(String),
    #[error("qualified name must be of the form 'qualified.name': {0}")]
    NotQualified(String),
    #[error("{kind} collides with existing reference: name={name}, {kind}={alias}, existing={existing}")]
    CollidesWithReference {
        kind: &'static str,
        name: String,
        alias: String,
        existing: String,
    },
    #[error("{kind} collides with container name: name={name}, {kind}={alias}, container={container}")]
    CollidesWithContainer {
        kind: &'static str,
        name: String,
        alias: String,
        container: String,
    },
}

/// The expression tree broke a structural guarantee of the parser. This is
/// a defect in whatever built the tree, never a problem with user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("no type recorded for expression #{0}")]
    MissingType(ExprId),
    #[error("malformed optional select #{id}: expected 2 arguments, found {found}")]
    OptionalSelectArity { id: ExprId, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid type '{text}' at offset {offset}: {reason}")]
pub struct TypeSyntaxError {
    pub text: String,
    pub offset: usize,
    pub reason: String,
}
