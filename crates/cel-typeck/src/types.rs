use smol_str::SmolStr;
use std::fmt;

use crate::error::TypeSyntaxError;

// ── Types ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int64,
    Uint64,
    Double,
    String,
    Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Any,
    Timestamp,
    Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Accepts and is accepted by everything.
    Dyn,
    Null,
    /// Sentinel for a failed check. Unifies with anything and never widens.
    Error,
    Primitive(Primitive),
    /// Nullable wrapper around a primitive: `wrapper(int)`
    Wrapper(Primitive),
    WellKnown(WellKnown),
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Function {
        result: Box<Type>,
        args: Vec<Type>,
    },
    /// Fully qualified message name
    Message(SmolStr),
    /// Type variable, bound through a substitution map
    Param(SmolStr),
    /// The type of a type value: `type(int)`. `None` is the bare `type`.
    Type(Option<Box<Type>>),
    Abstract {
        name: SmolStr,
        params: Vec<Type>,
    },
    Optional(Box<Type>),
}

impl Type {
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const INT: Type = Type::Primitive(Primitive::Int64);
    pub const UINT: Type = Type::Primitive(Primitive::Uint64);
    pub const DOUBLE: Type = Type::Primitive(Primitive::Double);
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const BYTES: Type = Type::Primitive(Primitive::Bytes);
    pub const ANY: Type = Type::WellKnown(WellKnown::Any);
    pub const TIMESTAMP: Type = Type::WellKnown(WellKnown::Timestamp);
    pub const DURATION: Type = Type::WellKnown(WellKnown::Duration);

    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    pub fn type_of(inner: Type) -> Self {
        Type::Type(Some(Box::new(inner)))
    }

    pub fn param(name: impl Into<SmolStr>) -> Self {
        Type::Param(name.into())
    }

    pub fn message(name: impl Into<SmolStr>) -> Self {
        Type::Message(name.into())
    }

    pub fn function(result: Type, args: Vec<Type>) -> Self {
        Type::Function {
            result: Box::new(result),
            args,
        }
    }

    /// An abstract type. `optional_type` with one parameter is normalized to
    /// [`Type::Optional`].
    pub fn abstract_type(name: impl Into<SmolStr>, mut params: Vec<Type>) -> Self {
        let name = name.into();
        if name == "optional_type" && params.len() == 1 {
            if let Some(inner) = params.pop() {
                return Type::optional(inner);
            }
        }
        Type::Abstract { name, params }
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_dyn_or_error(&self) -> bool {
        matches!(self, Type::Dyn | Type::Error)
    }

    /// Types that accept `null`.
    pub(crate) fn is_nullable(&self) -> bool {
        matches!(
            self,
            Type::Abstract { .. }
                | Type::Optional(_)
                | Type::Message(_)
                | Type::Null
                | Type::WellKnown(_)
                | Type::Wrapper(_)
        )
    }
}

/// Checked type for a protobuf well-known message name.
pub fn checked_well_known(message: &str) -> Option<Type> {
    Some(match message {
        "google.protobuf.BoolValue" => Type::Wrapper(Primitive::Bool),
        "google.protobuf.BytesValue" => Type::Wrapper(Primitive::Bytes),
        "google.protobuf.DoubleValue" | "google.protobuf.FloatValue" => {
            Type::Wrapper(Primitive::Double)
        }
        "google.protobuf.Int64Value" | "google.protobuf.Int32Value" => {
            Type::Wrapper(Primitive::Int64)
        }
        "google.protobuf.UInt64Value" | "google.protobuf.UInt32Value" => {
            Type::Wrapper(Primitive::Uint64)
        }
        "google.protobuf.StringValue" => Type::Wrapper(Primitive::String),
        "google.protobuf.Any" => Type::ANY,
        "google.protobuf.Duration" => Type::DURATION,
        "google.protobuf.Timestamp" => Type::TIMESTAMP,
        "google.protobuf.ListValue" => Type::list(Type::Dyn),
        "google.protobuf.NullValue" => Type::Null,
        "google.protobuf.Struct" => Type::map(Type::STRING, Type::Dyn),
        "google.protobuf.Value" => Type::Dyn,
        _ => return None,
    })
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Primitive::Bool => "bool",
            Primitive::Int64 => "int",
            Primitive::Uint64 => "uint",
            Primitive::Double => "double",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        })
    }
}

impl fmt::Display for WellKnown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WellKnown::Any => "any",
            WellKnown::Timestamp => "timestamp",
            WellKnown::Duration => "duration",
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Dyn => write!(f, "dyn"),
            Type::Null => write!(f, "null"),
            Type::Error => write!(f, "!error!"),
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Wrapper(p) => write!(f, "wrapper({})", p),
            Type::WellKnown(w) => write!(f, "{}", w),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(k, v) => write!(f, "map({}, {})", k, v),
            Type::Function { result, args } => {
                write_args(f, args)?;
                write!(f, " -> {}", result)
            }
            Type::Message(name) | Type::Param(name) => write!(f, "{}", name),
            Type::Type(None) => write!(f, "type"),
            Type::Type(Some(inner)) => write!(f, "type({})", inner),
            Type::Abstract { name, params } => {
                write!(f, "{}", name)?;
                write_args(f, params)
            }
            Type::Optional(inner) => write!(f, "optional_type({})", inner),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Type]) -> fmt::Result {
    write!(f, "(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    write!(f, ")")
}

/// Render a call signature: `(int, string)`, or `list(int).(int)` for a
/// receiver-style call whose first type is the receiver.
pub fn format_signature(args: &[Type], receiver_style: bool) -> String {
    struct Args<'a>(&'a [Type]);
    impl fmt::Display for Args<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_args(f, self.0)
        }
    }
    match args.split_first() {
        Some((target, rest)) if receiver_style => format!("{}.{}", target, Args(rest)),
        _ => Args(args).to_string(),
    }
}

// ── Parsing ──────────────────────────────────────────────────────

/// Parse the textual form produced by `Display`.
///
/// Bare names listed in `type_params` become type parameters; any other
/// unknown name is taken as a message type.
pub fn parse_type(text: &str, type_params: &[SmolStr]) -> Result<Type, TypeSyntaxError> {
    let mut parser = TypeParser {
        text,
        pos: 0,
        type_params,
    };
    let ty = parser.parse()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(ty)
}

struct TypeParser<'a> {
    text: &'a str,
    pos: usize,
    type_params: &'a [SmolStr],
}

impl TypeParser<'_> {
    fn error(&self, reason: &str) -> TypeSyntaxError {
        TypeSyntaxError {
            text: self.text.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.text[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn name(&mut self) -> Result<&str, TypeSyntaxError> {
        self.skip_ws();
        let start = self.pos;
        let len = self.text[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '!'))
            .unwrap_or(self.text.len() - start);
        if len == 0 {
            return Err(self.error("expected a type name"));
        }
        self.pos += len;
        Ok(&self.text[start..start + len])
    }

    fn parse(&mut self) -> Result<Type, TypeSyntaxError> {
        if self.eat('(') {
            let args = self.rest_of_args()?;
            self.skip_ws();
            if !self.text[self.pos..].starts_with("->") {
                return Err(self.error("expected '->'"));
            }
            self.pos += 2;
            let result = self.parse()?;
            return Ok(Type::function(result, args));
        }

        let name = self.name()?.to_string();
        let args = if self.eat('(') {
            Some(self.rest_of_args()?)
        } else {
            None
        };
        let arity = |n: usize, args: Vec<Type>, this: &Self| -> Result<Vec<Type>, TypeSyntaxError> {
            if args.len() == n {
                Ok(args)
            } else {
                Err(this.error(&format!("'{name}' takes {n} parameter(s)")))
            }
        };

        let ty = match (name.as_str(), args) {
            ("bool", None) => Type::BOOL,
            ("int", None) => Type::INT,
            ("uint", None) => Type::UINT,
            ("double", None) => Type::DOUBLE,
            ("string", None) => Type::STRING,
            ("bytes", None) => Type::BYTES,
            ("any", None) => Type::ANY,
            ("timestamp", None) => Type::TIMESTAMP,
            ("duration", None) => Type::DURATION,
            ("null", None) => Type::Null,
            ("dyn", None) => Type::Dyn,
            ("!error!", None) => Type::Error,
            ("type", None) => Type::Type(None),
            ("list", Some(args)) => {
                let mut args = arity(1, args, self)?;
                Type::list(args.remove(0))
            }
            ("map", Some(args)) => {
                let mut args = arity(2, args, self)?;
                let value = args.remove(1);
                Type::map(args.remove(0), value)
            }
            ("type", Some(args)) => {
                let mut args = arity(1, args, self)?;
                Type::type_of(args.remove(0))
            }
            ("optional_type", Some(args)) => {
                let mut args = arity(1, args, self)?;
                Type::optional(args.remove(0))
            }
            ("wrapper", Some(args)) => match arity(1, args, self)?.remove(0) {
                Type::Primitive(p) => Type::Wrapper(p),
                _ => return Err(self.error("wrapper takes a primitive type")),
            },
            (_, Some(args)) => Type::abstract_type(name.clone(), args),
            (_, None) if self.type_params.iter().any(|p| p.as_str() == name) => {
                Type::param(name.clone())
            }
            (_, None) => Type::message(name.clone()),
        };
        Ok(ty)
    }

    /// Comma separated types up to and including the closing paren.
    fn rest_of_args(&mut self) -> Result<Vec<Type>, TypeSyntaxError> {
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse()?);
            if self.eat(')') {
                return Ok(args);
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or ')'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Type::list(Type::INT).to_string(), "list(int)");
        assert_eq!(Type::map(Type::STRING, Type::Dyn).to_string(), "map(string, dyn)");
        assert_eq!(Type::Error.to_string(), "!error!");
        assert_eq!(Type::Wrapper(Primitive::Int64).to_string(), "wrapper(int)");
        assert_eq!(Type::type_of(Type::UINT).to_string(), "type(uint)");
        assert_eq!(Type::optional(Type::param("A")).to_string(), "optional_type(A)");
        assert_eq!(
            Type::function(Type::BOOL, vec![Type::INT, Type::DOUBLE]).to_string(),
            "(int, double) -> bool"
        );
        assert_eq!(
            Type::abstract_type("vector", vec![Type::BYTES]).to_string(),
            "vector(bytes)"
        );
    }

    #[test]
    fn test_signature_format() {
        assert_eq!(format_signature(&[Type::INT, Type::STRING], false), "(int, string)");
        assert_eq!(
            format_signature(&[Type::list(Type::INT), Type::INT], true),
            "list(int).(int)"
        );
        assert_eq!(format_signature(&[], false), "()");
    }

    #[test]
    fn test_abstract_optional_normalized() {
        assert_eq!(
            Type::abstract_type("optional_type", vec![Type::INT]),
            Type::optional(Type::INT)
        );
    }

    #[test]
    fn test_parse_reads_display_form() {
        let params = [SmolStr::new("A")];
        for text in [
            "int",
            "list(string)",
            "map(string, dyn)",
            "optional_type(A)",
            "type(list(int))",
            "wrapper(double)",
            "(int, A) -> bool",
            "my.pkg.Message",
            "vector(A, int)",
        ] {
            let ty = parse_type(text, &params).unwrap();
            assert_eq!(ty.to_string(), text);
        }
        assert_eq!(parse_type("A", &params).unwrap(), Type::param("A"));
        assert_eq!(parse_type("B", &params).unwrap(), Type::message("B"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_type("list(int", &[]).is_err());
        assert!(parse_type("map(int)", &[]).is_err());
        assert!(parse_type("wrapper(list(int))", &[]).is_err());
        assert!(parse_type("int int", &[]).is_err());
        assert!(parse_type("", &[]).is_err());
    }

    #[test]
    fn test_well_known_messages() {
        assert_eq!(
            checked_well_known("google.protobuf.Int32Value"),
            Some(Type::Wrapper(Primitive::Int64))
        );
        assert_eq!(
            checked_well_known("google.protobuf.Struct"),
            Some(Type::map(Type::STRING, Type::Dyn))
        );
        assert_eq!(checked_well_known("my.Message"), None);
    }
}
