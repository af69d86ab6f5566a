//! Internal function names for operators and reserved helpers.

pub const CONDITIONAL: &str = "_?_:_";
pub const LOGICAL_AND: &str = "_&&_";
pub const LOGICAL_OR: &str = "_||_";
pub const LOGICAL_NOT: &str = "!_";
pub const EQUALS: &str = "_==_";
pub const NOT_EQUALS: &str = "_!=_";
pub const LESS: &str = "_<_";
pub const LESS_EQUALS: &str = "_<=_";
pub const GREATER: &str = "_>_";
pub const GREATER_EQUALS: &str = "_>=_";
pub const ADD: &str = "_+_";
pub const SUBTRACT: &str = "_-_";
pub const MULTIPLY: &str = "_*_";
pub const DIVIDE: &str = "_/_";
pub const MODULO: &str = "_%_";
pub const NEGATE: &str = "-_";
pub const INDEX: &str = "_[_]";
pub const OPT_INDEX: &str = "_[?_]";
pub const OPT_SELECT: &str = "_?._";
pub const IN: &str = "@in";
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

/// Map the source spelling of a binary operator to its function name.
pub fn operator_from_text(text: &str) -> Option<&'static str> {
    Some(match text {
        "&&" => LOGICAL_AND,
        "||" => LOGICAL_OR,
        "==" => EQUALS,
        "!=" => NOT_EQUALS,
        "<" => LESS,
        "<=" => LESS_EQUALS,
        ">" => GREATER,
        ">=" => GREATER_EQUALS,
        "+" => ADD,
        "-" => SUBTRACT,
        "*" => MULTIPLY,
        "/" => DIVIDE,
        "%" => MODULO,
        "in" => IN,
        _ => return None,
    })
}

/// Printed spelling, binding strength and arity of each operator.
///
/// Lower precedence binds tighter. The conditional and the index forms
/// have no infix spelling.
const OPERATORS: &[(&str, &str, u8, usize)] = &[
    (CONDITIONAL, "", 8, 3),
    (LOGICAL_OR, "||", 7, 2),
    (LOGICAL_AND, "&&", 6, 2),
    (EQUALS, "==", 5, 2),
    (NOT_EQUALS, "!=", 5, 2),
    (LESS, "<", 5, 2),
    (LESS_EQUALS, "<=", 5, 2),
    (GREATER, ">", 5, 2),
    (GREATER_EQUALS, ">=", 5, 2),
    (IN, "in", 5, 2),
    (ADD, "+", 4, 2),
    (SUBTRACT, "-", 4, 2),
    (MULTIPLY, "*", 3, 2),
    (DIVIDE, "/", 3, 2),
    (MODULO, "%", 3, 2),
    (LOGICAL_NOT, "!", 2, 1),
    (NEGATE, "-", 2, 1),
    (INDEX, "", 1, 2),
    (OPT_INDEX, "", 1, 2),
    (OPT_SELECT, "", 1, 2),
];

fn lookup(function: &str) -> Option<&'static (&'static str, &'static str, u8, usize)> {
    OPERATORS.iter().find(|(name, ..)| *name == function)
}

/// Binding strength of an operator function, 0 for anything else.
pub fn precedence(function: &str) -> u8 {
    lookup(function).map_or(0, |op| op.2)
}

pub fn arity(function: &str) -> Option<usize> {
    lookup(function).map(|op| op.3)
}

/// Source spelling of a prefix or infix operator.
pub fn display_name(function: &str) -> Option<&'static str> {
    lookup(function).map(|op| op.1).filter(|name| !name.is_empty())
}

/// Source spelling of an infix operator.
pub fn binary_display_name(function: &str) -> Option<&'static str> {
    lookup(function)
        .filter(|op| op.3 == 2)
        .and_then(|op| display_name(op.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_table() {
        assert!(precedence(MULTIPLY) < precedence(ADD));
        assert!(precedence(LOGICAL_AND) < precedence(LOGICAL_OR));
        assert_eq!(precedence("size"), 0);
        assert_eq!(arity(CONDITIONAL), Some(3));
        assert_eq!(display_name(NEGATE), Some("-"));
        assert_eq!(binary_display_name(NEGATE), None);
        assert_eq!(binary_display_name(SUBTRACT), Some("-"));
        assert_eq!(binary_display_name(IN), Some("in"));
        assert_eq!(binary_display_name(INDEX), None);
        assert_eq!(display_name(CONDITIONAL), None);
    }

    #[test]
    fn test_spellings_round_trip() {
        for (function, _, _, _) in OPERATORS {
            if let Some(text) = binary_display_name(function) {
                assert_eq!(operator_from_text(text), Some(*function));
            }
        }
    }

    #[test]
    fn test_operator_from_text() {
        assert_eq!(operator_from_text("in"), Some(IN));
        assert_eq!(operator_from_text("<="), Some(LESS_EQUALS));
        assert_eq!(operator_from_text("?"), None);
    }
}
