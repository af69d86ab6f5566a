//! Standard identifiers and functions.

use cel_ast::operators;

use crate::decls::{Decl, FunctionDecl, IdentDecl, Overload};
use crate::types::Type;

const ORDERING: [(&str, &str); 4] = [
    (operators::LESS, "less"),
    (operators::LESS_EQUALS, "less_equals"),
    (operators::GREATER, "greater"),
    (operators::GREATER_EQUALS, "greater_equals"),
];

static CROSS_NUMERIC: [(&str, Type, Type); 6] = [
    ("int64_double", Type::INT, Type::DOUBLE),
    ("int64_uint64", Type::INT, Type::UINT),
    ("uint64_double", Type::UINT, Type::DOUBLE),
    ("uint64_int64", Type::UINT, Type::INT),
    ("double_int64", Type::DOUBLE, Type::INT),
    ("double_uint64", Type::DOUBLE, Type::UINT),
];

/// Whether `overload_id` is one of the ordering overloads that compare two
/// different numeric types, e.g. `less_int64_double`.
pub fn is_cross_type_numeric_comparison(overload_id: &str) -> bool {
    ORDERING.iter().any(|(_, prefix)| {
        overload_id
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| CROSS_NUMERIC.iter().any(|(suffix, ..)| *suffix == rest))
    })
}

fn function(name: &str, overloads: Vec<Overload>) -> Decl {
    Decl::Function(FunctionDecl::with_overloads(name, overloads))
}

fn type_ident(name: &str, ty: Type) -> Decl {
    Decl::Ident(IdentDecl::new(name, Type::type_of(ty)))
}

fn param(name: &str) -> Type {
    Type::param(name)
}

/// Declarations of the standard environment, in declaration order.
pub fn declarations() -> Vec<Decl> {
    let a = || param("A");
    let b = || param("B");
    let list_a = || Type::list(a());
    let map_ab = || Type::map(a(), b());
    let opt_a = || Type::optional(a());

    let mut decls = vec![
        type_ident("bool", Type::BOOL),
        type_ident("int", Type::INT),
        type_ident("uint", Type::UINT),
        type_ident("double", Type::DOUBLE),
        type_ident("string", Type::STRING),
        type_ident("bytes", Type::BYTES),
        type_ident("list", Type::list(Type::Dyn)),
        type_ident("map", Type::map(Type::Dyn, Type::Dyn)),
        type_ident("null_type", Type::Null),
        type_ident("type", Type::Type(None)),
        type_ident("dyn", Type::Dyn),
    ];

    // ── Logic ────────────────────────────────────────────────────────

    decls.extend([
        function(
            operators::CONDITIONAL,
            vec![Overload::global("conditional", vec![Type::BOOL, a(), a()], a())
                .with_type_params(["A"])],
        ),
        function(
            operators::LOGICAL_AND,
            vec![Overload::global("logical_and", vec![Type::BOOL, Type::BOOL], Type::BOOL)],
        ),
        function(
            operators::LOGICAL_OR,
            vec![Overload::global("logical_or", vec![Type::BOOL, Type::BOOL], Type::BOOL)],
        ),
        function(
            operators::LOGICAL_NOT,
            vec![Overload::global("logical_not", vec![Type::BOOL], Type::BOOL)],
        ),
        function(
            operators::NOT_STRICTLY_FALSE,
            vec![Overload::global("not_strictly_false", vec![Type::BOOL], Type::BOOL)],
        ),
    ]);

    // ── Comparison ───────────────────────────────────────────────────

    decls.extend([
        function(
            operators::EQUALS,
            vec![Overload::global("equals", vec![a(), a()], Type::BOOL).with_type_params(["A"])],
        ),
        function(
            operators::NOT_EQUALS,
            vec![Overload::global("not_equals", vec![a(), a()], Type::BOOL)
                .with_type_params(["A"])],
        ),
    ]);

    let comparable = [
        ("bool", Type::BOOL),
        ("int64", Type::INT),
        ("uint64", Type::UINT),
        ("double", Type::DOUBLE),
        ("string", Type::STRING),
        ("bytes", Type::BYTES),
        ("timestamp", Type::TIMESTAMP),
        ("duration", Type::DURATION),
    ];
    for (op, prefix) in ORDERING {
        let same = comparable.iter().map(|(suffix, t)| {
            Overload::global(format!("{prefix}_{suffix}"), vec![t.clone(), t.clone()], Type::BOOL)
        });
        let cross = CROSS_NUMERIC.iter().map(|(suffix, lhs, rhs)| {
            Overload::global(format!("{prefix}_{suffix}"), vec![lhs.clone(), rhs.clone()], Type::BOOL)
        });
        decls.push(function(op, same.chain(cross).collect()));
    }

    // ── Arithmetic ───────────────────────────────────────────────────

    let binary = |id: &str, t: Type| Overload::global(id, vec![t.clone(), t.clone()], t);
    decls.extend([
        function(
            operators::ADD,
            vec![
                binary("add_int64", Type::INT),
                binary("add_uint64", Type::UINT),
                binary("add_double", Type::DOUBLE),
                binary("add_string", Type::STRING),
                binary("add_bytes", Type::BYTES),
                binary("add_list", list_a()).with_type_params(["A"]),
                Overload::global(
                    "add_timestamp_duration",
                    vec![Type::TIMESTAMP, Type::DURATION],
                    Type::TIMESTAMP,
                ),
                Overload::global(
                    "add_duration_timestamp",
                    vec![Type::DURATION, Type::TIMESTAMP],
                    Type::TIMESTAMP,
                ),
                binary("add_duration_duration", Type::DURATION),
            ],
        ),
        function(
            operators::SUBTRACT,
            vec![
                binary("subtract_int64", Type::INT),
                binary("subtract_uint64", Type::UINT),
                binary("subtract_double", Type::DOUBLE),
                Overload::global(
                    "subtract_timestamp_timestamp",
                    vec![Type::TIMESTAMP, Type::TIMESTAMP],
                    Type::DURATION,
                ),
                Overload::global(
                    "subtract_timestamp_duration",
                    vec![Type::TIMESTAMP, Type::DURATION],
                    Type::TIMESTAMP,
                ),
                binary("subtract_duration_duration", Type::DURATION),
            ],
        ),
        function(
            operators::MULTIPLY,
            vec![
                binary("multiply_int64", Type::INT),
                binary("multiply_uint64", Type::UINT),
                binary("multiply_double", Type::DOUBLE),
            ],
        ),
        function(
            operators::DIVIDE,
            vec![
                binary("divide_int64", Type::INT),
                binary("divide_uint64", Type::UINT),
                binary("divide_double", Type::DOUBLE),
            ],
        ),
        function(
            operators::MODULO,
            vec![binary("modulo_int64", Type::INT), binary("modulo_uint64", Type::UINT)],
        ),
        function(
            operators::NEGATE,
            vec![
                Overload::global("negate_int64", vec![Type::INT], Type::INT),
                Overload::global("negate_double", vec![Type::DOUBLE], Type::DOUBLE),
            ],
        ),
    ]);

    // ── Indexing and membership ──────────────────────────────────────

    decls.extend([
        function(
            operators::INDEX,
            vec![
                Overload::global("index_list", vec![list_a(), Type::INT], a())
                    .with_type_params(["A"]),
                Overload::global("index_map", vec![map_ab(), a()], b())
                    .with_type_params(["A", "B"]),
            ],
        ),
        function(
            operators::IN,
            vec![
                Overload::global("in_list", vec![a(), list_a()], Type::BOOL)
                    .with_type_params(["A"]),
                Overload::global("in_map", vec![a(), map_ab()], Type::BOOL)
                    .with_type_params(["A", "B"]),
            ],
        ),
        function(
            "size",
            vec![
                Overload::global("size_string", vec![Type::STRING], Type::INT),
                Overload::global("size_bytes", vec![Type::BYTES], Type::INT),
                Overload::global("size_list", vec![list_a()], Type::INT).with_type_params(["A"]),
                Overload::global("size_map", vec![map_ab()], Type::INT)
                    .with_type_params(["A", "B"]),
                Overload::instance("string_size", vec![Type::STRING], Type::INT),
                Overload::instance("bytes_size", vec![Type::BYTES], Type::INT),
                Overload::instance("list_size", vec![list_a()], Type::INT).with_type_params(["A"]),
                Overload::instance("map_size", vec![map_ab()], Type::INT)
                    .with_type_params(["A", "B"]),
            ],
        ),
    ]);

    // ── Conversions ──────────────────────────────────────────────────

    let convert = |id: &str, from: Type, to: Type| Overload::global(id, vec![from], to);
    decls.extend([
        function(
            "int",
            vec![
                convert("int64_to_int64", Type::INT, Type::INT),
                convert("uint64_to_int64", Type::UINT, Type::INT),
                convert("double_to_int64", Type::DOUBLE, Type::INT),
                convert("string_to_int64", Type::STRING, Type::INT),
                convert("timestamp_to_int64", Type::TIMESTAMP, Type::INT),
            ],
        ),
        function(
            "uint",
            vec![
                convert("uint64_to_uint64", Type::UINT, Type::UINT),
                convert("int64_to_uint64", Type::INT, Type::UINT),
                convert("double_to_uint64", Type::DOUBLE, Type::UINT),
                convert("string_to_uint64", Type::STRING, Type::UINT),
            ],
        ),
        function(
            "double",
            vec![
                convert("double_to_double", Type::DOUBLE, Type::DOUBLE),
                convert("int64_to_double", Type::INT, Type::DOUBLE),
                convert("uint64_to_double", Type::UINT, Type::DOUBLE),
                convert("string_to_double", Type::STRING, Type::DOUBLE),
            ],
        ),
        function(
            "string",
            vec![
                convert("string_to_string", Type::STRING, Type::STRING),
                convert("int64_to_string", Type::INT, Type::STRING),
                convert("uint64_to_string", Type::UINT, Type::STRING),
                convert("double_to_string", Type::DOUBLE, Type::STRING),
                convert("bytes_to_string", Type::BYTES, Type::STRING),
                convert("timestamp_to_string", Type::TIMESTAMP, Type::STRING),
                convert("duration_to_string", Type::DURATION, Type::STRING),
            ],
        ),
        function(
            "bytes",
            vec![
                convert("bytes_to_bytes", Type::BYTES, Type::BYTES),
                convert("string_to_bytes", Type::STRING, Type::BYTES),
            ],
        ),
        function(
            "bool",
            vec![
                convert("bool_to_bool", Type::BOOL, Type::BOOL),
                convert("string_to_bool", Type::STRING, Type::BOOL),
            ],
        ),
        function(
            "duration",
            vec![convert("string_to_duration", Type::STRING, Type::DURATION)],
        ),
        function(
            "timestamp",
            vec![
                convert("string_to_timestamp", Type::STRING, Type::TIMESTAMP),
                convert("int64_to_timestamp", Type::INT, Type::TIMESTAMP),
            ],
        ),
        function(
            "type",
            vec![Overload::global("type", vec![a()], Type::type_of(a())).with_type_params(["A"])],
        ),
        function(
            "dyn",
            vec![Overload::global("to_dyn", vec![a()], Type::Dyn).with_type_params(["A"])],
        ),
    ]);

    // ── Strings ──────────────────────────────────────────────────────

    let predicate = |id: &str| Overload::instance(id, vec![Type::STRING, Type::STRING], Type::BOOL);
    decls.extend([
        function("contains", vec![predicate("contains_string")]),
        function("startsWith", vec![predicate("starts_with_string")]),
        function("endsWith", vec![predicate("ends_with_string")]),
        function(
            "matches",
            vec![
                Overload::global("matches", vec![Type::STRING, Type::STRING], Type::BOOL),
                predicate("matches_string"),
            ],
        ),
    ]);

    // ── Optionals ────────────────────────────────────────────────────

    decls.extend([
        function(
            "optional.of",
            vec![Overload::global("optional_of", vec![a()], opt_a()).with_type_params(["A"])],
        ),
        function(
            "optional.ofNonZeroValue",
            vec![Overload::global("optional_ofNonZeroValue", vec![a()], opt_a())
                .with_type_params(["A"])],
        ),
        function(
            "optional.none",
            vec![Overload::global("optional_none", vec![], opt_a()).with_type_params(["A"])],
        ),
        function(
            "value",
            vec![Overload::instance("optional_value", vec![opt_a()], a()).with_type_params(["A"])],
        ),
        function(
            "hasValue",
            vec![Overload::instance("optional_has_value", vec![opt_a()], Type::BOOL)
                .with_type_params(["A"])],
        ),
        function(
            "orValue",
            vec![Overload::instance("optional_or_value", vec![opt_a(), a()], a())
                .with_type_params(["A"])],
        ),
        function(
            "or",
            vec![Overload::instance("optional_or_optional", vec![opt_a(), opt_a()], opt_a())
                .with_type_params(["A"])],
        ),
        function(
            operators::OPT_INDEX,
            vec![
                Overload::global("optional_list_index_int", vec![list_a(), Type::INT], opt_a())
                    .with_type_params(["A"]),
                Overload::global(
                    "optional_map_index_value",
                    vec![map_ab(), a()],
                    Type::optional(b()),
                )
                .with_type_params(["A", "B"]),
            ],
        ),
    ]);

    decls
}
