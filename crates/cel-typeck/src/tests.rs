use std::sync::Arc;

use cel_ast::{
    Constant, ErrorKind, Errors, Expr, ExprId, ExprKind, Location, ParsedExpr, Source,
    SourceInfo,
};
use cel_parser::{parse, ParserOptions};

use super::*;

fn registry() -> Arc<dyn TypeProvider> {
    let mut registry = MessageRegistry::new();
    registry.add_message(
        "acme.Order",
        [
            ("id", Type::INT),
            ("tags", Type::list(Type::STRING)),
            ("total", Type::DOUBLE),
            ("customer", Type::message("acme.Customer")),
            ("note", Type::Wrapper(Primitive::String)),
        ],
    );
    registry.add_message("acme.Customer", [("name", Type::STRING)]);
    Arc::new(registry)
}

fn env_in(container: Container) -> Env {
    let mut env = Env::standard(container, registry()).unwrap();
    let idents = [
        IdentDecl::new("ii", Type::INT),
        IdentDecl::new("s", Type::STRING),
        IdentDecl::new("f", Type::BOOL),
        IdentDecl::new("d", Type::Dyn),
        IdentDecl::new("m", Type::list(Type::Dyn)),
        IdentDecl::new("mp", Type::map(Type::STRING, Type::INT)),
        IdentDecl::new("o", Type::message("acme.Order")),
        IdentDecl::new("opt", Type::optional(Type::INT)),
        IdentDecl::new("w", Type::message("google.protobuf.Int64Value")),
        IdentDecl::new("acme.MAX", Type::INT).with_value(Constant::Int(10)),
    ];
    for ident in idents {
        env.add_ident(ident).unwrap();
    }
    env
}

fn env() -> Env {
    env_in(Container::default())
}

fn check_src(source: &str, env: &mut Env, options: &CheckerOptions) -> (CheckedExpr, Errors) {
    let parser_options = ParserOptions::new(100).enable_optional_syntax(true);
    let (parsed, parse_errors) = parse(source, &parser_options);
    assert!(parse_errors.is_empty(), "parse errors for {source:?}:\n{parse_errors}");
    let result = check(&parsed, env, options).unwrap();
    assert_fully_typed(&result.0);
    result
}

fn check_ok(source: &str) -> CheckedExpr {
    let (checked, errors) = check_src(source, &mut env(), &CheckerOptions::new(100));
    assert!(errors.is_empty(), "unexpected errors for {source:?}:\n{errors}");
    checked
}

fn check_err(source: &str) -> String {
    check_err_with(source, &CheckerOptions::new(100))
}

fn check_err_with(source: &str, options: &CheckerOptions) -> String {
    let (_, errors) = check_src(source, &mut env(), options);
    assert!(!errors.is_empty(), "expected errors for {source:?}, got none");
    errors
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

fn root_type(source: &str) -> String {
    check_ok(source).root_type().to_string()
}

fn contains_param(ty: &Type) -> bool {
    match ty {
        Type::Param(_) => true,
        Type::List(inner) | Type::Optional(inner) => contains_param(inner),
        Type::Type(Some(inner)) => contains_param(inner),
        Type::Map(k, v) => contains_param(k) || contains_param(v),
        Type::Function { result, args } => contains_param(result) || args.iter().any(contains_param),
        Type::Abstract { params, .. } => params.iter().any(contains_param),
        _ => false,
    }
}

fn assert_fully_typed(checked: &CheckedExpr) {
    for id in checked.expr.node_ids() {
        let ty = checked
            .type_of(id)
            .unwrap_or_else(|| panic!("node #{id} has no type"));
        assert!(!contains_param(ty), "node #{id} has unresolved type {ty}");
    }
}

fn find_ident(expr: &Expr, name: &str) -> ExprId {
    let mut found = None;
    expr.for_each_node(&mut |node| {
        if node.as_ident().is_some_and(|n| n == name) {
            found = Some(node.id);
        }
    });
    found.unwrap_or_else(|| panic!("no identifier {name}"))
}

// ── Literals and identifiers ──────────────────────────────────────

#[test]
fn string_literal() {
    let checked = check_ok("\"A\"");
    assert_eq!(checked.expr.id, 1);
    assert_eq!(checked.type_map.len(), 1);
    assert_eq!(checked.root_type(), &Type::STRING);
}

#[test]
fn literal_types() {
    assert_eq!(root_type("1"), "int");
    assert_eq!(root_type("1u"), "uint");
    assert_eq!(root_type("1.5"), "double");
    assert_eq!(root_type("b'x'"), "bytes");
    assert_eq!(root_type("true"), "bool");
    assert_eq!(root_type("null"), "null");
}

#[test]
fn add_resolves_int_overload() {
    let checked = check_ok("1 + ii");
    assert_eq!(checked.root_type(), &Type::INT);
    assert_eq!(
        checked.reference(checked.expr.id),
        Some(&Reference::function(vec!["add_int64".into()]))
    );
    let ii = find_ident(&checked.expr, "ii");
    assert_eq!(checked.type_of(ii), Some(&Type::INT));
    assert_eq!(
        checked.reference(ii),
        Some(&Reference::Ident {
            name: "ii".into(),
            value: None
        })
    );
}

#[test]
fn undeclared_identifier() {
    let (checked, errors) = check_src("foo", &mut env(), &CheckerOptions::new(100));
    assert_eq!(checked.root_type(), &Type::Error);
    assert_eq!(errors.len(), 1);
    let diagnostic = &errors.diagnostics()[0];
    assert_eq!(diagnostic.kind, ErrorKind::UndeclaredReference);
    assert_eq!(diagnostic.location, Location::new(1, 0));
    assert_eq!(diagnostic.message, "undeclared reference to 'foo' (in container '')");
}

#[test]
fn qualified_identifier_replaces_select() {
    let checked = check_ok("acme.MAX");
    assert_eq!(checked.expr.kind, ExprKind::Ident("acme.MAX".into()));
    assert_eq!(
        checked.reference(checked.expr.id),
        Some(&Reference::Ident {
            name: "acme.MAX".into(),
            value: Some(Constant::Int(10))
        })
    );
    assert_eq!(checked.root_type(), &Type::INT);
}

#[test]
fn identifiers_resolve_through_container() {
    let mut env = env_in(Container::new("acme.v1"));
    let (checked, errors) = check_src("MAX + 1", &mut env, &CheckerOptions::new(100));
    assert!(errors.is_empty(), "{errors}");
    let max = find_ident(&checked.expr, "acme.MAX");
    assert_eq!(checked.type_of(max), Some(&Type::INT));
}

#[test]
fn well_known_identifier_types() {
    assert_eq!(root_type("w"), "wrapper(int)");
    assert_eq!(root_type("w + 1"), "int");
    assert_eq!(root_type("w == null"), "bool");
    assert_eq!(root_type("int"), "type(int)");
}

// ── Field selection ───────────────────────────────────────────────

#[test]
fn message_fields() {
    assert_eq!(root_type("o.id"), "int");
    assert_eq!(root_type("o.customer.name"), "string");
    assert_eq!(root_type("o.note"), "wrapper(string)");
    assert_eq!(root_type("has(o.id)"), "bool");
    assert_eq!(check_err("o.missing"), "undefined field 'missing'");
}

#[test]
fn map_and_dyn_fields() {
    assert_eq!(root_type("mp.key"), "int");
    assert_eq!(root_type("d.a.b"), "dyn");
}

#[test]
fn field_selection_not_supported() {
    assert_eq!(check_err("ii.foo"), "type 'int' does not support field selection");
    assert_eq!(check_err("has(s.foo)"), "type 'string' does not support field selection");
}

#[test]
fn optional_field_selection() {
    let checked = check_ok("o.?id");
    assert_eq!(checked.root_type().to_string(), "optional_type(int)");
    assert_eq!(
        checked.reference(checked.expr.id),
        Some(&Reference::function(vec!["select_optional_field".into()]))
    );
    assert_eq!(root_type("o.?customer.name"), "optional_type(string)");
}

#[test]
fn malformed_optional_select() {
    let source_info = SourceInfo::new(Source::new("o"));
    let parsed = ParsedExpr {
        expr: Expr::call(1, "_?._", vec![Expr::ident(2, "o")]),
        source_info,
    };
    let err = check(&parsed, &mut env(), &CheckerOptions::new(100)).unwrap_err();
    assert_eq!(err, InvariantViolation::OptionalSelectArity { id: 1, found: 1 });

    let parsed = ParsedExpr {
        expr: Expr::call(1, "_?._", vec![Expr::ident(2, "o"), Expr::ident(3, "ii")]),
        source_info: SourceInfo::new(Source::new("o")),
    };
    let (checked, errors) = check(&parsed, &mut env(), &CheckerOptions::new(100)).unwrap();
    assert_eq!(errors.diagnostics()[0].message, "unsupported optional field selection");
    assert_eq!(checked.root_type(), &Type::Error);
    assert_fully_typed(&checked);
}

// ── Calls ─────────────────────────────────────────────────────────

#[test]
fn generic_overloads() {
    assert_eq!(root_type("[1, 2][0]"), "int");
    assert_eq!(root_type("mp['a']"), "int");
    assert_eq!(root_type("size([1])"), "int");
    assert_eq!(root_type("s.size()"), "int");
    assert_eq!(root_type("ii in [1, 2]"), "bool");
    assert_eq!(root_type("[1] + [2]"), "list(int)");
    assert_eq!(root_type("f ? 1 : 2"), "int");
    assert_eq!(root_type("type(1)"), "type(int)");
}

#[test]
fn no_matching_overload() {
    assert_eq!(
        check_err("1 + 'a'"),
        "found no matching overload for '_+_' applied to '(int, string)'"
    );
    assert_eq!(
        check_err("ii.size()"),
        "found no matching overload for 'size' applied to 'int.()'"
    );
    assert_eq!(
        check_err("f ? 1 : 'a'"),
        "found no matching overload for '_?_:_' applied to '(bool, int, string)'"
    );
}

#[test]
fn dyn_arguments_widen_result() {
    let checked = check_ok("d + d");
    assert_eq!(checked.root_type(), &Type::Dyn);
    let Some(Reference::Function { overload_ids }) = checked.reference(checked.expr.id) else {
        panic!("missing function reference");
    };
    assert_eq!(overload_ids[0], "add_int64");
    assert!(overload_ids.iter().any(|id| id == "add_list"));
    assert_eq!(root_type("d + 1"), "int");
}

#[test]
fn matching_overloads_with_same_result_keep_it() {
    let checked = check_ok("size(d)");
    assert_eq!(checked.root_type(), &Type::INT);
    let Some(Reference::Function { overload_ids }) = checked.reference(checked.expr.id) else {
        panic!("missing function reference");
    };
    assert!(overload_ids.len() > 1, "{overload_ids:?}");
}

#[test]
fn cross_type_numeric_comparisons() {
    assert_eq!(
        check_err("1 < 2.0"),
        "found no matching overload for '_<_' applied to '(int, double)'"
    );
    let options = CheckerOptions::new(100).cross_type_numeric_comparisons(true);
    let (checked, errors) = check_src("1 < 2.0", &mut env(), &options);
    assert!(errors.is_empty(), "{errors}");
    assert_eq!(checked.root_type(), &Type::BOOL);
}

#[test]
fn undeclared_functions() {
    assert_eq!(check_err("foo(1)"), "undeclared reference to 'foo' (in container '')");
    assert_eq!(check_err("ii.foo()"), "undeclared reference to 'foo' (in container '')");
}

#[test]
fn namespaced_function_drops_target() {
    let checked = check_ok("optional.of(1)");
    let ExprKind::Call {
        function, target, ..
    } = &checked.expr.kind
    else {
        panic!("expected a call");
    };
    assert_eq!(function, "optional.of");
    assert!(target.is_none());
    assert_eq!(checked.root_type().to_string(), "optional_type(int)");
    assert_eq!(root_type("optional.none()"), "optional_type(dyn)");
    assert_eq!(root_type("opt.orValue(2)"), "int");
}

// ── Aggregates ────────────────────────────────────────────────────

#[test]
fn list_literals() {
    assert_eq!(root_type("[1, 2]"), "list(int)");
    assert_eq!(root_type("[]"), "list(dyn)");
    assert_eq!(root_type("[[1], []]"), "list(list(int))");
    assert_eq!(root_type("[1, \"A\"]"), "list(dyn)");
}

#[test]
fn homogeneous_list_mismatch() {
    let options = CheckerOptions::new(100).heterogeneous_aggregate_literals(false);
    let (checked, errors) = check_src("[1, \"A\"]", &mut env(), &options);
    assert_eq!(checked.root_type(), &Type::Error);
    assert_eq!(errors.len(), 1);
    let diagnostic = &errors.diagnostics()[0];
    assert_eq!(diagnostic.kind, ErrorKind::TypeMismatch);
    assert_eq!(diagnostic.message, "expected type 'int' but found 'string'");
    assert_eq!(diagnostic.location, Location::new(1, 4));
}

#[test]
fn map_literals() {
    assert_eq!(root_type("{'a': 1, 'b': 2}"), "map(string, int)");
    assert_eq!(root_type("{}"), "map(dyn, dyn)");
    assert_eq!(root_type("{1: 'a', 'b': 2}"), "map(dyn, dyn)");
    let options = CheckerOptions::new(100).heterogeneous_aggregate_literals(false);
    assert_eq!(
        check_err_with("{'a': 1, 'b': 'c'}", &options),
        "expected type 'int' but found 'string'"
    );
}

#[test]
fn optional_entries() {
    assert_eq!(root_type("[?opt, 2]"), "list(int)");
    assert_eq!(root_type("{?'a': opt}"), "map(string, int)");
    assert_eq!(root_type("mp[?'a']"), "optional_type(int)");
    assert_eq!(
        check_err("[?ii]"),
        "expected type 'optional_type(int)' but found 'int'"
    );
    assert_eq!(root_type("[?d]"), "list(dyn)");
}

#[test]
fn message_construction() {
    let checked = check_ok("acme.Order{id: 1, tags: ['a']}");
    assert_eq!(checked.root_type(), &Type::message("acme.Order"));
    assert_eq!(
        checked.reference(checked.expr.id),
        Some(&Reference::Ident {
            name: "acme.Order".into(),
            value: None
        })
    );
    assert_eq!(root_type("acme.Order{?id: opt}"), "acme.Order");
    assert_eq!(root_type("google.protobuf.Int64Value{}"), "wrapper(int)");
}

#[test]
fn message_name_resolves_through_container() {
    let mut env = env_in(Container::new("acme"));
    let (checked, errors) = check_src("Order{id: 1}", &mut env, &CheckerOptions::new(100));
    assert!(errors.is_empty(), "{errors}");
    let ExprKind::CreateStruct { message_name, .. } = &checked.expr.kind else {
        panic!("expected a message");
    };
    assert_eq!(message_name, "acme.Order");
}

#[test]
fn message_construction_errors() {
    assert_eq!(
        check_err("acme.Order{id: 'x'}"),
        "expected type of field 'id' is 'int' but provided type is 'string'"
    );
    assert_eq!(check_err("acme.Order{nope: 1}"), "undefined field 'nope'");
    assert_eq!(
        check_err("acme.Nope{id: ii}"),
        "undeclared reference to 'acme.Nope' (in container '')"
    );
    assert_eq!(check_err("int{}"), "'int' is not a message type");
    assert_eq!(check_err("ii{}"), "'ii' is not a type");
}

// ── Comprehensions ────────────────────────────────────────────────

#[test]
fn all_macro() {
    let checked = check_ok("m.all(v, f)");
    assert!(matches!(checked.expr.kind, ExprKind::Comprehension(_)));
    assert_eq!(checked.root_type(), &Type::BOOL);
}

#[test]
fn comprehension_macros() {
    assert_eq!(root_type("[1, 2].map(v, v + 1)"), "list(int)");
    assert_eq!(root_type("[1, 2].filter(v, v > 0)"), "list(int)");
    assert_eq!(root_type("[1, 2].map(v, v > 0, 'x')"), "list(string)");
    assert_eq!(root_type("mp.exists(k, k == 'a')"), "bool");
    assert_eq!(root_type("m.exists_one(v, v == 1)"), "bool");
    assert_eq!(root_type("d.all(v, v)"), "bool");
}

#[test]
fn comprehension_errors() {
    assert_eq!(
        check_err("ii.all(v, true)"),
        "expression of type 'int' cannot be range of a comprehension (must be list, map, or dynamic)"
    );
    assert_eq!(
        check_err("m.all(v, 1)"),
        "found no matching overload for '_&&_' applied to '(bool, int)'"
    );
}

#[test]
fn comprehension_variables_are_scoped() {
    let mut env = env();
    let (_, errors) = check_src("[1].all(v, v > 0) && v", &mut env, &CheckerOptions::new(100));
    assert_eq!(
        errors.diagnostics()[0].message,
        "undeclared reference to 'v' (in container '')"
    );
}

// ── Limits ────────────────────────────────────────────────────────

#[test]
fn recursion_limit() {
    let options = CheckerOptions::new(3);
    let (checked, errors) = check_src("[[[[1]]]]", &mut env(), &options);
    assert!(errors
        .diagnostics()
        .iter()
        .any(|d| d.kind == ErrorKind::RecursionLimitExceeded));
    assert_eq!(
        errors.to_string(),
        "ERROR: <input>:-1:0: max recursion depth exceeded"
    );
    assert_eq!(checked.type_of(4), Some(&Type::Error));
    assert_eq!(checked.type_of(5), Some(&Type::Error));
    assert_eq!(checked.type_of(3).map(ToString::to_string).as_deref(), Some("list(!error!)"));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_source() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            Just("1"),
            Just("2u"),
            Just("3.5"),
            Just("'s'"),
            Just("true"),
            Just("null"),
            Just("ii"),
            Just("d"),
            Just("m"),
            Just("mp"),
            Just("o"),
            Just("opt"),
            Just("foo"),
            Just("[]"),
            Just("{}"),
        ]
        .prop_map(String::from);
        leaf.prop_recursive(4, 32, 3, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} + {b}")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} == {b}")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("[{a}, {b}]")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{{{a}: {b}}}")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a})[{b}]")),
                inner.clone().prop_map(|a| format!("({a}).id")),
                inner.clone().prop_map(|a| format!("({a}).?id")),
                inner.clone().prop_map(|a| format!("has(({a}).id)")),
                inner.clone().prop_map(|a| format!("size({a})")),
                inner.clone().prop_map(|a| format!("[?{a}]")),
                inner.clone().prop_map(|a| format!("acme.Order{{id: {a}}}")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}).all(v, {b})")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}).map(v, {b})")),
                (inner.clone(), inner.clone(), inner)
                    .prop_map(|(a, b, c)| format!("{a} ? {b} : {c}")),
            ]
        })
    }

    fn check_any(source: &str) -> (CheckedExpr, Errors) {
        let options = ParserOptions::new(100).enable_optional_syntax(true);
        let (parsed, _) = parse(source, &options);
        let result = check(&parsed, &mut env(), &CheckerOptions::new(100));
        assert!(result.is_ok(), "invariant violation for {source:?}: {result:?}");
        let (checked, errors) = result.unwrap();
        assert_fully_typed(&checked);
        (checked, errors)
    }

    proptest! {
        #[test]
        fn checker_types_every_node(source in arb_source()) {
            check_any(&source);
        }

        #[test]
        fn checker_never_panics(source in "\\PC{0,40}") {
            check_any(&source);
        }

        #[test]
        fn checking_is_deterministic(source in arb_source()) {
            let (first, first_errors) = check_any(&source);
            let (second, second_errors) = check_any(&source);
            prop_assert_eq!(first.type_map, second.type_map);
            prop_assert_eq!(first_errors.to_string(), second_errors.to_string());
        }
    }
}
