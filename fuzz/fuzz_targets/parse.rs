#![no_main]

use std::sync::Arc;

use cel_parser::{ParserOptions, UnparserOptions};
use cel_typeck::{CheckerOptions, Container, Env, MessageRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let options = ParserOptions::new(64)
        .enable_optional_syntax(true)
        .populate_macro_calls(true);
    let (parsed, errors) = cel_parser::parse(s, &options);
    if errors.is_empty() {
        // Valid input must print back to source that parses cleanly.
        let text = cel_parser::unparse(&parsed, &UnparserOptions::default());
        assert!(text.is_ok(), "{:?}", text.err());
        let text = text.unwrap_or_default();
        let (_, errors) = cel_parser::parse(&text, &options);
        assert!(errors.is_empty(), "{text:?} does not parse:\n{errors}");
    }
    let Ok(mut env) = Env::standard(Container::new(""), Arc::new(MessageRegistry::new())) else {
        return;
    };
    // Parser output must never break the checker's tree invariants.
    let checked = cel_typeck::check(&parsed, &mut env, &CheckerOptions::new(64));
    assert!(checked.is_ok(), "{:?}", checked.err());
});
