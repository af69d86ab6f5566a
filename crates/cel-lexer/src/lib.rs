pub mod literal;

use logos::Logos;
use smol_str::SmolStr;

pub use literal::{
    decode_bytes, decode_double, decode_int, decode_string, decode_uint, LiteralError,
};

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Scan the body of a quoted literal after its prefix and opening quote.
///
/// Escapes are skipped in cooked literals; raw literals end at the first
/// matching quote. Single-quoted forms may not span lines.
fn lex_quoted(lex: &mut logos::Lexer<Token>) -> Option<SmolStr> {
    let prefix = lex.slice();
    let quote = *prefix.as_bytes().last()?;
    let raw = prefix.bytes().any(|b| b == b'r' || b == b'R');
    let body = lex.remainder().as_bytes();
    let triple = body.len() >= 2 && body[0] == quote && body[1] == quote;

    let mut i = if triple { 2 } else { 0 };
    while i < body.len() {
        let b = body[i];
        if b == b'\\' && !raw {
            i += 2;
            continue;
        }
        if triple {
            if body[i..].starts_with(&[quote, quote, quote]) {
                lex.bump(i + 3);
                return Some(SmolStr::new(lex.slice()));
            }
        } else if b == quote {
            lex.bump(i + 1);
            return Some(SmolStr::new(lex.slice()));
        } else if b == b'\n' || b == b'\r' {
            return None;
        }
        i += 1;
    }
    None
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\x0C]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    #[token("in")]
    In,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*", callback = |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    /// Literal tokens keep their source text; decoding happens when the
    /// syntax tree is lowered so errors can point inside the literal.
    #[regex(r"[0-9]+|0[xX][0-9a-fA-F]+", callback = |lex| SmolStr::new(lex.slice()))]
    Int(SmolStr),

    #[regex(r"([0-9]+|0[xX][0-9a-fA-F]+)[uU]", callback = |lex| SmolStr::new(lex.slice()))]
    Uint(SmolStr),

    #[regex(
        r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+|\.[0-9]+([eE][+-]?[0-9]+)?",
        callback = |lex| SmolStr::new(lex.slice())
    )]
    Double(SmolStr),

    #[regex(r#"[rR]?["']"#, lex_quoted)]
    Str(SmolStr),

    #[regex(r#"([bB][rR]?|[rR][bB])["']"#, lex_quoted)]
    Bytes(SmolStr),
}

impl Token {
    /// How the token is named in syntax error messages.
    pub fn display_name(&self) -> String {
        match self {
            Token::Ident(s)
            | Token::Int(s)
            | Token::Uint(s)
            | Token::Double(s)
            | Token::Str(s)
            | Token::Bytes(s) => format!("'{s}'"),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::In => "in",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Ident(_)
            | Token::Int(_)
            | Token::Uint(_)
            | Token::Double(_)
            | Token::Str(_)
            | Token::Bytes(_) => "",
        }
    }
}

/// Lex source code into a list of (token, span) pairs.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<Span>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => errors.push(span),
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex_tokens("== != <= >= < > && || !"),
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::Lt,
                Token::Gt,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_idents() {
        assert_eq!(
            lex_tokens("in int true truely null"),
            vec![
                Token::In,
                Token::Ident("int".into()),
                Token::True,
                Token::Ident("truely".into()),
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex_tokens("42 0x1F 7u 0xAu 1.5 1e3 .5"),
            vec![
                Token::Int("42".into()),
                Token::Int("0x1F".into()),
                Token::Uint("7u".into()),
                Token::Uint("0xAu".into()),
                Token::Double("1.5".into()),
                Token::Double("1e3".into()),
                Token::Double(".5".into()),
            ]
        );
    }

    #[test]
    fn test_int_then_member() {
        assert_eq!(
            lex_tokens("1.exists"),
            vec![
                Token::Int("1".into()),
                Token::Dot,
                Token::Ident("exists".into()),
            ]
        );
    }

    #[test]
    fn test_strings_keep_source_text() {
        assert_eq!(
            lex_tokens(r#""a\"b" 'c' r"\d" """x"y""""#),
            vec![
                Token::Str(r#""a\"b""#.into()),
                Token::Str("'c'".into()),
                Token::Str(r#"r"\d""#.into()),
                Token::Str(r#""""x"y""""#.into()),
            ]
        );
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(
            lex_tokens(r#""" + ''"#),
            vec![Token::Str(r#""""#.into()), Token::Plus, Token::Str("''".into())]
        );
    }

    #[test]
    fn test_bytes_prefixes() {
        assert_eq!(
            lex_tokens(r#"b"a" rb'c' BR"d""#),
            vec![
                Token::Bytes(r#"b"a""#.into()),
                Token::Bytes("rb'c'".into()),
                Token::Bytes(r#"BR"d""#.into()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex_tokens("a // trailing\n+ b"),
            vec![
                Token::Ident("a".into()),
                Token::Plus,
                Token::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let (_, errors) = lex("\"abc");
        assert!(!errors.is_empty());
        let (_, errors) = lex("'a\nb'");
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_unknown_character() {
        let (tokens, errors) = lex("a # b");
        assert_eq!(errors, vec![Span::new(2, 3)]);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_spans() {
        let (tokens, _) = lex("ab  + 1");
        let spans: Vec<Span> = tokens.iter().map(|(_, s)| *s).collect();
        assert_eq!(spans, vec![Span::new(0, 2), Span::new(4, 5), Span::new(6, 7)]);
    }
}
