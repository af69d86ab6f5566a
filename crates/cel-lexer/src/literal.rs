//! Decoding of literal token text into constant values.
//!
//! Every failure carries a byte offset relative to the start of the literal
//! text so callers can point a diagnostic inside the literal.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("Integer literal is malformed")]
    MalformedInt,
    #[error("Unsigned integer literal is missing trailing 'u' suffix")]
    MissingUintSuffix,
    #[error("Unsigned integer literal is malformed")]
    MalformedUint,
    #[error("Double literal is malformed")]
    MalformedDouble,
    #[error("{kind} literal is missing surrounding single or double quotes")]
    MissingQuotes { kind: &'static str },
    #[error("Bytes literal is missing leading 'b' or 'B' prefix")]
    MissingBytesPrefix,
    #[error("String literal missing terminating quote {quote}")]
    MissingTerminatingQuote { quote: &'static str },
    #[error("String literal contains unescaped terminating quote {quote}")]
    UnescapedTerminatingQuote { quote: &'static str, offset: usize },
    #[error("Raw literals cannot end with an odd number of \\")]
    RawTrailingBackslash { offset: usize },
    #[error("{kind} literal cannot end with \\")]
    TrailingBackslash { kind: &'static str, offset: usize },
    #[error("Invalid octal escape sequence")]
    InvalidOctalEscape { offset: usize },
    #[error("Invalid hex escape sequence")]
    InvalidHexEscape { offset: usize },
    #[error("Invalid unicode escape sequence")]
    InvalidUnicodeEscape { offset: usize },
    #[error("Illegal escape sequence: Unicode escape sequences cannot be used in bytes literal")]
    UnicodeEscapeInBytes { offset: usize },
    #[error("Invalid unicode code point")]
    InvalidCodePoint { offset: usize },
    #[error("Illegal escape sequence")]
    IllegalEscape { offset: usize },
}

impl LiteralError {
    /// Byte offset of the failure within the literal text.
    pub fn offset(&self) -> usize {
        match self {
            LiteralError::UnescapedTerminatingQuote { offset, .. }
            | LiteralError::RawTrailingBackslash { offset }
            | LiteralError::TrailingBackslash { offset, .. }
            | LiteralError::InvalidOctalEscape { offset }
            | LiteralError::InvalidHexEscape { offset }
            | LiteralError::InvalidUnicodeEscape { offset }
            | LiteralError::UnicodeEscapeInBytes { offset }
            | LiteralError::InvalidCodePoint { offset }
            | LiteralError::IllegalEscape { offset } => *offset,
            _ => 0,
        }
    }
}

const QUOTES: [&str; 4] = ["\"\"\"", "'''", "\"", "'"];

/// Split an optional `-` and parse the magnitude as decimal or `0x` hex.
fn parse_magnitude(text: &str) -> Option<(bool, u64)> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<u64>().ok()?
        }
        None => return None,
    };
    Some((negative, magnitude))
}

pub fn decode_int(text: &str) -> Result<i64, LiteralError> {
    let (negative, magnitude) = parse_magnitude(text).ok_or(LiteralError::MalformedInt)?;
    let value = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };
    i64::try_from(value).map_err(|_| LiteralError::MalformedInt)
}

pub fn decode_uint(text: &str) -> Result<u64, LiteralError> {
    let digits = text
        .strip_suffix('u')
        .or_else(|| text.strip_suffix('U'))
        .ok_or(LiteralError::MissingUintSuffix)?;
    match parse_magnitude(digits) {
        Some((false, magnitude)) => Ok(magnitude),
        Some((true, 0)) => Ok(0),
        _ => Err(LiteralError::MalformedUint),
    }
}

/// Decode a floating point literal. Only finite values written with digits,
/// `.`, exponent markers and signs are accepted.
pub fn decode_double(text: &str) -> Result<f64, LiteralError> {
    let well_formed = !text.is_empty()
        && text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !well_formed {
        return Err(LiteralError::MalformedDouble);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(LiteralError::MalformedDouble),
    }
}

pub fn decode_string(text: &str) -> Result<String, LiteralError> {
    let mut offset = 0;
    let mut raw = false;
    let mut rest = text;
    if let Some(stripped) = rest.strip_prefix(['r', 'R']) {
        raw = true;
        rest = stripped;
        offset += 1;
    }
    let (body, body_offset) = strip_quotes(rest, offset, "String")?;
    let mut out = String::with_capacity(body.len());
    decode_body(body, body_offset, &mut out, raw, false)?;
    Ok(out)
}

pub fn decode_bytes(text: &str) -> Result<Vec<u8>, LiteralError> {
    let mut offset = 0;
    let mut raw = false;
    let mut rest = text;
    if let Some(stripped) = rest.strip_prefix(['r', 'R']) {
        raw = true;
        rest = stripped
            .strip_prefix(['b', 'B'])
            .ok_or(LiteralError::MissingBytesPrefix)?;
        offset += 2;
    } else {
        rest = rest
            .strip_prefix(['b', 'B'])
            .ok_or(LiteralError::MissingBytesPrefix)?;
        offset += 1;
        if let Some(stripped) = rest.strip_prefix(['r', 'R']) {
            raw = true;
            rest = stripped;
            offset += 1;
        }
    }
    let (body, body_offset) = strip_quotes(rest, offset, "Bytes")?;
    let mut out = Vec::with_capacity(body.len());
    decode_body(body, body_offset, &mut out, raw, true)?;
    Ok(out)
}

/// Remove the surrounding quotes and return the body with its offset.
fn strip_quotes<'a>(
    text: &'a str,
    offset: usize,
    kind: &'static str,
) -> Result<(&'a str, usize), LiteralError> {
    let quote = QUOTES
        .into_iter()
        .find(|q| text.starts_with(q))
        .ok_or(LiteralError::MissingQuotes { kind })?;
    let rest = &text[quote.len()..];
    let offset = offset + quote.len();
    check_closing_quote(rest, quote, offset)?;
    Ok((&rest[..rest.len() - quote.len()], offset))
}

/// The only unescaped occurrence of the quote must be at the very end.
fn check_closing_quote(
    text: &str,
    quote: &'static str,
    offset: usize,
) -> Result<(), LiteralError> {
    if text.len() < quote.len() {
        return Err(LiteralError::MissingTerminatingQuote { quote });
    }
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut closed = false;
    while pos + quote.len() <= bytes.len() {
        if bytes[pos] == b'\\' {
            pos += 1;
        } else if bytes[pos..].starts_with(quote.as_bytes()) {
            closed = pos + quote.len() == bytes.len();
            break;
        }
        pos += 1;
    }
    if closed {
        Ok(())
    } else {
        Err(LiteralError::UnescapedTerminatingQuote {
            quote,
            offset: offset + pos,
        })
    }
}

/// Output sink for decoded literal bodies.
///
/// Escapes that denote a single octet (`\x`, octal, named) go through
/// `push_byte`; everything else is a code point.
trait DecodeBuffer {
    fn push_byte(&mut self, b: u8);
    fn push_char(&mut self, c: char);
}

impl DecodeBuffer for String {
    fn push_byte(&mut self, b: u8) {
        self.push(char::from(b));
    }

    fn push_char(&mut self, c: char) {
        self.push(c);
    }
}

impl DecodeBuffer for Vec<u8> {
    fn push_byte(&mut self, b: u8) {
        self.push(b);
    }

    fn push_char(&mut self, c: char) {
        let mut scratch = [0u8; 4];
        self.extend_from_slice(c.encode_utf8(&mut scratch).as_bytes());
    }
}

fn take_digits(
    chars: &mut impl Iterator<Item = (usize, char)>,
    count: usize,
    radix: u32,
) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let (_, c) = chars.next()?;
        value = value * radix + c.to_digit(radix)?;
    }
    Some(value)
}

fn decode_body(
    body: &str,
    base: usize,
    buf: &mut impl DecodeBuffer,
    raw: bool,
    bytes: bool,
) -> Result<(), LiteralError> {
    let mut chars = body.char_indices();
    let mut skip_newline = false;

    while let Some((idx, c)) = chars.next() {
        let offset = base + idx;
        if c != '\\' {
            match c {
                '\r' => {
                    buf.push_char('\n');
                    skip_newline = true;
                }
                '\n' if skip_newline => skip_newline = false,
                _ => {
                    skip_newline = false;
                    buf.push_char(c);
                }
            }
            continue;
        }

        skip_newline = false;
        let Some((_, next)) = chars.next() else {
            return Err(match (raw, bytes) {
                (true, _) => LiteralError::RawTrailingBackslash { offset },
                (false, true) => LiteralError::TrailingBackslash {
                    kind: "Bytes",
                    offset,
                },
                (false, false) => LiteralError::TrailingBackslash {
                    kind: "String",
                    offset,
                },
            });
        };

        if raw {
            buf.push_char('\\');
            buf.push_char(next);
            continue;
        }

        match next {
            'a' => buf.push_byte(0x07),
            'b' => buf.push_byte(0x08),
            'f' => buf.push_byte(0x0C),
            'n' => buf.push_byte(b'\n'),
            'r' => buf.push_byte(b'\r'),
            't' => buf.push_byte(b'\t'),
            'v' => buf.push_byte(0x0B),
            '"' | '\'' | '\\' | '?' | '`' => buf.push_byte(next as u8),
            '0'..='3' => {
                let low = take_digits(&mut chars, 2, 8)
                    .ok_or(LiteralError::InvalidOctalEscape { offset })?;
                let high = next as u32 - '0' as u32;
                buf.push_byte((high * 64 + low) as u8);
            }
            'x' | 'X' => {
                let value = take_digits(&mut chars, 2, 16)
                    .ok_or(LiteralError::InvalidHexEscape { offset })?;
                buf.push_byte(value as u8);
            }
            'u' | 'U' => {
                if bytes {
                    return Err(LiteralError::UnicodeEscapeInBytes { offset });
                }
                let width = if next == 'u' { 4 } else { 8 };
                let value = take_digits(&mut chars, width, 16)
                    .ok_or(LiteralError::InvalidUnicodeEscape { offset })?;
                let c = char::from_u32(value).ok_or(LiteralError::InvalidCodePoint { offset })?;
                buf.push_char(c);
            }
            _ => return Err(LiteralError::IllegalEscape { offset }),
        }
    }
    Ok(())
}
