//! ASCII bridge
//!
//! Converts the flat vector of an array to and from a whitespace separated
//! token stream, one token per element in row-major order (last axis
//! varies fastest). Strings take one token per row and are double-quoted,
//! with `\` escapes, when they are empty or contain whitespace or quotes.

use crate::array::TypedArray;
use crate::codec::c_strlen;
use crate::config::AsciiOptions;
use crate::datatype::Datatype;
use crate::element::{self, Value};
use crate::error::{ArrayError, Result};
use crate::introspect;
use crate::raw::Arena;
use tracing::{debug, warn};

const SEPARATORS: &[u8] = b" \t\n";
const QUOTE: u8 = b'"';
const ESCAPE: u8 = b'\\';

fn unparseable(token: &str, reason: impl Into<String>) -> ArrayError {
    ArrayError::UnparseableToken {
        token: token.to_string(),
        reason: reason.into(),
    }
}

/// Splits text into tokens at spaces, tabs and newlines.
///
/// A token starting with `"` runs to the next unescaped `"` and may contain
/// separators. Inside quotes a backslash takes the next byte literally, so
/// `\"` is a quote and `\\` a backslash. Unquoted tokens longer than the
/// limit are cut with a warning; quoted ones are an error, since their
/// content is meant literally.
pub struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    max_len: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, max_len: usize) -> Self {
        Tokenizer {
            text,
            pos: 0,
            max_len,
        }
    }

    /// The part of the input not consumed yet.
    pub fn remainder(&self) -> &'a str {
        &self.text[self.pos..]
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && SEPARATORS.contains(&bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }

        if bytes[self.pos] == QUOTE {
            let open = self.pos;
            let mut token = Vec::new();
            let mut i = open + 1;
            loop {
                match bytes.get(i) {
                    None => {
                        self.pos = bytes.len();
                        return Some(Err(unparseable(&self.text[open..], "unterminated quoted string")));
                    }
                    Some(&QUOTE) => break,
                    Some(&ESCAPE) if i + 1 < bytes.len() => {
                        token.push(bytes[i + 1]);
                        i += 2;
                    }
                    Some(&b) => {
                        token.push(b);
                        i += 1;
                    }
                }
            }
            self.pos = i + 1;

            // Escapes only ever drop an ASCII backslash, so the bytes stay UTF-8
            let token = String::from_utf8_lossy(&token).into_owned();
            if token.len() > self.max_len {
                return Some(Err(unparseable(
                    &token,
                    format!("quoted token is longer than {} bytes", self.max_len),
                )));
            }
            return Some(Ok(token));
        }

        let start = self.pos;
        let end = bytes[start..]
            .iter()
            .position(|b| SEPARATORS.contains(b))
            .map_or(bytes.len(), |len| start + len);
        self.pos = end;

        let mut cut = end;
        if end - start > self.max_len {
            cut = start + self.max_len;
            while !self.text.is_char_boundary(cut) {
                cut -= 1;
            }
            warn!(
                "Token '{}...' exceeds {} bytes; the rest of it is ignored",
                &self.text[start..cut],
                self.max_len
            );
        }
        Some(Ok(self.text[start..cut].to_string()))
    }
}

/// Shortest `%g`-style rendering with `precision` significant digits.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// `strtoul` with base 0: `0x` means hexadecimal, a leading `0` octal.
/// A leading minus wraps around.
fn parse_c_unsigned(token: &str) -> Option<u64> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

fn quote_if_needed(text: &str) -> String {
    let plain = !text.is_empty()
        && !text.bytes().any(|b| b == QUOTE || SEPARATORS.contains(&b));
    if plain {
        return text.to_string();
    }

    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiBridge {
    options: AsciiOptions,
}

impl AsciiBridge {
    pub fn new(options: AsciiOptions) -> Self {
        AsciiBridge { options }
    }

    pub fn options(&self) -> &AsciiOptions {
        &self.options
    }

    pub fn tokenizer<'a>(&self, text: &'a str) -> Tokenizer<'a> {
        Tokenizer::new(text, self.options.max_token_length)
    }

    pub fn format_element(&self, datatype: Datatype, value: Value) -> Result<String> {
        let token = match datatype {
            Datatype::Char | Datatype::UChar => match value.as_u64() as u8 {
                0 => "\"\"".to_string(),
                byte => quote_if_needed(&char::from(byte).to_string()),
            },
            Datatype::Bool => if value.as_u64() != 0 { "1" } else { "0" }.to_string(),
            Datatype::Hex => format!("{:#x}", value.as_u64()),
            Datatype::Float | Datatype::Double => format_g(value.as_f64(), self.options.float_precision),
            dt if dt.is_signed() => value.as_i64().to_string(),
            dt if dt.is_numeric() => value.as_u64().to_string(),
            _ => {
                return Err(ArrayError::UnsupportedDatatype(format!(
                    "{} elements have no token form",
                    datatype
                )))
            }
        };
        Ok(token)
    }

    pub fn parse_element(&self, datatype: Datatype, token: &str) -> Result<Value> {
        let value = match datatype {
            Datatype::Char | Datatype::UChar => match token.chars().next() {
                None => Value::Unsigned(0),
                Some(c) if (c as u32) <= 0xff => Value::Unsigned(c as u64),
                Some(_) => return Err(unparseable(token, "not a single-byte character")),
            },
            Datatype::Bool => match token {
                "0" => Value::Unsigned(0),
                "1" => Value::Unsigned(1),
                _ => {
                    return Err(ArrayError::IllegalArgument(format!(
                        "boolean token '{}' is neither 0 nor 1",
                        token
                    )))
                }
            },
            Datatype::Hex => Value::Unsigned(
                parse_c_unsigned(token).ok_or_else(|| unparseable(token, "not a hex or unsigned value"))?,
            ),
            Datatype::Float | Datatype::Double => Value::Float(
                token
                    .parse::<f64>()
                    .map_err(|_| unparseable(token, "not a floating point number"))?,
            ),
            dt if dt.is_signed() => Value::Signed(
                token
                    .parse::<i64>()
                    .map_err(|_| unparseable(token, "not an integer"))?,
            ),
            dt if dt.is_numeric() => match token.parse::<u64>() {
                Ok(v) => Value::Unsigned(v),
                Err(_) => Value::Signed(
                    token
                        .parse::<i64>()
                        .map_err(|_| unparseable(token, "not an unsigned integer"))?,
                ),
            },
            _ => {
                return Err(ArrayError::UnsupportedDatatype(format!(
                    "{} elements have no token form",
                    datatype
                )))
            }
        };
        Ok(value)
    }

    /// Render every element of the array, separated by single spaces.
    pub fn array_to_tokens(&self, arena: &Arena, array: TypedArray) -> Result<String> {
        let header = introspect::header(arena, array)?;
        let datatype = header.datatype;
        let base = introspect::base_vector(arena, array)?;
        let vector = arena.bytes(base, header.byte_count())?;

        let tokens: Vec<String> = if datatype == Datatype::String {
            let (rows, row_len) = string_rows(&header.dims)?;
            (0..rows)
                .map(|row| {
                    let bytes = &vector[row * row_len..(row + 1) * row_len];
                    quote_if_needed(&String::from_utf8_lossy(&bytes[..c_strlen(bytes)]))
                })
                .collect()
        } else {
            let size = header.scalar_size();
            let mut tokens = Vec::with_capacity(header.element_count());
            for i in 0..header.element_count() {
                let value = element::load(datatype, &vector[i * size..(i + 1) * size])?;
                tokens.push(self.format_element(datatype, value)?);
            }
            tokens
        };

        debug!("Formatted {} {} tokens", tokens.len(), datatype);
        Ok(tokens.join(" "))
    }

    /// Parse tokens from `text` into the array and return how many were
    /// used. Tokens beyond the array's length are ignored. The array is left
    /// untouched if any token fails to parse.
    pub fn tokens_to_array(&self, arena: &mut Arena, array: TypedArray, text: &str) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        let datatype = header.datatype;
        let mut staged = vec![0u8; header.byte_count()];
        let mut tokens = self.tokenizer(text);
        let mut next_token = || {
            tokens
                .next()
                .unwrap_or_else(|| Err(unparseable("", "array was too short")))
        };

        let used = if datatype == Datatype::String {
            let (rows, row_len) = string_rows(&header.dims)?;
            for row in 0..rows {
                let token = next_token()?;
                let mut len = token.len();
                if len > row_len {
                    warn!(
                        "String token of {} bytes truncated to {} bytes",
                        len, row_len
                    );
                    len = row_len;
                }
                staged[row * row_len..row * row_len + len].copy_from_slice(&token.as_bytes()[..len]);
            }
            rows
        } else {
            let size = header.scalar_size();
            for i in 0..header.element_count() {
                let token = next_token()?;
                let value = self.parse_element(datatype, &token)?;
                element::store(datatype, value, &mut staged[i * size..(i + 1) * size])?;
            }
            header.element_count()
        };

        let base = introspect::base_vector(arena, array)?;
        arena.bytes_mut(base, staged.len())?.copy_from_slice(&staged);
        debug!("Parsed {} {} tokens", used, datatype);
        Ok(used)
    }
}

/// Row count and row length of a string array's flat vector.
fn string_rows(dims: &[usize]) -> Result<(usize, usize)> {
    match dims.split_last() {
        Some((&row_len, outer)) => Ok((outer.iter().product(), row_len)),
        None => Err(ArrayError::Unsupported(
            "0-dimensional strings are not supported".into(),
        )),
    }
}
