// ABOUTME: Reader turning source text into Values, one top-level form at a time

use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1};
use nom::combinator::{opt, recognize};
use nom::{IResult, Parser};

use crate::config::MAX_SYMBOL_LEN;
use crate::error::LispError;
use crate::symbol::intern;
use crate::value::Value;

/// Read the next top-level form, returning it and the remaining input.
/// `Ok(None)` means the stream held nothing but whitespace and comments.
pub fn read_form(input: &str) -> Result<Option<(Value, &str)>, LispError> {
    let input = skip_ws_and_comments(input);
    if input.is_empty() {
        return Ok(None);
    }
    read_expr(input).map(Some)
}

/// Read exactly one form; trailing input (other than whitespace and
/// comments) is an error. Convenience entry point for tests and callers
/// that hold a complete expression.
pub fn read_str(input: &str) -> Result<Value, LispError> {
    match read_form(input)? {
        None => Err(LispError::UnexpectedEof),
        Some((value, rest)) => {
            if skip_ws_and_comments(rest).is_empty() {
                Ok(value)
            } else {
                Err(LispError::TrailingInput)
            }
        }
    }
}

/// Skip whitespace and `;`-to-end-of-line comments.
fn skip_ws_and_comments(mut input: &str) -> &str {
    loop {
        input = input.trim_start();
        if input.starts_with(';') {
            input = match input.find('\n') {
                Some(pos) => &input[pos + 1..],
                None => "",
            };
        } else {
            return input;
        }
    }
}

/// A symbol may continue with anything that is not whitespace or a
/// structural delimiter; digits are allowed after the first character.
fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '.'
}

fn read_expr(input: &str) -> Result<(Value, &str), LispError> {
    let input = skip_ws_and_comments(input);
    let mut chars = input.chars();
    let c = chars.next().ok_or(LispError::UnexpectedEof)?;
    let after = chars.next();

    match c {
        '(' => read_list(&input[1..], true),
        ')' => Err(LispError::UnexpectedChar(')')),
        '.' => Err(LispError::DotOutsideList),
        '\'' => read_sugar(&input[1..], "quote"),
        '`' => read_sugar(&input[1..], "quasiquote"),
        ',' => {
            if let Some(rest) = input[1..].strip_prefix('@') {
                read_sugar(rest, "unquote-splicing")
            } else {
                read_sugar(&input[1..], "unquote")
            }
        }
        '"' => read_string(&input[1..]),
        '-' if after.is_some_and(|d| d.is_ascii_digit()) => read_int(input),
        _ if c.is_ascii_digit() => read_int(input),
        _ => read_symbol(input),
    }
}

/// `'E` and friends expand to a two-element list at read time.
fn read_sugar<'a>(input: &'a str, name: &str) -> Result<(Value, &'a str), LispError> {
    let (expr, rest) = read_expr(input)?;
    let wrapped = Value::list(vec![Value::Symbol(intern(name)), expr]);
    Ok((wrapped, rest))
}

/// The body of a list, after the opening paren. Built right to left by
/// `cons` through the recursion. A `.` after the first element makes the
/// next form the final cdr.
fn read_list(input: &str, first: bool) -> Result<(Value, &str), LispError> {
    let input = skip_ws_and_comments(input);
    let mut chars = input.chars();
    match chars.next() {
        None => Err(LispError::UnexpectedEof),
        Some(')') => Ok((Value::Nil, &input[1..])),
        Some('.') if first => Err(LispError::DotOutsideList),
        Some('.') => {
            let (cdr, rest) = read_expr(&input[1..])?;
            let rest = skip_ws_and_comments(rest);
            match rest.strip_prefix(')') {
                Some(rest) => Ok((cdr, rest)),
                None => Err(LispError::ExpectedCloseParen),
            }
        }
        Some(_) => {
            let (car, rest) = read_expr(input)?;
            let (cdr, rest) = read_list(rest, false)?;
            Ok((Value::cons(car, cdr), rest))
        }
    }
}

fn read_int(input: &str) -> Result<(Value, &str), LispError> {
    let result: IResult<&str, &str> = recognize((opt(char('-')), digit1)).parse(input);
    let (rest, digits) = result.map_err(|_| LispError::UnexpectedEof)?;
    let n: i64 = digits.parse().map_err(|_| LispError::IntegerOverflow)?;
    Ok((Value::Int(n), rest))
}

fn read_symbol(input: &str) -> Result<(Value, &str), LispError> {
    let result: IResult<&str, &str> =
        take_while1::<_, _, nom::error::Error<_>>(is_symbol_char).parse(input);
    let (rest, name) = result.map_err(|_| {
        LispError::UnexpectedChar(input.chars().next().unwrap_or('\0'))
    })?;
    if name.len() > MAX_SYMBOL_LEN {
        return Err(LispError::SymbolTooLong);
    }
    // the nil literal is the empty list, not a symbol
    if name == "nil" {
        return Ok((Value::Nil, rest));
    }
    Ok((Value::Symbol(intern(name)), rest))
}

/// A string body, after the opening quote. Escapes are `\n \t \r \\ \"`.
fn read_string(input: &str) -> Result<(Value, &str), LispError> {
    let mut out = String::new();
    let mut iter = input.char_indices();
    while let Some((i, c)) = iter.next() {
        match c {
            '"' => return Ok((Value::string(out), &input[i + 1..])),
            '\\' => match iter.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, other)) => return Err(LispError::UnknownEscape(other)),
                None => return Err(LispError::UnterminatedString),
            },
            _ => out.push(c),
        }
    }
    Err(LispError::UnterminatedString)
}
