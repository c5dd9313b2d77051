//! Path expressions.
//!
//! A tag name is resolved against the context stack. Besides plain names it
//! may be a dotted path (`a.b`), an index (`a[i]`, `a[0].b`), a function
//! call (`f(x, 'y')`) or a literal (`'text'`, `42`, `0x1f`, `1.5`, `true`,
//! `1+2i`). The first structural character, left to right, decides how the
//! expression is split; index and argument sub-expressions are resolved
//! independently against the whole stack.

use std::str::CharIndices;

use crate::context::Stack;
use crate::error::RenderError;
use crate::value::{Callable, Complex, Value};


/// Resolve `expression` against contexts given innermost first.
pub fn resolve(contexts: &[Value], expression: &str) -> Result<Value, RenderError> {
    lookup(&Stack::from(contexts), None, expression)
}

/// Resolve `name`, turning a missing variable into `None` when allowed.
pub(crate) fn lookup_allow_missing(
    stack: &Stack, name: &str, allow_missing: bool
) -> Result<Option<Value>, RenderError> {
    match lookup(stack, None, name) {
        Ok(value) => Ok(Some(value)),
        Err(RenderError::MissingVariable(_)) if allow_missing => Ok(None),
        Err(err) => Err(err)
    }
}

/// Resolve `name` against the stack, or against `left` alone when the name
/// continues a path whose head was already resolved.
pub(crate) fn lookup(stack: &Stack, left: Option<&Value>, name: &str) -> Result<Value, RenderError> {
    tracing::trace!(name, "lookup");
    if let Some(value) = parse_literal(name) {
        return Ok(value);
    }
    match find_structural(name) {
        Some((at, '.')) if name != "." => lookup_dotted(stack, left, name, at),
        Some((at, '[')) => lookup_indexed(stack, left, name, at),
        Some((at, '(')) => lookup_call(stack, left, name, at),
        _ => lookup_name(stack, left, name)
    }
}

fn lookup_dotted(stack: &Stack, left: Option<&Value>, name: &str, at: usize) -> Result<Value, RenderError> {
    let value = lookup(stack, left, &name[..at])?;
    let rest = &name[at + 1..];
    if starts_with_digit(rest) {
        return Err(RenderError::InvalidVariable(name.to_owned()));
    }
    lookup(stack, Some(&value), rest)
}

fn lookup_indexed(stack: &Stack, left: Option<&Value>, name: &str, open: usize) -> Result<Value, RenderError> {
    let invalid = || RenderError::InvalidVariable(name.to_owned());
    let close = matching_close(name, open).ok_or_else(invalid)?;
    let target = if open > 0 {
        lookup(stack, left, &name[..open])?
    } else {
        left.cloned().ok_or_else(invalid)?
    };
    let index = lookup(stack, None, name[open + 1..close].trim())?;
    let value = index_into(&target, &index).ok_or_else(invalid)?;
    continue_path(stack, value, &name[close + 1..], name)
}

fn lookup_call(stack: &Stack, left: Option<&Value>, name: &str, open: usize) -> Result<Value, RenderError> {
    let close = matching_close(name, open)
        .ok_or_else(|| RenderError::InvalidVariable(name.to_owned()))?;
    let function_name = name[..open].trim();
    let args = split_args(&name[open + 1..close]);
    let function = find_function(stack, left, function_name, args.len())?;
    let values = args.iter()
        .map(|arg| lookup(stack, None, arg))
        .collect::<Result<Vec<_>, _>>()?;
    let value = function.call(&values).map_err(RenderError::from_boxed)?;
    continue_path(stack, value, &name[close + 1..], name)
}

// resolve what follows `]` or `)` against the value just produced
fn continue_path(stack: &Stack, value: Value, rest: &str, name: &str) -> Result<Value, RenderError> {
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    if rest.is_empty() {
        Ok(value)
    } else if starts_with_digit(rest) {
        Err(RenderError::InvalidVariable(name.to_owned()))
    } else {
        lookup(stack, Some(&value), rest)
    }
}

fn lookup_name(stack: &Stack, left: Option<&Value>, name: &str) -> Result<Value, RenderError> {
    match left {
        Some(context) => {
            if let Some(value) = value_in(context, name)? {
                return Ok(value);
            }
        },
        None => {
            for context in stack.iter() {
                if let Some(value) = value_in(context, name)? {
                    return Ok(value);
                }
            }
        }
    }
    Err(RenderError::MissingVariable(name.to_owned()))
}

// look `name` up in a single context; `None` moves on to the next one
fn value_in(context: &Value, name: &str) -> Result<Option<Value>, RenderError> {
    if let Value::Custom(custom) = context {
        return custom.lookup(name)
            .map(Some)
            .map_err(RenderError::from_boxed);
    }
    if let Value::Record(record) = context {
        if let Some(method) = record.get_method(name).filter(|m| m.arity() == 0) {
            return method.call(&[])
                .map(Some)
                .map_err(RenderError::from_boxed);
        }
    }
    if name == "." {
        return Ok(Some(context.clone()));
    }
    let found = match context {
        Value::Record(record) => record.get(name).cloned(),
        Value::Mapping(map) => map.get(name).cloned(),
        Value::Sequence(seq) => match name {
            "length" | "len" => Some(Value::from(seq.len())),
            _ => name.parse::<usize>().ok().and_then(|i| seq.get(i).cloned())
        },
        _ => None
    };
    Ok(found)
}

fn find_function(
    stack: &Stack, left: Option<&Value>, name: &str, arity: usize
) -> Result<Callable, RenderError> {
    let found = match left {
        Some(context) => function_in(context, name, arity)?,
        None => {
            let mut found = None;
            for context in stack.iter() {
                found = function_in(context, name, arity)?;
                if found.is_some() {
                    break;
                }
            }
            found
        }
    };
    match found {
        Some(Value::Callable(callable)) if callable.arity() == arity => Ok(callable),
        _ => Err(RenderError::MissingFunction(name.to_owned()))
    }
}

// candidate for `name` in a single context; `None` moves on to the next one.
// A custom lookup answers for its context, value or error.
fn function_in(context: &Value, name: &str, arity: usize) -> Result<Option<Value>, RenderError> {
    let is_match = |value: &Value| matches!(value, Value::Callable(c) if c.arity() == arity);
    let candidate = match context {
        Value::Custom(custom) => return custom.lookup(name)
            .map(Some)
            .map_err(RenderError::from_boxed),
        Value::Record(record) => record.get_method(name)
            .filter(|method| method.arity() == arity)
            .cloned()
            .map(Value::Callable)
            .or_else(|| record.get(name).cloned()),
        Value::Mapping(map) => map.get(name).cloned(),
        _ => None
    };
    Ok(candidate.filter(is_match))
}

fn index_into(target: &Value, index: &Value) -> Option<Value> {
    match target {
        Value::Mapping(map) => {
            let key = match index {
                Value::String(s) => s.clone(),
                Value::Int(_) | Value::Uint(_) | Value::Bool(_) => index.to_string(),
                _ => return None
            };
            map.get(&key).cloned()
        },
        Value::Sequence(seq) => {
            let position = match index {
                Value::Int(i) => usize::try_from(*i).ok()?,
                Value::Uint(u) => usize::try_from(*u).ok()?,
                Value::Float(f) if f.is_finite() && *f >= 0.0 => *f as usize,
                _ => return None
            };
            seq.get(position).cloned()
        },
        _ => None
    }
}


/// Characters of an expression that lie outside quoted literals.
///
/// A quote only opens a literal at the start of an operand, so the
/// apostrophe in `don't` is part of a plain name.
struct Unquoted<'a> {
    chars: CharIndices<'a>,
    quote: Option<char>,
    prev: Option<char>,
}

impl<'a> Unquoted<'a> {
    fn new(text: &'a str) -> Self {
        Unquoted { chars: text.char_indices(), quote: None, prev: None }
    }

    fn in_quote(&self) -> bool {
        self.quote.is_some()
    }
}

impl Iterator for Unquoted<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, c) = self.chars.next()?;
            let prev = self.prev.replace(c);
            match self.quote {
                Some(q) => if c == q {
                    self.quote = None;
                },
                None if matches!(c, '\'' | '"') && starts_operand(prev) => self.quote = Some(c),
                None => return Some((i, c))
            }
        }
    }
}

fn starts_operand(prev: Option<char>) -> bool {
    matches!(prev, None | Some('[' | '(' | ',' | ' ' | '\t'))
}


/// Check that brackets, parentheses and quotes of an expression balance.
pub(crate) fn is_valid_expression(name: &str) -> bool {
    let mut closers = Vec::new();
    let mut scan = Unquoted::new(name);
    for (_, c) in scan.by_ref() {
        match c {
            '[' => closers.push(']'),
            '(' => closers.push(')'),
            ']' | ')' => {
                if closers.pop() != Some(c) {
                    return false;
                }
            },
            _ => {}
        }
    }
    !scan.in_quote() && closers.is_empty()
}

// first `.`, `[` or `(` outside quotes
fn find_structural(name: &str) -> Option<(usize, char)> {
    Unquoted::new(name).find(|&(_, c)| matches!(c, '.' | '[' | '('))
}

// position of the bracket closing the one at `open`
fn matching_close(name: &str, open: usize) -> Option<usize> {
    let mut closers = Vec::new();
    for (i, c) in Unquoted::new(&name[open..]) {
        match c {
            '[' => closers.push(']'),
            '(' => closers.push(')'),
            ']' | ')' => {
                if closers.pop() != Some(c) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(open + i);
                }
            },
            _ => {}
        }
    }
    None
}

// comma separated arguments, ignoring commas nested in brackets or quotes
fn split_args(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return vec![];
    }
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in Unquoted::new(text) {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            },
            _ => {}
        }
    }
    args.push(text[start..].trim());
    args
}

fn starts_with_digit(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit())
}


/// Parse a literal: quoted string, then signed integer, unsigned integer,
/// float, boolean and complex number. The first successful parse wins.
pub(crate) fn parse_literal(text: &str) -> Option<Value> {
    if let Some(s) = parse_quoted(text) {
        return Some(Value::from(s));
    }
    if let Some(i) = parse_int(text) {
        return Some(Value::Int(i));
    }
    if let Some(u) = parse_uint(text) {
        return Some(Value::Uint(u));
    }
    if let Some(f) = parse_float(text) {
        return Some(Value::Float(f));
    }
    if let Some(b) = parse_bool(text) {
        return Some(Value::Bool(b));
    }
    parse_complex(text).map(Value::Complex)
}

fn parse_quoted(text: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            Some(&text[1..text.len() - 1])
        } else {
            None
        }
    })
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text))
    };
    let magnitude = i128::from(parse_uint(digits)?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn parse_uint(text: &str) -> Option<u64> {
    let (radix, digits) = match text.get(..2) {
        Some("0x" | "0X") => (16, &text[2..]),
        Some("0o" | "0O") => (8, &text[2..]),
        Some("0b" | "0B") => (2, &text[2..]),
        _ if text.len() > 1 && text.starts_with('0') => (8, &text[1..]),
        _ => (10, text)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok()
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None
    }
}

fn parse_complex(text: &str) -> Option<Complex> {
    let text = text.strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    let body = text.strip_suffix('i')?;
    let bytes = body.as_bytes();
    let split = (1..bytes.len()).rev().find(
        |&k| matches!(bytes[k], b'+' | b'-') && !matches!(bytes[k - 1], b'e' | b'E')
    );
    match split {
        Some(k) => {
            let im = match &body[k..] {
                "+" => 1.0,
                "-" => -1.0,
                im => parse_float(im)?
            };
            Some(Complex::new(parse_float(&body[..k])?, im))
        },
        None => Some(Complex::new(0.0, parse_float(body)?))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::value::{Lookup, Record};
    use crate::error::BoxError;

    fn data() -> Value {
        let items = Value::from(vec!["zero", "one", "two"]);
        let user = Record::new("User")
            .aliased_field("Name", "name", "Ada")
            .field("Langs", vec!["en", "fr"])
            .method("Greeting", Callable::new(0, |_| Ok(Value::from("hello"))))
            .method("Twice", Callable::new(1, |args| Ok(Value::from(format!("{0}{0}", args[0])))));
        vec![
            ("items", items),
            ("user", Value::from(user)),
            ("key", Value::from("b")),
            ("map", vec![("a", 1), ("b", 2)].into_iter().collect()),
            ("add", Value::function(2, |args| {
                Ok(Value::from(args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0)))
            })),
            ("fail", Value::function(0, |_| Err("boom".into()))),
        ].into_iter().collect()
    }

    fn eval(expression: &str) -> Result<String, RenderError> {
        resolve(&[data()], expression).map(|value| value.to_string())
    }

    #[test]
    fn literals() {
        assert!(matches!(parse_literal("'a.b'"), Some(Value::String(s)) if s == "a.b"));
        assert!(matches!(parse_literal("\"x\""), Some(Value::String(s)) if s == "x"));
        assert!(matches!(parse_literal("-42"), Some(Value::Int(-42))));
        assert!(matches!(parse_literal("0x1f"), Some(Value::Int(31))));
        assert!(matches!(parse_literal("0755"), Some(Value::Int(493))));
        assert!(matches!(parse_literal("18446744073709551615"), Some(Value::Uint(u64::MAX))));
        assert!(matches!(parse_literal("1.5"), Some(Value::Float(f)) if f == 1.5));
        assert!(matches!(parse_literal("True"), Some(Value::Bool(true))));
        assert!(matches!(parse_literal("1+2i"), Some(Value::Complex(c)) if c == Complex::new(1.0, 2.0)));
        assert!(matches!(parse_literal("3i"), Some(Value::Complex(c)) if c == Complex::new(0.0, 3.0)));
        for name in ["name", "i", "inf", "nan", "t", "x1", "."] {
            assert!(parse_literal(name).is_none(), "{} is not a literal", name);
        }
    }

    #[test]
    fn dotted_paths() {
        assert_eq!(eval("user.Name").unwrap(), "Ada");
        assert_eq!(eval("user.name").unwrap(), "Ada");
        assert_eq!(eval("user.Greeting").unwrap(), "hello");
        assert_eq!(eval("items.length").unwrap(), "3");
        assert!(eval("items.1").unwrap_err().is_invalid_variable());
        assert!(matches!(eval("user.Missing"), Err(RenderError::MissingVariable(name)) if name == "Missing"));
    }

    #[test]
    fn indexed_paths() {
        assert_eq!(eval("items[0]").unwrap(), "zero");
        assert_eq!(eval("user.Langs[1]").unwrap(), "fr");
        assert_eq!(eval("map['a']").unwrap(), "1");
        assert_eq!(eval("map[key]").unwrap(), "2");
        assert_eq!(eval("items[map.b]").unwrap(), "two");
        assert!(eval("items[3]").unwrap_err().is_invalid_variable());
        assert!(eval("items[-1]").unwrap_err().is_invalid_variable());
        assert!(eval("map['z']").unwrap_err().is_invalid_variable());
        assert!(eval("key[0]").unwrap_err().is_invalid_variable());
    }

    #[test]
    fn calls() {
        assert_eq!(eval("add(1, 2)").unwrap(), "3");
        assert_eq!(eval("add(map.a, add(2, 3))").unwrap(), "6");
        assert_eq!(eval("user.Twice('ab')").unwrap(), "abab");
        assert!(matches!(eval("add(1)"), Err(RenderError::MissingFunction(name)) if name == "add"));
        assert!(matches!(eval("fail()"), Err(RenderError::Callable(err)) if err.to_string() == "boom"));
    }

    #[test]
    fn innermost_context_wins() {
        let inner: Value = vec![("name", "inner")].into_iter().collect();
        let outer: Value = vec![("name", "outer"), ("only", "outer")].into_iter().collect();
        let contexts = [inner, outer];
        assert_eq!(resolve(&contexts, "name").unwrap().to_string(), "inner");
        assert_eq!(resolve(&contexts, "only").unwrap().to_string(), "outer");
        assert_eq!(resolve(&contexts, ".").unwrap().to_string(), "{name: inner}");
    }

    struct Env;

    impl Lookup for Env {
        fn lookup(&self, name: &str) -> Result<Value, BoxError> {
            match name {
                "home" => Ok(Value::from("/root")),
                _ => Err(Box::new(RenderError::MissingVariable(name.to_owned())))
            }
        }
    }

    #[test]
    fn custom_lookup_short_circuits() {
        let outer: Value = vec![("home", "shadowed"), ("other", "x")].into_iter().collect();
        let contexts = [Value::Custom(Arc::new(Env)), outer];
        assert_eq!(resolve(&contexts, "home").unwrap().to_string(), "/root");
        assert!(resolve(&contexts, "other").unwrap_err().is_missing_variable());
    }

    #[test]
    fn expression_validation() {
        assert!(is_valid_expression("a[b[0]].c(d, 'e)')"));
        assert!(!is_valid_expression("a[0"));
        assert!(!is_valid_expression("f(]"));
        assert!(!is_valid_expression("'open"));
        assert!(is_valid_expression("don't"));
        assert!(is_valid_expression("f(x, 'it''s')"));
        assert!(!is_valid_expression("f('a)"));
    }
}
