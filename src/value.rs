//! Dynamic representation of host data.
//!
//! Host data is converted into a [Value] once, at the API boundary. The
//! engine only ever reads values: rendering never mutates them, and cloning
//! a value is cheap because aggregates are reference counted.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;


/// A host value as seen by the template engine.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent or null data.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(Complex),
    String(String),
    Sequence(Arc<Vec<Value>>),
    Mapping(Arc<BTreeMap<String, Value>>),
    Record(Arc<Record>),
    Callable(Callable),
    /// A value resolving names through its own [Lookup] implementation.
    Custom(Arc<dyn Lookup>),
}


/// Opt-in capability to intercept name resolution.
///
/// A context implementing it is asked for every name resolved against it,
/// and its answer, value or error, is final for that context.
pub trait Lookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Value, BoxError>;
}


type CallableFn = dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync;

/// A function value with a fixed number of arguments.
#[derive(Clone)]
pub struct Callable {
    arity: usize,
    fun: Arc<CallableFn>,
}

impl Callable {
    pub fn new<F>(arity: usize, fun: F) -> Self
    where F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static {
        Callable { arity, fun: Arc::new(fun) }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, BoxError> {
        if args.len() != self.arity {
            return Err(format!(
                "expected {} argument(s), got {}", self.arity, args.len()
            ).into());
        }
        (self.fun)(args)
    }

    /// Convenience for the render callback handed to section lambdas.
    pub fn render(&self, text: &str) -> Result<String, BoxError> {
        self.call(&[Value::from(text)]).map(|value| value.to_string())
    }
}


/// A complex number literal, `re + im i`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im.is_sign_negative() {
            write!(f, "({}-{}i)", Float(self.re), Float(-self.im))
        } else {
            write!(f, "({}+{}i)", Float(self.re), Float(self.im))
        }
    }
}

/// Shortest float text, switching to an exponent for very large or very
/// small magnitudes: `1e+21`, `1.5e-07`.
struct Float(f64);

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = self.0;
        if x.is_infinite() {
            return f.write_str(if x > 0.0 { "+Inf" } else { "-Inf" });
        }
        if x.is_nan() || x == 0.0 || (1e-4..1e21).contains(&x.abs()) {
            return write!(f, "{}", x);
        }
        let text = format!("{:e}", x);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let exponent = exponent.parse::<i32>().unwrap_or_default();
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}


/// A named field of a [Record], optionally reachable through an alias.
#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub value: Value,
}

/// A named-field aggregate with methods, the engine's view of a struct.
#[derive(Clone, Default)]
pub struct Record {
    name: String,
    fields: Vec<Field>,
    methods: Vec<(String, Callable)>,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Record {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn field<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.fields.push(Field {
            name: name.to_owned(),
            alias: None,
            value: value.into(),
        });
        self
    }

    /// Add a field also reachable by `alias`, the way a serialization
    /// rename exposes a field under another name.
    pub fn aliased_field<V: Into<Value>>(mut self, name: &str, alias: &str, value: V) -> Self {
        self.fields.push(Field {
            name: name.to_owned(),
            alias: Some(alias.to_owned()),
            value: value.into(),
        });
        self
    }

    pub fn method(mut self, name: &str, method: Callable) -> Self {
        self.methods.push((name.to_owned(), method));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field by exact name, then by alias.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter()
            .find(|field| field.name == name)
            .or_else(|| self.fields.iter().find(|field| field.alias.as_deref() == Some(name)))
            .map(|field| &field.value)
    }

    pub fn get_method(&self, name: &str) -> Option<&Callable> {
        self.methods.iter()
            .find(|(method, _)| method == name)
            .map(|(_, callable)| callable)
    }
}


impl Value {
    /// Build a section lambda: `fun` receives the literal section body and a
    /// callback rendering text against the section's context.
    pub fn lambda<F>(fun: F) -> Value
    where F: Fn(&str, &Callable) -> Result<String, BoxError> + Send + Sync + 'static {
        Value::Callable(Callable::new(2, move |args| {
            match (&args[0], &args[1]) {
                (Value::String(text), Value::Callable(render)) =>
                    fun(text, render).map(Value::String),
                _ => Err("lambda called without text and render callback".into())
            }
        }))
    }

    pub fn function<F>(arity: usize, fun: F) -> Value
    where F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static {
        Value::Callable(Callable::new(arity, fun))
    }

    pub fn custom<L: Lookup + 'static>(lookup: L) -> Value {
        Value::Custom(Arc::new(lookup))
    }

    /// Emptiness as seen by sections: null, zero scalars, blank strings
    /// and empty sequences are empty; everything else is not.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Complex(c) => c.re == 0.0 && c.im == 0.0,
            Value::String(s) => s.trim().is_empty(),
            Value::Sequence(seq) => seq.is_empty(),
            Value::Mapping(_)
            | Value::Record(_)
            | Value::Callable(_)
            | Value::Custom(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Uint(u) => i64::try_from(*u).ok(),
            _ => None
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Record(_) => "record",
            Value::Callable(_) => "callable",
            Value::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", Float(*x)),
            Value::Complex(c) => write!(f, "{}", c),
            Value::String(s) => f.write_str(s),
            Value::Sequence(seq) => {
                f.write_str("[")?;
                for (i, item) in seq.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            },
            Value::Mapping(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            },
            Value::Record(record) => {
                write!(f, "{}{{", record.name)?;
                for (i, field) in record.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.value)?;
                }
                f.write_str("}")
            },
            Value::Callable(c) => write!(f, "<function/{}>", c.arity),
            Value::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Null => f.write_str("null"),
            other => write!(f, "{}", other),
        }
    }
}


impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(u: $t) -> Self {
                Value::Uint(u as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x as f64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(Arc::new(items.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Mapping(Arc::new(
            map.into_iter().map(|(k, v)| (k, v.into())).collect()
        ))
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Value::Mapping(Arc::new(
            map.into_iter().map(|(k, v)| (k, v.into())).collect()
        ))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(callable)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Mapping(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
        ))
    }
}
