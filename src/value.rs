//! Dynamic argument values.
//!
//! Memoized bodies receive their arguments as a slice of [`Value`]s. Keys,
//! partial-match patterns and shared-cache prefixes are all built from the
//! same type, so a single equality notion runs through the whole crate.
//!
//! ## Example Usage
//!
//! ```
//! use memokit::args;
//! use memokit::value::Value;
//!
//! let list = args![1, "two", 3.5, Value::Nil];
//! assert_eq!(list.len(), 4);
//! assert_eq!(list[0], Value::Int(1));
//! assert!(list[3].is_nil());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One argument (or key component) of a memoized call.
///
/// `Float` compares and hashes by bit pattern so that `Value` can be `Eq`
/// and used as a hash-map key; `NaN` therefore equals itself.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// An interned name. Cache identities use this variant when they prefix
    /// the keys of shared caches, so they never collide with string
    /// arguments.
    Symbol(Arc<str>),
    List(Vec<Value>),
}

impl Value {
    /// Creates a symbol value.
    pub fn symbol(name: impl Into<Arc<str>>) -> Self {
        Value::Symbol(name.into())
    }

    /// Returns `true` for [`Value::Nil`].
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload of `Str` or `Symbol`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::Symbol(_) => 5,
            Value::List(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            Value::Nil => {},
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) | Value::Symbol(s) => s.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "'{s}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

/// Builds a `Vec<Value>` argument list from anything convertible into
/// [`Value`].
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::value::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::value::Value::from($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn str_and_symbol_are_distinct() {
        let s = Value::from("cache");
        let sym = Value::symbol("cache");
        assert_ne!(s, sym);
        assert_ne!(hash_of(&s), hash_of(&sym));
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn option_none_converts_to_nil() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_nil());
        assert_eq!(Value::from(Some(4)), Value::Int(4));
    }

    #[test]
    fn args_macro_builds_values() {
        let empty = args![];
        assert!(empty.is_empty());

        let list = args![1, "a", true];
        assert_eq!(list, vec![Value::Int(1), Value::from("a"), Value::Bool(true)]);
    }

    #[test]
    fn nested_lists_hash_consistently() {
        let a = Value::List(vec![Value::Int(1), Value::List(vec![Value::Nil])]);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn debug_rendering() {
        let v = Value::List(vec![Value::symbol("id"), Value::from("x"), Value::Nil]);
        assert_eq!(format!("{v:?}"), "['id, \"x\", nil]");
    }
}
