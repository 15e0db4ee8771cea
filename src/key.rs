//! Cache key derivation.
//!
//! Turns an argument list into a canonical, hashable [`CacheKey`].
//!
//! ## Derivation Rules
//!
//! ```text
//!   derive(Nil)          = Nil
//!   derive(List([]))     = Nil
//!   derive(List(xs))     = List(xs.map(derive))
//!   derive(scalar)       = test.canonicalize(scalar)
//!
//!   compute_cache_key(args)          = [derive(a) for a in args]
//!   compute_cache_key(args, shared)  = ['identity, derive(a) for a in args]
//! ```
//!
//! The top-level argument slice is always kept as a sequence: a call with no
//! arguments keys to `[]` while a call with one `Nil` argument keys to
//! `[nil]`.
//!
//! ## Equality Tests
//!
//! | Test         | Table storage | Single-cell storage | Semantics                       |
//! |--------------|---------------|---------------------|---------------------------------|
//! | `Structural` | yes           | yes                 | `==` on derived values          |
//! | `Relaxed`    | yes           | yes                 | case-folded strings, 2.0 == 2   |
//! | `Custom`     | no            | yes                 | arbitrary predicate             |
//!
//! Tables can only honor tests that are expressible as a canonical form,
//! because lookups go through hashing.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Predicate used by [`EqualityTest::Custom`].
pub type KeyPredicate = Arc<dyn Fn(&CacheKey, &CacheKey) -> bool + Send + Sync>;

/// How two keys are judged equivalent.
#[derive(Clone, Default)]
pub enum EqualityTest {
    #[default]
    Structural,
    Relaxed,
    Custom(KeyPredicate),
}

impl EqualityTest {
    /// Wraps an arbitrary predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&CacheKey, &CacheKey) -> bool + Send + Sync + 'static,
    {
        EqualityTest::Custom(Arc::new(predicate))
    }

    /// Returns `true` if keys compared under this test can be hashed.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, EqualityTest::Custom(_))
    }

    /// Maps a scalar to its canonical representative under this test.
    pub fn canonicalize(&self, value: &Value) -> Value {
        match (self, value) {
            (EqualityTest::Relaxed, Value::Str(s)) => Value::from(s.to_lowercase()),
            (EqualityTest::Relaxed, Value::Float(x))
                if x.fract() == 0.0 && x.abs() < i64::MAX as f64 =>
            {
                Value::Int(*x as i64)
            },
            _ => value.clone(),
        }
    }

    /// Compares two derived keys.
    pub fn keys_equal(&self, a: &CacheKey, b: &CacheKey) -> bool {
        match self {
            EqualityTest::Custom(predicate) => predicate(a, b),
            _ => a == b,
        }
    }
}

impl fmt::Debug for EqualityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqualityTest::Structural => f.write_str("Structural"),
            EqualityTest::Relaxed => f.write_str("Relaxed"),
            EqualityTest::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Canonical key of one memoized call.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<Value>);

impl CacheKey {
    /// Wraps already-derived components.
    pub fn from_components(components: Vec<Value>) -> Self {
        Self(components)
    }

    /// Key components, identity prefix included for shared caches.
    pub fn components(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

/// Derives the canonical form of a single argument.
pub fn derive_key(value: &Value, test: &EqualityTest) -> Value {
    match value {
        Value::Nil => Value::Nil,
        Value::List(items) if items.is_empty() => Value::Nil,
        Value::List(items) => Value::List(items.iter().map(|v| derive_key(v, test)).collect()),
        scalar => test.canonicalize(scalar),
    }
}

/// Derives the key a cache stores a call under.
///
/// `shared_identity` is the cache identity when the cache shares its table
/// with other caches; it becomes the first key component.
pub fn compute_cache_key(
    args: &[Value],
    shared_identity: Option<&CacheId>,
    test: &EqualityTest,
) -> CacheKey {
    let prefix = usize::from(shared_identity.is_some());
    let mut components = Vec::with_capacity(args.len() + prefix);
    if let Some(id) = shared_identity {
        components.push(id.as_symbol());
    }
    components.extend(args.iter().map(|arg| derive_key(arg, test)));
    CacheKey(components)
}

/// Stable identity of a cache: an optional namespace plus a declared name.
///
/// Parsed from and rendered as `namespace::name`; the namespace is everything
/// before the last `::`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId {
    namespace: Option<Arc<str>>,
    name: Arc<str>,
}

impl CacheId {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(Arc::from),
            name: Arc::from(name),
        }
    }

    /// Parses `namespace::name` (or a bare `name`).
    pub fn parse(qualified: &str) -> Self {
        match qualified.rsplit_once("::") {
            Some((ns, name)) => Self::new(Some(ns), name),
            None => Self::new(None, qualified),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this identity lives directly in `namespace`.
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// The identity as a key component.
    pub fn as_symbol(&self) -> Value {
        Value::symbol(self.to_string())
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}::{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Debug for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheId({self})")
    }
}

impl From<&str> for CacheId {
    fn from(qualified: &str) -> Self {
        Self::parse(qualified)
    }
}

impl From<String> for CacheId {
    fn from(qualified: String) -> Self {
        Self::parse(&qualified)
    }
}
