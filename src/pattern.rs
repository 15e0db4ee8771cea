//! Partial-key patterns for selective invalidation.
//!
//! A [`KeyPattern`] is matched position by position against stored keys:
//!
//! ```text
//!   pattern  [ A ,  _  , C ]
//!   stored   [ A ,  B  , C , D ]   ✓  (trailing D unconstrained)
//!   stored   [ A ,  X  , C ]       ✓
//!   stored   [ A ,  B  , E ]       ✗
//!   stored   [ A ]                 ✗  (exact C has nothing to match)
//! ```
//!
//! `_` is [`WILDCARD`]. It is a distinct [`PatternPart`] variant rather than
//! a reserved [`Value`], so no argument can ever be mistaken for it.

use crate::key::{CacheKey, EqualityTest, derive_key};
use crate::value::Value;

/// One position of a [`KeyPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternPart {
    /// Accepts any component.
    Any,
    /// Requires an equal component.
    Exact(Value),
}

/// Matches any key component.
pub const WILDCARD: PatternPart = PatternPart::Any;

impl<T: Into<Value>> From<T> for PatternPart {
    fn from(value: T) -> Self {
        PatternPart::Exact(value.into())
    }
}

/// Sequence of pattern parts matched against key prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPattern {
    parts: Vec<PatternPart>,
}

impl KeyPattern {
    /// Creates an empty pattern, which matches every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an exact component.
    pub fn exact(mut self, value: impl Into<Value>) -> Self {
        self.parts.push(PatternPart::Exact(value.into()));
        self
    }

    /// Appends a wildcard.
    pub fn any(mut self) -> Self {
        self.parts.push(PatternPart::Any);
        self
    }

    pub fn parts(&self) -> &[PatternPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns a copy of this pattern with `value` in front.
    pub fn prefixed(&self, value: Value) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.push(PatternPart::Exact(value));
        parts.extend(self.parts.iter().cloned());
        Self { parts }
    }

    /// Derives every exact component under `test`, so they compare like the
    /// keys they are matched against.
    pub fn derived(&self, test: &EqualityTest) -> Self {
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                PatternPart::Any => PatternPart::Any,
                PatternPart::Exact(value) => PatternPart::Exact(derive_key(value, test)),
            })
            .collect();
        Self { parts }
    }

    /// Tests `key` against this pattern. Components compare with `==`, so a
    /// pattern must be [`derived`](Self::derived) under the same test as the
    /// keys it is matched against.
    pub fn matches(&self, key: &CacheKey) -> bool {
        let components = key.components();
        self.parts
            .iter()
            .enumerate()
            .all(|(idx, part)| match part {
                PatternPart::Any => true,
                PatternPart::Exact(expected) => components.get(idx) == Some(expected),
            })
    }
}

impl FromIterator<PatternPart> for KeyPattern {
    fn from_iter<I: IntoIterator<Item = PatternPart>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<PatternPart>> for KeyPattern {
    fn from(parts: Vec<PatternPart>) -> Self {
        Self { parts }
    }
}
