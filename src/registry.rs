//! Registry of caches by identity.
//!
//! A [`Registry`] is an ordinary value: create one, register caches in it and
//! pass it to whatever performs administration. Several registries can
//! coexist (tests usually build their own).
//!
//! ```text
//!   ids ─────────────▶ Arc<dyn CacheAdmin>
//!   "math::double"     MemoCache<i64, Infallible>
//!   "net::resolve"     MemoCache<IpAddr, io::Error>
//!   "resolve"  ◀── bare-name lookup falls back to the name part
//!
//!   tables: TableDirectory  ("dns" ──▶ Arc<TableStore<IpAddr>>)
//! ```
//!
//! Every administrative operation on an unknown name is a no-op.
//!
//! ## Example Usage
//!
//! ```
//! use std::convert::Infallible;
//!
//! use memokit::args;
//! use memokit::builder::MemoBuilder;
//! use memokit::registry::Registry;
//!
//! let registry = Registry::new();
//! let double = MemoBuilder::new("math::double")
//!     .build_in(&registry, |args| Ok::<_, Infallible>(args[0].as_int().unwrap_or(0) * 2));
//!
//! double.call(&args![3]).unwrap();
//! assert_eq!(registry.cached_entry_count("math::double"), 1);
//!
//! registry.clear_all(Some("math"));
//! assert_eq!(registry.cached_entry_count("double"), 0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::key::CacheId;
use crate::pattern::KeyPattern;
use crate::store::TableDirectory;
use crate::traits::CacheAdmin;
use crate::value::Value;

/// Identity → cache lookup plus the named-table directory.
#[derive(Default)]
pub struct Registry {
    caches: RwLock<BTreeMap<CacheId, Arc<dyn CacheAdmin>>>,
    tables: TableDirectory,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cache` under its identity, replacing any cache registered
    /// under the same identity.
    pub fn register(&self, cache: Arc<dyn CacheAdmin>) {
        let id = cache.id().clone();
        tracing::debug!(cache = %id, kind = ?cache.kind(), "registered cache");
        if self.caches.write().insert(id.clone(), cache).is_some() {
            tracing::debug!(cache = %id, "replaced previously registered cache");
        }
    }

    /// Removes the cache registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn CacheAdmin>> {
        let id = self.find_by_name(name)?.id().clone();
        self.caches.write().remove(&id)
    }

    /// Finds a cache by fully qualified identity, or failing that by bare
    /// name. With several caches sharing a bare name, the one with the
    /// smallest identity wins.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn CacheAdmin>> {
        let caches = self.caches.read();
        if let Some(cache) = caches.get(&CacheId::parse(name)) {
            return Some(Arc::clone(cache));
        }
        caches
            .iter()
            .find(|(id, _)| id.name() == name)
            .map(|(_, cache)| Arc::clone(cache))
    }

    /// Registered identities in order.
    pub fn ids(&self) -> Vec<CacheId> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }

    /// Directory that [`StorageSource::Named`](crate::store::StorageSource::Named)
    /// references resolve against.
    pub fn tables(&self) -> &TableDirectory {
        &self.tables
    }

    /// Clears the whole cache, or only the entry for `args` when given.
    /// Returns the number of entries removed.
    pub fn clear_cache(&self, name: &str, args: Option<&[Value]>) -> usize {
        let Some(cache) = self.find_by_name(name) else {
            return 0;
        };
        match args {
            Some(args) => usize::from(cache.clear_args(args)),
            None => cache.clear(),
        }
    }

    /// Removes the entries of `name` whose arguments match `pattern`.
    pub fn clear_matching(&self, name: &str, pattern: &KeyPattern) -> usize {
        self.find_by_name(name)
            .map_or(0, |cache| cache.clear_matching(pattern))
    }

    /// Removes the expired entries of `name`.
    pub fn purge_cache(&self, name: &str) -> usize {
        self.find_by_name(name).map_or(0, |cache| cache.purge())
    }

    /// Entry count of `name`, expired entries included.
    pub fn cached_entry_count(&self, name: &str) -> usize {
        self.find_by_name(name)
            .map_or(0, |cache| cache.entry_count())
    }

    /// Clears every cache, or only those directly in `namespace`.
    pub fn clear_all(&self, namespace: Option<&str>) -> usize {
        let removed: usize = self
            .selected(namespace)
            .iter()
            .map(|cache| cache.clear())
            .sum();
        tracing::debug!(namespace = ?namespace, removed, "cleared caches");
        removed
    }

    /// Purges every cache, or only those directly in `namespace`.
    pub fn purge_all(&self, namespace: Option<&str>) -> usize {
        let purged: usize = self
            .selected(namespace)
            .iter()
            .map(|cache| cache.purge())
            .sum();
        tracing::debug!(namespace = ?namespace, purged, "purged caches");
        purged
    }

    /// Snapshot of the matching caches, so the operations run without the
    /// registry lock held.
    fn selected(&self, namespace: Option<&str>) -> Vec<Arc<dyn CacheAdmin>> {
        self.caches
            .read()
            .iter()
            .filter(|(id, _)| namespace.is_none_or(|ns| id.in_namespace(ns)))
            .map(|(_, cache)| Arc::clone(cache))
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("caches", &self.ids())
            .field("tables", &self.tables)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use super::*;
    use crate::args;
    use crate::builder::MemoBuilder;
    use crate::expiry::ManualClock;
    use crate::memo::MemoCache;
    use crate::pattern::WILDCARD;
    use crate::store::{StorageSource, TableStore};

    fn identity(id: &str, registry: &Registry) -> Arc<MemoCache<i64>> {
        MemoBuilder::new(id).build_in(registry, |args: &[Value]| {
            Ok::<_, Infallible>(args.first().and_then(Value::as_int).unwrap_or(0))
        })
    }

    #[test]
    fn find_by_qualified_and_bare_name() {
        let registry = Registry::new();
        identity("a::f", &registry);
        identity("b::g", &registry);

        assert_eq!(registry.find_by_name("a::f").unwrap().id().to_string(), "a::f");
        assert_eq!(registry.find_by_name("g").unwrap().id().to_string(), "b::g");
        assert!(registry.find_by_name("missing").is_none());
        assert!(registry.find_by_name("c::f").is_none());
        assert_eq!(
            registry.ids(),
            vec![CacheId::parse("a::f"), CacheId::parse("b::g")]
        );
    }

    #[test]
    fn unknown_names_are_no_ops() {
        let registry = Registry::new();
        assert_eq!(registry.clear_cache("nope", None), 0);
        assert_eq!(registry.clear_cache("nope", Some(&args![1])), 0);
        assert_eq!(registry.purge_cache("nope"), 0);
        assert_eq!(registry.cached_entry_count("nope"), 0);
        assert_eq!(registry.clear_matching("nope", &KeyPattern::new().any()), 0);
        assert!(registry.unregister("nope").is_none());
    }

    #[test]
    fn clear_cache_whole_and_single() {
        let registry = Registry::new();
        let cache = identity("a::f", &registry);
        for n in 0..4 {
            cache.call(&args![n]).unwrap();
        }

        assert_eq!(registry.clear_cache("a::f", Some(&args![2])), 1);
        assert_eq!(registry.cached_entry_count("a::f"), 3);
        assert_eq!(registry.clear_cache("f", None), 3);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn clear_all_respects_namespace() {
        let registry = Registry::new();
        let f = identity("a::f", &registry);
        let g = identity("a::g", &registry);
        let h = identity("b::h", &registry);
        for cache in [&f, &g, &h] {
            cache.call(&args![1]).unwrap();
        }

        assert_eq!(registry.clear_all(Some("a")), 2);
        assert_eq!(h.entry_count(), 1);
        assert_eq!(registry.clear_all(None), 1);
        assert_eq!(h.entry_count(), 0);
    }

    #[test]
    fn purge_all_uses_each_cache_ttl() {
        let clock = Arc::new(ManualClock::new());
        let registry = Registry::new();
        let short = MemoBuilder::new("p::short")
            .time_to_live(Duration::from_secs(1))
            .clock(clock.clone())
            .build_in(&registry, |_: &[Value]| Ok::<_, Infallible>(0u8));
        let forever = MemoBuilder::new("p::forever")
            .clock(clock.clone())
            .build_in(&registry, |_: &[Value]| Ok::<_, Infallible>(0u8));

        short.call(&args![1]).unwrap();
        forever.call(&args![1]).unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(registry.purge_all(Some("p")), 1);
        assert_eq!(short.entry_count(), 0);
        assert_eq!(forever.entry_count(), 1);
    }

    #[test]
    fn register_replaces_and_unregister_removes() {
        let registry = Registry::new();
        let first = identity("a::f", &registry);
        let second = identity("a::f", &registry);
        assert_eq!(registry.len(), 1);

        first.call(&args![1]).unwrap();
        assert_eq!(registry.cached_entry_count("a::f"), 0);
        second.call(&args![1]).unwrap();
        assert_eq!(registry.cached_entry_count("a::f"), 1);

        assert!(registry.unregister("f").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_caches_cleared_independently() {
        let registry = Registry::new();
        let table = Arc::new(TableStore::<i64>::new());
        registry.tables().insert("shared", table.clone());

        let build = |id: &str| {
            MemoBuilder::new(id)
                .shared(true)
                .backing(StorageSource::named("shared", registry.tables()))
                .build_in(&registry, |args: &[Value]| {
                    Ok::<_, Infallible>(args[0].as_int().unwrap_or(0))
                })
        };
        let f = build("s::f");
        let g = build("s::g");
        f.call(&args![1]).unwrap();
        f.call(&args![2]).unwrap();
        g.call(&args![1]).unwrap();

        assert_eq!(registry.cached_entry_count("s::f"), 2);
        assert_eq!(registry.cached_entry_count("s::g"), 1);
        assert_eq!(registry.clear_cache("s::f", None), 2);
        assert_eq!(registry.cached_entry_count("s::g"), 1);
        assert_eq!(
            registry.clear_matching("s::g", &KeyPattern::from(vec![WILDCARD])),
            1
        );
        assert_eq!(g.entry_count(), 0);
    }
}
