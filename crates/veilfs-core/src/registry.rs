//! Append-only keyed record store.
//!
//! Every spoofing table in the engine is one `Registry` instantiation. A
//! registry owns an insertion-ordered `Vec` behind its own `RwLock`, so
//! lookups against different stores never contend and many readers can scan
//! the same store at once. Insertion runs the uniqueness scan and the append
//! under a single write guard.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use veilfs_common::error::{Result, VeilError};

/// A record that can live in a [`Registry`].
pub trait RegistryRecord: Send + Sync {
    /// Store name used in logs and errors.
    const STORE: &'static str;

    /// Returns whether `candidate` collides with this already stored record.
    fn conflicts_with(&self, candidate: &Self) -> bool;

    /// Renders the record's uniqueness key for diagnostics.
    fn describe(&self) -> String;
}

/// Insertion-ordered store of immutable-after-insert records.
#[derive(Debug)]
pub struct Registry<T> {
    records: RwLock<Vec<T>>,
    limit: Option<usize>,
}

impl<T: RegistryRecord> Registry<T> {
    /// Creates an unbounded registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            limit: None,
        }
    }

    /// Creates a registry that refuses to grow beyond `limit` entries.
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            limit: Some(limit),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record unless it collides with a stored one.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntry` on a key collision, `StoreFull` when the
    /// registry is at its limit, and `OutOfMemory` if the backing storage
    /// cannot grow.
    pub fn insert(&self, record: T) -> Result<()> {
        let mut records = self.write();
        if records.iter().any(|existing| existing.conflicts_with(&record)) {
            return Err(VeilError::DuplicateEntry {
                store: T::STORE,
                key: record.describe(),
            });
        }
        if let Some(limit) = self.limit {
            if records.len() >= limit {
                return Err(VeilError::StoreFull {
                    store: T::STORE,
                    limit,
                });
            }
        }
        records
            .try_reserve(1)
            .map_err(|_| VeilError::OutOfMemory { store: T::STORE })?;
        records.push(record);
        Ok(())
    }

    /// Mutates the first record selected by `select` in place.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` (reporting `key`) when no record is selected.
    pub fn update<S, F>(&self, key: &str, mut select: S, apply: F) -> Result<()>
    where
        S: FnMut(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut records = self.write();
        match records.iter_mut().find(|record| select(record)) {
            Some(record) => {
                apply(record);
                Ok(())
            }
            None => Err(VeilError::NotFound {
                store: T::STORE,
                key: key.to_owned(),
            }),
        }
    }

    /// Visits records in insertion order and returns the first `Some`.
    pub fn scan<R, F>(&self, visit: F) -> Option<R>
    where
        F: FnMut(&T) -> Option<R>,
    {
        self.read().iter().find_map(visit)
    }

    /// Returns whether any record satisfies `predicate`.
    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.read().iter().any(predicate)
    }

    /// Runs `f` against a consistent view of every record.
    pub fn with_records<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&[T]) -> R,
    {
        f(&self.read())
    }

    /// Removes and returns the first record satisfying `predicate`.
    pub fn remove_first<F>(&self, predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut records = self.write();
        let index = records.iter().position(predicate)?;
        Some(records.remove(index))
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the configured entry limit, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl<T: RegistryRecord + Clone> Registry<T> {
    /// Returns a copy of every record in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }
}

impl<T: RegistryRecord> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Named {
        name: String,
        value: u32,
    }

    impl RegistryRecord for Named {
        const STORE: &'static str = "named";

        fn conflicts_with(&self, candidate: &Self) -> bool {
            self.name == candidate.name
        }

        fn describe(&self) -> String {
            format!("name '{}'", self.name)
        }
    }

    fn named(name: &str, value: u32) -> Named {
        Named {
            name: name.into(),
            value,
        }
    }

    #[test]
    fn insert_preserves_order() {
        let registry = Registry::new();
        registry.insert(named("a", 1)).unwrap();
        registry.insert(named("b", 2)).unwrap();
        let names: Vec<_> = registry.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn duplicate_is_rejected_and_original_kept() {
        let registry = Registry::new();
        registry.insert(named("a", 1)).unwrap();
        let err = registry.insert(named("a", 2)).unwrap_err();
        assert!(matches!(err, VeilError::DuplicateEntry { store: "named", .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].value, 1);
    }

    #[test]
    fn limit_is_enforced() {
        let registry = Registry::with_limit(2);
        registry.insert(named("a", 1)).unwrap();
        registry.insert(named("b", 1)).unwrap();
        let err = registry.insert(named("c", 1)).unwrap_err();
        assert!(matches!(err, VeilError::StoreFull { limit: 2, .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_reported_before_full() {
        let registry = Registry::with_limit(1);
        registry.insert(named("a", 1)).unwrap();
        let err = registry.insert(named("a", 1)).unwrap_err();
        assert!(matches!(err, VeilError::DuplicateEntry { .. }));
    }

    #[test]
    fn update_mutates_selected_record() {
        let registry = Registry::new();
        registry.insert(named("a", 1)).unwrap();
        registry
            .update("a", |r| r.name == "a", |r| r.value = 9)
            .unwrap();
        assert_eq!(registry.scan(|r| Some(r.value)), Some(9));
    }

    #[test]
    fn update_missing_key_is_not_found() {
        let registry: Registry<Named> = Registry::new();
        let err = registry.update("zzz", |_| true, |_| {}).unwrap_err();
        assert!(err.to_string().contains("zzz"), "got: {err}");
    }

    #[test]
    fn remove_first_takes_one_record() {
        let registry = Registry::new();
        registry.insert(named("a", 1)).unwrap();
        registry.insert(named("b", 2)).unwrap();
        let removed = registry.remove_first(|r| r.name == "a");
        assert_eq!(removed.map(|r| r.value), Some(1));
        assert!(registry.remove_first(|r| r.name == "a").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_duplicate_inserts_admit_exactly_one() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.insert(named("same", i)).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }
}
