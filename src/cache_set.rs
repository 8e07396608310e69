use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::cache_table;
use crate::cache_table::CacheTable;
use crate::cache_table::CacheTableBuilder;
use crate::cache_table::TableStats;
use crate::error::CacheTableError;
use crate::hash::BuildJenkinsHasher;
use crate::policy::Discard;
use crate::policy::DiscardIgnore;
use crate::policy::EqualTo;
use crate::policy::Identity;
use crate::storage::Heap;
use crate::storage::TableAlloc;

/// A direct-mapped cache of values built on [`CacheTable`].
///
/// `CacheSet<T, S, D, A>` stores values that are their own keys. One value,
/// the *empty value*, is reserved to mark vacant slots and can never be
/// inserted.
///
/// Membership is lossy: inserting a value whose bucket is taken evicts the
/// resident, so a value that was inserted may later be reported absent.
///
/// # Examples
///
/// ```rust
/// use direct_cache::CacheSet;
///
/// let mut seen: CacheSet<u64> = CacheSet::new(1 << 10, u64::MAX).unwrap();
///
/// assert_eq!(seen.insert(42), Ok(true));
/// assert!(seen.contains(&42));
///
/// // 42 + 1024 shares the bucket and replaces it.
/// seen.insert(42 + 1024).unwrap();
/// assert!(!seen.contains(&42));
/// assert_eq!(seen.num_collisions(), 1);
/// ```
#[derive(Clone)]
pub struct CacheSet<T, S = BuildJenkinsHasher, D = DiscardIgnore, A: TableAlloc = Heap> {
    table: CacheTable<T, Identity, S, EqualTo, D, A>,
}

impl<T: Clone> CacheSet<T> {
    /// Creates a set with default policies.
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn new(capacity: usize, empty_value: T) -> Result<Self, CacheTableError> {
        Self::from_builder(CacheTableBuilder::new(capacity), empty_value)
    }
}

impl<T: Clone, S> CacheSet<T, S> {
    /// Creates a set with the given hasher builder.
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn with_hasher(
        capacity: usize,
        empty_value: T,
        hash_builder: S,
    ) -> Result<Self, CacheTableError> {
        Self::from_builder(
            CacheTableBuilder::new(capacity).with_hasher(hash_builder),
            empty_value,
        )
    }
}

impl<T: Clone, S, D, A: TableAlloc> CacheSet<T, S, D, A> {
    /// Creates a set from a configured builder.
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn from_builder(
        builder: CacheTableBuilder<Identity, S, EqualTo, D, A>,
        empty_value: T,
    ) -> Result<Self, CacheTableError> {
        Ok(Self {
            table: builder.build(empty_value)?,
        })
    }
}

impl<T, S, D, A: TableAlloc> CacheSet<T, S, D, A> {
    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Returns the maximum number of values, which is the bucket count.
    pub fn max_size(&self) -> usize {
        self.table.max_size()
    }

    /// Returns the number of evictions since the set was built.
    pub fn num_collisions(&self) -> usize {
        self.table.num_collisions()
    }

    /// Returns a summary of the set's occupancy.
    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    /// Returns the reserved value.
    pub fn empty_value(&self) -> &T {
        self.table.empty_value()
    }

    /// Returns the hasher builder.
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    /// Returns the eviction policy.
    pub fn discard_policy(&self) -> &D {
        self.table.discard_policy()
    }

    /// Returns the eviction policy mutably.
    pub fn discard_policy_mut(&mut self) -> &mut D {
        self.table.discard_policy_mut()
    }

    /// Returns the underlying table.
    pub fn as_table(&self) -> &CacheTable<T, Identity, S, EqualTo, D, A> {
        &self.table
    }

    /// Does nothing; the bucket count is fixed.
    pub fn resize(&mut self, hint: usize) {
        self.table.resize(hint);
    }

    /// Exchanges the contents of two sets.
    pub fn swap(&mut self, other: &mut Self) {
        self.table.swap(&mut other.table);
    }
}

impl<T, S, D, A> CacheSet<T, S, D, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Adds `value`, evicting the resident of its bucket.
    ///
    /// Returns `true` if the slot was vacant. Re-inserting a stored value
    /// replaces it and counts as a collision.
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if `value` is the empty value.
    pub fn insert(&mut self, value: T) -> Result<bool, CacheTableError>
    where
        D: Discard<T>,
    {
        self.table.insert(value).map(|(_, vacant)| vacant)
    }

    /// Returns `true` if `value` is stored.
    pub fn contains(&self, value: &T) -> bool {
        self.table.contains(value)
    }

    /// Returns the stored value equal to `value`.
    pub fn get(&self, value: &T) -> Option<&T> {
        self.table.find(value)
    }

    /// Erases `value`. Returns 1 if it was stored, 0 otherwise.
    pub fn erase(&mut self, value: &T) -> usize
    where
        T: Clone,
    {
        self.table.erase(value)
    }

    /// Removes and returns the stored value equal to `value`.
    pub fn take(&mut self, value: &T) -> Option<T>
    where
        T: Clone,
    {
        self.table.remove(value)
    }

    /// Erases every value. The collision counter is kept.
    pub fn clear(&mut self)
    where
        T: Clone,
    {
        self.table.clear();
    }

    /// Returns an iterator over the stored values in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }
}

impl<T, S, D, A: TableAlloc> PartialEq for CacheSet<T, S, D, A> {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl<T, S, D, A: TableAlloc> Eq for CacheSet<T, S, D, A> {}

impl<T, S, D, A> Debug for CacheSet<T, S, D, A>
where
    T: Debug + Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S, D, A> Extend<T> for CacheSet<T, S, D, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    D: Discard<T>,
    A: TableAlloc,
{
    /// Inserts every value in order. The empty value is skipped.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            if let Err(err) = self.insert(value) {
                log::warn!("skipped value while extending cache set: {err}");
            }
        }
    }
}

impl<'a, T, S, D, A> IntoIterator for &'a CacheSet<T, S, D, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the values of a `CacheSet`.
pub struct Iter<'a, T> {
    inner: cache_table::Iter<'a, T, Identity, EqualTo>,
}

impl<'a, T: PartialEq> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: PartialEq> ExactSizeIterator for Iter<'_, T> {}
