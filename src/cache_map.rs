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
use crate::policy::First;
use crate::storage::Heap;
use crate::storage::TableAlloc;

/// A direct-mapped cache of key-value pairs built on [`CacheTable`].
///
/// `CacheMap<K, T, S, D, A>` stores `(K, T)` pairs keyed by the first element
/// and compared with `==`. One key value, the *empty key*, is reserved to mark
/// vacant slots and is rejected by every storing operation.
///
/// Like the underlying table, the map never grows: storing a key whose bucket
/// is taken evicts the previous pair, reporting it to the discard policy `D`.
///
/// # Equality
///
/// `==` compares storage identity, see [`CacheTable`].
///
/// # Examples
///
/// ```rust
/// use direct_cache::CacheMap;
///
/// let mut map: CacheMap<String, f64> = CacheMap::new(1024, String::new()).unwrap();
///
/// map.insert("ciao".to_string(), 11.0).unwrap();
/// *map.find_or_insert("prova".to_string()).unwrap() = 1.5;
/// *map.find_or_insert("hola".to_string()).unwrap() = 3.1;
///
/// assert_eq!(map.get(&"prova".to_string()), Some(&1.5));
/// assert_eq!(map.len(), 3);
/// ```
#[derive(Clone)]
pub struct CacheMap<K, T, S = BuildJenkinsHasher, D = DiscardIgnore, A: TableAlloc = Heap> {
    table: CacheTable<(K, T), First, S, EqualTo, D, A>,
}

impl<K, T> CacheMap<K, T>
where
    K: Clone,
    T: Clone + Default,
{
    /// Creates a map with default policies.
    ///
    /// Vacant slots hold `(empty_key, T::default())`.
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn new(capacity: usize, empty_key: K) -> Result<Self, CacheTableError> {
        Self::from_builder(CacheTableBuilder::with_key_extract(capacity, First), empty_key)
    }
}

impl<K, T, S> CacheMap<K, T, S>
where
    K: Clone,
    T: Clone + Default,
{
    /// Creates a map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use direct_cache::CacheMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = CacheMap::with_hasher(64, u64::MAX, SimpleHasher).unwrap();
    /// map.insert(37, "a").unwrap();
    /// assert_eq!(map.get(&37), Some(&"a"));
    /// ```
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn with_hasher(
        capacity: usize,
        empty_key: K,
        hash_builder: S,
    ) -> Result<Self, CacheTableError> {
        Self::from_builder(
            CacheTableBuilder::with_key_extract(capacity, First).with_hasher(hash_builder),
            empty_key,
        )
    }
}

impl<K, T, S, D, A> CacheMap<K, T, S, D, A>
where
    K: Clone,
    T: Clone + Default,
    A: TableAlloc,
{
    /// Creates a map from a configured builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheMap;
    /// use direct_cache::CacheTableBuilder;
    /// use direct_cache::policy::First;
    ///
    /// let mut evicted = Vec::new();
    /// {
    ///     let builder = CacheTableBuilder::with_key_extract(2, First)
    ///         .with_discard(|old: &(u32, u32), _: &(u32, u32)| evicted.push(old.0));
    ///     let mut map: CacheMap<u32, u32, _, _> = CacheMap::from_builder(builder, u32::MAX).unwrap();
    ///     map.insert(0, 10).unwrap();
    ///     map.insert(2, 20).unwrap();
    /// }
    /// assert_eq!(evicted, [0]);
    /// ```
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    pub fn from_builder(
        builder: CacheTableBuilder<First, S, EqualTo, D, A>,
        empty_key: K,
    ) -> Result<Self, CacheTableError> {
        Ok(Self {
            table: builder.build((empty_key, T::default()))?,
        })
    }
}

impl<K, T, S, D, A: TableAlloc> CacheMap<K, T, S, D, A> {
    /// Returns the number of stored pairs.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Returns the maximum number of pairs, which is the bucket count.
    pub fn max_size(&self) -> usize {
        self.table.max_size()
    }

    /// Returns the number of evictions since the map was built.
    pub fn num_collisions(&self) -> usize {
        self.table.num_collisions()
    }

    /// Returns a summary of the map's occupancy.
    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    /// Returns the reserved key.
    pub fn empty_key(&self) -> &K {
        &self.table.empty_value().0
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
    pub fn as_table(&self) -> &CacheTable<(K, T), First, S, EqualTo, D, A> {
        &self.table
    }

    /// Does nothing; the bucket count is fixed.
    pub fn resize(&mut self, hint: usize) {
        self.table.resize(hint);
    }

    /// Exchanges the contents of two maps.
    pub fn swap(&mut self, other: &mut Self) {
        self.table.swap(&mut other.table);
    }
}

impl<K, T, S, D, A> CacheMap<K, T, S, D, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Stores `value` under `key`, evicting the pair in the target slot.
    ///
    /// Returns `true` if the slot was vacant. Overwriting an existing pair,
    /// even one with the same key, counts as a collision.
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if `key` is the empty key.
    pub fn insert(&mut self, key: K, value: T) -> Result<bool, CacheTableError>
    where
        D: Discard<(K, T)>,
    {
        self.insert_pair((key, value))
    }

    /// Stores a `(key, value)` pair, see [`insert`](CacheMap::insert).
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if the key is the empty key.
    pub fn insert_pair(&mut self, pair: (K, T)) -> Result<bool, CacheTableError>
    where
        D: Discard<(K, T)>,
    {
        self.table.insert(pair).map(|(_, vacant)| vacant)
    }

    /// Returns the value stored under `key`, claiming the slot with a default
    /// value if `key` is not stored.
    ///
    /// A different resident in the slot is evicted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheMap;
    ///
    /// let mut hits: CacheMap<&str, u32> = CacheMap::new(16, "").unwrap();
    /// for word in ["a", "b", "a"] {
    ///     *hits.find_or_insert(word).unwrap() += 1;
    /// }
    /// assert_eq!(hits.get(&"a"), Some(&2));
    /// ```
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if `key` is the empty key.
    pub fn find_or_insert(&mut self, key: K) -> Result<&mut T, CacheTableError>
    where
        K: Clone,
        T: Clone,
        D: Discard<(K, T)>,
    {
        self.table.find_or_insert(key).map(|(_, value)| value)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&T> {
        self.table.find(key).map(|(_, value)| value)
    }

    /// Returns the value stored under `key` mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut T> {
        self.table.find_mut(key).map(|(_, value)| value)
    }

    /// Returns the stored pair for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &T)> {
        self.table.find(key).map(|(k, v)| (k, v))
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains(key)
    }

    /// Erases the pair stored under `key`. Returns 1 if a pair was removed,
    /// 0 otherwise.
    pub fn erase(&mut self, key: &K) -> usize
    where
        K: Clone,
        T: Clone,
    {
        self.table.erase(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &K) -> Option<T>
    where
        K: Clone,
        T: Clone,
    {
        self.table.remove(key).map(|(_, value)| value)
    }

    /// Erases every pair. The collision counter is kept.
    pub fn clear(&mut self)
    where
        K: Clone,
        T: Clone,
    {
        self.table.clear();
    }

    /// Returns an iterator over the stored pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the stored pairs with mutable values.
    ///
    /// Keys are only exposed immutably, so the placement of every pair stays
    /// valid.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, T> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the stored keys.
    pub fn keys(&self) -> Keys<'_, K, T> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the stored values.
    pub fn values(&self) -> Values<'_, K, T> {
        Values { inner: self.iter() }
    }
}

impl<K, T, S, D, A: TableAlloc> PartialEq for CacheMap<K, T, S, D, A> {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl<K, T, S, D, A: TableAlloc> Eq for CacheMap<K, T, S, D, A> {}

impl<K, T, S, D, A> Debug for CacheMap<K, T, S, D, A>
where
    K: Debug + Hash + Eq,
    T: Debug,
    S: BuildHasher,
    A: TableAlloc,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, T, S, D, A> Extend<(K, T)> for CacheMap<K, T, S, D, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    D: Discard<(K, T)>,
    A: TableAlloc,
{
    /// Inserts every pair in order. Pairs carrying the empty key are skipped.
    fn extend<I: IntoIterator<Item = (K, T)>>(&mut self, iter: I) {
        for pair in iter {
            if let Err(err) = self.insert_pair(pair) {
                log::warn!("skipped pair while extending cache map: {err}");
            }
        }
    }
}

impl<'a, K, T, S, D, A> IntoIterator for &'a CacheMap<K, T, S, D, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    type IntoIter = Iter<'a, K, T>;
    type Item = (&'a K, &'a T);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the pairs of a `CacheMap`.
pub struct Iter<'a, K, T> {
    inner: cache_table::Iter<'a, (K, T), First, EqualTo>,
}

impl<'a, K: PartialEq, T> Iterator for Iter<'a, K, T> {
    type Item = (&'a K, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: PartialEq, T> ExactSizeIterator for Iter<'_, K, T> {}

/// A mutable iterator over the pairs of a `CacheMap`.
pub struct IterMut<'a, K, T> {
    inner: cache_table::IterMut<'a, (K, T), First, EqualTo>,
}

impl<'a, K: PartialEq, T> Iterator for IterMut<'a, K, T> {
    type Item = (&'a K, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the keys of a `CacheMap`.
pub struct Keys<'a, K, T> {
    inner: Iter<'a, K, T>,
}

impl<'a, K: PartialEq, T> Iterator for Keys<'a, K, T> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a `CacheMap`.
pub struct Values<'a, K, T> {
    inner: Iter<'a, K, T>,
}

impl<'a, K: PartialEq, T> Iterator for Values<'a, K, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}
