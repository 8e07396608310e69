//! The direct-mapped table engine.
//!
//! A [`CacheTable`] owns a fixed array of `bucket_count` slots, where
//! `bucket_count` is a power of two. A value lives in exactly one slot,
//! `hash(key) & (bucket_count - 1)`. There is no chaining and no probing:
//! storing into an occupied slot evicts its resident.
//!
//! Every slot always holds an initialized value. Unused slots hold a clone of
//! the table's *empty value*, and a slot is vacant iff its key equals the
//! *empty key* (the key of the empty value). There is no separate occupancy
//! tag.
//!
//! The table performs no internal synchronization. Shared access follows the
//! usual borrowing rules, so a lookup can never race with a mutation.

use core::alloc::Layout;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::marker::PhantomData;
use core::ops::Range;
use core::ptr::NonNull;

use crate::error::CacheTableError;
use crate::hash::BuildJenkinsHasher;
use crate::policy::Discard;
use crate::policy::DiscardIgnore;
use crate::policy::EqualTo;
use crate::policy::KeyEqual;
use crate::policy::KeyExtract;
use crate::storage::Heap;
use crate::storage::TableAlloc;

/// Rounds a requested capacity up to a bucket count.
#[inline]
fn buckets_for(capacity: usize) -> Option<usize> {
    capacity.max(1).checked_next_power_of_two()
}

/// Allocates a slot array of `buckets` values and initializes every slot
/// with `fill`.
fn allocate_slots<V, A: TableAlloc>(
    alloc: &A,
    buckets: usize,
    mut fill: impl FnMut(usize) -> V,
) -> Result<(NonNull<V>, Layout), CacheTableError> {
    let layout = Layout::array::<V>(buckets).map_err(|_| CacheTableError::CapacityOverflow)?;
    let slots = if layout.size() == 0 {
        NonNull::dangling()
    } else {
        alloc.allocate(layout)?.cast::<V>()
    };

    for index in 0..buckets {
        // SAFETY: `index < buckets` and the block holds `buckets` values (or `V`
        // is zero-sized, in which case any aligned non-null pointer is valid).
        unsafe { slots.as_ptr().add(index).write(fill(index)) };
    }

    Ok((slots, layout))
}

/// The position of a slot in a table's slot array.
///
/// Positions are plain indices. They stay in bounds for the table's whole
/// life since the slot array never changes size, but after a mutation a
/// position may refer to a vacant slot or to a different value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    /// Returns the slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A configured table that has not acquired storage yet.
///
/// The builder knows the bucket count and carries the policies. Calling
/// [`build`](CacheTableBuilder::build) with the empty value allocates the slot
/// array and yields the table. The builder is consumed, so the empty value of
/// a table is set exactly once.
///
/// # Examples
///
/// ```rust
/// use direct_cache::CacheTableBuilder;
/// use direct_cache::policy::First;
///
/// let builder = CacheTableBuilder::with_key_extract(1000, First);
/// assert_eq!(builder.bucket_count(), 1024);
///
/// let table = builder.build((-1i64, 0u32)).unwrap();
/// assert_eq!(table.bucket_count(), 1024);
/// assert!(table.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct CacheTableBuilder<
    X,
    S = BuildJenkinsHasher,
    E = EqualTo,
    D = DiscardIgnore,
    A = Heap,
> {
    capacity: usize,
    key_extract: X,
    hash_builder: S,
    key_equal: E,
    discard: D,
    alloc: A,
}

impl<X: Default> CacheTableBuilder<X> {
    /// Starts a builder with default policies.
    pub fn new(capacity: usize) -> Self {
        Self::with_key_extract(capacity, X::default())
    }
}

impl<X> CacheTableBuilder<X> {
    /// Starts a builder with the given key extraction and default remaining
    /// policies.
    pub fn with_key_extract(capacity: usize, key_extract: X) -> Self {
        Self {
            capacity,
            key_extract,
            hash_builder: BuildJenkinsHasher::default(),
            key_equal: EqualTo,
            discard: DiscardIgnore,
            alloc: Heap,
        }
    }
}

impl<X, S, E, D, A> CacheTableBuilder<X, S, E, D, A> {
    /// Replaces the hash function policy.
    pub fn with_hasher<S2>(self, hash_builder: S2) -> CacheTableBuilder<X, S2, E, D, A> {
        CacheTableBuilder {
            capacity: self.capacity,
            key_extract: self.key_extract,
            hash_builder,
            key_equal: self.key_equal,
            discard: self.discard,
            alloc: self.alloc,
        }
    }

    /// Replaces the key equality policy.
    pub fn with_key_equal<E2>(self, key_equal: E2) -> CacheTableBuilder<X, S, E2, D, A> {
        CacheTableBuilder {
            capacity: self.capacity,
            key_extract: self.key_extract,
            hash_builder: self.hash_builder,
            key_equal,
            discard: self.discard,
            alloc: self.alloc,
        }
    }

    /// Replaces the eviction policy.
    pub fn with_discard<D2>(self, discard: D2) -> CacheTableBuilder<X, S, E, D2, A> {
        CacheTableBuilder {
            capacity: self.capacity,
            key_extract: self.key_extract,
            hash_builder: self.hash_builder,
            key_equal: self.key_equal,
            discard,
            alloc: self.alloc,
        }
    }

    /// Replaces the backing-storage strategy.
    pub fn with_allocator<A2>(self, alloc: A2) -> CacheTableBuilder<X, S, E, D, A2> {
        CacheTableBuilder {
            capacity: self.capacity,
            key_extract: self.key_extract,
            hash_builder: self.hash_builder,
            key_equal: self.key_equal,
            discard: self.discard,
            alloc,
        }
    }

    /// Returns the number of buckets the table will have.
    ///
    /// This is the requested capacity rounded up to a power of two, with a
    /// capacity of 0 giving 1 bucket. Capacities above the largest
    /// representable power of two report that power; `build` then fails with
    /// [`CacheTableError::CapacityOverflow`].
    pub fn bucket_count(&self) -> usize {
        buckets_for(self.capacity).unwrap_or(1 << (usize::BITS - 1))
    }

    /// Returns the maximum number of values the table will hold, which is the
    /// bucket count.
    pub fn max_size(&self) -> usize {
        self.bucket_count()
    }

    /// Allocates the slot array, fills every slot with `empty_value`, and
    /// returns the ready table.
    ///
    /// The key of `empty_value` becomes the empty key. It must never be used
    /// as a real key.
    ///
    /// # Errors
    ///
    /// [`CacheTableError::CapacityOverflow`] if the slot array is not
    /// representable, [`CacheTableError::AllocFailed`] if the allocator cannot
    /// provide it.
    pub fn build<V>(self, empty_value: V) -> Result<CacheTable<V, X, S, E, D, A>, CacheTableError>
    where
        V: Clone,
        X: KeyExtract<V>,
        A: TableAlloc,
    {
        let buckets = buckets_for(self.capacity).ok_or(CacheTableError::CapacityOverflow)?;
        let (slots, layout) = allocate_slots(&self.alloc, buckets, |_| empty_value.clone())?;

        log::debug!(
            "built cache table: {buckets} buckets, {} bytes",
            layout.size()
        );

        Ok(CacheTable {
            slots,
            layout,
            mask: buckets - 1,
            populated: 0,
            collisions: 0,
            empty_value,
            key_extract: self.key_extract,
            hash_builder: self.hash_builder,
            key_equal: self.key_equal,
            discard: self.discard,
            alloc: self.alloc,
            _marker: PhantomData,
        })
    }
}

/// A point-in-time summary of a table.
#[derive(Debug, Clone)]
pub struct TableStats {
    /// Number of occupied slots.
    pub populated: usize,
    /// Number of slots.
    pub buckets: usize,
    /// Evictions since the table was built.
    pub collisions: usize,
    /// `populated / buckets`.
    pub load_factor: f64,
    /// Size of the slot array in bytes.
    pub total_bytes: usize,
}

impl TableStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Cache Table Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.buckets,
            self.load_factor * 100.0
        );
        println!("Collisions: {}", self.collisions);
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// A fixed-capacity, direct-mapped hash cache.
///
/// `CacheTable<V, X, S, E, D, A>` stores values of type `V` in a power-of-two
/// array of slots. Its behavior is configured by policies:
///
/// - `X`: [`KeyExtract`], projects a value to its key.
/// - `S`: [`BuildHasher`], hashes keys. Defaults to [`BuildJenkinsHasher`].
/// - `E`: [`KeyEqual`], compares keys. Defaults to [`EqualTo`].
/// - `D`: [`Discard`], observes evictions. Defaults to [`DiscardIgnore`].
/// - `A`: [`TableAlloc`], provides the slot array. Defaults to [`Heap`].
///
/// Lookups cost one hash and one key comparison. Inserts never fail for lack
/// of space; they evict whatever occupies the target slot.
///
/// # Equality
///
/// `==` compares storage identity, not contents. Two distinct tables are
/// never equal, even when they hold the same values, and a clone is not
/// equal to its source. Compare [`iter`](CacheTable::iter) output to test
/// for equal contents.
///
/// # Examples
///
/// ```rust
/// use direct_cache::CacheTable;
/// use direct_cache::policy::First;
///
/// let mut table: CacheTable<(i64, &str), First> = CacheTable::new(4, (-1, "")).unwrap();
///
/// table.insert((0, "A")).unwrap();
/// assert_eq!(table.find(&0), Some(&(0, "A")));
///
/// // 4 & 3 == 0: same bucket, so "A" is evicted.
/// table.insert((4, "B")).unwrap();
/// assert_eq!(table.find(&0), None);
/// assert_eq!(table.find(&4), Some(&(4, "B")));
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.num_collisions(), 1);
/// ```
pub struct CacheTable<
    V,
    X,
    S = BuildJenkinsHasher,
    E = EqualTo,
    D = DiscardIgnore,
    A: TableAlloc = Heap,
> {
    slots: NonNull<V>,
    layout: Layout,
    mask: usize,

    populated: usize,
    collisions: usize,

    empty_value: V,

    key_extract: X,
    hash_builder: S,
    key_equal: E,
    discard: D,
    alloc: A,

    _marker: PhantomData<V>,
}

// SAFETY: The table uniquely owns its slot array, like a `Vec<V>`.
unsafe impl<V, X, S, E, D, A> Send for CacheTable<V, X, S, E, D, A>
where
    V: Send,
    X: Send,
    S: Send,
    E: Send,
    D: Send,
    A: TableAlloc + Send,
{
}

// SAFETY: Shared access never mutates the slot array.
unsafe impl<V, X, S, E, D, A> Sync for CacheTable<V, X, S, E, D, A>
where
    V: Sync,
    X: Sync,
    S: Sync,
    E: Sync,
    D: Sync,
    A: TableAlloc + Sync,
{
}

impl<V, X: Default> CacheTable<V, X>
where
    V: Clone,
    X: KeyExtract<V>,
{
    /// Creates a table with default policies.
    ///
    /// Shorthand for `CacheTableBuilder::new(capacity).build(empty_value)`.
    ///
    /// # Errors
    ///
    /// See [`CacheTableBuilder::build`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::Identity;
    ///
    /// let table: CacheTable<u32, Identity> = CacheTable::new(3, u32::MAX).unwrap();
    /// assert_eq!(table.bucket_count(), 4);
    /// ```
    pub fn new(capacity: usize, empty_value: V) -> Result<Self, CacheTableError> {
        CacheTableBuilder::new(capacity).build(empty_value)
    }

    /// Starts a builder with default policies.
    pub fn builder(capacity: usize) -> CacheTableBuilder<X> {
        CacheTableBuilder::new(capacity)
    }
}

impl<V, X, S, E, D, A: TableAlloc> CacheTable<V, X, S, E, D, A> {
    #[inline(always)]
    fn slot_ptr(&self, index: usize) -> *mut V {
        debug_assert!(index <= self.mask);
        // SAFETY: Callers pass indices in `0..=mask`, inside the slot array.
        unsafe { self.slots.as_ptr().add(index) }
    }

    fn slots(&self) -> &[V] {
        // SAFETY: All `mask + 1` slots are initialized for the table's whole life.
        unsafe { core::slice::from_raw_parts(self.slots.as_ptr(), self.bucket_count()) }
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.mask + 1
    }

    /// Returns the maximum number of values the table can hold, which is the
    /// bucket count.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.bucket_count()
    }

    /// Returns the number of evictions since the table was built.
    ///
    /// This is a lifetime counter: erasing and clearing do not reset it.
    #[inline]
    pub fn num_collisions(&self) -> usize {
        self.collisions
    }

    /// Returns the value that fills vacant slots.
    pub fn empty_value(&self) -> &V {
        &self.empty_value
    }

    /// Returns the hash function policy.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the key equality policy.
    pub fn key_equal(&self) -> &E {
        &self.key_equal
    }

    /// Returns the eviction policy.
    pub fn discard_policy(&self) -> &D {
        &self.discard
    }

    /// Returns the eviction policy mutably.
    pub fn discard_policy_mut(&mut self) -> &mut D {
        &mut self.discard
    }

    /// Does nothing. The bucket count is fixed when the table is built.
    #[inline]
    pub fn resize(&mut self, _hint: usize) {}

    /// Exchanges the contents, counters and policies of two tables.
    ///
    /// No values are moved; only the storage handles change owner.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Returns a summary of the table's occupancy.
    pub fn stats(&self) -> TableStats {
        TableStats {
            populated: self.populated,
            buckets: self.bucket_count(),
            collisions: self.collisions,
            load_factor: self.populated as f64 / self.bucket_count() as f64,
            total_bytes: self.layout.size(),
        }
    }
}

impl<V, X, S, E, D, A> CacheTable<V, X, S, E, D, A>
where
    X: KeyExtract<V>,
    X::Key: Hash,
    S: BuildHasher,
    E: KeyEqual<X::Key>,
    A: TableAlloc,
{
    #[inline(always)]
    fn empty_key(&self) -> &X::Key {
        self.key_extract.key(&self.empty_value)
    }

    #[inline(always)]
    fn is_vacant(&self, value: &V) -> bool {
        self.key_equal
            .equal(self.key_extract.key(value), self.empty_key())
    }

    #[inline(always)]
    fn bucket(&self, key: &X::Key) -> usize {
        self.hash_builder.hash_one(key) as usize & self.mask
    }

    /// Stores `value` in its bucket, evicting the resident if there is one.
    ///
    /// Any occupied target slot counts as a collision, including one that
    /// holds the same key: the discard policy sees the old value, the
    /// collision counter grows, and the size is unchanged. Storing into a
    /// vacant slot grows the size instead.
    ///
    /// Returns the slot position and `true` if the slot was vacant.
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if the key of `value` is the empty
    /// key. The table is left untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::Identity;
    ///
    /// let mut table: CacheTable<u64, Identity> = CacheTable::new(8, u64::MAX).unwrap();
    /// let (pos, vacant) = table.insert(3).unwrap();
    /// assert!(vacant);
    /// assert_eq!(table.cursor(pos).get(), Some(&3));
    ///
    /// // Re-inserting the same key still counts as an eviction.
    /// let (_, vacant) = table.insert(3).unwrap();
    /// assert!(!vacant);
    /// assert_eq!(table.num_collisions(), 1);
    ///
    /// assert!(table.insert(u64::MAX).is_err());
    /// ```
    pub fn insert(&mut self, value: V) -> Result<(Position, bool), CacheTableError>
    where
        D: Discard<V>,
    {
        let key = self.key_extract.key(&value);
        if self.key_equal.equal(key, self.empty_key()) {
            return Err(CacheTableError::SentinelKey);
        }

        let index = self.bucket(key);
        // SAFETY: `bucket` masks into `0..=mask` and every slot is initialized.
        // The slot lives in the slot array, disjoint from the table's fields.
        let slot = unsafe { &mut *self.slot_ptr(index) };

        let vacant = self.is_vacant(slot);
        if vacant {
            self.populated += 1;
        } else {
            self.collisions += 1;
            self.discard.discard(slot, &value);
        }

        *slot = value;
        Ok((Position(index), vacant))
    }

    /// Inserts every value of `values` in order.
    ///
    /// Returns how many values were stored.
    ///
    /// # Errors
    ///
    /// Stops at the first value whose key is the empty key and returns
    /// [`CacheTableError::SentinelKey`]. Values before it stay stored.
    pub fn insert_all<I>(&mut self, values: I) -> Result<usize, CacheTableError>
    where
        I: IntoIterator<Item = V>,
        D: Discard<V>,
    {
        let mut stored = 0;
        for value in values {
            self.insert(value)?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Returns the position of the value stored under `key`.
    ///
    /// The empty key is never found.
    #[inline]
    pub fn find_position(&self, key: &X::Key) -> Option<Position> {
        if self.populated == 0 {
            return None;
        }

        let index = self.bucket(key);
        // SAFETY: `bucket` masks into `0..=mask` and every slot is initialized.
        let slot = unsafe { &*self.slot_ptr(index) };
        if !self.key_equal.equal(self.key_extract.key(slot), key) || self.is_vacant(slot) {
            return None;
        }

        Some(Position(index))
    }

    /// Returns the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::First;
    ///
    /// let mut table: CacheTable<(String, f64), First> =
    ///     CacheTable::new(16, (String::new(), 0.0)).unwrap();
    /// table.insert(("ciao".to_string(), 11.0)).unwrap();
    ///
    /// assert_eq!(table.find(&"ciao".to_string()).map(|(_, v)| *v), Some(11.0));
    /// assert_eq!(table.find(&"hola".to_string()), None);
    /// ```
    #[inline]
    pub fn find(&self, key: &X::Key) -> Option<&V> {
        let position = self.find_position(key)?;
        // SAFETY: `find_position` only returns in-bounds positions.
        Some(unsafe { &*self.slot_ptr(position.0) })
    }

    /// Returns the value stored under `key` mutably.
    ///
    /// Changing the key of the returned value breaks the table's placement
    /// invariant: the value becomes unreachable by key until it is evicted or
    /// erased by position.
    #[inline]
    pub fn find_mut(&mut self, key: &X::Key) -> Option<&mut V> {
        let position = self.find_position(key)?;
        // SAFETY: `find_position` only returns in-bounds positions.
        Some(unsafe { &mut *self.slot_ptr(position.0) })
    }

    /// Returns `true` if a value is stored under `key`.
    #[inline]
    pub fn contains(&self, key: &X::Key) -> bool {
        self.find_position(key).is_some()
    }

    /// Returns the slot for `key`, claiming it if `key` is not stored.
    ///
    /// If the bucket holds `key` the slot is returned unchanged. Otherwise the
    /// slot is reset to the empty value and `key` is written into it, leaving
    /// the rest of the value at its empty-value state. A different resident
    /// is first passed to the discard policy (with the empty value as the
    /// incoming side) and counted as a collision; a vacant slot grows the
    /// size instead.
    ///
    /// Calling this twice with the same key and no mutation in between
    /// returns the same slot and changes no counter.
    ///
    /// # Errors
    ///
    /// [`CacheTableError::SentinelKey`] if `key` is the empty key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::First;
    ///
    /// let mut table: CacheTable<(i32, u32), First> = CacheTable::new(8, (-1, 0)).unwrap();
    ///
    /// table.find_or_insert(5).unwrap().1 += 10;
    /// table.find_or_insert(5).unwrap().1 += 1;
    ///
    /// assert_eq!(table.find(&5), Some(&(5, 11)));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn find_or_insert(&mut self, key: X::Key) -> Result<&mut V, CacheTableError>
    where
        V: Clone,
        D: Discard<V>,
    {
        if self.key_equal.equal(&key, self.empty_key()) {
            return Err(CacheTableError::SentinelKey);
        }

        let index = self.bucket(&key);
        // SAFETY: `bucket` masks into `0..=mask` and every slot is initialized.
        // The slot lives in the slot array, disjoint from the table's fields.
        let slot = unsafe { &mut *self.slot_ptr(index) };

        if !self.key_equal.equal(self.key_extract.key(slot), &key) {
            if self.is_vacant(slot) {
                self.populated += 1;
            } else {
                self.collisions += 1;
                self.discard.discard(slot, &self.empty_value);
                *slot = self.empty_value.clone();
            }

            *self.key_extract.key_mut(slot) = key;
        }

        Ok(slot)
    }

    /// Erases the value stored under `key`.
    ///
    /// Returns the number of removed values, 1 or 0. The eviction policy is
    /// not consulted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::Identity;
    ///
    /// let mut table: CacheTable<i32, Identity> = CacheTable::new(8, -1).unwrap();
    /// table.insert(2).unwrap();
    ///
    /// assert_eq!(table.erase(&2), 1);
    /// assert_eq!(table.erase(&2), 0);
    /// assert!(table.is_empty());
    /// ```
    pub fn erase(&mut self, key: &X::Key) -> usize
    where
        V: Clone,
    {
        match self.find_position(key) {
            Some(position) => self.erase_at(position),
            None => 0,
        }
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &X::Key) -> Option<V>
    where
        V: Clone,
    {
        let position = self.find_position(key)?;
        // SAFETY: `find_position` only returns in-bounds positions.
        let slot = unsafe { &mut *self.slot_ptr(position.0) };
        self.populated -= 1;
        Some(core::mem::replace(slot, self.empty_value.clone()))
    }

    /// Erases the value at `position`, if the slot is occupied.
    ///
    /// Returns the number of removed values, 1 or 0.
    pub fn erase_at(&mut self, position: Position) -> usize
    where
        V: Clone,
    {
        if position.0 > self.mask {
            return 0;
        }

        // SAFETY: Bounds checked above; every slot is initialized.
        let slot = unsafe { &mut *self.slot_ptr(position.0) };
        if self.is_vacant(slot) {
            return 0;
        }

        *slot = self.empty_value.clone();
        self.populated -= 1;
        1
    }

    /// Erases every occupied slot in `range`.
    ///
    /// Returns the number of removed values.
    pub fn erase_range(&mut self, range: Range<Position>) -> usize
    where
        V: Clone,
    {
        let end = range.end.0.min(self.bucket_count());
        (range.start.0..end)
            .map(|index| self.erase_at(Position(index)))
            .sum()
    }

    /// Erases every value.
    ///
    /// The collision counter is not reset.
    pub fn clear(&mut self)
    where
        V: Clone,
    {
        if self.populated == 0 {
            return;
        }

        self.erase_range(Position(0)..Position(self.bucket_count()));
        debug_assert_eq!(self.populated, 0);
    }

    /// Returns a cursor at the first occupied slot, or at the end if the table
    /// is empty.
    pub fn begin(&self) -> Cursor<'_, V, X, E> {
        let mut cursor = self.cursor(Position(0));
        cursor.skip_vacant();
        cursor
    }

    /// Returns the past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, V, X, E> {
        self.cursor(Position(self.bucket_count()))
    }

    /// Returns a cursor at `position`, which may be vacant.
    ///
    /// Positions past the end give the end cursor.
    pub fn cursor(&self, position: Position) -> Cursor<'_, V, X, E> {
        Cursor {
            slots: self.slots(),
            empty_key: self.empty_key(),
            key_extract: &self.key_extract,
            key_equal: &self.key_equal,
            position: position.0.min(self.bucket_count()),
        }
    }

    /// Returns an iterator over the stored values in slot order.
    ///
    /// The order is fixed by slot position and stays the same until the table
    /// is mutated. A full traversal visits every slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use direct_cache::CacheTable;
    /// use direct_cache::policy::Identity;
    ///
    /// let mut table: CacheTable<u8, Identity> = CacheTable::new(8, 0).unwrap();
    /// table.insert_all([6, 1, 3]).unwrap();
    ///
    /// let values: Vec<u8> = table.iter().copied().collect();
    /// assert_eq!(values, [1, 3, 6]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V, X, E> {
        Iter {
            cursor: self.begin(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over the stored values that allows modifying
    /// them.
    ///
    /// Changing a value's key through this iterator breaks the table's
    /// placement invariant, see [`find_mut`](CacheTable::find_mut).
    pub fn iter_mut(&mut self) -> IterMut<'_, V, X, E> {
        // SAFETY: All `mask + 1` slots are initialized and the slot array is
        // disjoint from the fields borrowed below.
        let slots =
            unsafe { core::slice::from_raw_parts_mut(self.slots.as_ptr(), self.mask + 1) };
        IterMut {
            inner: slots.iter_mut(),
            empty_key: self.key_extract.key(&self.empty_value),
            key_extract: &self.key_extract,
            key_equal: &self.key_equal,
            remaining: self.populated,
        }
    }
}

impl<V, X, S, E, D, A: TableAlloc> PartialEq for CacheTable<V, X, S, E, D, A> {
    /// Storage identity, see the type-level documentation.
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<V, X, S, E, D, A: TableAlloc> Eq for CacheTable<V, X, S, E, D, A> {}

impl<V, X, S, E, D, A> Clone for CacheTable<V, X, S, E, D, A>
where
    V: Clone,
    X: Clone,
    S: Clone,
    E: Clone,
    D: Clone,
    A: TableAlloc + Clone,
{
    fn clone(&self) -> Self {
        let allocator = self.alloc.clone();
        let source = self.slots();
        let (slots, layout) =
            match allocate_slots(&allocator, source.len(), |index| source[index].clone()) {
                Ok(allocated) => allocated,
                Err(_) => alloc::alloc::handle_alloc_error(self.layout),
            };

        Self {
            slots,
            layout,
            mask: self.mask,
            populated: self.populated,
            collisions: self.collisions,
            empty_value: self.empty_value.clone(),
            key_extract: self.key_extract.clone(),
            hash_builder: self.hash_builder.clone(),
            key_equal: self.key_equal.clone(),
            discard: self.discard.clone(),
            alloc: allocator,
            _marker: PhantomData,
        }
    }
}

impl<V, X, S, E, D, A> Debug for CacheTable<V, X, S, E, D, A>
where
    V: Debug,
    X: KeyExtract<V>,
    X::Key: Hash,
    S: BuildHasher,
    E: KeyEqual<X::Key>,
    A: TableAlloc,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheTable")
            .field("populated", &self.populated)
            .field("buckets", &self.bucket_count())
            .field("collisions", &self.collisions)
            .field("entries", &DebugEntries(self.iter()))
            .finish()
    }
}

struct DebugEntries<'a, V, X: KeyExtract<V>, E>(Iter<'a, V, X, E>);

impl<V, X, E> Debug for DebugEntries<'_, V, X, E>
where
    V: Debug,
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.0.clone()).finish()
    }
}

impl<V, X, S, E, D, A: TableAlloc> Drop for CacheTable<V, X, S, E, D, A> {
    fn drop(&mut self) {
        // SAFETY: Every slot holds an initialized value and is dropped once; the
        // block is released with the layout it was allocated with.
        unsafe {
            if core::mem::needs_drop::<V>() {
                let slots = NonNull::slice_from_raw_parts(self.slots, self.mask + 1);
                core::ptr::drop_in_place(slots.as_ptr());
            }

            if self.layout.size() != 0 {
                self.alloc.deallocate(self.slots.cast(), self.layout);
            }
        }
    }
}

impl<'a, V, X, S, E, D, A> IntoIterator for &'a CacheTable<V, X, S, E, D, A>
where
    X: KeyExtract<V>,
    X::Key: Hash,
    S: BuildHasher,
    E: KeyEqual<X::Key>,
    A: TableAlloc,
{
    type IntoIter = Iter<'a, V, X, E>;
    type Item = &'a V;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A read-only position in a table's slot array.
///
/// A cursor borrows its table, so the table cannot be mutated while the
/// cursor exists. [`move_next`](Cursor::move_next) skips vacant slots, so a
/// cursor obtained from [`begin`](CacheTable::begin) only ever rests on
/// occupied slots or on the end.
///
/// Cursors compare by position alone. Comparing cursors of two different
/// tables is meaningless.
pub struct Cursor<'a, V, X: KeyExtract<V>, E> {
    slots: &'a [V],
    empty_key: &'a X::Key,
    key_extract: &'a X,
    key_equal: &'a E,
    position: usize,
}

impl<V, X: KeyExtract<V>, E> Clone for Cursor<'_, V, X, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, X: KeyExtract<V>, E> Copy for Cursor<'_, V, X, E> {}

impl<V, X: KeyExtract<V>, E> PartialEq for Cursor<'_, V, X, E> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl<V, X: KeyExtract<V>, E> Eq for Cursor<'_, V, X, E> {}

impl<V, X: KeyExtract<V>, E> Debug for Cursor<'_, V, X, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("end", &self.is_end())
            .finish()
    }
}

impl<'a, V, X: KeyExtract<V>, E> Cursor<'a, V, X, E> {
    /// Returns the value under the cursor, or `None` at the end.
    ///
    /// A cursor created with [`CacheTable::cursor`] may rest on a vacant
    /// slot, in which case the empty value is returned.
    #[inline]
    pub fn get(&self) -> Option<&'a V> {
        self.slots.get(self.position)
    }

    /// Returns the cursor's position.
    #[inline]
    pub fn position(&self) -> Position {
        Position(self.position)
    }

    /// Returns `true` at the past-the-end position.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.position >= self.slots.len()
    }

}

impl<V, X, E> Cursor<'_, V, X, E>
where
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
    #[inline]
    fn skip_vacant(&mut self) {
        while let Some(value) = self.slots.get(self.position) {
            if !self
                .key_equal
                .equal(self.key_extract.key(value), self.empty_key)
            {
                break;
            }
            self.position += 1;
        }
    }

    /// Moves to the next occupied slot, or to the end. Does nothing at the
    /// end.
    #[inline]
    pub fn move_next(&mut self) {
        if self.is_end() {
            return;
        }
        self.position += 1;
        self.skip_vacant();
    }
}

/// An iterator over the values of a [`CacheTable`].
///
/// This struct is created by the [`iter`] method on [`CacheTable`].
///
/// [`iter`]: CacheTable::iter
pub struct Iter<'a, V, X: KeyExtract<V>, E> {
    cursor: Cursor<'a, V, X, E>,
    remaining: usize,
}

impl<V, X: KeyExtract<V>, E> Clone for Iter<'_, V, X, E> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, V, X, E> Iterator for Iter<'a, V, X, E>
where
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.cursor.get()?;
        self.cursor.move_next();
        self.remaining = self.remaining.saturating_sub(1);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V, X, E> ExactSizeIterator for Iter<'_, V, X, E>
where
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
}

/// A mutable iterator over the values of a [`CacheTable`].
///
/// This struct is created by the [`iter_mut`] method on [`CacheTable`].
///
/// [`iter_mut`]: CacheTable::iter_mut
pub struct IterMut<'a, V, X: KeyExtract<V>, E> {
    inner: core::slice::IterMut<'a, V>,
    empty_key: &'a X::Key,
    key_extract: &'a X,
    key_equal: &'a E,
    remaining: usize,
}

impl<'a, V, X, E> Iterator for IterMut<'a, V, X, E>
where
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for value in self.inner.by_ref() {
            if !self
                .key_equal
                .equal(self.key_extract.key(value), self.empty_key)
            {
                self.remaining -= 1;
                return Some(value);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V, X, E> ExactSizeIterator for IterMut<'_, V, X, E>
where
    X: KeyExtract<V>,
    E: KeyEqual<X::Key>,
{
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::policy::First;
    use crate::policy::Identity;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Default)]
    struct Recorder<V> {
        events: Vec<(V, V)>,
    }

    impl<V: Clone> Discard<V> for Recorder<V> {
        fn discard(&mut self, evicted: &V, incoming: &V) {
            self.events.push((evicted.clone(), incoming.clone()));
        }
    }

    type Pair = (i64, &'static str);
    type PairTable = CacheTable<Pair, First, BuildJenkinsHasher, EqualTo, Recorder<Pair>>;

    fn pair_table(capacity: usize) -> PairTable {
        CacheTableBuilder::with_key_extract(capacity, First)
            .with_discard(Recorder::default())
            .build((-1, ""))
            .unwrap()
    }

    fn occupied_slots<V, X, S, E, D, A>(table: &CacheTable<V, X, S, E, D, A>) -> usize
    where
        X: KeyExtract<V>,
        E: KeyEqual<X::Key>,
        A: TableAlloc,
    {
        let empty_key = table.key_extract.key(&table.empty_value);
        table
            .slots()
            .iter()
            .filter(|v| !table.key_equal.equal(table.key_extract.key(v), empty_key))
            .count()
    }

    #[test]
    fn bucket_count_rounds_to_power_of_two() {
        let cases = [(0, 1), (1, 1), (2, 2), (3, 4), (5, 8), (1000, 1024), (1024, 1024)];
        for (capacity, buckets) in cases {
            let builder = CacheTableBuilder::<Identity>::new(capacity);
            assert_eq!(builder.bucket_count(), buckets, "capacity {capacity}");
            assert_eq!(builder.max_size(), buckets);

            let table = builder.build(u32::MAX).unwrap();
            assert_eq!(table.bucket_count(), buckets);
            assert_eq!(table.max_size(), buckets);
            assert!(table.is_empty());
            assert_eq!(table.num_collisions(), 0);
        }
    }

    #[test]
    fn capacity_overflow_is_an_error() {
        let builder = CacheTableBuilder::<Identity>::new(usize::MAX);
        assert_eq!(
            builder.build(0u64).unwrap_err(),
            CacheTableError::CapacityOverflow
        );

        // Representable bucket count, unrepresentable slot array.
        let builder = CacheTableBuilder::<Identity>::new(1 << (usize::BITS - 2));
        assert_eq!(
            builder.build(0u64).unwrap_err(),
            CacheTableError::CapacityOverflow
        );
    }

    #[test]
    fn insert_and_find() {
        let mut table = pair_table(64);
        for k in 0..64i64 {
            let (pos, vacant) = table.insert((k, "v")).unwrap();
            assert!(vacant);
            assert_eq!(pos.index(), k as usize);
        }

        assert_eq!(table.len(), 64);
        assert_eq!(table.num_collisions(), 0);
        for k in 0..64i64 {
            assert_eq!(table.find(&k), Some(&(k, "v")));
            assert!(table.contains(&k));
        }
        assert_eq!(table.find(&64), None);
        assert!(table.discard_policy().events.is_empty());
    }

    #[test]
    fn insert_and_find_random_hasher() {
        let mut table: CacheTable<(u64, u64), First, SipHashBuilder> =
            CacheTableBuilder::with_key_extract(256, First)
                .with_hasher(SipHashBuilder::default())
                .build((u64::MAX, 0))
                .unwrap();

        for k in 0..200u64 {
            table.insert((k, k * 2)).unwrap();
            assert_eq!(table.find(&k), Some(&(k, k * 2)));
        }

        // Every insert either filled a slot or evicted someone.
        assert_eq!(table.len() + table.num_collisions(), 200);
        assert_eq!(occupied_slots(&table), table.len());

        let found = (0..200u64).filter(|k| table.find(k).is_some()).count();
        assert_eq!(found, table.len());
        for (k, v) in table.iter() {
            assert_eq!(*v, k * 2);
        }
    }

    #[test]
    fn collision_overwrites_resident() {
        let mut table = pair_table(4);
        assert_eq!(table.bucket_count(), 4);

        table.insert((0, "A")).unwrap();
        assert_eq!(table.len(), 1);

        let (pos, vacant) = table.insert((4, "B")).unwrap();
        assert!(!vacant);
        assert_eq!(pos.index(), 0);

        assert_eq!(table.discard_policy().events, [((0, "A"), (4, "B"))]);
        assert_eq!(table.num_collisions(), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&0), None);
        assert_eq!(table.find(&4), Some(&(4, "B")));
    }

    #[test]
    fn insert_same_key_counts_as_collision() {
        let mut table = pair_table(8);
        table.insert((3, "old")).unwrap();
        let (_, vacant) = table.insert((3, "new")).unwrap();

        assert!(!vacant);
        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 1);
        assert_eq!(table.discard_policy().events, [((3, "old"), (3, "new"))]);
        assert_eq!(table.find(&3), Some(&(3, "new")));
    }

    #[test]
    fn insert_empty_key_is_rejected() {
        let mut table = pair_table(8);
        assert_eq!(
            table.insert((-1, "sentinel")).unwrap_err(),
            CacheTableError::SentinelKey
        );
        assert_eq!(
            table.find_or_insert(-1).unwrap_err(),
            CacheTableError::SentinelKey
        );
        assert!(table.is_empty());
        assert_eq!(table.num_collisions(), 0);
        assert_eq!(table.find(&-1), None);
        assert_eq!(table.erase(&-1), 0);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn find_of_empty_key_misses_when_populated() {
        let mut table = pair_table(4);
        table.insert((1, "x")).unwrap();
        assert_eq!(table.find(&-1), None);
        assert!(!table.contains(&-1));
    }

    #[test]
    fn insert_all_stops_at_sentinel() {
        let mut table: CacheTable<i32, Identity> = CacheTable::new(16, -1).unwrap();
        assert_eq!(table.insert_all([1, 2, 3]), Ok(3));
        assert_eq!(
            table.insert_all([4, -1, 5]),
            Err(CacheTableError::SentinelKey)
        );
        assert_eq!(table.len(), 4);
        assert!(table.contains(&4));
        assert!(!table.contains(&5));
    }

    #[test]
    fn find_or_insert_is_idempotent() {
        let mut table = pair_table(8);

        let first = table.find_or_insert(5).unwrap() as *const _;
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&5), Some(&(5, "")));

        let second = table.find_or_insert(5).unwrap() as *const _;
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 0);
        assert!(table.discard_policy().events.is_empty());
    }

    #[test]
    fn find_or_insert_keeps_existing_value() {
        let mut table = pair_table(8);
        table.insert((2, "kept")).unwrap();

        assert_eq!(*table.find_or_insert(2).unwrap(), (2, "kept"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 0);
    }

    #[test]
    fn find_or_insert_displaces_other_key() {
        let mut table = pair_table(4);
        table.insert((1, "one")).unwrap();

        let slot = table.find_or_insert(5).unwrap();
        assert_eq!(*slot, (5, ""));
        slot.1 = "five";

        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 1);
        assert_eq!(table.discard_policy().events, [((1, "one"), (-1, ""))]);
        assert_eq!(table.find(&1), None);
        assert_eq!(table.find(&5), Some(&(5, "five")));
    }

    #[test]
    fn erase_by_key() {
        let mut table = pair_table(8);
        table.insert((1, "a")).unwrap();
        table.insert((2, "b")).unwrap();

        assert_eq!(table.erase(&1), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&1), None);
        assert_eq!(table.find(&2), Some(&(2, "b")));

        assert_eq!(table.erase(&1), 0);
        assert_eq!(table.erase(&7), 0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 0);
        assert!(table.discard_policy().events.is_empty());
    }

    #[test]
    fn erase_at_and_range() {
        let mut table = pair_table(8);
        for k in [0, 2, 3, 6] {
            table.insert((k, "v")).unwrap();
        }

        let pos = table.find_position(&2).unwrap();
        assert_eq!(table.erase_at(pos), 1);
        assert_eq!(table.erase_at(pos), 0);
        assert_eq!(table.erase_at(Position(100)), 0);
        assert_eq!(table.len(), 3);

        assert_eq!(table.erase_range(Position(1)..Position(4)), 1);
        assert_eq!(table.len(), 2);
        assert!(table.contains(&0));
        assert!(!table.contains(&3));
        assert!(table.contains(&6));

        let end = table.end().position();
        assert_eq!(table.erase_range(table.begin().position()..end), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_returns_value() {
        let mut table: CacheTable<(u32, String), First> =
            CacheTable::new(8, (0, String::new())).unwrap();
        table.insert((1, "one".to_string())).unwrap();

        assert_eq!(table.remove(&1), Some((1, "one".to_string())));
        assert_eq!(table.remove(&1), None);
        assert!(table.is_empty());
    }

    #[test]
    fn clear_keeps_collision_count() {
        let mut table = pair_table(4);
        table.insert((0, "a")).unwrap();
        table.insert((4, "b")).unwrap();
        table.insert((1, "c")).unwrap();
        assert_eq!(table.num_collisions(), 1);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.num_collisions(), 1);
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.begin(), table.end());

        table.insert((4, "d")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.num_collisions(), 1);
    }

    #[test]
    fn resize_is_a_no_op() {
        let mut table = pair_table(4);
        table.insert((1, "a")).unwrap();
        table.resize(1000);
        assert_eq!(table.bucket_count(), 4);
        assert_eq!(table.find(&1), Some(&(1, "a")));
    }

    #[test]
    fn iteration_visits_occupied_slots_in_order() {
        let mut table = pair_table(16);
        for k in [9, 1, 14, 4] {
            table.insert((k, "v")).unwrap();
        }
        table.erase(&14);

        let keys: Vec<i64> = table.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, [1, 4, 9]);
        assert_eq!(table.iter().len(), 3);
        assert_eq!((&table).into_iter().count(), table.len());
    }

    #[test]
    fn iteration_matches_size_after_mixed_operations() {
        let mut table: CacheTable<(u64, u64), First> =
            CacheTable::new(32, (u64::MAX, 0)).unwrap();
        for round in 0..10u64 {
            for k in 0..40u64 {
                table.insert((k * 7 + round, k)).unwrap();
            }
            for k in (0..40u64).step_by(3) {
                table.erase(&(k * 7 + round));
            }
            let _ = table.find_or_insert(round * 1000 + 1).unwrap();

            let iterated: Vec<_> = table.iter().collect();
            assert_eq!(iterated.len(), table.len());
            assert_eq!(occupied_slots(&table), table.len());
            assert!(iterated.iter().all(|(k, _)| *k != u64::MAX));
        }
    }

    #[test]
    fn cursors_skip_vacant_slots() {
        let mut table = pair_table(8);
        assert_eq!(table.begin(), table.end());
        assert!(table.begin().is_end());
        assert_eq!(table.end().get(), None);

        table.insert((3, "three")).unwrap();
        table.insert((5, "five")).unwrap();

        let mut cursor = table.begin();
        assert_eq!(cursor.position().index(), 3);
        assert_eq!(cursor.get(), Some(&(3, "three")));

        cursor.move_next();
        assert_eq!(cursor.get(), Some(&(5, "five")));

        cursor.move_next();
        assert_eq!(cursor, table.end());
        cursor.move_next();
        assert_eq!(cursor, table.end());

        let pos = table.find_position(&5).unwrap();
        assert_eq!(table.cursor(pos).get(), Some(&(5, "five")));
        // Resting on a vacant slot yields the empty value.
        assert_eq!(table.cursor(Position(0)).get(), Some(&(-1, "")));
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut table: CacheTable<(u32, u32), First> =
            CacheTable::new(8, (u32::MAX, 0)).unwrap();
        table.insert_all([(1, 10), (2, 20), (6, 60)]).unwrap();

        for (_, v) in table.iter_mut() {
            *v += 1;
        }
        assert_eq!(table.iter_mut().len(), 3);

        assert_eq!(table.find(&1), Some(&(1, 11)));
        assert_eq!(table.find(&6), Some(&(6, 61)));
        *table.find_mut(&2).unwrap() = (2, 0);
        assert_eq!(table.find(&2), Some(&(2, 0)));
    }

    #[test]
    fn equality_is_storage_identity() {
        let mut a: CacheTable<u32, Identity> = CacheTable::new(4, u32::MAX).unwrap();
        let b: CacheTable<u32, Identity> = CacheTable::new(4, u32::MAX).unwrap();
        assert!(a.eq(&a));
        assert!(a != b);

        a.insert(1).unwrap();
        let c = a.clone();
        assert!(a != c);
        assert_eq!(c.len(), 1);
        assert_eq!(c.find(&1), Some(&1));
        assert_eq!(a.iter().collect::<Vec<_>>(), c.iter().collect::<Vec<_>>());
    }

    #[test]
    fn swap_exchanges_everything() {
        let mut a = pair_table(4);
        let mut b = pair_table(16);
        a.insert((0, "a")).unwrap();
        a.insert((4, "a2")).unwrap();
        b.insert((9, "b")).unwrap();

        a.swap(&mut b);

        assert_eq!(a.bucket_count(), 16);
        assert_eq!(a.find(&9), Some(&(9, "b")));
        assert_eq!(a.num_collisions(), 0);
        assert_eq!(b.bucket_count(), 4);
        assert_eq!(b.find(&4), Some(&(4, "a2")));
        assert_eq!(b.num_collisions(), 1);
        assert_eq!(b.discard_policy().events.len(), 1);
    }

    #[test]
    fn values_are_dropped() {
        let marker = Rc::new(());
        {
            let mut table: CacheTable<(u32, Rc<()>), First> =
                CacheTable::new(4, (u32::MAX, Rc::new(()))).unwrap();
            table.insert((0, marker.clone())).unwrap();
            table.insert((1, marker.clone())).unwrap();
            table.insert((2, marker.clone())).unwrap();
            assert_eq!(Rc::strong_count(&marker), 4);

            // Eviction drops the resident.
            table.insert((4, marker.clone())).unwrap();
            assert_eq!(Rc::strong_count(&marker), 4);

            table.erase(&1);
            assert_eq!(Rc::strong_count(&marker), 3);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn stats_snapshot() {
        let mut table: CacheTable<u64, Identity> = CacheTable::new(8, u64::MAX).unwrap();
        table.insert_all([0, 1, 8]).unwrap();

        let stats = table.stats();
        assert_eq!(stats.populated, 2);
        assert_eq!(stats.buckets, 8);
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.total_bytes, 64);
        assert!((stats.load_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn string_keys() {
        let mut table: CacheTable<(String, f64), First> =
            CacheTable::new(1024, (String::new(), 0.0)).unwrap();
        table.insert(("ciao".to_string(), 11.0)).unwrap();
        table.find_or_insert("prova".to_string()).unwrap().1 = 1.5;
        table.find_or_insert("hola".to_string()).unwrap().1 = 3.1;

        assert_eq!(table.find(&"prova".to_string()).map(|e| e.1), Some(1.5));
        assert_eq!(table.find(&"hola".to_string()).map(|e| e.1), Some(3.1));
        assert_eq!(table.len(), 3, "{table:#?}");
        assert_eq!(table.num_collisions(), 0);
    }

    #[test]
    fn closure_discard_policy() {
        let mut evicted = 0;
        {
            let mut table = CacheTableBuilder::<Identity>::new(2)
                .with_discard(|_: &u64, _: &u64| evicted += 1)
                .build(u64::MAX)
                .unwrap();
            table.insert_all([0, 2, 4, 1]).unwrap();
            assert_eq!(table.num_collisions(), 2);
        }
        assert_eq!(evicted, 2);
    }

    #[test]
    fn debug_output_lists_entries() {
        let mut table: CacheTable<u8, Identity> = CacheTable::new(4, 0).unwrap();
        table.insert(2).unwrap();
        let out = alloc::format!("{table:?}");
        assert!(out.contains("populated: 1"), "{out}");
        assert!(out.contains("entries: [2]"), "{out}");
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn mmap_backed_table() {
        use crate::storage::MmapAlloc;

        let mut table = CacheTableBuilder::with_key_extract(1 << 16, First)
            .with_allocator(MmapAlloc)
            .build((u64::MAX, 0u64))
            .unwrap();
        for k in 0..1000u64 {
            table.insert((k, k)).unwrap();
        }
        assert_eq!(table.len(), 1000);
        assert_eq!(table.find(&999), Some(&(999, 999)));
        table.clear();
        assert!(table.is_empty());
    }
}
