//! Policy objects that configure a [`CacheTable`](crate::CacheTable).
//!
//! A table is parameterized by four policies besides its hasher:
//!
//! - [`KeyExtract`] projects a stored value to its key. [`Identity`] is used
//!   for set-like tables, [`First`] for tables of `(key, value)` pairs.
//! - [`KeyEqual`] decides key equivalence. It must agree with the hasher:
//!   keys that compare equal must hash identically.
//! - [`Discard`] observes every eviction. [`DiscardIgnore`] is the inert
//!   default; [`LogDiscard`] reports evictions through the `log` facade, and
//!   any `FnMut(&V, &V)` closure can be used directly.

use core::fmt::Debug;

/// Projects a stored value to its key.
pub trait KeyExtract<V> {
    /// The key type.
    type Key;

    /// Returns the key of `value`.
    fn key<'a>(&self, value: &'a V) -> &'a Self::Key;

    /// Returns the key of `value` mutably.
    ///
    /// Used by upserts to write the queried key into a freshly emptied slot.
    fn key_mut<'a>(&self, value: &'a mut V) -> &'a mut Self::Key;
}

/// The value is its own key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl<T> KeyExtract<T> for Identity {
    type Key = T;

    #[inline(always)]
    fn key<'a>(&self, value: &'a T) -> &'a T {
        value
    }

    #[inline(always)]
    fn key_mut<'a>(&self, value: &'a mut T) -> &'a mut T {
        value
    }
}

/// The key is the first element of a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct First;

impl<K, T> KeyExtract<(K, T)> for First {
    type Key = K;

    #[inline(always)]
    fn key<'a>(&self, value: &'a (K, T)) -> &'a K {
        &value.0
    }

    #[inline(always)]
    fn key_mut<'a>(&self, value: &'a mut (K, T)) -> &'a mut K {
        &mut value.0
    }
}

/// Key equivalence.
pub trait KeyEqual<K: ?Sized> {
    /// Returns `true` if `a` and `b` are the same key.
    fn equal(&self, a: &K, b: &K) -> bool;
}

/// Key equivalence through [`PartialEq`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EqualTo;

impl<K: PartialEq + ?Sized> KeyEqual<K> for EqualTo {
    #[inline(always)]
    fn equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Observer for evicted values.
///
/// `discard` runs before the slot is overwritten, while `evicted` is still in
/// place. For an upsert that displaces a live value, `incoming` is the table's
/// empty value, since the replacement is only written by the caller
/// afterwards.
pub trait Discard<V> {
    /// Called once per eviction.
    fn discard(&mut self, evicted: &V, incoming: &V);
}

/// Ignores evictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscardIgnore;

impl<V> Discard<V> for DiscardIgnore {
    #[inline(always)]
    fn discard(&mut self, _evicted: &V, _incoming: &V) {}
}

impl<V, F> Discard<V> for F
where
    F: FnMut(&V, &V),
{
    #[inline]
    fn discard(&mut self, evicted: &V, incoming: &V) {
        self(evicted, incoming)
    }
}

/// Logs each eviction at `debug` level under the `direct_cache::evict`
/// target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogDiscard;

impl<V: Debug> Discard<V> for LogDiscard {
    fn discard(&mut self, evicted: &V, incoming: &V) {
        log::debug!(target: "direct_cache::evict", "evicted {evicted:?} for {incoming:?}");
    }
}
