//! Fixed-capacity hash table with separate chaining.
//!
//! Entries live in a slot pool; a bucket holds the pool index of its chain
//! head and every entry holds the index of its successor. Removed slots go
//! on a free-list and are reused by later inserts, so there is no per-entry
//! allocation once the pool has grown to its working size.
//!
//! The bucket count is fixed at construction. There is no resizing: a key's
//! home bucket is `hash(key) % capacity` for the whole life of the table.
//!
//! The table is not synchronized. Sharing it between threads for mutation
//! requires an external lock.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hasher};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::key::KeyHash;
use crate::polymur::PolymurState;

/// Bucket count used by [`TableBuilder`] when none is given.
pub const DEFAULT_CAPACITY: usize = 16;

struct Entry<K, V> {
    key: K,
    value: V,
    next: Option<usize>,
}

/// Walks one chain, head to tail, yielding slot indices with their entries.
struct Chain<'a, K, V> {
    slots: &'a [Option<Entry<K, V>>],
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = (usize, &'a Entry<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.cursor?;
        let entry = self.slots.get(at)?.as_ref()?;
        self.cursor = entry.next;
        Some((at, entry))
    }
}

/// Result of [`ChainedHashTable::get_or_placeholder`].
///
/// `Absent` is a variant of its own, so it can never be confused with a
/// stored value, whatever that value is.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, V> {
    Present(&'a V),
    Absent,
}

impl<'a, V> Lookup<'a, V> {
    pub fn is_present(&self) -> bool {
        matches!(self, Lookup::Present(_))
    }

    pub fn value(self) -> Option<&'a V> {
        match self {
            Lookup::Present(v) => Some(v),
            Lookup::Absent => None,
        }
    }
}

impl<V: fmt::Display> fmt::Display for Lookup<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Present(v) => v.fmt(f),
            Lookup::Absent => f.write_str("value does not exist"),
        }
    }
}

/// Separate-chaining hash table with a fixed number of buckets.
pub struct ChainedHashTable<K, V, S = PolymurState> {
    buckets: Box<[Option<usize>]>,
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    len: usize,
    hash_builder: S,
}

impl<K, V> ChainedHashTable<K, V, PolymurState> {
    /// Creates a table with `capacity` buckets, hashing with the default
    /// Polymur key.
    ///
    /// Fails with [`Error::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_hasher(capacity, PolymurState::default())
    }

    pub fn builder() -> TableBuilder<PolymurState> {
        TableBuilder::new()
    }
}

impl<K, V, S> ChainedHashTable<K, V, S> {
    /// Creates a table with `capacity` buckets that hashes keys with
    /// `hash_builder`.
    pub fn with_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        debug!("creating chained hash table with {} buckets", capacity);
        Ok(Self {
            buckets: vec![None; capacity].into_boxed_slice(),
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            hash_builder,
        })
    }

    /// Number of key-value pairs stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets. Never changes.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Stored pairs per bucket. Informational only: nothing resizes on it.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Length of the chain in `bucket`, or `None` if there is no such bucket.
    pub fn chain_len(&self, bucket: usize) -> Option<usize> {
        let head = *self.buckets.get(bucket)?;
        Some(self.chain_from(head).count())
    }

    /// Iterates over all pairs, buckets in ascending order and each chain
    /// from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.buckets.iter().flat_map(move |&head| {
            self.chain_from(head)
                .map(|(_, entry)| (&entry.key, &entry.value))
        })
    }

    /// Snapshot of every pair in [`iter`](Self::iter) order, for display and
    /// debugging.
    pub fn render(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    /// Drops every entry. The bucket count is kept.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|head| *head = None);
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    fn chain_from(&self, head: Option<usize>) -> Chain<'_, K, V> {
        Chain {
            slots: &self.slots,
            cursor: head,
        }
    }

    fn chain(&self, bucket: usize) -> Chain<'_, K, V> {
        self.chain_from(self.buckets[bucket])
    }

    fn alloc(&mut self, entry: Entry<K, V>) -> usize {
        match self.free.pop() {
            Some(at) => {
                self.slots[at] = Some(entry);
                at
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }
}

impl<K, V, S: BuildHasher> ChainedHashTable<K, V, S> {
    /// Maps `key` to its home bucket in `[0, capacity)`.
    ///
    /// Fails with [`Error::UnhashableKey`] if the key refuses to hash.
    pub fn hash_index<Q: KeyHash + ?Sized>(&self, key: &Q) -> Result<usize> {
        let mut state = self.hash_builder.build_hasher();
        key.try_hash(&mut state)?;
        Ok((state.finish() % self.buckets.len() as u64) as usize)
    }
}

impl<K, V, S> ChainedHashTable<K, V, S>
where
    K: KeyHash + Eq,
    S: BuildHasher,
{
    /// Inserts `value` under `key`.
    ///
    /// An existing entry for an equal key has its value replaced in place;
    /// otherwise a new entry is prepended to the home bucket's chain.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let index = self.hash_index(&key)?;
        if let Some(at) = self.find(index, &key) {
            if let Some(entry) = self.slots[at].as_mut() {
                entry.value = value;
            }
            trace!("updated entry in bucket {}", index);
            return Ok(());
        }

        let next = self.buckets[index];
        let at = self.alloc(Entry { key, value, next });
        self.buckets[index] = Some(at);
        self.len += 1;
        trace!("inserted entry into bucket {} (len {})", index, self.len);
        Ok(())
    }

    /// Returns the value stored under `key`.
    pub fn search<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        let index = self.hash_index(key)?;
        self.chain(index)
            .find(|(_, entry)| key.eq(entry.key.borrow()))
            .map(|(_, entry)| &entry.value)
            .ok_or(Error::KeyNotFound)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        self.search(key).ok()
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        let index = self.hash_index(key).ok()?;
        let at = self.find(index, key)?;
        self.slots[at].as_mut().map(|entry| &mut entry.value)
    }

    /// Like [`search`](Self::search), but reports a missing or unhashable
    /// key as [`Lookup::Absent`] instead of an error.
    pub fn get_or_placeholder<Q>(&self, key: &Q) -> Lookup<'_, V>
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        match self.search(key) {
            Ok(value) => Lookup::Present(value),
            Err(_) => Lookup::Absent,
        }
    }

    /// Whether `key` is stored. Unhashable keys are simply not contained.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        self.search(key).is_ok()
    }

    /// Unlinks the entry for `key` and returns its value.
    ///
    /// On failure the table is left untouched.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: KeyHash + Eq + ?Sized,
    {
        let index = self.hash_index(key)?;

        let mut prev = None;
        let mut found = None;
        for (at, entry) in self.chain(index) {
            if key.eq(entry.key.borrow()) {
                found = Some((at, entry.next));
                break;
            }
            prev = Some(at);
        }
        let Some((at, next)) = found else {
            return Err(Error::KeyNotFound);
        };

        match prev {
            None => self.buckets[index] = next,
            Some(p) => {
                if let Some(prev_entry) = self.slots[p].as_mut() {
                    prev_entry.next = next;
                }
            }
        }
        let removed = self.slots[at].take();
        self.free.push(at);
        self.len -= 1;
        trace!("removed entry from bucket {} (len {})", index, self.len);
        removed.map(|entry| entry.value).ok_or(Error::KeyNotFound)
    }

    fn find<Q>(&self, index: usize, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.chain(index)
            .find(|(_, entry)| key.eq(entry.key.borrow()))
            .map(|(at, _)| at)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ChainedHashTable<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, S> fmt::Display for ChainedHashTable<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        f.write_str("}")
    }
}

/// Configures and builds a [`ChainedHashTable`].
#[derive(Clone, Debug)]
pub struct TableBuilder<S = PolymurState> {
    capacity: usize,
    hasher: S,
}

impl TableBuilder<PolymurState> {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            hasher: PolymurState::default(),
        }
    }

    /// Keys the Polymur hasher with `seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.hasher = PolymurState::with_seed(seed);
        self
    }
}

impl Default for TableBuilder<PolymurState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TableBuilder<S> {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Replaces the hasher with any `BuildHasher`.
    pub fn hasher<T>(self, hasher: T) -> TableBuilder<T> {
        TableBuilder {
            capacity: self.capacity,
            hasher,
        }
    }

    pub fn build<K, V>(self) -> Result<ChainedHashTable<K, V, S>> {
        ChainedHashTable::with_hasher(self.capacity, self.hasher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Value;

    // Every reachable entry sits in its home bucket and the count matches len().
    fn check_invariants<K, V, S>(table: &ChainedHashTable<K, V, S>)
    where
        K: KeyHash + Eq,
        S: BuildHasher,
    {
        let mut reachable = 0;
        for bucket in 0..table.capacity() {
            let keys: Vec<&K> = table.chain(bucket).map(|(_, e)| &e.key).collect();
            for (i, key) in keys.iter().enumerate() {
                assert_eq!(table.hash_index(*key), Ok(bucket));
                assert!(keys[i + 1..].iter().all(|other| other != key));
            }
            reachable += keys.len();
        }
        assert_eq!(reachable, table.len());
        assert_eq!(
            table.slots.iter().filter(|slot| slot.is_some()).count(),
            table.len()
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let table = ChainedHashTable::<String, i32>::new(0);
        assert!(matches!(table, Err(Error::InvalidCapacity(0))));
    }

    #[test]
    fn hash_index_in_range() {
        let table = ChainedHashTable::<u64, ()>::new(7).unwrap();
        for k in 0..1000u64 {
            let index = table.hash_index(&k).unwrap();
            assert!(index < 7);
            assert_eq!(table.hash_index(&k), Ok(index));
        }
    }

    #[test]
    fn hash_index_spreads_keys() {
        let table = ChainedHashTable::<String, ()>::new(8).unwrap();
        let mut counts = [0usize; 8];
        for i in 0..8000 {
            counts[table.hash_index(&format!("key{}", i)).unwrap()] += 1;
        }
        assert!(counts.iter().all(|&c| c > 500 && c < 1500), "{:?}", counts);
    }

    #[test]
    fn unhashable_key_is_its_own_error() {
        let mut table = ChainedHashTable::<Value, i32>::new(4).unwrap();
        let list = Value::from(vec![Value::from(1)]);
        assert_eq!(table.hash_index(&list), Err(Error::UnhashableKey));
        assert_eq!(table.insert(list.clone(), 1), Err(Error::UnhashableKey));
        assert_eq!(table.search(&list), Err(Error::UnhashableKey));
        assert_eq!(table.remove(&list), Err(Error::UnhashableKey));
        assert!(!table.contains(&list));
        assert_eq!(table.get_or_placeholder(&list), Lookup::Absent);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn collisions_prepend_to_chain() {
        let mut table = ChainedHashTable::new(1).unwrap();
        table.insert("a", 1).unwrap();
        table.insert("b", 2).unwrap();
        table.insert("c", 3).unwrap();
        assert_eq!(table.chain_len(0), Some(3));
        assert_eq!(table.render(), vec![(&"c", &3), (&"b", &2), (&"a", &1)]);

        // updates keep their position
        table.insert("a", 10).unwrap();
        assert_eq!(table.render(), vec![(&"c", &3), (&"b", &2), (&"a", &10)]);
        check_invariants(&table);
    }

    #[test]
    fn remove_head_middle_tail() {
        for victim in ["a", "b", "c"] {
            let mut table = ChainedHashTable::new(1).unwrap();
            for (i, k) in ["a", "b", "c"].into_iter().enumerate() {
                table.insert(k, i).unwrap();
            }
            table.remove(victim).unwrap();
            assert_eq!(table.len(), 2);
            assert!(!table.contains(victim));
            for (i, k) in ["a", "b", "c"].into_iter().enumerate() {
                if k != victim {
                    assert_eq!(table.search(k), Ok(&i));
                }
            }
            check_invariants(&table);
        }
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut table = ChainedHashTable::new(4).unwrap();
        for i in 0..10u32 {
            table.insert(i, i * 2).unwrap();
        }
        assert_eq!(table.slots.len(), 10);
        for i in 0..5u32 {
            assert_eq!(table.remove(&i), Ok(i * 2));
        }
        assert_eq!(table.free.len(), 5);
        for i in 100..105u32 {
            table.insert(i, i).unwrap();
        }
        assert_eq!(table.slots.len(), 10);
        assert!(table.free.is_empty());
        assert_eq!(table.len(), 10);
        check_invariants(&table);
    }

    #[test]
    fn failed_remove_changes_nothing() {
        let mut table = ChainedHashTable::new(2).unwrap();
        for i in 0..6i64 {
            table.insert(i, i).unwrap();
        }
        let before: Vec<(i64, i64)> = table.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(table.remove(&42i64), Err(Error::KeyNotFound));
        let after: Vec<(i64, i64)> = table.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(before, after);
        assert_eq!(table.len(), 6);
        check_invariants(&table);
    }

    #[test]
    fn borrowed_lookups() {
        let mut table = ChainedHashTable::new(5).unwrap();
        table.insert(String::from("apple"), 3).unwrap();
        assert_eq!(table.search("apple"), Ok(&3));
        if let Some(v) = table.get_mut("apple") {
            *v += 1;
        }
        assert_eq!(table.get("apple"), Some(&4));
        assert_eq!(table.remove("apple"), Ok(4));
        assert!(table.is_empty());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table = ChainedHashTable::new(3).unwrap();
        for i in 0..20 {
            table.insert(i, ()).unwrap();
        }
        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 3);
        assert_eq!(table.iter().count(), 0);
        table.insert(1, ()).unwrap();
        check_invariants(&table);
    }

    #[test]
    fn builder_settings() {
        let table: ChainedHashTable<u8, u8> = TableBuilder::new().capacity(9).seed(3).build().unwrap();
        assert_eq!(table.capacity(), 9);
        assert_eq!(*table.hasher(), PolymurState::with_seed(3));

        let table: ChainedHashTable<u8, u8> = TableBuilder::default().build().unwrap();
        assert_eq!(table.capacity(), DEFAULT_CAPACITY);

        assert!(TableBuilder::new().capacity(0).build::<u8, u8>().is_err());
    }

    #[test]
    fn display_and_debug() {
        let mut table = ChainedHashTable::new(1).unwrap();
        table.insert(Value::from("a"), Value::from(1)).unwrap();
        table.insert(Value::from(12), Value::from(vec![Value::from(1)])).unwrap();
        assert_eq!(table.to_string(), "{12: [1], \"a\": 1}");
        assert_eq!(format!("{:?}", table).matches("Str").count(), 1);
        assert_eq!(Lookup::<Value>::Absent.to_string(), "value does not exist");
    }
}
