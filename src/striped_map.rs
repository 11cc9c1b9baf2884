use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::fs::File;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use crate::striped_table::StripedTable;

/// The hasher builder used when none is supplied.
pub type DefaultHashBuilder = foldhash::fast::RandomState;

/// Bucket count used by constructors that do not take an explicit count.
///
/// A small prime, so key sets with a stride pattern still spread across
/// buckets.
pub const DEFAULT_BUCKET_COUNT: usize = 19;

/// A thread-safe hash map with one reader-writer lock per bucket.
///
/// `StripedMap<K, V, S>` maps keys implementing `Hash + Eq` to values,
/// resolving collisions by chaining within a fixed set of buckets. Every
/// operation takes `&self`: a key is hashed with the map's `BuildHasher`,
/// routed to its bucket, and the work happens under that bucket's lock
/// alone. Operations on keys in different buckets proceed in parallel;
/// lookups of the same bucket share its lock.
///
/// Unlike the standard map types, [`insert`](Self::insert) never overwrites:
/// it returns `false` if the key is already present. Overwriting is the
/// separate [`assign`](Self::assign), which in turn never creates a key.
///
/// The bucket count is fixed at construction. There is no resizing, so
/// chains grow when the map holds many more entries than buckets; choose the
/// bucket count for the expected population and concurrency.
///
/// # Examples
///
/// ```rust
/// use stripe_map::StripedMap;
///
/// let map = StripedMap::with_buckets(16);
/// assert!(map.insert("a", 1));
/// assert!(map.insert("b", 2));
/// assert!(!map.insert("a", 3));
///
/// assert_eq!(map.get(&"a"), Some(1));
/// assert_eq!(map.len(), 2);
/// ```
pub struct StripedMap<K, V, S = DefaultHashBuilder> {
    table: StripedTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for StripedMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each(|k, v| {
            map.entry(k, v);
        });
        map.finish()
    }
}

impl<K, V> StripedMap<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    /// Creates a map with [`DEFAULT_BUCKET_COUNT`] buckets and the default
    /// hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates a map with `bucket_count` buckets and the default hasher
    /// builder.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::with_buckets(64);
    /// map.insert("a", 1);
    /// assert_eq!(map.bucket_count(), 64);
    /// ```
    pub fn with_buckets(bucket_count: usize) -> Self {
        Self::with_buckets_and_hasher(bucket_count, DefaultHashBuilder::default())
    }
}

impl<K, V, S> StripedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a map with [`DEFAULT_BUCKET_COUNT`] buckets and the given
    /// hasher builder.
    ///
    /// The hasher must be deterministic across calls on the same map
    /// instance; it does not need to be cryptographic.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_buckets_and_hasher(DEFAULT_BUCKET_COUNT, hash_builder)
    }

    /// Creates a map with `bucket_count` buckets and the given hasher
    /// builder. All buckets and their locks are allocated here; nothing is
    /// reallocated later.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    pub fn with_buckets_and_hasher(bucket_count: usize, hash_builder: S) -> Self {
        Self {
            table: StripedTable::with_buckets(bucket_count),
            hash_builder,
        }
    }

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Inserts `key` with `value` if the key is not already present.
    ///
    /// Returns `true` if the entry was inserted. Returns `false`, leaving
    /// the existing value untouched, if the key was already in the map. The
    /// check and the insertion happen under one acquisition of the bucket's
    /// write lock, so two racing inserts of the same key cannot both
    /// succeed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// assert!(map.insert("k", 1));
    /// assert!(!map.insert("k", 2));
    /// assert_eq!(map.get(&"k"), Some(1));
    /// ```
    pub fn insert(&self, key: K, value: V) -> bool {
        let hash = self.hash(&key);
        self.table
            .insert_unique(hash, (key, value), |existing, new| existing.0 == new.0)
    }

    /// Overwrites the value of an existing key.
    ///
    /// Returns `true` if the key was present and its value replaced.
    /// Returns `false` if the key was absent; `assign` never creates an
    /// entry, so the map's length is unchanged either way.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert("k", 1);
    ///
    /// assert!(map.assign(&"k", 10));
    /// assert_eq!(map.get(&"k"), Some(10));
    ///
    /// assert!(!map.assign(&"missing", 0));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn assign(&self, key: &K, value: V) -> bool {
        let hash = self.hash(key);
        self.table
            .update(hash, |(k, _)| k == key, |entry| entry.1 = value)
    }

    /// Removes the entry for `key` if present.
    ///
    /// Returns `true` if an entry was removed. Removing an absent key
    /// returns `false` with no observable change, so repeated removal of
    /// the same key succeeds at most once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert("k", 1);
    ///
    /// assert!(map.remove(&"k"));
    /// assert!(!map.remove(&"k"));
    /// assert_eq!(map.get(&"k"), None);
    /// ```
    pub fn remove(&self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes the entry for `key` and returns the owned pair, or `None` if
    /// the key was absent.
    pub fn remove_entry(&self, key: &K) -> Option<(K, V)> {
        let hash = self.hash(key);
        self.table.remove_where(hash, |(k, _)| k == key)
    }

    /// Returns a copy of the value for `key`, or `None` if absent.
    ///
    /// The lookup runs under the bucket's shared lock: it is concurrent
    /// with other readers of the same bucket and with every operation on
    /// other buckets, and excluded only by a writer of this bucket. Use
    /// [`get_with`](Self::get_with) to read without cloning.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert(1, "one".to_string());
    ///
    /// assert_eq!(map.get(&1), Some("one".to_string()));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Looks up `key` and passes the value to `read` under the bucket's
    /// shared lock, returning the closure's result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert("k", "value".to_string());
    ///
    /// assert_eq!(map.get_with(&"k", |v| v.len()), Some(5));
    /// assert_eq!(map.get_with(&"absent", |v| v.len()), None);
    /// ```
    pub fn get_with<R>(&self, key: &K, read: impl FnOnce(&V) -> R) -> Option<R> {
        let hash = self.hash(key);
        self.table.find(hash, |(k, _)| k == key, |(_, v)| read(v))
    }

    /// Returns `true` if the map contains an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get_with(key, |_| ()).is_some()
    }

    /// Returns the number of entries at some instant.
    ///
    /// The count is read from a counter maintained under its own lock, so
    /// it reflects some valid serialization of completed inserts and
    /// removes and is never torn. A call racing an in-flight mutation may
    /// observe the count from just before or just after that mutation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert("a", 1);
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the fixed number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Returns the chain length of one bucket at some instant. Useful for
    /// inspecting how well the hasher spreads the key population.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.bucket_count()`.
    pub fn bucket_len(&self, index: usize) -> usize {
        self.table.bucket_len(index)
    }

    /// Removes all entries.
    ///
    /// Buckets are emptied one at a time under their write locks, in index
    /// order. Concurrent inserts into buckets already cleared survive the
    /// call.
    pub fn clear(&self) {
        self.table.clear();
    }

    /// Visits every entry, bucket by bucket in index order.
    ///
    /// Only the bucket currently being visited is locked (shared), so the
    /// traversal observes each bucket at one consistent instant but is not
    /// an atomic snapshot of the whole map. Entries mutated in buckets
    /// already visited, or not yet visited, may be missed or seen twice
    /// under concurrent writes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::new();
    /// map.insert(1, 10);
    /// map.insert(2, 20);
    ///
    /// let mut total = 0;
    /// map.for_each(|_, v| total += v);
    /// assert_eq!(total, 30);
    /// ```
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.table.for_each_bucket(|_, chain| {
            for (k, v) in chain {
                f(k, v);
            }
        });
    }

    /// Writes a textual rendering of the map to `out`, one line per bucket
    /// in index order:
    ///
    /// ```text
    /// Bucket 0: (K0,0) (K19,19)
    /// Bucket 1: (K1,1)
    /// ```
    ///
    /// Each bucket's read lock is held only while that bucket's line is
    /// rendered, so a dump never stalls writers to other buckets and the
    /// output is bucket-locally consistent rather than a global snapshot.
    /// I/O errors from `out` abort the dump and are returned to the caller.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedMap;
    ///
    /// let map = StripedMap::with_buckets(2);
    /// map.insert(1u64, "one");
    ///
    /// let mut out = Vec::new();
    /// map.dump(&mut out).unwrap();
    /// let text = String::from_utf8(out).unwrap();
    /// assert_eq!(text.lines().count(), 2);
    /// assert!(text.contains("(1,one)"));
    /// ```
    pub fn dump<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write,
        K: Display,
        V: Display,
    {
        self.table.try_for_each_bucket(|index, chain| {
            write!(out, "Bucket {index}:")?;
            for (key, value) in chain {
                write!(out, " ({key},{value})")?;
            }
            writeln!(out)
        })
    }

    /// Creates (or truncates) the file at `path` and writes the
    /// [`dump`](Self::dump) rendering into it through a buffered writer.
    pub fn dump_to_path<P>(&self, path: P) -> io::Result<()>
    where
        P: AsRef<Path>,
        K: Display,
        V: Display,
    {
        let mut out = BufWriter::new(File::create(path)?);
        self.dump(&mut out)?;
        out.flush()
    }
}

impl<K, V, S> Default for StripedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_buckets_and_hasher(DEFAULT_BUCKET_COUNT, S::default())
    }
}
