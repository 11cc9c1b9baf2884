use parking_lot::Mutex;
use parking_lot::RwLock;

/// The raw striped table underlying [`StripedMap`](crate::StripedMap).
///
/// `StripedTable<T>` stores entries of an opaque type `T` in a fixed number
/// of buckets, each bucket an unordered chain guarded by its own
/// reader-writer lock. Entries are addressed by a caller-computed 64-bit
/// hash; the bucket index is `hash % bucket_count`. Equality between the
/// probe and stored entries is supplied per call as a closure, so the table
/// itself never hashes or compares keys.
///
/// A single live-entry counter is kept under its own mutex, separate from
/// every bucket lock. Mutating operations take the counter lock only while
/// the affected bucket's write lock is held, and release it before the
/// bucket lock. Traversals take one bucket read lock at a time in increasing
/// index order and never hold two bucket locks simultaneously. Together
/// these two rules exclude circular waits between any mix of concurrent
/// operations.
///
/// The bucket array and its locks are allocated once at construction and
/// never resized.
pub struct StripedTable<T> {
    buckets: Box<[RwLock<Vec<T>>]>,
    len: Mutex<usize>,
}

impl<T> StripedTable<T> {
    /// Creates a table with `bucket_count` empty buckets.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    pub fn with_buckets(bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "bucket count must be positive");
        let buckets = (0..bucket_count)
            .map(|_| RwLock::new(Vec::new()))
            .collect();
        Self {
            buckets,
            len: Mutex::new(0),
        }
    }

    /// Returns the fixed number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the chain length of one bucket at some instant.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.bucket_count()`.
    pub fn bucket_len(&self, index: usize) -> usize {
        self.buckets[index].read().len()
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Inserts `value` into its bucket unless an entry matching it is
    /// already present.
    ///
    /// `eq` is called as `eq(existing, &value)` for entries in the target
    /// bucket. Returns `true` and increments the entry counter if the value
    /// was appended; returns `false` without side effects if a match was
    /// found.
    pub fn insert_unique(&self, hash: u64, value: T, eq: impl Fn(&T, &T) -> bool) -> bool {
        let mut chain = self.buckets[self.bucket_index(hash)].write();
        if chain.iter().any(|existing| eq(existing, &value)) {
            return false;
        }
        chain.push(value);
        // Counter lock nests inside the bucket write lock and is released
        // first; `chain` stays locked until the function returns.
        *self.len.lock() += 1;
        true
    }

    /// Applies `apply` to the first entry matching `eq`, under the bucket's
    /// write lock. Returns whether a match was found. The entry counter is
    /// untouched.
    pub fn update(
        &self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
        apply: impl FnOnce(&mut T),
    ) -> bool {
        let mut chain = self.buckets[self.bucket_index(hash)].write();
        match chain.iter_mut().find(|entry| eq(entry)) {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the first entry matching `eq`, decrementing the
    /// entry counter. Returns `None` without side effects if no entry
    /// matches.
    pub fn remove_where(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<T> {
        let mut chain = self.buckets[self.bucket_index(hash)].write();
        let position = chain.iter().position(eq)?;
        let removed = chain.remove(position);
        *self.len.lock() -= 1;
        Some(removed)
    }

    /// Looks up the first entry matching `eq` under the bucket's read lock
    /// and passes it to `read`, returning the closure's result.
    ///
    /// The shared lock admits concurrent `find` calls on the same bucket and
    /// any operation on other buckets; only a writer to the same bucket is
    /// excluded.
    pub fn find<R>(
        &self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
        read: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let chain = self.buckets[self.bucket_index(hash)].read();
        chain.iter().find(|entry| eq(entry)).map(read)
    }

    /// Returns the live-entry counter at some instant.
    ///
    /// The counter is updated inside the bucket critical section that
    /// decided each mutation, so this value reflects some serialization of
    /// completed inserts and removes. A call racing an in-flight mutation
    /// may land on either side of it, but the value is never torn.
    pub fn len(&self) -> usize {
        *self.len.lock()
    }

    /// Returns `true` if the counter reads zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every bucket, one write lock at a time in index order.
    ///
    /// Each chain's length is deducted from the entry counter before that
    /// bucket's lock is released, so the counter stays consistent with the
    /// set of buckets already cleared. Entries inserted into already-cleared
    /// buckets during the traversal survive.
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            let mut chain = bucket.write();
            let drained = chain.len();
            chain.clear();
            if drained > 0 {
                *self.len.lock() -= drained;
            }
        }
    }

    /// Visits every bucket in index order, passing the bucket index and a
    /// view of its chain to `f`.
    ///
    /// Only the current bucket's read lock is held while `f` runs for it.
    /// Each chain view is one consistent instant of that bucket, but the
    /// traversal as a whole is not an atomic snapshot of the map.
    pub fn for_each_bucket(&self, mut f: impl FnMut(usize, &[T])) {
        for (index, bucket) in self.buckets.iter().enumerate() {
            let chain = bucket.read();
            f(index, &chain);
        }
    }

    /// Fallible variant of [`for_each_bucket`](Self::for_each_bucket);
    /// stops at the first error and propagates it.
    pub fn try_for_each_bucket<E>(
        &self,
        mut f: impl FnMut(usize, &[T]) -> Result<(), E>,
    ) -> Result<(), E> {
        for (index, bucket) in self.buckets.iter().enumerate() {
            let chain = bucket.read();
            f(index, &chain)?;
        }
        Ok(())
    }
}
