//! Fixed-size chaining hash table.
//!
//! The table is an index over objects owned elsewhere: items are usually
//! shared handles (`Arc<T>`) into an object list. Hashing, matching and
//! disposal are supplied by a [`HashStrategy`]. The table never resizes;
//! owners rebuild it when the indexed set changes.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, VrmrError};
use crate::list::List;

/// Row count used when a table is set up with zero rows.
pub const DEFAULT_ROWS: usize = 10;

/// Hash, compare and free strategy for a [`HashTable`].
///
/// Two things that compare equal must hash to the same value, otherwise
/// `search` and `remove` will look in the wrong row.
pub trait HashStrategy {
    /// Element stored in the table
    type Item;
    /// Search key compared against stored elements
    type Key: ?Sized;

    fn hash_item(&self, item: &Self::Item) -> usize;

    fn hash_key(&self, key: &Self::Key) -> usize;

    /// Does the stored `item` match the search `key`?
    fn equals(&self, item: &Self::Item, key: &Self::Key) -> bool;

    /// Dispose of an element leaving the table.
    fn destroy(&self, item: Self::Item) {
        drop(item);
    }
}

/// Chaining hash table with a fixed number of rows.
pub struct HashTable<S: HashStrategy> {
    rows: Vec<List<S::Item>>,
    cells: usize,
    strategy: S,
}

impl<S: HashStrategy> HashTable<S> {
    /// Set up a table with `rows` buckets. Zero rows means [`DEFAULT_ROWS`].
    pub fn new(rows: usize, strategy: S) -> Self {
        let rows = if rows == 0 { DEFAULT_ROWS } else { rows };
        Self {
            rows: (0..rows).map(|_| List::new()).collect(),
            cells: 0,
            strategy,
        }
    }

    /// Number of buckets.
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored elements.
    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells == 0
    }

    /// Length of one bucket, `None` if `row` is out of range.
    pub fn row_len(&self, row: usize) -> Option<usize> {
        self.rows.get(row).map(List::len)
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Add an element. Duplicates are allowed.
    pub fn insert(&mut self, item: S::Item) {
        let row = self.strategy.hash_item(&item) % self.rows.len();
        self.rows[row].append(item);
        self.cells += 1;
    }

    /// Remove the first element in the key's bucket that matches `key`.
    pub fn remove(&mut self, key: &S::Key) -> Result<()> {
        let row = self.strategy.hash_key(key) % self.rows.len();
        let found = self.rows[row]
            .cursor_top()
            .find(|(_, item)| self.strategy.equals(item, key))
            .map(|(id, _)| id);

        let Some(id) = found else {
            warn!(row, "hash remove: no matching element");
            return Err(VrmrError::NotFound("element not in hash table".to_string()));
        };

        let item = self.rows[row].unlink(id)?;
        self.strategy.destroy(item);
        self.cells -= 1;
        Ok(())
    }

    /// First element in the key's bucket that matches `key`.
    pub fn search(&self, key: &S::Key) -> Option<&S::Item> {
        let row = self.strategy.hash_key(key) % self.rows.len();
        self.rows[row]
            .iter()
            .find(|item| self.strategy.equals(item, key))
    }

    /// Iterate every element, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &S::Item> {
        self.rows.iter().flat_map(List::iter)
    }

    /// Destroy every element. The row count is kept.
    pub fn cleanup(&mut self) {
        for row in &mut self.rows {
            while let Some(top) = row.top() {
                match row.unlink(top) {
                    Ok(item) => self.strategy.destroy(item),
                    Err(_) => break,
                }
            }
        }
        debug!(cells = self.cells, "hash table cleaned up");
        self.cells = 0;
    }
}

impl<S: HashStrategy> Drop for HashTable<S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Objects looked up by name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Sum of the bytes of a string.
pub fn hash_string(s: &str) -> usize {
    s.bytes().map(usize::from).sum()
}

/// Name index over shared objects.
pub struct StringHash<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> StringHash<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for StringHash<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Named> HashStrategy for StringHash<T> {
    type Item = Arc<T>;
    type Key = str;

    fn hash_item(&self, item: &Arc<T>) -> usize {
        hash_string(item.name())
    }

    fn hash_key(&self, key: &str) -> usize {
        hash_string(key)
    }

    fn equals(&self, item: &Arc<T>, key: &str) -> bool {
        item.name() == key
    }
}

/// Build a name index over `items`.
pub fn name_index<'a, T, I>(rows: usize, items: I) -> HashTable<StringHash<T>>
where
    T: Named + 'a,
    I: IntoIterator<Item = &'a Arc<T>>,
{
    let mut table = HashTable::new(rows, StringHash::new());
    for item in items {
        table.insert(Arc::clone(item));
    }
    table
}
