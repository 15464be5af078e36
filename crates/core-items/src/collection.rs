use crate::Item;
use tracing::trace;

/// Returned by the bounds-checked `try_*` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("index {index} out of range for collection of {len} items")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered, mutable sequence of items. Order decides row placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCollection {
    items: Vec<Item>,
}

impl ItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection of `count` items labelled `"0"` through `"count - 1"`.
    pub fn seeded(count: usize) -> Self {
        (0..count).map(|i| Item::new(i.to_string())).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Insert before `at`, or append when `at` is past the end. Returns the
    /// index the item actually landed on.
    pub fn insert(&mut self, item: Item, at: usize) -> usize {
        let len = self.items.len();
        let landed = if at < len {
            self.items.insert(at, item);
            at
        } else {
            self.items.push(item);
            len
        };
        trace!(target: "layout.items", requested = at, landed, len = self.items.len(), "item_inserted");
        landed
    }

    /// Remove `index`, or the last item when `index` is out of range.
    /// `None` only when the collection is empty.
    pub fn remove_at(&mut self, index: usize) -> Option<Item> {
        let removed = if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            self.items.pop()
        };
        if removed.is_some() {
            trace!(target: "layout.items", requested = index, len = self.items.len(), "item_removed");
        }
        removed
    }

    /// Bounds-checked insert. `at == len` is accepted as an explicit append.
    pub fn try_insert(&mut self, item: Item, at: usize) -> Result<usize, IndexError> {
        let len = self.items.len();
        if at > len {
            return Err(IndexError::OutOfRange { index: at, len });
        }
        Ok(self.insert(item, at))
    }

    pub fn try_remove_at(&mut self, index: usize) -> Result<Item, IndexError> {
        let len = self.items.len();
        if index >= len {
            return Err(IndexError::OutOfRange { index, len });
        }
        Ok(self.items.remove(index))
    }

    /// Row-major lookup: item at `row * columns + column`, if any.
    /// No wraparound; an overflowing position is simply absent.
    pub fn get(&self, row: usize, column: usize, columns: usize) -> Option<&Item> {
        let index = row.checked_mul(columns)?.checked_add(column)?;
        self.items.get(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.items.get_mut(index)
    }
}

impl FromIterator<Item> for ItemCollection {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ItemCollection {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(c: &ItemCollection) -> Vec<&str> {
        c.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn seeded_labels_are_sequential() {
        let c = ItemCollection::seeded(4);
        assert_eq!(ids(&c), vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn insert_in_bounds_goes_before_position() {
        let mut c = ItemCollection::seeded(3);
        assert_eq!(c.insert(Item::new("x"), 1), 1);
        assert_eq!(ids(&c), vec!["0", "x", "1", "2"]);
    }

    #[test]
    fn insert_out_of_range_appends() {
        let mut c = ItemCollection::seeded(3);
        assert_eq!(c.insert(Item::new("x"), 999), 3);
        assert_eq!(ids(&c), vec!["0", "1", "2", "x"]);
    }

    #[test]
    fn remove_out_of_range_takes_last() {
        let mut c = ItemCollection::seeded(3);
        let removed = c.remove_at(999).expect("removed");
        assert_eq!(removed.id, "2");
        assert_eq!(ids(&c), vec!["0", "1"]);
    }

    #[test]
    fn remove_on_empty_is_none() {
        let mut c = ItemCollection::new();
        assert!(c.remove_at(0).is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn duplicate_ids_are_allowed() {
        let mut c = ItemCollection::new();
        c.insert(Item::new("dup"), 0);
        c.insert(Item::new("dup"), 0);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn get_uses_row_major_position() {
        let c = ItemCollection::seeded(8);
        assert_eq!(c.get(1, 2, 3).map(|i| i.id.as_str()), Some("5"));
        assert_eq!(c.get(2, 1, 3).map(|i| i.id.as_str()), Some("7"));
        assert!(c.get(2, 2, 3).is_none());
        assert!(c.get(usize::MAX, 1, 3).is_none());
    }

    #[test]
    fn strict_variants_reject_out_of_range() {
        let mut c = ItemCollection::seeded(2);
        assert_eq!(
            c.try_insert(Item::new("x"), 5),
            Err(IndexError::OutOfRange { index: 5, len: 2 })
        );
        assert_eq!(c.try_insert(Item::new("x"), 2), Ok(2));
        assert_eq!(
            c.try_remove_at(3).unwrap_err(),
            IndexError::OutOfRange { index: 3, len: 3 }
        );
        assert_eq!(c.try_remove_at(0).unwrap().id, "0");
    }
}
