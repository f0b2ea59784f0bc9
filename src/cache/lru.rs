//! Recency List Module
//!
//! Doubly-linked most-recently-used ordering for cache eviction.

use crate::cache::CacheEntry;

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// Entries live in a slab of slots linked by index:
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// Slots freed by removal or eviction are recycled by the next insertion,
/// so steady-state churn does not grow the slab.
#[derive(Debug)]
pub struct RecencyList<K, V> {
    slots: Vec<Option<CacheEntry<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts a pair at the MRU position and returns its slot.
    pub fn push_front(&mut self, key: K, value: V) -> usize {
        let entry = CacheEntry::new(key, value);
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        self.link_front(slot);
        self.len += 1;
        slot
    }

    // == Touch ==
    /// Marks a slot as most recently used.
    pub fn touch(&mut self, slot: usize) {
        if self.head == Some(slot) || self.entry(slot).is_none() {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    // == Remove ==
    /// Unlinks a slot and returns its pair.
    pub fn remove(&mut self, slot: usize) -> Option<(K, V)> {
        self.entry(slot)?;
        self.unlink(slot);
        self.len -= 1;
        self.free.push(slot);
        self.slots[slot].take().map(CacheEntry::into_pair)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used pair.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<(K, V)> {
        let tail = self.tail?;
        self.remove(tail)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.tail
            .and_then(|slot| self.entry(slot))
            .map(|entry| &entry.key)
    }

    /// Returns the most recently used key.
    pub fn peek_newest(&self) -> Option<&K> {
        self.head
            .and_then(|slot| self.entry(slot))
            .map(|entry| &entry.key)
    }

    pub fn entry(&self, slot: usize) -> Option<&CacheEntry<K, V>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut CacheEntry<K, V>> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    // == Clear ==
    /// Drops every entry and releases the slab.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Length ==
    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Iter ==
    /// Iterates keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let entry = self.entry(cursor?)?;
            cursor = entry.next;
            Some(&entry.key)
        })
    }

    /// Mutable access to every value, in slot order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.slots.iter_mut().flatten().map(|entry| &mut entry.value)
    }

    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(entry) = self.entry_mut(slot) {
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head.and_then(|head| self.entry_mut(head)) {
            Some(head) => head.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.entry_mut(slot) {
            Some(entry) => (entry.prev.take(), entry.next.take()),
            None => return,
        };

        match prev.and_then(|p| self.entry_mut(p)) {
            Some(entry) => entry.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.entry_mut(n)) {
            Some(entry) => entry.prev = prev,
            None => self.tail = prev,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(list: &RecencyList<String, u32>) -> Vec<String> {
        list.keys().cloned().collect()
    }

    #[test]
    fn test_list_new() {
        let list: RecencyList<String, u32> = RecencyList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.peek_oldest().is_none());
    }

    #[test]
    fn test_list_push_front_orders_by_insertion() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        list.push_front("key2".to_string(), 2);
        list.push_front("key3".to_string(), 3);

        assert_eq!(list.len(), 3);
        assert_eq!(list.peek_oldest(), Some(&"key1".to_string()));
        assert_eq!(list.peek_newest(), Some(&"key3".to_string()));
    }

    #[test]
    fn test_list_touch_existing_slot() {
        let mut list = RecencyList::new();

        let first = list.push_front("key1".to_string(), 1);
        list.push_front("key2".to_string(), 2);
        list.push_front("key3".to_string(), 3);

        list.touch(first);

        assert_eq!(list.len(), 3);
        assert_eq!(list.peek_oldest(), Some(&"key2".to_string()));
        assert_eq!(keys_of(&list), vec!["key1", "key3", "key2"]);
    }

    #[test]
    fn test_list_evict_oldest() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        list.push_front("key2".to_string(), 2);
        list.push_front("key3".to_string(), 3);

        assert_eq!(list.evict_oldest(), Some(("key1".to_string(), 1)));
        assert_eq!(list.len(), 2);

        assert_eq!(list.evict_oldest(), Some(("key2".to_string(), 2)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_list_evict_empty() {
        let mut list: RecencyList<String, u32> = RecencyList::new();
        assert_eq!(list.evict_oldest(), None);
    }

    #[test]
    fn test_list_remove_middle() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        let middle = list.push_front("key2".to_string(), 2);
        list.push_front("key3".to_string(), 3);

        assert_eq!(list.remove(middle), Some(("key2".to_string(), 2)));
        assert_eq!(keys_of(&list), vec!["key3", "key1"]);
        assert_eq!(list.remove(middle), None);
    }

    #[test]
    fn test_list_order_after_multiple_touches() {
        let mut list = RecencyList::new();

        let a = list.push_front("a".to_string(), 0);
        let b = list.push_front("b".to_string(), 0);
        let c = list.push_front("c".to_string(), 0);

        list.touch(a);
        list.touch(c);
        list.touch(b);

        assert_eq!(list.evict_oldest().map(|(k, _)| k), Some("a".to_string()));
        assert_eq!(list.evict_oldest().map(|(k, _)| k), Some("c".to_string()));
        assert_eq!(list.evict_oldest().map(|(k, _)| k), Some("b".to_string()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_reuses_freed_slot() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        list.push_front("key2".to_string(), 2);
        list.evict_oldest();

        let slot = list.push_front("key3".to_string(), 3);

        assert_eq!(slot, 0, "evicted slot should be recycled");
        assert_eq!(list.slots.len(), 2);
        assert_eq!(keys_of(&list), vec!["key3", "key2"]);
    }

    #[test]
    fn test_list_touch_head_is_noop() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        let head = list.push_front("key2".to_string(), 2);
        list.touch(head);

        assert_eq!(keys_of(&list), vec!["key2", "key1"]);
    }

    #[test]
    fn test_list_values_mut_skips_freed_slots() {
        let mut list = RecencyList::new();
        list.push_front("a".to_string(), 1u32);
        let b = list.push_front("b".to_string(), 2);
        list.push_front("c".to_string(), 3);
        list.remove(b);

        for value in list.values_mut() {
            *value *= 10;
        }

        let mut values: Vec<u32> = list.values_mut().map(|v| *v).collect();
        values.sort();
        assert_eq!(values, vec![10, 30]);
        assert_eq!(keys_of(&list), vec!["c", "a"]);
    }

    #[test]
    fn test_list_clear() {
        let mut list = RecencyList::new();

        list.push_front("key1".to_string(), 1);
        list.push_front("key2".to_string(), 2);
        list.clear();

        assert!(list.is_empty());
        assert!(list.peek_newest().is_none());
        assert_eq!(list.keys().count(), 0);
    }
}
