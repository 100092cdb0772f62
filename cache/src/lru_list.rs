use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, T> {
  key: K,
  value: T,
  next: Option<Index>,
  prev: Option<Index>,
}

/// The cache index and its recency order in one structure.
///
/// Nodes live in a generational arena and are linked through arena indices,
/// so the list needs no second allocation per entry and never forms an
/// ownership cycle. The lookup map points each key at its node.
#[derive(Debug)]
pub(crate) struct LruList<K, T, H> {
  nodes: Arena<Node<K, T>>,
  lookup: HashMap<K, Index, H>,
  // Head is the most-recently-used item.
  head: Option<Index>,
  // Tail is the least-recently-used item.
  tail: Option<Index>,
}

impl<K, T, H> LruList<K, T, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn with_hasher(hasher: H) -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::with_hasher(hasher),
      head: None,
      tail: None,
    }
  }

  // Detaches a node from its neighbours. Arena and map are left untouched.
  fn unlink(&mut self, index: Index) {
    let (prev_idx, next_idx) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev_idx {
      Some(prev) => self.nodes[prev].next = next_idx,
      None => self.head = next_idx,
    }

    match next_idx {
      Some(next) => self.nodes[next].prev = prev_idx,
      None => self.tail = prev_idx,
    }
  }

  // Links a node that is already in the arena in as the new head.
  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old) = old_head {
      self.nodes[old].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  #[cfg(test)]
  pub(crate) fn contains(&self, key: &K) -> bool {
    self.lookup.contains_key(key)
  }

  pub(crate) fn get(&self, key: &K) -> Option<&T> {
    let index = *self.lookup.get(key)?;
    self.nodes.get(index).map(|node| &node.value)
  }

  pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut T> {
    let index = *self.lookup.get(key)?;
    self.nodes.get_mut(index).map(|node| &mut node.value)
  }

  /// Inserts `key` at the head. If the key is already present its value is
  /// replaced, it is moved to the head, and the old value is returned.
  pub(crate) fn push_front(&mut self, key: K, value: T) -> Option<T> {
    if let Some(&index) = self.lookup.get(&key) {
      let old = std::mem::replace(&mut self.nodes[index].value, value);
      self.move_index_to_front(index);
      return Some(old);
    }

    let index = self.nodes.insert(Node {
      key: key.clone(),
      value,
      next: None,
      prev: None,
    });
    self.lookup.insert(key, index);
    self.link_front(index);
    None
  }

  fn move_index_to_front(&mut self, index: Index) {
    if self.head != Some(index) {
      self.unlink(index);
      self.link_front(index);
    }
  }

  /// Marks `key` as most recently used. Returns `false` if it is not present.
  pub(crate) fn move_to_front(&mut self, key: &K) -> bool {
    match self.lookup.get(key) {
      Some(&index) => {
        self.move_index_to_front(index);
        true
      }
      None => false,
    }
  }

  pub(crate) fn remove(&mut self, key: &K) -> Option<T> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.value)
  }

  /// Removes and returns the least recently used entry.
  pub(crate) fn pop_back(&mut self) -> Option<(K, T)> {
    let tail = self.tail?;
    let key = self.nodes.get(tail)?.key.clone();
    self.remove(&key).map(|value| (key, value))
  }

  /// Removes and returns every entry for which `remove` returns `true`.
  pub(crate) fn drain_where<F>(&mut self, mut remove: F) -> Vec<(K, T)>
  where
    F: FnMut(&K, &T) -> bool,
  {
    let victims: Vec<K> = self
      .nodes
      .iter()
      .filter(|(_, node)| remove(&node.key, &node.value))
      .map(|(_, node)| node.key.clone())
      .collect();

    victims
      .into_iter()
      .filter_map(|key| self.remove(&key).map(|value| (key, value)))
      .collect()
  }

  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  /// Keys from most to least recently used.
  pub(crate) fn keys(&self) -> Vec<K> {
    let mut keys = Vec::with_capacity(self.len());
    let mut current = self.head;
    while let Some(index) = current {
      let node = &self.nodes[index];
      keys.push(node.key.clone());
      current = node.next;
    }
    keys
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn list() -> LruList<i32, &'static str, ahash::RandomState> {
    LruList::with_hasher(ahash::RandomState::new())
  }

  #[test]
  fn new_list_is_empty() {
    let list = list();
    assert!(list.keys().is_empty(), "New list keys should be empty");
    assert_eq!(list.len(), 0);
    assert!(!list.contains(&123), "New list should not contain any key");
  }

  #[test]
  fn push_front_new_items() {
    let mut list = list();

    assert!(list.push_front(10, "a").is_none());
    assert!(list.contains(&10));
    assert_eq!(list.keys(), vec![10]);

    assert!(list.push_front(20, "b").is_none());
    assert_eq!(list.len(), 2);
    assert_eq!(
      list.keys(),
      vec![20, 10],
      "Newest item should be at the front"
    );
  }

  #[test]
  fn push_front_existing_item_replaces_and_moves_to_front() {
    let mut list = list();
    list.push_front(1, "one");
    list.push_front(2, "two");
    list.push_front(3, "three");
    assert_eq!(list.keys(), vec![3, 2, 1]);

    let old = list.push_front(1, "uno");
    assert_eq!(old, Some("one"));
    assert_eq!(list.len(), 3, "Length should not change");
    assert_eq!(list.get(&1), Some(&"uno"));
    assert_eq!(
      list.keys(),
      vec![1, 3, 2],
      "Existing item should move to front"
    );
  }

  #[test]
  fn move_to_front_is_noop_for_head_and_missing() {
    let mut list = list();
    list.push_front(1, "a");
    list.push_front(2, "b");

    assert!(list.move_to_front(&2));
    assert_eq!(list.keys(), vec![2, 1]);

    assert!(list.move_to_front(&1));
    assert_eq!(list.keys(), vec![1, 2]);

    assert!(!list.move_to_front(&99));
    assert_eq!(list.keys(), vec![1, 2]);
  }

  #[test]
  fn pop_back_from_non_empty_list() {
    let mut list = list();
    list.push_front(1, "a"); // This will be the LRU item
    list.push_front(2, "b");
    list.push_front(3, "c");

    assert_eq!(list.pop_back(), Some((1, "a")));
    assert!(!list.contains(&1), "Popped item should be removed");
    assert_eq!(list.keys(), vec![3, 2]);

    assert_eq!(list.pop_back(), Some((2, "b")));
    assert_eq!(list.pop_back(), Some((3, "c")));
    assert_eq!(list.pop_back(), None, "pop_back on empty list returns None");
    assert!(list.keys().is_empty());
  }

  #[test]
  fn remove_item_from_middle_and_ends() {
    let mut list = list();
    for key in 1..=5 {
      list.push_front(key, "x");
    }
    assert_eq!(list.keys(), vec![5, 4, 3, 2, 1]);

    assert_eq!(list.remove(&3), Some("x"));
    assert_eq!(list.keys(), vec![5, 4, 2, 1]);

    assert_eq!(list.remove(&5), Some("x"));
    assert_eq!(list.remove(&1), Some("x"));
    assert_eq!(list.keys(), vec![4, 2]);

    assert_eq!(list.remove(&99), None);
    assert_eq!(list.len(), 2, "Length should not change");

    // Links must still be consistent after the head and tail were removed.
    list.push_front(6, "y");
    assert_eq!(list.pop_back(), Some((2, "x")));
    assert_eq!(list.keys(), vec![6, 4]);
  }

  #[test]
  fn drain_where_removes_matching_entries() {
    let mut list = list();
    for key in 1..=6 {
      list.push_front(key, if key % 2 == 0 { "even" } else { "odd" });
    }

    let mut removed = list.drain_where(|_, value| *value == "even");
    removed.sort();
    assert_eq!(removed, vec![(2, "even"), (4, "even"), (6, "even")]);
    assert_eq!(list.keys(), vec![5, 3, 1]);
  }

  #[test]
  fn clear_resets_list() {
    let mut list = list();
    list.push_front(1, "a");
    list.push_front(2, "b");

    list.clear();

    assert!(list.keys().is_empty());
    assert_eq!(list.len(), 0);
    assert!(!list.contains(&1));
    assert_eq!(list.pop_back(), None);
  }

  #[test]
  fn get_mut_updates_in_place_without_reordering() {
    let mut list = list();
    list.push_front(1, "a");
    list.push_front(2, "b");

    if let Some(value) = list.get_mut(&1) {
      *value = "changed";
    }
    assert_eq!(list.get(&1), Some(&"changed"));
    assert_eq!(list.keys(), vec![2, 1]);
  }
}
